use tracing::info;

use crate::catalog::{clips, SheetId};
use crate::context::AppContext;
use crate::playback::accompany;

use super::StateKind;

/// Wake-up animation with its fixed cue
pub struct BootState;

impl BootState {
    pub fn run(&self, ctx: &AppContext) -> Option<StateKind> {
        info!("boot: animation and cue");
        let sheet = SheetId::Awaken;
        // The cue is never cut; the animation yields to the interrupt flag
        accompany(&ctx.playback, &ctx.pacer, clips::BOOT, false, |_| {
            ctx.animator
                .play_column(sheet, 0, 0..sheet.rows(), true, false);
        });
        Some(StateKind::Idle)
    }
}
