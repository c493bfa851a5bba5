//! Sprite-sheet frame pacing

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::{FrameRef, SheetId};
use crate::hw::DisplaySink;
use crate::runtime::Pacer;

/// Plays runs of frames from one sheet column at the frame period
pub struct Animator {
    display: Arc<dyn DisplaySink>,
    pacer: Arc<Pacer>,
    frame_period: Duration,
}

impl Animator {
    pub fn new(display: Arc<dyn DisplaySink>, pacer: Arc<Pacer>, frame_period: Duration) -> Self {
        Self {
            display,
            pacer,
            frame_period,
        }
    }

    pub fn display(&self) -> &Arc<dyn DisplaySink> {
        &self.display
    }

    /// Play rows `rows` of `column`, one frame per period.
    ///
    /// An interruptable run stops at the first frame boundary after the
    /// interrupt flag rises; any run stops on shutdown. With `hold_last`
    /// the last frame shown is drawn again after the run. Returns the row
    /// index reached, `rows.end` when the run completed.
    pub fn play_column(
        &self,
        sheet: SheetId,
        column: usize,
        rows: Range<usize>,
        interruptable: bool,
        hold_last: bool,
    ) -> usize {
        let end = rows.end.min(sheet.rows());
        let start = rows.start.min(end);
        if column >= sheet.columns() {
            warn!(%sheet, column, "column outside sheet, skipping");
            return start;
        }
        debug!(%sheet, column, start, end, interruptable, "animate");

        let mut failed = false;
        let mut index = start;
        while index < end {
            if self.pacer.cancelled(interruptable) {
                break;
            }
            self.show(sheet, column, index, &mut failed);
            index += 1;
            if !self.pacer.wait(self.frame_period, interruptable) {
                break;
            }
        }

        if hold_last && index > start {
            self.show(sheet, column, index - 1, &mut failed);
        }
        index
    }

    /// Show `rows` in the given order at the frame period, regardless of
    /// the interrupt flag. Returns the number of frames shown.
    pub fn play_rows(&self, sheet: SheetId, column: usize, rows: &[usize]) -> usize {
        let mut failed = false;
        let mut shown = 0;
        for &row in rows {
            if row >= sheet.rows() || column >= sheet.columns() {
                warn!(%sheet, column, row, "frame outside sheet, skipping");
                continue;
            }
            if self.pacer.cancelled(false) {
                break;
            }
            self.show(sheet, column, row, &mut failed);
            shown += 1;
            if !self.pacer.wait(self.frame_period, false) {
                break;
            }
        }
        shown
    }

    fn show(&self, sheet: SheetId, column: usize, row: usize, failed: &mut bool) {
        let frame = FrameRef { sheet, column, row };
        if let Err(e) = self.display.show(frame) {
            // One warning per run; the run keeps its pacing
            if !*failed {
                warn!(%sheet, column, row, error = %e, "display write failed");
                *failed = true;
            }
        }
    }
}
