//! Named sprite sheets and audio clips
//!
//! Frames are addressed by (sheet, column, row). Turning a [`FrameRef`] into
//! pixels is the display backend's job.

use std::path::{Path, PathBuf};

/// The sprite sheets shipped with the prop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetId {
    Awaken,
    Idle,
    Sing,
    /// Shared by quips and the story
    Active,
    /// Rows 0..4 preview, 4..23 roll
    Dice,
    /// One column per result value; rows 0..4 reveal, 3..7 tail
    Results,
}

impl SheetId {
    pub fn file_name(self) -> &'static str {
        match self {
            SheetId::Awaken => "awaken.bmp",
            SheetId::Idle => "idle.bmp",
            SheetId::Sing => "sing.bmp",
            SheetId::Active => "active.bmp",
            SheetId::Dice => "dice.bmp",
            SheetId::Results => "results.bmp",
        }
    }

    pub fn columns(self) -> usize {
        match self {
            SheetId::Awaken => 1,
            SheetId::Idle => 5,
            SheetId::Sing => 6,
            SheetId::Active => 10,
            SheetId::Dice => 7,
            SheetId::Results => 100,
        }
    }

    pub fn rows(self) -> usize {
        match self {
            SheetId::Awaken | SheetId::Idle | SheetId::Sing | SheetId::Active => 36,
            SheetId::Dice => 23,
            SheetId::Results => 7,
        }
    }
}

impl std::fmt::Display for SheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One frame of one sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub sheet: SheetId,
    pub column: usize,
    pub row: usize,
}

/// Audio clip names, relative to the audio directory
pub mod clips {
    pub const BEEP: &str = "fx/beep.wav";
    pub const REVIVE: &str = "fx/revive.wav";
    pub const GUARDIAN_DOWN: &str = "fx/guardiandown.wav";
    pub const CRIT: &str = "fx/crit.wav";
    pub const ROLL: &str = "fx/roll.wav";
    pub const STORY: &str = "fx/story.wav";
    pub const BOOT: &str = "quips/eyesupguardian.wav";

    /// Always the first song after power-up
    pub const FIRST_SONG: &str = "songs/billy.wav";

    pub const SONGS: [&str; 8] = [
        "songs/erismorn.wav",
        "songs/closingtime.wav",
        "songs/mulan.wav",
        "songs/onmyown.wav",
        "songs/dreadnaught.wav",
        "songs/boomsmash.wav",
        "songs/billy.wav",
        "songs/awokenqueen.wav",
    ];

    pub const QUIPS: [&str; 18] = [
        "quips/shaxlasers.wav",
        "quips/smells.wav",
        "quips/wewin.wav",
        "quips/decapitation.wav",
        "quips/lesssorry.wav",
        "quips/vextrap.wav",
        "quips/scarymonster.wav",
        "quips/staydown.wav",
        "quips/cruciblenext.wav",
        "quips/noarms.wav",
        "quips/elevator.wav",
        "quips/occamlaser.wav",
        "quips/victorydance.wav",
        "quips/setup.wav",
        "quips/zavalalove.wav",
        "quips/handlandslaser.wav",
        "quips/view.wav",
        "quips/allyourlimbs.wav",
    ];
}

/// Resolves catalog names against the asset tree
#[derive(Debug, Clone)]
pub struct Assets {
    root: PathBuf,
}

impl Assets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clip(&self, name: &str) -> PathBuf {
        self.root.join("audio").join(name)
    }

    pub fn sheet(&self, sheet: SheetId) -> PathBuf {
        self.root.join("animations").join(sheet.file_name())
    }
}
