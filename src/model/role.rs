use serde::{Deserialize, Serialize};
use std::fmt;

/// Target cursor roles that Windows cursors are mapped onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorRole {
    Arrow,
    Ibeam,
    Pointing,
    Busy,
    Wait,
    Crosshair,
    Forbidden,
    Move,
    Help,
    ResizeNs,
    WindowNs,
    ResizeWe,
    WindowEw,
    WindowNwse,
    WindowNesw,
}

impl CursorRole {
    pub const ALL: [CursorRole; 15] = [
        CursorRole::Arrow,
        CursorRole::Ibeam,
        CursorRole::Pointing,
        CursorRole::Busy,
        CursorRole::Wait,
        CursorRole::Crosshair,
        CursorRole::Forbidden,
        CursorRole::Move,
        CursorRole::Help,
        CursorRole::ResizeNs,
        CursorRole::WindowNs,
        CursorRole::ResizeWe,
        CursorRole::WindowEw,
        CursorRole::WindowNwse,
        CursorRole::WindowNesw,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            CursorRole::Arrow => "arrow",
            CursorRole::Ibeam => "ibeam",
            CursorRole::Pointing => "pointing",
            CursorRole::Busy => "busy",
            CursorRole::Wait => "wait",
            CursorRole::Crosshair => "crosshair",
            CursorRole::Forbidden => "forbidden",
            CursorRole::Move => "move",
            CursorRole::Help => "help",
            CursorRole::ResizeNs => "resize-ns",
            CursorRole::WindowNs => "window-ns",
            CursorRole::ResizeWe => "resize-we",
            CursorRole::WindowEw => "window-ew",
            CursorRole::WindowNwse => "window-nwse",
            CursorRole::WindowNesw => "window-nesw",
        }
    }

    pub fn from_identifier(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.identifier() == id)
    }
}

impl fmt::Display for CursorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
