pub mod ani;
pub mod converter;
pub mod cur;
pub mod dib;
pub mod reader;
pub mod utils;

pub use ani::{AniCursor, AniParser};
pub use converter::{ConversionOptions, convert_bytes, convert_file};
pub use cur::CurParser;
pub use dib::DibStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorFormat {
    Cur,
    Ani,
}

impl CursorFormat {
    /// Sniffs the container from its leading bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if CurParser::can_parse(data) {
            Some(CursorFormat::Cur)
        } else if AniParser::can_parse(data) {
            Some(CursorFormat::Ani)
        } else {
            None
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "cur" => Some(CursorFormat::Cur),
            "ani" => Some(CursorFormat::Ani),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CursorFormat::Cur => "cur",
            CursorFormat::Ani => "ani",
        }
    }
}
