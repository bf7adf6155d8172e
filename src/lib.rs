// Library exports for ani2sprite

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;

pub use error::{CursorError, InfError};
pub use model::cursor::{CursorResult, MappedCursor, RoleSource};
pub use model::role::CursorRole;
pub use pipeline::cursor_io::{ConversionBatch, CursorSource, convert_folder, convert_listing};
pub use pipeline::inf::{InfMapping, parse_inf};
pub use pipeline::wincur::{ConversionOptions, convert_bytes, convert_file};
