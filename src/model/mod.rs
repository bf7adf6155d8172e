pub mod cursor;
pub mod mapping;
pub mod role;
