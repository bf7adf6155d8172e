pub mod cursor_io;
pub mod inf;
pub mod wincur;

#[cfg(test)]
mod pipeline_test;
