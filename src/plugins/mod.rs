pub mod console;
pub mod legendary;
pub mod process;
pub mod registry;
