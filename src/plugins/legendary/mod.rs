pub mod cli;
pub mod driver;
pub mod locator;
pub mod progress;
