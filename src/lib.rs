pub mod config;
pub mod core;
pub mod error;
pub mod i18n;
pub mod plugins;
