pub mod config;
pub mod fs;
pub mod setup;
pub mod utils;
