pub mod cli;
pub mod commands;
pub mod generate;
pub mod util;

pub use generate::run_generate;
