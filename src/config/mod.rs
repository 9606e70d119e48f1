pub mod cli;
pub mod settings;

pub use settings::{IdleStrategy, Settings};
