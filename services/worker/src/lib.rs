pub mod config;
pub mod consumer;

pub use config::Config;
pub use consumer::{Consumer, Outcome};
