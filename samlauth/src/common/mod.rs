pub mod config;
pub mod types;

pub use config::ProfileConfig;
pub use types::*;
