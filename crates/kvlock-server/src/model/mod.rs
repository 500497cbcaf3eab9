//! Configuration, shared state and response models

pub mod app_state;
pub mod config;
pub mod constants;
pub mod response;

pub use app_state::AppState;
pub use config::{Cli, Configuration, StoreMode};
pub use response::{CountResult, ErrorResult};
