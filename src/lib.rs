pub mod application;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infrastructure;

pub use config::AppConfig;
pub use errors::{CoreError, CoreErrorClass, CoreResult};
