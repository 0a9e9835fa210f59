pub mod grading;
pub mod payments;
pub mod storage;
pub mod config;
pub mod error;
pub mod utils;

pub use error::{Result, PortalError};
pub use config::Config;
