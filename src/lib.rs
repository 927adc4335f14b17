pub mod activity;
pub mod config;
pub mod credentials;
pub mod database;
pub mod engine;
pub mod error;
pub mod github;
pub mod notify;
pub mod watermark;

pub use error::PulseError;
