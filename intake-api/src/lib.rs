pub mod config;
pub mod database;
pub mod dedup;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod jobs;
pub mod notifications;
pub mod store;

pub use database::Database;
pub use error::{IntakeError, IntakeResult};
