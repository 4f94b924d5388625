//! HTTP ingestion and read endpoints.

pub mod error;
pub mod update;
pub mod value;

pub use error::ApiError;
