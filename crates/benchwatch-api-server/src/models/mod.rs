// ABOUTME: Request, response and error models for the API server

pub mod errors;
pub mod requests;
pub mod responses;

pub use errors::{ApiError, ErrorBody};
