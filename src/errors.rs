//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion
//! for errors the pipeline uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for EtlError {
    fn from(e: reqwest::Error) -> Self { EtlError::Http(e.to_string()) }
}

impl From<serde_json::Error> for EtlError {
    fn from(e: serde_json::Error) -> Self { EtlError::Parse(e.to_string()) }
}

impl From<sqlx::Error> for EtlError {
    fn from(e: sqlx::Error) -> Self { EtlError::Db(e.to_string()) }
}
