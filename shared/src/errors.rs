//! Shared error types for the inference stack

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid role name: {input}")]
    InvalidRole { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
