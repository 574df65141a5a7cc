use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hardware init error: {0}")]
    HardwareInit(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

pub type Result<T> = std::result::Result<T, PlayError>;
