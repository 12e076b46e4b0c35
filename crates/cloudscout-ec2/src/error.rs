//! EC2 wrapper error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Ec2Error {
    #[error("Invalid AWS configuration: {0}")]
    Config(String),

    #[error("EC2 API error: {0}")]
    Api(#[source] Box<aws_sdk_ec2::Error>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl Ec2Error {
    /// Wrap a service error without reclassifying it.
    pub(crate) fn api(err: impl Into<aws_sdk_ec2::Error>) -> Self {
        Ec2Error::Api(Box::new(err.into()))
    }
}

pub type Result<T> = std::result::Result<T, Ec2Error>;
