use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Processor is not configured: missing {0}")]
    NotConfigured(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
