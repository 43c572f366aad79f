use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service error: {0}")]
    Service(#[from] crate::service::ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
