use clinic_types::{MoneyError, TextError};

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{label} not found: {id}")]
    NotFound { label: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write document file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read document file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove document file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize document: {0}")]
    Deserialization(serde_json::Error),
    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("invalid id: {0}")]
    Uuid(#[from] clinic_uuid::UuidError),
    #[error("file storage error: {0}")]
    Files(#[from] clinic_files::FilesError),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),
    #[error("invalid amount: {0}")]
    Money(#[from] MoneyError),
}

impl ClinicError {
    /// True for errors caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClinicError::InvalidInput(_)
                | ClinicError::NotFound { .. }
                | ClinicError::Conflict(_)
                | ClinicError::Uuid(_)
                | ClinicError::Text(_)
                | ClinicError::Money(_)
        )
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
