use std::fmt;

#[derive(Debug)]
pub enum MaterializeError {
    MissingHash(String),
    MissingLocation(String),
    UnknownNode(String),
    ManifestError(String, String),
    StoreResetFailed(String),
    CopyFailed(String, String),
    LinkFailed(String, String),
    DescriptorError(String, String),
    IoError(String),
}

impl fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializeError::MissingHash(node) => {
                write!(f, "No content hash recorded for node '{}'", node)
            }
            MaterializeError::MissingLocation(key) => {
                write!(f, "No cache location recorded for package '{}'", key)
            }
            MaterializeError::UnknownNode(node) => {
                write!(
                    f,
                    "Graph references node '{}' but no install location was resolved for it",
                    node
                )
            }
            MaterializeError::ManifestError(file, msg) => {
                write!(f, "Failed to load manifest '{}': {}", file, msg)
            }
            MaterializeError::StoreResetFailed(msg) => {
                write!(f, "Failed to reset package store: {}", msg)
            }
            MaterializeError::CopyFailed(hash, msg) => {
                write!(f, "Failed to copy package contents for hash '{}': {}", hash, msg)
            }
            MaterializeError::LinkFailed(name, msg) => {
                write!(f, "Failed to link '{}': {}", name, msg)
            }
            MaterializeError::DescriptorError(location, msg) => {
                write!(f, "Package descriptor error at {}: {}", location, msg)
            }
            MaterializeError::IoError(msg) => {
                write!(f, "I/O error: {}", msg)
            }
        }
    }
}

impl std::error::Error for MaterializeError {}

impl From<anyhow::Error> for MaterializeError {
    fn from(err: anyhow::Error) -> Self {
        MaterializeError::IoError(err.to_string())
    }
}

impl From<std::io::Error> for MaterializeError {
    fn from(err: std::io::Error) -> Self {
        MaterializeError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MaterializeError>;
