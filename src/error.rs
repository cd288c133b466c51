use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum CredentialError {
    UserAlreadyExists(String),
    UserNotFound(String),
    InvalidUsername(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::UserAlreadyExists(u) => write!(f, "user '{u}' already exists"),
            CredentialError::UserNotFound(u) => write!(f, "user '{u}' not found"),
            CredentialError::InvalidUsername(u) => write!(f, "invalid username {u:?}"),
        }
    }
}

impl std::error::Error for CredentialError {}
