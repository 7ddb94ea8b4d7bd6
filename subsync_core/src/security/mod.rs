//! Credential handling
//!
//! Credentials are read on demand through [`CredentialProvider`] and the
//! password is only held as a [`SecureString`].

pub mod credentials;
pub mod secure_string;

// Re-export main types
pub use credentials::{
    AUTH_FILE_NAME, AuthCredentials, CredentialProvider, FileCredentialProvider,
    StaticCredentialProvider,
};
pub use secure_string::SecureString;
