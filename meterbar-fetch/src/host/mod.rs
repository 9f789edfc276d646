//! Host APIs for `MeterBar` fetch strategies.
//!
//! - [`credentials`] - Credential sources handed in by the host
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`process`] - Subprocess execution for CLI tools

pub mod credentials;
pub mod http;
pub mod process;

// Re-export key types
pub use credentials::{
    Credential, CredentialChain, CredentialSource, EnvCredentials, Secret, StaticCredentials,
};
pub use http::HttpClient;
pub use process::{ProcessOutput, ProcessRunner};
