pub mod cert_verifier;
pub mod policy;
pub mod types;
pub mod verify;
pub mod error;
