// Re-export all types so callers can use `domain::types::*`.

pub use self::core::*;
pub use self::trust::*;
pub use self::config::*;

// Module declarations
mod core;
mod trust;
mod config;
