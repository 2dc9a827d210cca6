// Concrete verifier layers and the owner-thread plumbing they share.

pub mod caching;
pub mod multi_threaded;
pub mod sequence;

#[cfg(feature = "openssl")]
pub mod openssl;
