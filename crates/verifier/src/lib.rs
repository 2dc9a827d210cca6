// crates/verifier/src/lib.rs

//! Public facade for the policy certificate verifier.
//! Exposes a stable API and re-exports types for consumers (FFI, embedders).

pub mod adapters;
pub mod crypto;
pub mod domain;

/// Build and initialize a [`PolicyCertVerifier`] over the OpenSSL
/// procedure. Must be called inside a tokio runtime; completions are
/// delivered through `owner`.
#[cfg(feature = "openssl")]
pub fn openssl_policy_verifier(
    anchor_used: Option<AnchorUsedCallback>,
    settings: VerifierSettings,
    use_system_roots: bool,
    owner: OwnerSequence,
) -> domain::error::EngineResult<PolicyCertVerifier> {
    let proc_ = if use_system_roots {
        adapters::openssl::OpensslVerifyProc::new()
    } else {
        adapters::openssl::OpensslVerifyProc::without_system_roots()
    };
    let limits = settings.cache;
    let config = settings.into_config()?;
    let mut verifier = PolicyCertVerifier::new(anchor_used).with_cache_limits(limits);
    verifier.initialize(std::sync::Arc::new(proc_), owner)?;
    verifier.set_config(config)?;
    Ok(verifier)
}

// Re-exports for convenience
pub use adapters::caching::CachingCertVerifier;
pub use adapters::multi_threaded::MultiThreadedCertVerifier;
pub use adapters::sequence::{owner_sequence, OwnerLoop, OwnerSequence};
#[cfg(feature = "openssl")]
pub use adapters::openssl::OpensslVerifyProc;
pub use domain::cert_verifier::{CertVerifier, CertVerifyProc, CompletionCallback, Request};
pub use domain::error::EngineError;
pub use domain::policy::{extend_trust_anchors, AnchorUsedCallback, PolicyCertVerifier};
pub use domain::types::{
    CacheLimits, Certificate, CertificateList, EngineDefaults, RequestParams, TrustPolicyConfig,
    VerifierConfig, VerifierSettings, VerifyFlags,
};
pub use domain::verify::{CertError, CertVerifyResult, Completion, NetStatus, VerifyStatus};
