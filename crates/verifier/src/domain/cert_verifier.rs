// crates/verifier/src/domain/cert_verifier.rs

use std::fmt;

use tokio_util::sync::{CancellationToken, DropGuard};

use super::error::EngineResult;
use super::types::{RequestParams, VerifierConfig};
use super::verify::{Completion, VerifyStatus};

/// Invoked once with the outcome of a pending verification.
pub type CompletionCallback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Verifier interface shared by the policy layer and its delegates.
///
/// Contract for implementors: when `verify` returns
/// [`VerifyStatus::Complete`], `callback` must be dropped without being
/// called. When it returns [`VerifyStatus::Pending`], `callback` runs at
/// most once, on the owner sequence, and never after the returned
/// [`Request`] was dropped or cancelled.
pub trait CertVerifier: Send {
    fn verify(
        &mut self,
        params: &RequestParams,
        callback: CompletionCallback,
        log: &tracing::Span,
    ) -> EngineResult<VerifyStatus>;

    /// Replace the configuration used by subsequent verifications.
    fn set_config(&mut self, config: VerifierConfig) -> EngineResult<()>;

    /// Whether `additional_trust_anchors` in the config has any effect.
    fn supports_additional_trust_anchors(&self) -> bool {
        true
    }
}

/// Synchronous verification routine run on a worker thread. This is the
/// seam to the platform engine that does path building and validation.
pub trait CertVerifyProc: Send + Sync {
    fn verify(&self, params: &RequestParams, config: &VerifierConfig) -> Completion;

    fn supports_additional_trust_anchors(&self) -> bool;
}

/// Handle to a pending verification. Dropping it cancels the request.
pub struct Request {
    _guard: DropGuard,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request").finish_non_exhaustive()
    }
}

impl Request {
    /// A request handle plus the token the worker side checks before
    /// delivering the completion.
    pub fn new_pair() -> (Request, CancellationToken) {
        let token = CancellationToken::new();
        let worker = token.clone();
        (Request { _guard: token.drop_guard() }, worker)
    }

    /// Explicit form of dropping the handle.
    pub fn cancel(self) {}
}
