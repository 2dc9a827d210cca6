// crates/verifier/src/domain/policy.rs

//! Policy overlay on top of a certificate verifier: injects administrator
//! trust anchors into every configuration and reports when a successful
//! verification relied on one of them.

use std::fmt;
use std::sync::Arc;

use super::cert_verifier::{CertVerifier, CertVerifyProc, CompletionCallback};
use super::error::{EngineError, EngineResult};
use super::types::{CacheLimits, Certificate, CertificateList, RequestParams, VerifierConfig};
use super::verify::{CertVerifyResult, Completion, NetStatus, VerifyStatus};
use crate::adapters::caching::CachingCertVerifier;
use crate::adapters::multi_threaded::MultiThreadedCertVerifier;
use crate::adapters::sequence::OwnerSequence;

/// Zero-argument notification fired when an additional anchor was used.
pub type AnchorUsedCallback = Arc<dyn Fn() + Send + Sync>;

pub struct PolicyCertVerifier {
    anchor_used: Option<AnchorUsedCallback>,
    trust_anchors: CertificateList,
    orig_config: VerifierConfig,
    cache_limits: CacheLimits,
    delegate: Option<Box<dyn CertVerifier>>,
}

impl fmt::Debug for PolicyCertVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyCertVerifier")
            .field("has_anchor_used_callback", &self.anchor_used.is_some())
            .field("trust_anchors", &self.trust_anchors.len())
            .field("initialized", &self.delegate.is_some())
            .finish()
    }
}

impl PolicyCertVerifier {
    pub fn new(anchor_used: Option<AnchorUsedCallback>) -> Self {
        Self {
            anchor_used,
            trust_anchors: CertificateList::new(),
            orig_config: VerifierConfig::default(),
            cache_limits: CacheLimits::defaults(),
            delegate: None,
        }
    }

    /// Limits for the result cache built by [`initialize`](Self::initialize).
    pub fn with_cache_limits(mut self, limits: CacheLimits) -> Self {
        self.cache_limits = limits;
        self
    }

    /// Bind the default verifier stack (a caching layer over a worker-pool
    /// verifier running `proc_`). Must run inside a tokio runtime.
    pub fn initialize(
        &mut self,
        proc_: Arc<dyn CertVerifyProc>,
        owner: OwnerSequence,
    ) -> EngineResult<()> {
        if self.delegate.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        let workers = MultiThreadedCertVerifier::new(proc_, owner)?;
        let delegate = CachingCertVerifier::new(workers, self.cache_limits);
        self.initialize_with_delegate(Box::new(delegate))
    }

    /// Bind an arbitrary delegate. The engine is fixed for the lifetime of
    /// this verifier; only its configuration changes afterwards.
    pub fn initialize_with_delegate(
        &mut self,
        mut delegate: Box<dyn CertVerifier>,
    ) -> EngineResult<()> {
        if self.delegate.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        if !delegate.supports_additional_trust_anchors() {
            tracing::warn!("Additional trust anchors not supported on the current platform!");
        }
        delegate.set_config(extend_trust_anchors(&self.orig_config, &self.trust_anchors))?;
        self.delegate = Some(delegate);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.delegate.is_some()
    }

    /// Replace the policy trust anchors. An identical list is a no-op.
    pub fn set_trust_anchors(&mut self, trust_anchors: CertificateList) -> EngineResult<()> {
        if trust_anchors == self.trust_anchors {
            return Ok(());
        }
        tracing::debug!(count = trust_anchors.len(), "trust anchors changed");
        // Stored only after the delegate accepted them.
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.set_config(extend_trust_anchors(&self.orig_config, &trust_anchors))?;
        }
        self.trust_anchors = trust_anchors;
        Ok(())
    }

    pub fn trust_anchors(&self) -> &[Certificate] {
        &self.trust_anchors
    }

    /// Configuration the delegate is (or will be) running with.
    pub fn effective_config(&self) -> VerifierConfig {
        extend_trust_anchors(&self.orig_config, &self.trust_anchors)
    }
}

impl CertVerifier for PolicyCertVerifier {
    fn verify(
        &mut self,
        params: &RequestParams,
        callback: CompletionCallback,
        log: &tracing::Span,
    ) -> EngineResult<VerifyStatus> {
        let delegate = self.delegate.as_mut().ok_or(EngineError::NotInitialized)?;

        let anchor_used = self.anchor_used.clone();
        let wrapped: CompletionCallback = Box::new(move |completion| {
            complete_and_signal_anchor_use(anchor_used.as_ref(), callback, completion)
        });

        let status = delegate.verify(params, wrapped, log)?;
        if let VerifyStatus::Complete(c) = &status {
            maybe_signal_anchor_use(&c.status, self.anchor_used.as_ref(), &c.result);
        }
        Ok(status)
    }

    fn set_config(&mut self, config: VerifierConfig) -> EngineResult<()> {
        let delegate = self.delegate.as_mut().ok_or(EngineError::NotInitialized)?;
        tracing::debug!("base verifier config replaced");
        self.orig_config = config;
        delegate.set_config(extend_trust_anchors(&self.orig_config, &self.trust_anchors))
    }

    fn supports_additional_trust_anchors(&self) -> bool {
        self.delegate
            .as_ref()
            .map_or(true, |d| d.supports_additional_trust_anchors())
    }
}

fn maybe_signal_anchor_use(
    status: &NetStatus,
    anchor_used: Option<&AnchorUsedCallback>,
    result: &CertVerifyResult,
) {
    if status.is_err() || !result.is_issued_by_additional_trust_anchor {
        return;
    }
    if let Some(cb) = anchor_used {
        cb();
    }
}

fn complete_and_signal_anchor_use(
    anchor_used: Option<&AnchorUsedCallback>,
    callback: CompletionCallback,
    completion: Completion,
) {
    maybe_signal_anchor_use(&completion.status, anchor_used, &completion.result);
    callback(completion);
}

/// `config` with `trust_anchors` placed ahead of its own additional anchors.
pub fn extend_trust_anchors(config: &VerifierConfig, trust_anchors: &[Certificate]) -> VerifierConfig {
    let mut new_config = config.clone();
    new_config
        .additional_trust_anchors
        .splice(0..0, trust_anchors.iter().cloned());
    new_config
}
