// adapters/multi_threaded.rs

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::domain::cert_verifier::{CertVerifier, CertVerifyProc, CompletionCallback, Request};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{RequestParams, VerifierConfig};
use crate::domain::verify::{CertError, CertVerifyResult, Completion, VerifyStatus};
use super::sequence::OwnerSequence;

/// Runs a [`CertVerifyProc`] on the tokio blocking pool and delivers
/// completions through the owner sequence.
pub struct MultiThreadedCertVerifier {
  proc_: Arc<dyn CertVerifyProc>,
  config: Arc<VerifierConfig>,
  owner: OwnerSequence,
  runtime: tokio::runtime::Handle,
}

impl MultiThreadedCertVerifier {
  /// Uses the tokio runtime the caller is running in.
  pub fn new(proc_: Arc<dyn CertVerifyProc>, owner: OwnerSequence) -> EngineResult<Self> {
    let runtime = tokio::runtime::Handle::try_current()
      .map_err(|e| EngineError::Runtime(format!("no tokio runtime for verifier workers: {}", e)))?;
    Ok(Self::with_runtime(proc_, owner, runtime))
  }

  pub fn with_runtime(
    proc_: Arc<dyn CertVerifyProc>,
    owner: OwnerSequence,
    runtime: tokio::runtime::Handle,
  ) -> Self {
    Self {
      proc_,
      config: Arc::new(VerifierConfig::default()),
      owner,
      runtime,
    }
  }

  /// Snapshot of the currently published config.
  pub fn config(&self) -> Arc<VerifierConfig> {
    Arc::clone(&self.config)
  }
}

impl CertVerifier for MultiThreadedCertVerifier {
  fn verify(
    &mut self,
    params: &RequestParams,
    callback: CompletionCallback,
    log: &tracing::Span,
  ) -> EngineResult<VerifyStatus> {
    if params.hostname.is_empty() {
      return Ok(VerifyStatus::Complete(Completion::failed(
        CertError::InvalidArgument,
        CertVerifyResult::default(),
      )));
    }

    let (request, cancel) = Request::new_pair();
    let proc_ = Arc::clone(&self.proc_);
    let config = Arc::clone(&self.config);
    let owner = self.owner.clone();
    let params = params.clone();
    let span = log.clone();

    tracing::debug!(parent: log, host = %params.hostname, "dispatching verification");
    self.runtime.spawn_blocking(move || {
      let _entered = span.enter();
      let completion = match catch_unwind(AssertUnwindSafe(|| proc_.verify(&params, &config))) {
        Ok(c) => c,
        Err(_) => {
          tracing::error!(host = %params.hostname, "verification procedure panicked");
          Completion::failed(CertError::Aborted, CertVerifyResult::default())
        }
      };
      let posted = owner.post(Box::new(move || {
        if cancel.is_cancelled() {
          tracing::trace!("dropping completion of cancelled request");
          return;
        }
        callback(completion);
      }));
      if !posted {
        tracing::debug!("owner sequence closed; completion discarded");
      }
    });

    Ok(VerifyStatus::Pending(request))
  }

  fn set_config(&mut self, config: VerifierConfig) -> EngineResult<()> {
    self.config = Arc::new(config);
    Ok(())
  }

  fn supports_additional_trust_anchors(&self) -> bool {
    self.proc_.supports_additional_trust_anchors()
  }
}
