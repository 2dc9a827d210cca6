use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use policy_cert_verifier as pcv;
use pcv::domain::error::EngineError;
use pcv::{CertVerifier, Certificate, Completion, OwnerLoop, PolicyCertVerifier, VerifyStatus};

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    #[error("{message}")]
    Generic { message: String },
}

impl From<EngineError> for FfiError {
    fn from(e: EngineError) -> Self {
        FfiError::Generic {
            message: e.to_string(),
        }
    }
}

fn generic(message: impl Into<String>) -> FfiError {
    FfiError::Generic { message: message.into() }
}

// ===== FFI types mirroring the public Rust API (FFI-friendly) =====

#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiCertError {
    InvalidArgument,
    AuthorityInvalid,
    DateInvalid,
    CommonNameInvalid,
    Revoked,
    UnableToCheckRevocation,
    WeakSignatureAlgorithm,
    Invalid,
    Aborted,
}

impl From<pcv::CertError> for FfiCertError {
    fn from(v: pcv::CertError) -> Self {
        use pcv::CertError as E;
        match v {
            E::InvalidArgument => FfiCertError::InvalidArgument,
            E::AuthorityInvalid => FfiCertError::AuthorityInvalid,
            E::DateInvalid => FfiCertError::DateInvalid,
            E::CommonNameInvalid => FfiCertError::CommonNameInvalid,
            E::Revoked => FfiCertError::Revoked,
            E::UnableToCheckRevocation => FfiCertError::UnableToCheckRevocation,
            E::WeakSignatureAlgorithm => FfiCertError::WeakSignatureAlgorithm,
            E::Invalid => FfiCertError::Invalid,
            E::Aborted => FfiCertError::Aborted,
        }
    }
}

#[derive(uniffi::Record, Debug, Clone, PartialEq, Eq)]
pub struct FfiVerifierConfig {
    pub enable_rev_checking: bool,
    pub require_rev_checking_local_anchors: bool,
    pub enable_sha1_local_anchors: bool,
    pub disable_symantec_enforcement: bool,
    pub additional_trust_anchors: Vec<Vec<u8>>,         // DER
    pub additional_untrusted_authorities: Vec<Vec<u8>>, // DER
}

fn to_certs(ders: Vec<Vec<u8>>) -> pcv::CertificateList {
    ders.into_iter().map(Certificate::from_der).collect()
}

fn from_certs(certs: &[Certificate]) -> Vec<Vec<u8>> {
    certs.iter().map(|c| c.as_der().to_vec()).collect()
}

impl From<FfiVerifierConfig> for pcv::VerifierConfig {
    fn from(v: FfiVerifierConfig) -> Self {
        pcv::VerifierConfig {
            enable_rev_checking: v.enable_rev_checking,
            require_rev_checking_local_anchors: v.require_rev_checking_local_anchors,
            enable_sha1_local_anchors: v.enable_sha1_local_anchors,
            disable_symantec_enforcement: v.disable_symantec_enforcement,
            additional_trust_anchors: to_certs(v.additional_trust_anchors),
            additional_untrusted_authorities: to_certs(v.additional_untrusted_authorities),
        }
    }
}

impl From<pcv::VerifierConfig> for FfiVerifierConfig {
    fn from(v: pcv::VerifierConfig) -> Self {
        Self {
            enable_rev_checking: v.enable_rev_checking,
            require_rev_checking_local_anchors: v.require_rev_checking_local_anchors,
            enable_sha1_local_anchors: v.enable_sha1_local_anchors,
            disable_symantec_enforcement: v.disable_symantec_enforcement,
            additional_trust_anchors: from_certs(&v.additional_trust_anchors),
            additional_untrusted_authorities: from_certs(&v.additional_untrusted_authorities),
        }
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiVerifyRequest {
    pub certificate: Vec<u8>,        // leaf, DER
    pub intermediates: Vec<Vec<u8>>, // DER, leaf-most first
    pub hostname: String,
    pub ocsp_response: Vec<u8>,
    pub sct_list: Vec<u8>,
    pub disable_network_fetches: bool,
}

impl From<FfiVerifyRequest> for pcv::RequestParams {
    fn from(v: FfiVerifyRequest) -> Self {
        let mut params = pcv::RequestParams::new(
            Certificate::from_der(v.certificate),
            to_certs(v.intermediates),
            v.hostname,
        );
        params.ocsp_response = v.ocsp_response;
        params.sct_list = v.sct_list;
        params.flags.disable_network_fetches = v.disable_network_fetches;
        params
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiVerifyOutcome {
    pub error: Option<FfiCertError>, // None on success
    pub cert_status: Vec<FfiCertError>,
    pub verified_chain: Vec<Vec<u8>>,
    pub has_sha1: bool,
    pub is_issued_by_known_root: bool,
    pub is_issued_by_additional_trust_anchor: bool,
}

impl From<Completion> for FfiVerifyOutcome {
    fn from(c: Completion) -> Self {
        Self {
            error: c.status.err().map(FfiCertError::from),
            cert_status: c.result.cert_status.into_iter().map(FfiCertError::from).collect(),
            verified_chain: from_certs(&c.result.verified_chain),
            has_sha1: c.result.has_sha1,
            is_issued_by_known_root: c.result.is_issued_by_known_root,
            is_issued_by_additional_trust_anchor: c.result.is_issued_by_additional_trust_anchor,
        }
    }
}

// ===== Anchor-use notification from the host =====

/// Implemented by the host application; told whenever a successful
/// verification relied on a policy trust anchor.
#[uniffi::export(with_foreign)]
pub trait AnchorUsedObserver: Send + Sync {
    fn on_anchor_used(&self);
}

// ===== Verifier object =====

struct Inner {
    verifier: PolicyCertVerifier,
    owner: OwnerLoop,
}

/// Blocking wrapper over [`PolicyCertVerifier`]. Worker jobs run on an
/// owned tokio runtime; each `verify` call drives completions to its own
/// thread before returning.
#[derive(uniffi::Object)]
pub struct FfiPolicyVerifier {
    // Declared before `runtime` so the verifier stack drops first.
    inner: Mutex<Inner>,
    runtime: tokio::runtime::Runtime,
}

impl FfiPolicyVerifier {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, FfiError> {
        self.inner.lock().map_err(|_| generic("verifier state poisoned"))
    }
}

#[uniffi::export]
impl FfiPolicyVerifier {
    #[uniffi::constructor]
    pub fn new(
        observer: Option<Arc<dyn AnchorUsedObserver>>,
        use_system_roots: bool,
    ) -> Result<Arc<Self>, FfiError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| generic(format!("Failed to build runtime: {e}")))?;
        let anchor_used: Option<pcv::AnchorUsedCallback> = observer.map(|o| {
            let cb: pcv::AnchorUsedCallback = Arc::new(move || o.on_anchor_used());
            cb
        });
        let (seq, owner) = pcv::owner_sequence();
        let mut verifier = PolicyCertVerifier::new(anchor_used);
        {
            let _guard = runtime.enter();
            initialize(&mut verifier, seq, use_system_roots)?;
        }
        tracing::debug!(use_system_roots, "ffi policy verifier created");
        Ok(Arc::new(Self {
            inner: Mutex::new(Inner { verifier, owner }),
            runtime,
        }))
    }

    /// Replace the policy anchors from a PEM bundle. A blank string clears them.
    pub fn set_trust_anchors_pem(&self, pem: String) -> Result<(), FfiError> {
        let anchors = if pem.trim().is_empty() {
            pcv::CertificateList::new()
        } else {
            pcv::crypto::pem::parse_pem_bundle(pem.as_bytes())?
        };
        let mut inner = self.lock()?;
        let _guard = self.runtime.enter();
        inner.verifier.set_trust_anchors(anchors).map_err(FfiError::from)
    }

    pub fn set_trust_anchors_der(&self, anchors: Vec<Vec<u8>>) -> Result<(), FfiError> {
        let mut inner = self.lock()?;
        let _guard = self.runtime.enter();
        inner.verifier.set_trust_anchors(to_certs(anchors)).map_err(FfiError::from)
    }

    pub fn trust_anchors_pem(&self) -> Result<String, FfiError> {
        let inner = self.lock()?;
        pcv::crypto::pem::to_pem_bundle(inner.verifier.trust_anchors()).map_err(FfiError::from)
    }

    /// Replace the base engine configuration. Policy anchors stay in front.
    pub fn set_config(&self, config: FfiVerifierConfig) -> Result<(), FfiError> {
        let mut inner = self.lock()?;
        let _guard = self.runtime.enter();
        inner.verifier.set_config(config.into()).map_err(FfiError::from)
    }

    /// Configuration currently applied to the engine, policy anchors included.
    pub fn effective_config(&self) -> Result<FfiVerifierConfig, FfiError> {
        Ok(self.lock()?.verifier.effective_config().into())
    }

    pub fn supports_additional_trust_anchors(&self) -> Result<bool, FfiError> {
        Ok(self.lock()?.verifier.supports_additional_trust_anchors())
    }

    /// Verify a chain, blocking until the result is available. Must not be
    /// called from inside an async runtime.
    pub fn verify(&self, request: FfiVerifyRequest) -> Result<FfiVerifyOutcome, FfiError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let params: pcv::RequestParams = request.into();
        let host = params.hostname.clone();

        let res = catch_unwind(AssertUnwindSafe(|| -> Result<Completion, FfiError> {
            let slot: Arc<Mutex<Option<Completion>>> = Arc::default();
            let sink = Arc::clone(&slot);
            let status = {
                let _guard = self.runtime.enter();
                let span = tracing::debug_span!("ffi_verify", host = %host);
                inner.verifier.verify(
                    &params,
                    Box::new(move |c| {
                        if let Ok(mut s) = sink.lock() {
                            *s = Some(c);
                        }
                    }),
                    &span,
                )?
            };
            let request = match status {
                VerifyStatus::Complete(c) => return Ok(c),
                VerifyStatus::Pending(request) => request,
            };
            loop {
                if let Some(c) = slot.lock().map_err(|_| generic("result slot poisoned"))?.take() {
                    drop(request);
                    return Ok(c);
                }
                if !inner.owner.blocking_run_next() {
                    return Err(generic("verifier owner loop closed"));
                }
            }
        }));
        match res {
            Ok(r) => r.map(FfiVerifyOutcome::from),
            Err(_) => Err(EngineError::Panic("panic in verify".into()).into()),
        }
    }
}

#[cfg(feature = "openssl")]
fn initialize(
    verifier: &mut PolicyCertVerifier,
    seq: pcv::OwnerSequence,
    use_system_roots: bool,
) -> Result<(), FfiError> {
    let proc_ = if use_system_roots {
        pcv::OpensslVerifyProc::new()
    } else {
        pcv::OpensslVerifyProc::without_system_roots()
    };
    verifier.initialize(Arc::new(proc_), seq).map_err(FfiError::from)
}

#[cfg(not(feature = "openssl"))]
fn initialize(
    _verifier: &mut PolicyCertVerifier,
    _seq: pcv::OwnerSequence,
    _use_system_roots: bool,
) -> Result<(), FfiError> {
    Err(EngineError::Feature("openssl").into())
}

// ===== Free helpers =====

#[uniffi::export]
pub fn default_verifier_config() -> FfiVerifierConfig {
    pcv::VerifierConfig::secure_default().into()
}

/// Split a PEM bundle into DER certificates, keeping bundle order.
#[uniffi::export]
pub fn pem_bundle_to_der(pem: String) -> Result<Vec<Vec<u8>>, FfiError> {
    let certs = pcv::crypto::pem::parse_pem_bundle(pem.as_bytes())?;
    Ok(from_certs(&certs))
}

uniffi::setup_scaffolding!();
