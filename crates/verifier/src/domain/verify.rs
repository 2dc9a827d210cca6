// crates/verifier/src/domain/verify.rs
use thiserror::Error;

use super::cert_verifier::Request;
use super::types::CertificateList;

/// Verification failure codes reported by the engine. They are passed
/// through every layer untranslated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CertError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("certificate authority invalid")]
    AuthorityInvalid,
    #[error("certificate date invalid")]
    DateInvalid,
    #[error("certificate name does not match host")]
    CommonNameInvalid,
    #[error("certificate revoked")]
    Revoked,
    #[error("unable to check revocation")]
    UnableToCheckRevocation,
    #[error("weak signature algorithm")]
    WeakSignatureAlgorithm,
    #[error("certificate invalid")]
    Invalid,
    #[error("verification aborted")]
    Aborted,
}

/// Final status of one verification.
pub type NetStatus = Result<(), CertError>;

/// Metadata produced alongside the status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertVerifyResult {
    /// Chain as built by the engine, leaf first. Empty on path-building failure.
    pub verified_chain: CertificateList,
    /// Every problem the engine noticed, including non-fatal ones.
    pub cert_status: Vec<CertError>,
    pub has_sha1: bool,
    /// The chain terminates in a root from the platform store.
    pub is_issued_by_known_root: bool,
    /// The chain terminates in one of the configured additional trust
    /// anchors. Only meaningful when the status is `Ok`.
    pub is_issued_by_additional_trust_anchor: bool,
}

/// Status and result of a completed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: NetStatus,
    pub result: CertVerifyResult,
}

impl Completion {
    pub fn ok(result: CertVerifyResult) -> Self {
        Self { status: Ok(()), result }
    }

    /// Failure with `err` also recorded in `cert_status`.
    pub fn failed(err: CertError, mut result: CertVerifyResult) -> Self {
        if !result.cert_status.contains(&err) {
            result.cert_status.push(err);
        }
        Self { status: Err(err), result }
    }
}

/// What `verify` returned synchronously.
#[derive(Debug)]
pub enum VerifyStatus {
    /// Finished before returning. The completion callback is not invoked.
    Complete(Completion),
    /// Will finish later through the completion callback, unless the
    /// request handle is dropped or cancelled first.
    Pending(Request),
}

impl VerifyStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, VerifyStatus::Pending(_))
    }

    pub fn completion(&self) -> Option<&Completion> {
        match self {
            VerifyStatus::Complete(c) => Some(c),
            VerifyStatus::Pending(_) => None,
        }
    }
}
