use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::error::{EngineError, EngineResult};

/// A DER-encoded X.509 certificate. Cheap to clone; equality is byte
/// equality of the encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    der: Arc<[u8]>,
}

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self {
            der: Arc::from(der.into().into_boxed_slice()),
        }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.der
    }
}

/// Ordered list of certificates. Order is significant for equality.
pub type CertificateList = Vec<Certificate>;

/// Administrative trust anchor policy, given either as raw PEM bytes or as
/// a path to a PEM bundle. Both sources are concatenated when present.
#[derive(Debug, Clone, Default)]
pub struct TrustPolicyConfig {
    /// PEM trust anchors data (concatenated PEMs)
    pub anchors: Option<Vec<u8>>,
    /// PEM bundle on disk
    pub anchors_path: Option<PathBuf>,
}

impl TrustPolicyConfig {
    /// Resolve the configured sources into an anchor list, in source order
    /// (inline bytes first, then the file).
    pub fn trust_anchors(&self) -> EngineResult<CertificateList> {
        let mut out = CertificateList::new();
        if let Some(pem) = &self.anchors {
            out.extend(crate::crypto::pem::parse_pem_bundle(pem)?);
        }
        if let Some(path) = &self.anchors_path {
            let pem = std::fs::read(path)?;
            if pem.is_empty() {
                return Err(EngineError::Config(format!(
                    "trust anchor bundle is empty: {}",
                    path.display()
                )));
            }
            out.extend(crate::crypto::pem::parse_pem_bundle(&pem)?);
        }
        Ok(out)
    }
}
