//! PEM bundle loading for trust anchors and authorities.

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{Certificate, CertificateList};

/// Parse concatenated PEM `CERTIFICATE` blocks into DER certificates,
/// preserving bundle order. An input without any certificate is an error.
pub fn parse_pem_bundle(pem: &[u8]) -> EngineResult<CertificateList> {
    #[cfg(not(feature = "openssl"))]
    {
        let _ = pem;
        Err(EngineError::Feature("openssl"))
    }
    #[cfg(feature = "openssl")]
    {
        let certs = openssl::x509::X509::stack_from_pem(pem)?;
        if certs.is_empty() {
            return Err(EngineError::Config(
                "PEM bundle contains no certificates".into(),
            ));
        }
        certs
            .iter()
            .map(|c| -> EngineResult<Certificate> { Ok(Certificate::from_der(c.to_der()?)) })
            .collect()
    }
}

/// Inverse of [`parse_pem_bundle`].
pub fn to_pem_bundle(certs: &[Certificate]) -> EngineResult<String> {
    #[cfg(not(feature = "openssl"))]
    {
        let _ = certs;
        Err(EngineError::Feature("openssl"))
    }
    #[cfg(feature = "openssl")]
    {
        let mut out = String::new();
        for c in certs {
            let pem = openssl::x509::X509::from_der(c.as_der())?.to_pem()?;
            out.push_str(&String::from_utf8_lossy(&pem));
        }
        Ok(out)
    }
}
