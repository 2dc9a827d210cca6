use super::trust::{Certificate, CertificateList};

/// Per-request verification flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VerifyFlags {
    /// Do not fetch missing intermediates or revocation data from the network.
    pub disable_network_fetches: bool,
}

/// Parameters describing one chain + host to validate. Doubles as the
/// result cache key, so every field takes part in equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestParams {
    /// Leaf (end-entity) certificate.
    pub certificate: Certificate,
    /// Intermediates as presented by the peer, leaf-most first.
    pub intermediates: CertificateList,
    pub hostname: String,
    pub flags: VerifyFlags,
    /// Stapled OCSP response, if any.
    pub ocsp_response: Vec<u8>,
    /// TLS-extension SCT list, if any.
    pub sct_list: Vec<u8>,
}

impl RequestParams {
    pub fn new(
        certificate: Certificate,
        intermediates: CertificateList,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            certificate,
            intermediates,
            hostname: hostname.into(),
            flags: VerifyFlags::default(),
            ocsp_response: Vec::new(),
            sct_list: Vec::new(),
        }
    }
}
