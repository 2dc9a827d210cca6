use serde::Deserialize;

use crate::domain::error::EngineResult;
use super::trust::CertificateList;

/// Centralized defaults for the verifier.
/// All opinionated defaults should be defined here for consistency.
pub struct EngineDefaults;

impl EngineDefaults {
    // Revocation defaults
    pub const ENABLE_REV_CHECKING: bool = false; // Soft-fail online checks are off
    pub const REQUIRE_REV_CHECKING_LOCAL_ANCHORS: bool = false;

    // Algorithm defaults
    pub const ENABLE_SHA1_LOCAL_ANCHORS: bool = false; // Secure default: SHA-1 rejected everywhere
    pub const DISABLE_SYMANTEC_ENFORCEMENT: bool = false;

    // Procedure defaults
    pub const USE_SYSTEM_ROOTS: bool = true;

    // Cache defaults
    pub const CACHE_MAX_ENTRIES: usize = 256;
    pub const CACHE_TTL_SECS: u64 = 30 * 60; // 30 minutes
}

/// Bounds for the verification result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheLimits {
    /// Max number of cached results; the oldest is evicted beyond this.
    pub max_entries: usize,
    /// Max age (in seconds) of a cached result.
    pub ttl_secs: u64,
}

impl CacheLimits {
    /// Opinionated production defaults.
    pub fn defaults() -> Self {
        Self {
            max_entries: EngineDefaults::CACHE_MAX_ENTRIES,
            ttl_secs: EngineDefaults::CACHE_TTL_SECS,
        }
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Configuration record handed to the verification engine. Replaced
/// wholesale on every change, never edited in place once published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Online revocation checks. Ignored by the OpenSSL procedure, which never fetches.
    pub enable_rev_checking: bool,
    /// Hard-fail when revocation status of a chain anchored in an
    /// additional trust anchor cannot be determined.
    pub require_rev_checking_local_anchors: bool,
    /// Accept SHA-1 signatures on chains anchored in an additional anchor.
    pub enable_sha1_local_anchors: bool,
    /// Ignored by the OpenSSL procedure.
    pub disable_symantec_enforcement: bool,
    /// Roots trusted in addition to the platform store.
    pub additional_trust_anchors: CertificateList,
    /// Extra intermediates usable for path building but never trusted.
    pub additional_untrusted_authorities: CertificateList,
}

impl VerifierConfig {
    /// Secure opinionated defaults.
    pub fn secure_default() -> Self {
        Self {
            enable_rev_checking: EngineDefaults::ENABLE_REV_CHECKING,
            require_rev_checking_local_anchors: EngineDefaults::REQUIRE_REV_CHECKING_LOCAL_ANCHORS,
            enable_sha1_local_anchors: EngineDefaults::ENABLE_SHA1_LOCAL_ANCHORS,
            disable_symantec_enforcement: EngineDefaults::DISABLE_SYMANTEC_ENFORCEMENT,
            additional_trust_anchors: CertificateList::new(),
            additional_untrusted_authorities: CertificateList::new(),
        }
    }
}

/// Serializable form of [`VerifierConfig`] for policy files. Certificates
/// are carried as PEM bundles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierSettings {
    pub enable_rev_checking: bool,
    pub require_rev_checking_local_anchors: bool,
    pub enable_sha1_local_anchors: bool,
    pub disable_symantec_enforcement: bool,
    pub trust_anchors_pem: Option<String>,
    pub untrusted_authorities_pem: Option<String>,
    pub cache: CacheLimits,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            enable_rev_checking: EngineDefaults::ENABLE_REV_CHECKING,
            require_rev_checking_local_anchors: EngineDefaults::REQUIRE_REV_CHECKING_LOCAL_ANCHORS,
            enable_sha1_local_anchors: EngineDefaults::ENABLE_SHA1_LOCAL_ANCHORS,
            disable_symantec_enforcement: EngineDefaults::DISABLE_SYMANTEC_ENFORCEMENT,
            trust_anchors_pem: None,
            untrusted_authorities_pem: None,
            cache: CacheLimits::defaults(),
        }
    }
}

impl VerifierSettings {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the engine config. PEM fields need the `openssl` feature.
    pub fn into_config(self) -> EngineResult<VerifierConfig> {
        let parse = |pem: Option<String>| -> EngineResult<CertificateList> {
            match pem {
                Some(p) if !p.trim().is_empty() => {
                    crate::crypto::pem::parse_pem_bundle(p.as_bytes())
                }
                _ => Ok(CertificateList::new()),
            }
        };
        Ok(VerifierConfig {
            enable_rev_checking: self.enable_rev_checking,
            require_rev_checking_local_anchors: self.require_rev_checking_local_anchors,
            enable_sha1_local_anchors: self.enable_sha1_local_anchors,
            disable_symantec_enforcement: self.disable_symantec_enforcement,
            additional_trust_anchors: parse(self.trust_anchors_pem)?,
            additional_untrusted_authorities: parse(self.untrusted_authorities_pem)?,
        })
    }
}
