// adapters/openssl.rs

//! OpenSSL-backed verification procedure. Path building and signature
//! checks are OpenSSL's; this adapter only wires the config in and maps
//! the outcome.

use std::net::IpAddr;

use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509Ref, X509StoreContext, X509};

use crate::domain::cert_verifier::CertVerifyProc;
use crate::domain::types::{Certificate, CertificateList, EngineDefaults, RequestParams, VerifierConfig};
use crate::domain::verify::{CertError, CertVerifyResult, Completion};

// X509_V_ERR_* values from openssl/x509_vfy.h
const ERR_UNABLE_TO_GET_ISSUER_CERT: i32 = 2;
const ERR_UNABLE_TO_GET_CRL: i32 = 3;
const ERR_CERT_NOT_YET_VALID: i32 = 9;
const ERR_CERT_HAS_EXPIRED: i32 = 10;
const ERR_DEPTH_ZERO_SELF_SIGNED_CERT: i32 = 18;
const ERR_SELF_SIGNED_CERT_IN_CHAIN: i32 = 19;
const ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY: i32 = 20;
const ERR_UNABLE_TO_VERIFY_LEAF_SIGNATURE: i32 = 21;
const ERR_CERT_REVOKED: i32 = 23;
const ERR_INVALID_CA: i32 = 24;
const ERR_CERT_UNTRUSTED: i32 = 27;

pub struct OpensslVerifyProc {
  use_system_roots: bool,
}

impl Default for OpensslVerifyProc {
  fn default() -> Self {
    Self::new()
  }
}

impl OpensslVerifyProc {
  /// Trusts the platform's default CA paths plus configured anchors.
  pub fn new() -> Self {
    Self { use_system_roots: EngineDefaults::USE_SYSTEM_ROOTS }
  }

  /// Trusts only the configured additional anchors.
  pub fn without_system_roots() -> Self {
    Self { use_system_roots: false }
  }

  fn verify_inner(
    &self,
    params: &RequestParams,
    config: &VerifierConfig,
  ) -> Result<Completion, ErrorStack> {
    let leaf = match X509::from_der(params.certificate.as_der()) {
      Ok(c) => c,
      Err(_) => return Ok(Completion::failed(CertError::Invalid, CertVerifyResult::default())),
    };

    let mut untrusted = Stack::<X509>::new()?;
    for der in params.intermediates.iter().chain(&config.additional_untrusted_authorities) {
      match X509::from_der(der.as_der()) {
        Ok(c) => untrusted.push(c)?,
        Err(_) => tracing::debug!("skipping unparseable intermediate"),
      }
    }

    let mut builder = X509StoreBuilder::new()?;
    if self.use_system_roots {
      builder.set_default_paths()?;
    }
    for der in &config.additional_trust_anchors {
      match X509::from_der(der.as_der()) {
        Ok(c) => {
          // Duplicates of system roots are rejected by older OpenSSL; harmless.
          if let Err(e) = builder.add_cert(c) {
            tracing::debug!(error = %e, "trust anchor not added to store");
          }
        }
        Err(_) => tracing::warn!("skipping unparseable trust anchor"),
      }
    }
    if !config.additional_trust_anchors.is_empty() {
      // Lets a non-self-signed anchor (e.g. an enterprise intermediate) end the chain.
      builder.set_flags(X509VerifyFlags::PARTIAL_CHAIN)?;
    }
    let store = builder.build();

    let mut ctx = X509StoreContext::new()?;
    let (verified, error, chain, has_sha1) = ctx.init(&store, &leaf, &untrusted, |c| {
      let verified = c.verify_cert()?;
      let (chain, has_sha1) = match c.chain() {
        Some(stack) => {
          let n = stack.len();
          // The root's self-signature is never checked, so its digest is irrelevant.
          let has_sha1 = stack.iter().take(n.saturating_sub(1)).any(is_sha1_signed);
          let ders = stack
            .iter()
            .map(|x| x.to_der())
            .collect::<Result<Vec<_>, _>>()?;
          (ders, has_sha1)
        }
        None => (Vec::new(), false),
      };
      Ok((verified, c.error().as_raw(), chain, has_sha1))
    })?;

    let verified_chain: CertificateList = chain.into_iter().map(Certificate::from_der).collect();
    let mut result = CertVerifyResult {
      verified_chain,
      has_sha1,
      ..Default::default()
    };

    if !verified {
      return Ok(Completion::failed(map_verify_error(error), result));
    }

    let anchored = result
      .verified_chain
      .iter()
      .any(|c| config.additional_trust_anchors.contains(c));
    result.is_issued_by_additional_trust_anchor = anchored;
    result.is_issued_by_known_root = !anchored && self.use_system_roots;

    if !leaf_matches_host(&leaf, &params.hostname) {
      result.cert_status.push(CertError::CommonNameInvalid);
    }
    if has_sha1 && !(anchored && config.enable_sha1_local_anchors) {
      result.cert_status.push(CertError::WeakSignatureAlgorithm);
    }
    if anchored && config.require_rev_checking_local_anchors {
      result.cert_status.push(CertError::UnableToCheckRevocation);
    }

    Ok(match result.cert_status.first().copied() {
      Some(err) => Completion { status: Err(err), result },
      None => Completion::ok(result),
    })
  }
}

impl CertVerifyProc for OpensslVerifyProc {
  fn verify(&self, params: &RequestParams, config: &VerifierConfig) -> Completion {
    match self.verify_inner(params, config) {
      Ok(c) => c,
      Err(e) => {
        tracing::warn!(error = %e, host = %params.hostname, "openssl verification error");
        Completion::failed(CertError::Invalid, CertVerifyResult::default())
      }
    }
  }

  fn supports_additional_trust_anchors(&self) -> bool {
    true
  }
}

fn map_verify_error(code: i32) -> CertError {
  match code {
    ERR_CERT_NOT_YET_VALID | ERR_CERT_HAS_EXPIRED => CertError::DateInvalid,
    ERR_UNABLE_TO_GET_ISSUER_CERT
    | ERR_DEPTH_ZERO_SELF_SIGNED_CERT
    | ERR_SELF_SIGNED_CERT_IN_CHAIN
    | ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY
    | ERR_UNABLE_TO_VERIFY_LEAF_SIGNATURE
    | ERR_INVALID_CA
    | ERR_CERT_UNTRUSTED => CertError::AuthorityInvalid,
    ERR_CERT_REVOKED => CertError::Revoked,
    ERR_UNABLE_TO_GET_CRL => CertError::UnableToCheckRevocation,
    _ => CertError::Invalid,
  }
}

fn is_sha1_signed(cert: &X509Ref) -> bool {
  let nid = cert.signature_algorithm().object().nid();
  nid == Nid::SHA1WITHRSAENCRYPTION || nid == Nid::ECDSA_WITH_SHA1 || nid == Nid::DSAWITHSHA1
}

fn leaf_matches_host(leaf: &X509Ref, hostname: &str) -> bool {
  let mut dns = Vec::new();
  let mut ips = Vec::new();
  if let Some(names) = leaf.subject_alt_names() {
    for name in names.iter() {
      if let Some(d) = name.dnsname() {
        dns.push(d.to_owned());
      } else if let Some(ip) = name.ipaddress() {
        ips.push(ip.to_vec());
      }
    }
  }
  host_matches(hostname, &dns, &ips)
}

/// Match `hostname` against subjectAltName entries. IP literals match IP
/// entries only; DNS names allow a single wildcard as the whole left-most
/// label. The subject common name is not consulted.
pub(crate) fn host_matches(hostname: &str, dns_names: &[String], ip_addrs: &[Vec<u8>]) -> bool {
  let host = hostname.trim_end_matches('.');
  if host.is_empty() {
    return false;
  }

  let literal = host
    .strip_prefix('[')
    .and_then(|h| h.strip_suffix(']'))
    .unwrap_or(host);
  if let Ok(ip) = literal.parse::<IpAddr>() {
    let octets = match ip {
      IpAddr::V4(v4) => v4.octets().to_vec(),
      IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    return ip_addrs.iter().any(|a| *a == octets);
  }

  let host = host.to_ascii_lowercase();
  dns_names.iter().any(|pattern| {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
      Some(suffix) => {
        // Require at least two labels after the wildcard.
        if !suffix.contains('.') {
          return false;
        }
        match host.split_once('.') {
          Some((first, rest)) => !first.is_empty() && rest == suffix,
          None => false,
        }
      }
      None => pattern == host,
    }
  })
}
