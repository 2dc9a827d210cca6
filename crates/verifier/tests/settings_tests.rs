mod common;

use policy_cert_verifier as pcv;

#[test]
fn cache_limits_defaults_and_overrides() {
    let d = pcv::CacheLimits::defaults();
    assert!(d.max_entries > 0);
    assert_eq!(d, pcv::CacheLimits::default());
    let mut limits = d;
    limits.ttl_secs = 60;
    assert_eq!(limits.ttl_secs, 60);
}

#[test]
fn engine_defaults_values() {
    use pcv::EngineDefaults as D;
    assert_eq!(D::ENABLE_REV_CHECKING, false);
    assert_eq!(D::REQUIRE_REV_CHECKING_LOCAL_ANCHORS, false);
    assert_eq!(D::ENABLE_SHA1_LOCAL_ANCHORS, false);
    assert_eq!(D::DISABLE_SYMANTEC_ENFORCEMENT, false);
    assert_eq!(D::CACHE_TTL_SECS, 1800);
}

#[test]
fn secure_default_matches_defaults_and_has_no_anchors() {
    let c = pcv::VerifierConfig::secure_default();
    assert_eq!(c, pcv::VerifierConfig::default());
    assert!(c.additional_trust_anchors.is_empty());
    assert!(c.additional_untrusted_authorities.is_empty());
}

#[test]
fn empty_settings_json_gives_defaults() {
    let s = pcv::VerifierSettings::from_json("{}").unwrap();
    assert!(!s.enable_rev_checking);
    assert!(s.trust_anchors_pem.is_none());
    assert_eq!(s.cache, pcv::CacheLimits::defaults());
    assert_eq!(s.into_config().unwrap(), pcv::VerifierConfig::secure_default());
}

#[test]
fn settings_flags_flow_into_config() {
    let json = r#"{
        "enable_rev_checking": true,
        "require_rev_checking_local_anchors": true,
        "enable_sha1_local_anchors": true,
        "disable_symantec_enforcement": true,
        "trust_anchors_pem": "   ",
        "cache": { "ttl_secs": 5 }
    }"#;
    let s = pcv::VerifierSettings::from_json(json).unwrap();
    assert_eq!(s.cache.ttl_secs, 5);
    assert_eq!(s.cache.max_entries, pcv::EngineDefaults::CACHE_MAX_ENTRIES);

    let c = s.into_config().unwrap();
    assert!(c.enable_rev_checking);
    assert!(c.require_rev_checking_local_anchors);
    assert!(c.enable_sha1_local_anchors);
    assert!(c.disable_symantec_enforcement);
    // Blank PEM means no anchors.
    assert!(c.additional_trust_anchors.is_empty());
}

#[test]
fn unknown_settings_field_is_rejected() {
    let err = pcv::VerifierSettings::from_json(r#"{ "trust_everything": true }"#).unwrap_err();
    assert!(matches!(err, pcv::EngineError::Json(_)));
    assert!(err.to_string().contains("trust_everything"));

    let err = pcv::VerifierSettings::from_json(r#"{ "cache": { "size": 1 } }"#).unwrap_err();
    assert!(matches!(err, pcv::EngineError::Json(_)));
}

#[cfg(feature = "openssl")]
#[test]
fn settings_pem_bundles_are_parsed_in_order() {
    let a = common::make_ca("Anchor A");
    let b = common::make_ca("Anchor B");
    let i = common::make_ca("Intermediate I");
    let bundle = format!("{}{}", common::ca_pem(&a), common::ca_pem(&b));
    let json = serde_json::json!({
        "trust_anchors_pem": bundle,
        "untrusted_authorities_pem": common::ca_pem(&i),
    })
    .to_string();

    let c = pcv::VerifierSettings::from_json(&json).unwrap().into_config().unwrap();
    assert_eq!(c.additional_trust_anchors, vec![a.der, b.der]);
    assert_eq!(c.additional_untrusted_authorities, vec![i.der]);
}

#[cfg(feature = "openssl")]
#[test]
fn pem_bundle_round_trips_through_policy_file() {
    let a = common::make_ca("Anchor A");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.pem");
    let pem = pcv::crypto::pem::to_pem_bundle(std::slice::from_ref(&a.der)).unwrap();
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    std::fs::write(&path, pem).unwrap();

    let policy = pcv::TrustPolicyConfig { anchors: None, anchors_path: Some(path) };
    assert_eq!(policy.trust_anchors().unwrap(), vec![a.der]);
}

#[test]
fn empty_trust_policy_yields_no_anchors() {
    let policy = pcv::TrustPolicyConfig::default();
    assert!(policy.trust_anchors().unwrap().is_empty());
}

#[test]
fn empty_policy_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.pem");
    std::fs::write(&path, b"").unwrap();
    let policy = pcv::TrustPolicyConfig { anchors: None, anchors_path: Some(path) };
    let err = policy.trust_anchors().unwrap_err();
    assert!(matches!(err, pcv::EngineError::Config(_)));
    assert!(err.to_string().contains("empty"));
}
