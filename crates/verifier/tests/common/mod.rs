#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use policy_cert_verifier as pcv;
use pcv::{
    AnchorUsedCallback, CertError, CertVerifier, CertVerifyProc, CertVerifyResult, Certificate,
    Completion, CompletionCallback, EngineError, OwnerLoop, Request, RequestParams,
    VerifierConfig, VerifyStatus,
};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa};

// ===== Anchor-used counters =====

pub fn anchor_counter() -> (AnchorUsedCallback, Arc<AtomicUsize>) {
    let n = Arc::new(AtomicUsize::new(0));
    let n2 = Arc::clone(&n);
    let cb: AnchorUsedCallback = Arc::new(move || {
        n2.fetch_add(1, Ordering::SeqCst);
    });
    (cb, n)
}

pub fn count(n: &Arc<AtomicUsize>) -> usize {
    n.load(Ordering::SeqCst)
}

// ===== Completions =====

pub fn anchored_ok() -> Completion {
    Completion::ok(CertVerifyResult {
        is_issued_by_additional_trust_anchor: true,
        ..Default::default()
    })
}

pub fn known_root_ok() -> Completion {
    Completion::ok(CertVerifyResult {
        is_issued_by_known_root: true,
        ..Default::default()
    })
}

pub fn failed(err: CertError) -> Completion {
    Completion::failed(err, CertVerifyResult::default())
}

/// Records completions delivered to a caller callback.
#[derive(Clone, Default)]
pub struct Delivered(pub Arc<Mutex<Vec<Completion>>>);

impl Delivered {
    pub fn callback(&self) -> CompletionCallback {
        let sink = Arc::clone(&self.0);
        Box::new(move |c| sink.lock().unwrap().push(c))
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Completion> {
        self.0.lock().unwrap().last().cloned()
    }
}

// ===== Scripted delegate verifier =====

#[derive(Clone)]
pub enum Script {
    Sync(Completion),
    Async,
}

/// Shared view of a [`ScriptedVerifier`] that stays with the test after the
/// verifier itself is boxed into a `PolicyCertVerifier`.
#[derive(Clone)]
pub struct Recorder {
    pub configs: Arc<Mutex<Vec<VerifierConfig>>>,
    pub pending: Arc<Mutex<VecDeque<CompletionCallback>>>,
    pub script: Arc<Mutex<Script>>,
    pub verify_calls: Arc<AtomicUsize>,
    pub reject_next_config: Arc<AtomicBool>,
}

impl Recorder {
    pub fn set_config_calls(&self) -> usize {
        self.configs.lock().unwrap().len()
    }

    pub fn last_config(&self) -> Option<VerifierConfig> {
        self.configs.lock().unwrap().last().cloned()
    }

    /// Make the next `set_config` fail without recording anything.
    pub fn reject_next_config(&self) {
        self.reject_next_config.store(true, Ordering::SeqCst);
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    /// Finish the oldest pending verification. Returns false if none.
    pub fn complete_next(&self, completion: Completion) -> bool {
        let cb = self.pending.lock().unwrap().pop_front();
        match cb {
            Some(cb) => {
                cb(completion);
                true
            }
            None => false,
        }
    }
}

pub struct ScriptedVerifier {
    recorder: Recorder,
    supports_anchors: bool,
}

impl ScriptedVerifier {
    pub fn new(script: Script) -> (Self, Recorder) {
        Self::with_support(script, true)
    }

    pub fn with_support(script: Script, supports_anchors: bool) -> (Self, Recorder) {
        let recorder = Recorder {
            configs: Arc::default(),
            pending: Arc::default(),
            script: Arc::new(Mutex::new(script)),
            verify_calls: Arc::default(),
            reject_next_config: Arc::default(),
        };
        (
            Self { recorder: recorder.clone(), supports_anchors },
            recorder,
        )
    }
}

impl CertVerifier for ScriptedVerifier {
    fn verify(
        &mut self,
        _params: &RequestParams,
        callback: CompletionCallback,
        _log: &tracing::Span,
    ) -> Result<VerifyStatus, EngineError> {
        self.recorder.verify_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.recorder.script.lock().unwrap().clone();
        match script {
            Script::Sync(c) => Ok(VerifyStatus::Complete(c)),
            Script::Async => {
                self.recorder.pending.lock().unwrap().push_back(callback);
                let (request, _flag) = Request::new_pair();
                Ok(VerifyStatus::Pending(request))
            }
        }
    }

    fn set_config(&mut self, config: VerifierConfig) -> Result<(), EngineError> {
        if self.recorder.reject_next_config.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Runtime("config rejected".into()));
        }
        self.recorder.configs.lock().unwrap().push(config);
        Ok(())
    }

    fn supports_additional_trust_anchors(&self) -> bool {
        self.supports_anchors
    }
}

// ===== Procedure mock =====

/// Succeeds with the anchor flag when `issuer` is among the configured
/// additional anchors; otherwise falls back to a known root or fails.
pub struct AnchorProc {
    pub issuer: Certificate,
    pub known_root: bool,
    pub supports_anchors: bool,
    pub delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<VerifierConfig>>>,
}

impl AnchorProc {
    pub fn new(issuer: Certificate) -> Self {
        Self {
            issuer,
            known_root: false,
            supports_anchors: true,
            delay: None,
            calls: Arc::default(),
            seen: Arc::default(),
        }
    }
}

impl CertVerifyProc for AnchorProc {
    fn verify(&self, _params: &RequestParams, config: &VerifierConfig) -> Completion {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(config.clone());
        if config.additional_trust_anchors.contains(&self.issuer) {
            anchored_ok()
        } else if self.known_root {
            known_root_ok()
        } else {
            failed(CertError::AuthorityInvalid)
        }
    }

    fn supports_additional_trust_anchors(&self) -> bool {
        self.supports_anchors
    }
}

pub fn fake_cert(tag: u8) -> Certificate {
    Certificate::from_der(vec![0x30, 0x03, 0x02, 0x01, tag])
}

pub fn params_for(host: &str) -> RequestParams {
    RequestParams::new(fake_cert(0xEE), vec![], host)
}

// ===== Owner loop driving =====

/// Drive the owner loop until `done` holds, failing after a few seconds.
pub async fn drive_until(lp: &mut OwnerLoop, done: impl Fn() -> bool) {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        while !done() {
            if !lp.run_next().await {
                break;
            }
        }
    })
    .await
    .expect("owner loop timed out");
}

/// Let worker jobs finish, then run whatever they posted.
pub async fn settle(lp: &mut OwnerLoop) -> usize {
    tokio::time::sleep(Duration::from_millis(100)).await;
    lp.run_until_idle()
}

// ===== Real certificates (rcgen) =====

pub struct TestCa {
    pub cert: rcgen::Certificate,
    pub der: Certificate,
}

pub fn make_ca(common_name: &str) -> TestCa {
    let mut params = CertificateParams::new(vec![]);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    let cert = rcgen::Certificate::from_params(params).expect("ca cert");
    let der = Certificate::from_der(cert.serialize_der().expect("ca der"));
    TestCa { cert, der }
}

/// CA certificate issued by `issuer` rather than self-signed.
pub fn make_intermediate(issuer: &TestCa, common_name: &str) -> TestCa {
    let mut params = CertificateParams::new(vec![]);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    let cert = rcgen::Certificate::from_params(params).expect("intermediate cert");
    let der = Certificate::from_der(
        cert.serialize_der_with_signer(&issuer.cert).expect("intermediate der"),
    );
    TestCa { cert, der }
}

fn leaf_params(host: &str) -> CertificateParams {
    let mut params = CertificateParams::new(vec![host.to_string()]);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, host);
    params.distinguished_name = dn;
    params
}

pub fn make_leaf(ca: &TestCa, host: &str) -> Certificate {
    let leaf = rcgen::Certificate::from_params(leaf_params(host)).expect("leaf cert");
    Certificate::from_der(leaf.serialize_der_with_signer(&ca.cert).expect("leaf der"))
}

pub fn make_expired_leaf(ca: &TestCa, host: &str) -> Certificate {
    let mut params = leaf_params(host);
    params.not_before = rcgen::date_time_ymd(2000, 1, 1);
    params.not_after = rcgen::date_time_ymd(2001, 1, 1);
    let leaf = rcgen::Certificate::from_params(params).expect("leaf cert");
    Certificate::from_der(leaf.serialize_der_with_signer(&ca.cert).expect("leaf der"))
}

pub fn ca_pem(ca: &TestCa) -> String {
    // Re-encode the stored DER so the PEM matches `ca.der` byte for byte.
    pcv::crypto::pem::to_pem_bundle(std::slice::from_ref(&ca.der)).expect("pem")
}

// ===== Log capture =====

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Run `f` with a thread-local fmt subscriber and return its output.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buf = LogBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, buf.contents())
}
