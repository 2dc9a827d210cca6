// adapters/caching.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::domain::cert_verifier::{CertVerifier, CompletionCallback};
use crate::domain::error::EngineResult;
use crate::domain::types::{CacheLimits, RequestParams, VerifierConfig};
use crate::domain::verify::{Completion, VerifyStatus};

/// Bounded, TTL-limited result store. Values are tagged with the config
/// generation they were computed under; only the current generation hits.
#[derive(Clone)]
struct ResultCache {
  entries: Option<Cache<RequestParams, (u64, Completion)>>,
  generation: Arc<AtomicU64>,
  hits: Arc<AtomicU64>,
  misses: Arc<AtomicU64>,
}

impl ResultCache {
  fn new(limits: CacheLimits) -> Self {
    // Zero capacity or zero TTL disables caching.
    let entries = (limits.max_entries > 0 && limits.ttl_secs > 0).then(|| {
      Cache::builder()
        .max_capacity(limits.max_entries as u64)
        .time_to_live(Duration::from_secs(limits.ttl_secs))
        .build()
    });
    Self {
      entries,
      generation: Arc::new(AtomicU64::new(0)),
      hits: Arc::new(AtomicU64::new(0)),
      misses: Arc::new(AtomicU64::new(0)),
    }
  }

  fn generation(&self) -> u64 {
    self.generation.load(Ordering::Acquire)
  }

  fn lookup(&self, params: &RequestParams) -> Option<Completion> {
    let current = self.generation();
    let hit = self
      .entries
      .as_ref()
      .and_then(|c| c.get(params))
      .filter(|(generation, _)| *generation == current)
      .map(|(_, completion)| completion);
    let counter = if hit.is_some() { &self.hits } else { &self.misses };
    counter.fetch_add(1, Ordering::Relaxed);
    hit
  }

  /// Results computed against an older config are discarded.
  fn insert(&self, params: RequestParams, completion: Completion, generation: u64) {
    if generation != self.generation() {
      return;
    }
    if let Some(c) = &self.entries {
      c.insert(params, (generation, completion));
    }
  }

  fn invalidate(&self) {
    self.generation.fetch_add(1, Ordering::AcqRel);
    if let Some(c) = &self.entries {
      c.invalidate_all();
    }
  }

  fn len(&self) -> usize {
    self.entries.as_ref().map_or(0, |c| c.iter().count())
  }
}

/// Caches completed verifications of an inner verifier. Hits complete
/// synchronously; any config change empties the cache.
pub struct CachingCertVerifier<V: CertVerifier> {
  inner: V,
  cache: ResultCache,
}

impl<V: CertVerifier> CachingCertVerifier<V> {
  pub fn new(inner: V, limits: CacheLimits) -> Self {
    Self {
      inner,
      cache: ResultCache::new(limits),
    }
  }

  pub fn inner(&self) -> &V {
    &self.inner
  }

  pub fn hits(&self) -> u64 {
    self.cache.hits.load(Ordering::Relaxed)
  }

  pub fn misses(&self) -> u64 {
    self.cache.misses.load(Ordering::Relaxed)
  }

  pub fn len(&self) -> usize {
    self.cache.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<V: CertVerifier> CertVerifier for CachingCertVerifier<V> {
  fn verify(
    &mut self,
    params: &RequestParams,
    callback: CompletionCallback,
    log: &tracing::Span,
  ) -> EngineResult<VerifyStatus> {
    if let Some(hit) = self.cache.lookup(params) {
      tracing::debug!(parent: log, host = %params.hostname, "verification cache hit");
      return Ok(VerifyStatus::Complete(hit));
    }
    let generation = self.cache.generation();

    let cache = self.cache.clone();
    let key = params.clone();
    let wrapped: CompletionCallback = Box::new(move |completion: Completion| {
      cache.insert(key, completion.clone(), generation);
      callback(completion);
    });

    let status = self.inner.verify(params, wrapped, log)?;
    if let VerifyStatus::Complete(completion) = &status {
      self.cache.insert(params.clone(), completion.clone(), generation);
    }
    Ok(status)
  }

  fn set_config(&mut self, config: VerifierConfig) -> EngineResult<()> {
    self.cache.invalidate();
    self.inner.set_config(config)
  }

  fn supports_additional_trust_anchors(&self) -> bool {
    self.inner.supports_additional_trust_anchors()
  }
}
