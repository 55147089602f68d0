use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::env_subst::substitute_env;
use crate::error::ConfigError;
use crate::source::ConfigSource;

struct Snapshot<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

/// An immutable, TTL-cached view over a config source (spec §4.4: "Config
/// repositories ... provide immutable snapshots with TTL caching").
///
/// Readers always see either the old or the new snapshot, never a partial
/// one: the single `ArcSwap` publish is the only mutation point.
pub struct CachedConfig<T> {
    source: Box<dyn ConfigSource>,
    ttl: Duration,
    snapshot: ArcSwap<Option<Snapshot<T>>>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned + Send + Sync + 'static> CachedConfig<T> {
    pub fn new(source: Box<dyn ConfigSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: ArcSwap::from_pointee(None),
            _marker: PhantomData,
        }
    }

    /// Return the current snapshot, reloading from the source if the TTL has
    /// elapsed (or nothing has been loaded yet).
    pub async fn get(&self) -> Result<Arc<T>, ConfigError> {
        if let Some(snapshot) = &**self.snapshot.load() {
            if snapshot.loaded_at.elapsed() < self.ttl {
                return Ok(snapshot.value.clone());
            }
        }
        self.reload().await
    }

    /// Force a reload regardless of TTL, publishing the new snapshot atomically.
    pub async fn reload(&self) -> Result<Arc<T>, ConfigError> {
        let raw = self.source.load_raw().await?;
        let substituted = substitute_env(&raw);
        let parsed: T = serde_json::from_str(&substituted)?;
        let value = Arc::new(parsed);
        self.snapshot.store(Arc::new(Some(Snapshot {
            value: value.clone(),
            loaded_at: Instant::now(),
        })));
        debug!("config snapshot refreshed");
        Ok(value)
    }
}
