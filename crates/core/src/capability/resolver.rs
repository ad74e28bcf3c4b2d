//! Memoized resolution of a connection's capability variant.
//!
//! [`CapabilityCache`] asks a [`VersionSource`] for its server version at
//! most once per cache entry and hands back the cached
//! [`CapabilityVariant`] afterwards. The cache is an explicit object owned
//! by the session; entries only go away through [`CapabilityCache::reset`]
//! or [`CapabilityCache::reset_all`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::adapter::AdapterHints;
use super::version::{CapabilityVariant, ServerVersion};
use crate::errors::{BoxError, ResolutionError};

/// A connection able to report the version of the server behind it.
pub trait VersionSource: Send + Sync {
    /// Stable identity of the connection, used as the cache key.
    fn identity(&self) -> &str;

    /// Versions reported by the server. Only the first entry is consulted.
    ///
    /// This is a blocking call; callers needing a deadline impose it
    /// themselves.
    fn server_versions(&self) -> Result<Vec<String>, BoxError>;
}

/// Everything a caller supplies when asking for an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionContext {
    pub connection: String,
    pub baseline: Option<String>,
    pub request: Option<String>,
}

impl ResolutionContext {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            baseline: None,
            request: None,
        }
    }

    pub fn with_baseline(mut self, baseline: Option<String>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_request(mut self, request: Option<String>) -> Self {
        self.request = request;
        self
    }

    /// The pass-through hints for the adapter constructor.
    pub fn hints(&self) -> AdapterHints {
        AdapterHints::new(self.baseline.clone(), self.request.clone())
    }
}

/// Which part of a [`ResolutionContext`] identifies a cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// One entry per connection; the hints are ignored.
    #[default]
    Connection,
    /// One entry per full (connection, baseline, request) tuple.
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Connection(String),
    Context(ResolutionContext),
}

type Slot = Arc<Mutex<Option<CapabilityVariant>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Slots hold plain values; a panic elsewhere can't leave them half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-session cache of resolved capability variants.
///
/// Thread-safe. The map lock is held only while looking up a slot; each slot
/// has its own lock held across the version query, so concurrent callers on
/// the same entry wait for the first one instead of querying again.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    scope: CacheScope,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl CapabilityCache {
    pub fn new(scope: CacheScope) -> Self {
        Self {
            scope,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    fn key(&self, context: &ResolutionContext) -> CacheKey {
        self.key_for(&context.connection, context)
    }

    /// Key for `context` as answered by the connection named `identity`.
    fn key_for(&self, identity: &str, context: &ResolutionContext) -> CacheKey {
        match self.scope {
            CacheScope::Connection => CacheKey::Connection(identity.to_string()),
            CacheScope::Context => CacheKey::Context(ResolutionContext {
                connection: identity.to_string(),
                ..context.clone()
            }),
        }
    }

    fn slot(&self, key: CacheKey) -> Slot {
        Arc::clone(lock(&self.slots).entry(key).or_default())
    }

    /// Return the variant for `context`, querying `connection` only if the
    /// entry is still empty.
    ///
    /// The entry is keyed on `connection.identity()`, not on
    /// `context.connection`, so a mismatched context can't fill another
    /// connection's entry. A failed query leaves the entry empty; the next
    /// call queries again.
    #[instrument(skip(self, connection, context), fields(connection = %connection.identity()))]
    pub fn resolve(
        &self,
        connection: &dyn VersionSource,
        context: &ResolutionContext,
    ) -> Result<CapabilityVariant, ResolutionError> {
        if context.connection != connection.identity() {
            debug!(
                context = %context.connection,
                "context names another connection, keying on the queried one"
            );
        }
        let slot = self.slot(self.key_for(connection.identity(), context));
        let mut cached = lock(&slot);
        if let Some(variant) = *cached {
            debug!(%variant, "capability cache hit");
            return Ok(variant);
        }

        let variant = query_variant(connection)?;
        *cached = Some(variant);
        Ok(variant)
    }

    /// The cached variant for `context`, without querying.
    pub fn cached(&self, context: &ResolutionContext) -> Option<CapabilityVariant> {
        let slot = lock(&self.slots).get(&self.key(context)).cloned()?;
        let variant = *lock(&slot);
        variant
    }

    /// Drop the entry for `context`. Returns whether a variant was cached.
    pub fn reset(&self, context: &ResolutionContext) -> bool {
        let removed = lock(&self.slots).remove(&self.key(context));
        let had_variant = removed
            .as_ref()
            .map(|slot| lock(slot).is_some())
            .unwrap_or(false);
        debug!(connection = %context.connection, had_variant, "capability cache entry reset");
        had_variant
    }

    /// Drop every entry.
    pub fn reset_all(&self) {
        let mut slots = lock(&self.slots);
        debug!(entries = slots.len(), "capability cache cleared");
        slots.clear();
    }
}

/// Ask the server for its version and map the first entry to a variant.
fn query_variant(connection: &dyn VersionSource) -> Result<CapabilityVariant, ResolutionError> {
    let versions = connection
        .server_versions()
        .map_err(|source| ResolutionError::QueryFailed {
            connection: connection.identity().to_string(),
            source,
        })?;
    let raw = versions
        .first()
        .ok_or_else(|| ResolutionError::NoVersionReported(connection.identity().to_string()))?;

    let version = ServerVersion::parse(raw);
    if !version.is_known() {
        warn!(raw = %raw, "unrecognised server version, using legacy capabilities");
    }
    let variant = CapabilityVariant::for_version(&version);
    info!(raw = %raw, %version, %variant, "resolved server capabilities");
    Ok(variant)
}
