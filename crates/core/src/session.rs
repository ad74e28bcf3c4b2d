//! A server connection together with its capability cache.
//!
//! [`Session`] is what the orchestration layer holds on to: it resolves the
//! capability variant through its own [`CapabilityCache`] and hands out the
//! matching adapter.

use tracing::info;

use crate::capability::{
    CacheScope, CapabilityCache, CapabilityVariant, ResolutionContext, ScmAdapter, VersionSource,
};
use crate::changelog::{ChangeLog, RawChange};
use crate::config::LinkConfig;
use crate::errors::{ConfigError, CoreError, ResolutionError};
use crate::timestamp::CodecZone;

/// Connection plus per-connection state.
pub struct Session<C: VersionSource> {
    connection: C,
    cache: CapabilityCache,
    zone: CodecZone,
    tolerance_ms: i64,
}

impl<C: VersionSource> Session<C> {
    pub fn new(connection: C, scope: CacheScope, zone: CodecZone, tolerance_ms: i64) -> Self {
        info!(connection = connection.identity(), ?scope, %zone, "opened session");
        Self {
            connection,
            cache: CapabilityCache::new(scope),
            zone,
            tolerance_ms,
        }
    }

    /// Build a session from validated configuration.
    pub fn from_config(connection: C, config: &LinkConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            connection,
            config.capability.cache_scope,
            config.codec.zone()?,
            config.codec.tolerance_ms,
        ))
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn zone(&self) -> CodecZone {
        self.zone
    }

    pub fn tolerance_ms(&self) -> i64 {
        self.tolerance_ms
    }

    fn context(&self, baseline: Option<&str>, request: Option<&str>) -> ResolutionContext {
        ResolutionContext::new(self.connection.identity())
            .with_baseline(baseline.map(str::to_string))
            .with_request(request.map(str::to_string))
    }

    /// Capability variant of the server, queried at most once per cache
    /// entry.
    pub fn variant(
        &self,
        baseline: Option<&str>,
        request: Option<&str>,
    ) -> Result<CapabilityVariant, ResolutionError> {
        self.cache
            .resolve(&self.connection, &self.context(baseline, request))
    }

    /// Adapter for the server, carrying `baseline` and `request` through.
    pub fn adapter(
        &self,
        baseline: Option<&str>,
        request: Option<&str>,
    ) -> Result<Box<dyn ScmAdapter>, ResolutionError> {
        let context = self.context(baseline, request);
        let variant = self.cache.resolve(&self.connection, &context)?;
        Ok(variant.adapter(context.hints(), self.zone))
    }

    /// Resolve the adapter for `baseline`/`request` and decode `raws` with
    /// it.
    pub fn decode_changes(
        &self,
        raws: &[RawChange],
        baseline: Option<&str>,
        request: Option<&str>,
    ) -> Result<ChangeLog, CoreError> {
        let adapter = self.adapter(baseline, request)?;
        Ok(ChangeLog::decode_all(adapter.as_ref(), raws)?)
    }

    /// Forget every resolved variant; the next call queries the server again.
    pub fn reset_capabilities(&self) {
        self.cache.reset_all();
    }
}
