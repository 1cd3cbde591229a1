//! Synchronization orchestrator.
//!
//! Every mutating operation walks the same sequence against the live
//! engine: fetch the current document, locate the target host, compile
//! the replacement fragment, merge, push, and only then persist the
//! registry change together with an immutable snapshot of the pushed
//! document.
//!
//! # Design Decisions
//! - A failed fetch or push aborts before any registry write, so the
//!   registry and the (unchanged) engine stay consistent
//! - A registry failure *after* a successful push is the one known
//!   divergence window; it is surfaced as `PostPushPersistence` and
//!   logged loudly because recovery needs an operator re-sync
//! - All mutations serialize through one async mutex held across
//!   fetch→persist; the live document is a single shared resource and
//!   concurrent read-modify-write cycles would silently drop updates

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::document::{compile_route, CompileError, Document};
use crate::engine::{EngineClient, EngineError};
use crate::registry::{DomainRecord, RecordMutation, RegistryDb, RegistryError};

/// Failures of orchestrated mutations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The hostname already has a live route.
    #[error("domain {host} is already registered")]
    DuplicateRoute { host: String },

    /// The hostname has no route to update or remove.
    #[error("domain {host} is not registered")]
    RouteNotFound { host: String },

    /// The record guards the control plane's own route.
    #[error("domain {host} is locked and cannot be removed")]
    LockedRoute { host: String },

    /// A supplied document could not be parsed.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The engine accepted a document the registry then failed to
    /// record. Engine and registry have diverged; a retry will not
    /// help, an operator-triggered re-sync will.
    #[error("engine accepted the push but persistence failed, state has diverged: {source}")]
    PostPushPersistence {
        #[source]
        source: RegistryError,
    },
}

/// The reconciliation core. Owns the single-writer lock over the live
/// document.
pub struct Orchestrator {
    engine: EngineClient,
    registry: Arc<RegistryDb>,
    api: ApiConfig,
    write_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(engine: EngineClient, registry: Arc<RegistryDb>, api: ApiConfig) -> Self {
        Self {
            engine,
            registry,
            api,
            write_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &RegistryDb {
        &self.registry
    }

    pub(crate) async fn acquire_write_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Fetch the live document without mutating anything.
    pub async fn live_document(&self) -> Result<Document, SyncError> {
        Ok(self.engine.fetch_document().await?)
    }

    /// Register a new route. Fails with [`SyncError::DuplicateRoute`]
    /// when the hostname is already live.
    pub async fn add_route(&self, record: DomainRecord) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().await;
        let host = record.incoming_address.clone();

        let mut document = self.engine.fetch_document().await?;
        if document.has_route_for(&host) || self.registry.find_by_host(&host)?.is_some() {
            return Err(SyncError::DuplicateRoute { host });
        }

        let fragment = compile_route(&record)?;
        document.routes_mut().push(fragment);

        self.push_and_persist(document, RecordMutation::Insert(record))
            .await?;
        tracing::info!(host = %host, "route added");
        Ok(())
    }

    /// Register or replace a route (upsert semantics). An existing
    /// fragment for the hostname is removed before the new one is
    /// appended: replace, not append.
    pub async fn update_or_add_route(&self, record: DomainRecord) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().await;
        let host = record.incoming_address.clone();

        let mut document = self.engine.fetch_document().await?;
        let replaced = document.remove_routes_for(&host);

        let fragment = compile_route(&record)?;
        document.routes_mut().push(fragment);

        let mutation = match self.registry.find_by_host(&host)? {
            Some(existing) => {
                let mut updated = record;
                updated.id = existing.id;
                RecordMutation::Update(updated)
            }
            None => RecordMutation::Insert(record),
        };

        self.push_and_persist(document, mutation).await?;
        tracing::info!(host = %host, replaced, "route upserted");
        Ok(())
    }

    /// Remove a route and its record. Locked records are refused.
    pub async fn remove_route(&self, host: &str) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().await;

        let record = self
            .registry
            .find_by_host(host)?
            .ok_or_else(|| SyncError::RouteNotFound {
                host: host.to_string(),
            })?;
        if record.is_locked {
            return Err(SyncError::LockedRoute {
                host: host.to_string(),
            });
        }

        let mut document = self.engine.fetch_document().await?;
        if document.remove_routes_for(host) == 0 {
            return Err(SyncError::RouteNotFound {
                host: host.to_string(),
            });
        }

        self.push_and_persist(document, RecordMutation::Delete(host.to_string()))
            .await?;
        tracing::info!(host = %host, "route removed");
        Ok(())
    }

    /// Bootstrap the engine at process start.
    ///
    /// Replays the latest accepted snapshot when one exists; otherwise
    /// constructs the initial document containing only the locked
    /// route for the control API itself.
    pub async fn initialize(&self) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().await;

        if let Some(snapshot) = self.registry.latest_snapshot()? {
            tracing::info!(
                snapshot_id = snapshot.id,
                "replaying last accepted configuration to engine"
            );
            self.engine.push_document(&snapshot.document).await?;
            return Ok(());
        }

        tracing::info!("no stored configuration, generating initial document");
        let mut record = DomainRecord::proxy(
            &self.api.host,
            &self.api.service_address,
            self.api.port,
        );
        record.enable_https = true;
        record.is_locked = true;

        let fragment = compile_route(&record)?;
        let document = Document::base(vec![fragment]);

        self.push_and_persist(document, RecordMutation::Insert(record))
            .await?;
        tracing::info!(host = %self.api.host, "initial configuration accepted");
        Ok(())
    }

    /// Push the candidate document, then commit the registry mutation
    /// and the snapshot of exactly what the engine accepted.
    pub(crate) async fn push_and_persist(
        &self,
        candidate: Document,
        mutation: RecordMutation,
    ) -> Result<(), SyncError> {
        self.engine.push_document(&candidate).await?;

        self.registry
            .commit_mutation(mutation, &candidate)
            .map_err(|source| {
                tracing::error!(
                    error = %source,
                    "engine accepted a document the registry failed to persist; \
                     operator re-sync required"
                );
                SyncError::PostPushPersistence { source }
            })
    }
}
