//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every record family lives in its own [`Store`]. The in-memory stores are
//! the source of truth for reads; when a database pool is configured, each
//! mutation is written through to Postgres after it succeeds in memory, and
//! the stores are hydrated from Postgres on startup.
//!
//! Governance tasks are never stored. Only their completion attestations
//! are, in the [`CompletionLedger`].

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sqlx::PgPool;

use acr_core::{AssessmentId, DocumentId, MappingId, PolicyId, RulesetCatalog, SystemId};
use acr_governance::{AuditTrail, CompletionLedger};
use acr_state::{
    AiSystem, ComplianceDocumentation, ContentGenerator, LifecycleGate, LifecycleStageGate,
    MarkdownGenerator, Policy, PolicyMapping, RiskAssessment,
};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Copy + Eq + Hash, T: Clone> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Build and insert a record under the store's write lock.
    ///
    /// The closure sees every stored record, so values derived from the
    /// existing rows (next version numbers, duplicate checks) are computed
    /// and inserted atomically.
    pub fn insert_with<E>(
        &self,
        build: impl FnOnce(&HashMap<K, T>) -> Result<(K, T), E>,
    ) -> Result<T, E> {
        let mut guard = self.data.write();
        let (id, value) = build(&guard)?;
        guard.insert(id, value.clone());
        Ok(value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching a predicate.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure runs under a single write lock, so concurrent mutations
    /// of the same record are serialized and see each other's effects.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Copy + Eq + Hash, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Configuration -------------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts the auth token.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
    /// Ruleset catalog YAML. `None` uses the built-in version tags.
    pub ruleset_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN` and `RULESET_CONFIG` from the environment.
    ///
    /// An unparseable `PORT` falls back to 8080 with a warning; a blank
    /// `AUTH_TOKEN` is treated as unset.
    pub fn from_env() -> Self {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(port = %raw, "PORT is not a valid port number, using 8080");
                8080
            }),
            Err(_) => 8080,
        };
        let auth_token = std::env::var("AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let ruleset_path = std::env::var("RULESET_CONFIG").ok().map(PathBuf::from);
        Self {
            port,
            auth_token,
            ruleset_path,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("ruleset_path", &self.ruleset_path)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            ruleset_path: None,
        }
    }
}

// -- Application State ---------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub systems: Store<SystemId, AiSystem>,
    pub assessments: Store<AssessmentId, RiskAssessment>,
    pub documents: Store<DocumentId, ComplianceDocumentation>,
    pub policies: Store<PolicyId, Policy>,
    pub mappings: Store<MappingId, PolicyMapping>,

    /// Task completion side-table. Tasks themselves are derived on read.
    pub completions: Arc<RwLock<CompletionLedger>>,

    /// Bounded audit trail of every mutation.
    pub audit: Arc<Mutex<AuditTrail>>,

    /// Ruleset versions in force, passed explicitly into staleness checks.
    pub rulesets: Arc<RulesetCatalog>,

    /// Consulted before every assessment transition.
    pub gate: Arc<dyn LifecycleGate>,

    /// Renders document bodies.
    pub generator: Arc<dyn ContentGenerator>,

    /// PostgreSQL pool. `None` runs the API in-memory only.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), RulesetCatalog::default(), None)
    }

    /// State with the given configuration, ruleset catalog and optional pool.
    ///
    /// Uses the default lifecycle gate (retired systems veto every
    /// assessment action) and the Markdown content generator.
    pub fn with_config(
        config: AppConfig,
        rulesets: RulesetCatalog,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            systems: Store::new(),
            assessments: Store::new(),
            documents: Store::new(),
            policies: Store::new(),
            mappings: Store::new(),
            completions: Arc::new(RwLock::new(CompletionLedger::new())),
            audit: Arc::new(Mutex::new(AuditTrail::default())),
            rulesets: Arc::new(rulesets),
            gate: Arc::new(LifecycleStageGate::default()),
            generator: Arc::new(MarkdownGenerator),
            db_pool,
            config,
        }
    }

    /// Replace the lifecycle gate.
    pub fn with_gate(mut self, gate: impl LifecycleGate + 'static) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    /// Replace the content generator.
    pub fn with_generator(mut self, generator: impl ContentGenerator + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let systems = crate::db::systems::load_all(pool)
            .await
            .map_err(|e| format!("failed to load ai systems: {e}"))?;
        let system_count = systems.len();
        for record in systems {
            self.systems.insert(record.id, record);
        }

        let assessments = crate::db::assessments::load_all(pool)
            .await
            .map_err(|e| format!("failed to load risk assessments: {e}"))?;
        let assessment_count = assessments.len();
        for record in assessments {
            self.assessments.insert(record.id, record);
        }

        let documents = crate::db::documents::load_all(pool)
            .await
            .map_err(|e| format!("failed to load compliance documents: {e}"))?;
        let document_count = documents.len();
        for record in documents {
            self.documents.insert(record.id, record);
        }

        let policies = crate::db::policies::load_policies(pool)
            .await
            .map_err(|e| format!("failed to load policies: {e}"))?;
        let policy_count = policies.len();
        for record in policies {
            self.policies.insert(record.id, record);
        }

        let mappings = crate::db::policies::load_mappings(pool)
            .await
            .map_err(|e| format!("failed to load policy mappings: {e}"))?;
        let mapping_count = mappings.len();
        for record in mappings {
            self.mappings.insert(record.id, record);
        }

        let completions = crate::db::completions::load_all(pool)
            .await
            .map_err(|e| format!("failed to load task completions: {e}"))?;
        let completion_count = completions.len();
        *self.completions.write() = completions.into_iter().collect();

        tracing::info!(
            systems = system_count,
            assessments = assessment_count,
            documents = document_count,
            policies = policy_count,
            mappings = mapping_count,
            completions = completion_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("systems", &self.systems.len())
            .field("assessments", &self.assessments.len())
            .field("documents", &self.documents.len())
            .field("policies", &self.policies.len())
            .field("mappings", &self.mappings.len())
            .field("rulesets", &self.rulesets)
            .field("db_pool", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_insert_get_and_filter() {
        let store: Store<u32, String> = Store::new();
        assert!(store.is_empty());
        assert!(store.insert(1, "one".to_string()).is_none());
        store.insert(2, "two".to_string());
        assert_eq!(store.get(&1).as_deref(), Some("one"));
        assert!(store.contains(&2));
        assert_eq!(store.filter(|v| v.starts_with('t')), vec!["two".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_clone_shares_data() {
        let a: Store<u32, u32> = Store::new();
        let b = a.clone();
        a.insert(7, 49);
        assert_eq!(b.get(&7), Some(49));
    }

    #[test]
    fn try_update_reports_missing_and_closure_errors() {
        let store: Store<u32, u32> = Store::new();
        assert!(store.try_update(&1, |v| Ok::<_, ()>(*v)).is_none());

        store.insert(1, 10);
        let bumped = store.try_update(&1, |v| {
            *v += 1;
            Ok::<_, ()>(*v)
        });
        assert_eq!(bumped, Some(Ok(11)));

        let refused = store.try_update(&1, |v| if *v > 5 { Err("too big") } else { Ok(()) });
        assert_eq!(refused, Some(Err("too big")));
        assert_eq!(store.get(&1), Some(11));
    }

    #[test]
    fn insert_with_sees_existing_rows() {
        let store: Store<u32, u32> = Store::new();
        for _ in 0..3 {
            store
                .insert_with(|rows| {
                    let next = rows.values().max().copied().unwrap_or(0) + 1;
                    Ok::<_, ()>((next, next))
                })
                .unwrap();
        }
        let mut values = store.list();
        values.sort();
        assert_eq!(values, vec![1, 2, 3]);

        let refused = store.insert_with(|_| Err::<(u32, u32), _>("no"));
        assert_eq!(refused, Err("no"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some("super-secret".to_string()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_state_is_empty() {
        let state = AppState::new();
        assert!(state.systems.is_empty());
        assert!(state.completions.read().is_empty());
        assert!(state.audit.lock().is_empty());
        assert!(state.db_pool.is_none());
        assert_eq!(state.config.port, 8080);
    }
}
