//! Conflict resolution strategies and the resolver.

use crate::conflict::{server_modified_at, Conflict};
use crate::error::{ConflictError, ConflictResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shopsync_store::{FieldMap, PendingUpdate};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Policy governing automatic conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Later timestamp wins; ties go to the server.
    Timestamp,
    /// Server always wins.
    ServerWins,
    /// Client always wins.
    ClientWins,
    /// Resolution requires user input.
    Manual,
}

impl ResolutionStrategy {
    /// Returns the canonical textual name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::Timestamp => "timestamp",
            ResolutionStrategy::ServerWins => "server-wins",
            ResolutionStrategy::ClientWins => "client-wins",
            ResolutionStrategy::Manual => "manual",
        }
    }

    /// Returns true if this strategy resolves without user input.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ResolutionStrategy::Manual)
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = ConflictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(ResolutionStrategy::Timestamp),
            "server-wins" => Ok(ResolutionStrategy::ServerWins),
            "client-wins" => Ok(ResolutionStrategy::ClientWins),
            "manual" => Ok(ResolutionStrategy::Manual),
            other => Err(ConflictError::UnknownStrategy(other.to_owned())),
        }
    }
}

/// Which side a resolution keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    /// Keep the staged local mutation.
    UseLocal,
    /// Accept the server's state, discarding the local mutation.
    UseServer,
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Which side won.
    pub action: ResolutionAction,
    /// The winning payload.
    pub data: FieldMap,
    /// Human-readable explanation for audit output.
    pub reason: String,
}

impl Resolution {
    fn use_local(conflict: &Conflict, reason: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::UseLocal,
            data: conflict.local_data.clone(),
            reason: reason.into(),
        }
    }

    fn use_server(conflict: &Conflict, reason: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::UseServer,
            data: conflict.server_data.clone(),
            reason: reason.into(),
        }
    }
}

/// Capability interface for the manual-resolution UI.
///
/// The resolver depends on this without knowing about any particular UI
/// toolkit. Returning `Ok(None)` means the user closed the prompt without
/// choosing; the conflict stays open.
pub trait ConflictPresenter: Send + Sync {
    /// Presents both versions side by side and returns the user's choice.
    fn present(&self, conflict: &Conflict) -> ConflictResult<Option<ResolutionAction>>;
}

/// Detects conflicts and resolves them per the configured strategy.
///
/// The strategy is process-wide and mutable at runtime. Detection keeps an
/// in-memory audit log of every conflict seen; the log does not survive a
/// restart.
pub struct ConflictResolver {
    strategy: RwLock<ResolutionStrategy>,
    presenter: RwLock<Option<Arc<dyn ConflictPresenter>>>,
    log: RwLock<Vec<Conflict>>,
}

impl ConflictResolver {
    /// Creates a resolver with the given strategy.
    pub fn new(strategy: ResolutionStrategy) -> Self {
        Self {
            strategy: RwLock::new(strategy),
            presenter: RwLock::new(None),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Installs the presenter used by the manual strategy.
    pub fn set_presenter(&self, presenter: Arc<dyn ConflictPresenter>) {
        *self.presenter.write() = Some(presenter);
    }

    /// Returns the current strategy.
    pub fn strategy(&self) -> ResolutionStrategy {
        *self.strategy.read()
    }

    /// Replaces the strategy.
    pub fn set_strategy(&self, strategy: ResolutionStrategy) {
        *self.strategy.write() = strategy;
    }

    /// Parses and installs a strategy by name.
    ///
    /// An unknown name is rejected and the current strategy is left
    /// untouched.
    pub fn set_strategy_from_str(&self, name: &str) -> ConflictResult<()> {
        let strategy = ResolutionStrategy::from_str(name)?;
        self.set_strategy(strategy);
        Ok(())
    }

    /// Checks whether a staged mutation conflicts with server state.
    ///
    /// Returns a conflict iff the server was modified after the local change
    /// was staged; a blind overwrite would then lose server-side changes.
    /// No server state means no conflict. Detected conflicts are appended to
    /// the audit log.
    pub fn detect_conflict(
        &self,
        update: &PendingUpdate,
        server_data: Option<&FieldMap>,
    ) -> Option<Conflict> {
        let server_data = server_data?;
        let server_timestamp = server_modified_at(server_data);
        if server_timestamp <= update.created_at {
            return None;
        }

        let conflict = Conflict::between(update, server_data);
        debug!(
            owner = %conflict.owner_id,
            local = %conflict.local_timestamp,
            server = %conflict.server_timestamp,
            "conflict detected"
        );
        self.log.write().push(conflict.clone());
        Some(conflict)
    }

    /// Resolves a conflict per the configured strategy.
    ///
    /// # Errors
    ///
    /// Under the manual strategy, returns [`ConflictError::Unresolved`] when
    /// the user cancels and [`ConflictError::NoPresenter`] when no presenter
    /// is installed; both leave the conflict open.
    pub fn resolve(&self, conflict: &Conflict) -> ConflictResult<Resolution> {
        match self.strategy() {
            ResolutionStrategy::Timestamp => {
                // Ties favor the server so concurrent server writes are
                // never discarded by accident.
                if conflict.local_timestamp > conflict.server_timestamp {
                    Ok(Resolution::use_local(conflict, "local change is newer"))
                } else {
                    Ok(Resolution::use_server(conflict, "server state is newer"))
                }
            }
            ResolutionStrategy::ServerWins => {
                Ok(Resolution::use_server(conflict, "server-wins strategy"))
            }
            ResolutionStrategy::ClientWins => {
                Ok(Resolution::use_local(conflict, "client-wins strategy"))
            }
            ResolutionStrategy::Manual => {
                let presenter = self
                    .presenter
                    .read()
                    .clone()
                    .ok_or(ConflictError::NoPresenter)?;
                match presenter.present(conflict)? {
                    Some(ResolutionAction::UseLocal) => {
                        Ok(Resolution::use_local(conflict, "user kept local changes"))
                    }
                    Some(ResolutionAction::UseServer) => {
                        Ok(Resolution::use_server(conflict, "user kept server state"))
                    }
                    None => Err(ConflictError::Unresolved),
                }
            }
        }
    }

    /// Returns a copy of the audit log.
    pub fn conflict_log(&self) -> Vec<Conflict> {
        self.log.read().clone()
    }

    /// Empties the audit log.
    pub fn clear_conflict_log(&self) {
        self.log.write().clear();
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(ResolutionStrategy::Timestamp)
    }
}

/// Field-level merge: every non-null local field overwrites the server's.
///
/// Offered as a third option beyond pure local/server selection; never
/// invoked automatically by [`ConflictResolver::resolve`].
pub fn merge_changes(local: &FieldMap, server: &FieldMap) -> FieldMap {
    let mut merged = server.clone();
    for (field, value) in local {
        if !value.is_null() {
            merged.insert(field.clone(), value.clone());
        }
    }
    merged
}
