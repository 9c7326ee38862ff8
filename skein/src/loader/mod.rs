//! Agent Loader (spec §4.4): discovers ADL documents on disk, validates
//! them, and publishes an immutable, read-shared/write-exclusive registry.
//!
//! The registry snapshot is an `Arc<Inner>` behind a `RwLock`, swapped
//! whole on every reload/register/delete — the same read-shared,
//! write-exclusive swap the teacher's `InMemoryStore` uses for its map,
//! generalized from a key-value store to an agent-id/slug pair of maps.

mod validate;

pub use validate::{validate_agent, validate_constraints, ValidationOutcome};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

use crate::adl::{Agent, Status};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("schema invalid: {0}")]
    SchemaInvalid(String),
    #[error("reference invalid: {0}")]
    ReferenceInvalid(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

struct Inner {
    by_id: HashMap<String, Arc<Agent>>,
    by_slug: HashMap<String, String>,
}

impl Inner {
    fn empty() -> Self {
        Self {
            by_id: HashMap::new(),
            by_slug: HashMap::new(),
        }
    }

    fn insert(&mut self, agent: Agent) {
        let id = agent.id().to_string();
        let slug = agent.slug();
        self.by_slug.insert(slug, id.clone());
        self.by_id.insert(id, Arc::new(agent));
    }
}

/// Immutable-after-load agent registry. The Agent Loader is the sole
/// writer (spec §3 Ownership); every other component holds a read-only
/// view through a clone of this handle.
#[derive(Clone)]
pub struct AgentRegistry {
    inner: Arc<RwLock<Arc<Inner>>>,
    storage_path: Option<PathBuf>,
}

impl AgentRegistry {
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(Inner::empty()))),
            storage_path: None,
        }
    }

    /// Loads every `.yaml`/`.yml`/`.json` file under `dir`, replacing the
    /// current registry contents wholesale. Returns per-file warnings;
    /// files that fail schema or cross-reference validation are skipped
    /// (logged) rather than aborting the whole load.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<(Self, Vec<String>), LoadError> {
        let registry = Self {
            inner: Arc::new(RwLock::new(Arc::new(Inner::empty()))),
            storage_path: Some(dir.as_ref().to_path_buf()),
        };
        let warnings = registry.reload()?;
        Ok((registry, warnings))
    }

    /// Re-scans the storage directory and swaps in a fresh snapshot.
    /// Returns accumulated cross-reference warnings across all files.
    pub fn reload(&self) -> Result<Vec<String>, LoadError> {
        let Some(dir) = &self.storage_path else {
            return Ok(Vec::new());
        };
        let mut next = Inner::empty();
        let mut warnings = Vec::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                *self.inner.write().unwrap() = Arc::new(next);
                return Ok(warnings);
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !matches!(ext, "yaml" | "yml" | "json") {
                continue;
            }
            match load_one(&path) {
                Ok(Some((agent, mut file_warnings))) => {
                    info!(agent_id = %agent.id(), path = %path.display(), "loaded agent");
                    warnings.append(&mut file_warnings);
                    next.insert(agent);
                }
                Ok(None) => {
                    info!(path = %path.display(), "skipping disabled/archived agent");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "rejected agent file");
                }
            }
        }
        *self.inner.write().unwrap() = Arc::new(next);
        Ok(warnings)
    }

    fn snapshot(&self) -> Arc<Inner> {
        self.inner.read().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Agent>> {
        self.snapshot().by_id.get(id).cloned()
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<Arc<Agent>> {
        let snap = self.snapshot();
        let id = snap.by_slug.get(slug)?;
        snap.by_id.get(id).cloned()
    }

    /// Resolves either an id or a slug, per §6.2's `{id_or_slug}` routes.
    pub fn get_by_id_or_slug(&self, id_or_slug: &str) -> Option<Arc<Agent>> {
        self.get(id_or_slug).or_else(|| self.get_by_slug(id_or_slug))
    }

    pub fn list_all(&self) -> Vec<Arc<Agent>> {
        self.snapshot().by_id.values().cloned().collect()
    }

    pub fn list_active(&self) -> Vec<Arc<Agent>> {
        self.list_all()
            .into_iter()
            .filter(|a| a.identity.status == Status::Active)
            .collect()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<Arc<Agent>> {
        self.list_all()
            .into_iter()
            .filter(|a| a.identity.category.as_deref() == Some(category))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.snapshot().by_id.len()
    }

    /// Validates and inserts a single agent (e.g. from the Builder/DSL
    /// generator external collaborators, spec §1), without touching disk.
    pub fn register(&self, agent: Agent) -> Result<Vec<String>, LoadError> {
        let outcome = validate_agent(&agent)?;
        let mut guard = self.inner.write().unwrap();
        let mut next = (**guard).clone_shallow();
        next.insert(agent);
        *guard = Arc::new(next);
        Ok(outcome.warnings)
    }

    /// Serializes `agent` as YAML under the storage path, named by its slug,
    /// and registers it in the in-memory map.
    pub fn save(&self, agent: Agent) -> Result<(), LoadError> {
        if let Some(dir) = &self.storage_path {
            let path = dir.join(format!("{}.yaml", agent.slug()));
            let yaml = serde_yaml::to_string(&agent)
                .map_err(|e| LoadError::SchemaInvalid(e.to_string()))?;
            std::fs::write(path, yaml)?;
        }
        self.register(agent)?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut guard = self.inner.write().unwrap();
        let mut next = (**guard).clone_shallow();
        let removed = next.by_id.remove(id).is_some();
        next.by_slug.retain(|_, v| v != id);
        *guard = Arc::new(next);
        removed
    }
}

impl Inner {
    fn clone_shallow(&self) -> Inner {
        Inner {
            by_id: self.by_id.clone(),
            by_slug: self.by_slug.clone(),
        }
    }
}

/// Parses, validates, and returns `Some((agent, warnings))`, or `None` if
/// the agent is disabled/archived (spec §4.4: "skip and continue").
fn load_one(path: &Path) -> Result<Option<(Agent, Vec<String>)>, LoadError> {
    let content = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let agent: Agent = if ext == "json" {
        serde_json::from_str(&content).map_err(|e| LoadError::SchemaInvalid(e.to_string()))?
    } else {
        serde_yaml::from_str(&content).map_err(|e| LoadError::SchemaInvalid(e.to_string()))?
    };
    validate_constraints(&agent)?;
    if matches!(agent.identity.status, Status::Disabled | Status::Archived) {
        return Ok(None);
    }
    let outcome = validate_agent(&agent)?;
    Ok(Some((agent, outcome.warnings)))
}
