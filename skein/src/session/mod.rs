//! Session Manager (spec §4.5): short-lived conversational state keyed by
//! an opaque session id. Concurrency is per-id via `dashmap::DashMap`, the
//! same sharded-map idiom the teacher's in-memory store uses; eviction is a
//! background sweeper started with `tokio::spawn`, mirroring the teacher's
//! own background-task pattern and `session_manager.py`'s
//! `_cleanup_loop`/`_cleanup_expired` semantics one-for-one.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::message::{Message, Role};

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub messages: Vec<Message>,
    pub variables: std::collections::HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub user_id: Option<String>,
}

impl Session {
    fn new(agent_id: String, agent_name: String, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            agent_id,
            agent_name,
            messages: Vec::new(),
            variables: Default::default(),
            created_at: now,
            last_activity: now,
            user_id,
        }
    }
}

/// Owns all mutable conversation state (spec §3 Ownership). Cheap to
/// clone — every clone shares the same underlying map and sweeper.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Spawns the background eviction sweeper. Call once per process;
    /// the returned handle may be dropped (the task runs detached) or
    /// aborted for tests that don't want it outliving the test.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let sessions = self.sessions.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                sweep_expired(&sessions, ttl);
            }
        })
    }

    pub fn create(&self, agent_id: impl Into<String>, agent_name: impl Into<String>, user_id: Option<String>) -> Session {
        let session = Session::new(agent_id.into(), agent_name.into(), user_id);
        self.sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.last_activity = Utc::now();
        Some(entry.clone())
    }

    /// Returns the existing session if present and its `agent_id` matches;
    /// otherwise creates a new one (spec §4.5).
    pub fn get_or_create(
        &self,
        id: Option<&str>,
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        user_id: Option<String>,
    ) -> Session {
        let agent_id = agent_id.into();
        if let Some(id) = id {
            if let Some(existing) = self.get(id) {
                if existing.agent_id == agent_id {
                    return existing;
                }
            }
        }
        self.create(agent_id, agent_name, user_id)
    }

    pub fn add_message(&self, id: &str, role: Role, content: impl Into<String>) -> Option<()> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.messages.push(Message::new(role, content));
        entry.last_activity = Utc::now();
        Some(())
    }

    pub fn get_messages(&self, id: &str, limit: Option<usize>) -> Option<Vec<Message>> {
        let entry = self.sessions.get(id)?;
        let messages = &entry.messages;
        Some(match limit {
            Some(n) if n < messages.len() => messages[messages.len() - n..].to_vec(),
            _ => messages.clone(),
        })
    }

    pub fn set_variable(&self, id: &str, key: impl Into<String>, value: Value) -> Option<()> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.variables.insert(key.into(), value);
        entry.last_activity = Utc::now();
        Some(())
    }

    pub fn get_variable(&self, id: &str, key: &str) -> Option<Value> {
        self.sessions.get(id)?.variables.get(key).cloned()
    }

    pub fn clear_messages(&self, id: &str) -> Option<()> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.messages.clear();
        Some(())
    }

    pub fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn list_sessions(&self, agent_id: Option<&str>) -> Vec<Session> {
        self.sessions
            .iter()
            .map(|e| e.clone())
            .filter(|s| agent_id.map(|a| a == s.agent_id).unwrap_or(true))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn sweep_expired(sessions: &DashMap<String, Session>, ttl: Duration) {
    let now = Utc::now();
    sessions.retain(|_, session| {
        let idle = now.signed_duration_since(session.last_activity);
        // Strict inequality at the boundary (spec §8): `idle == ttl` is not expired.
        idle.to_std().map(|d| d <= ttl).unwrap_or(true)
    });
}
