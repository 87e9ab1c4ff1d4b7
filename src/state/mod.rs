//! Session context store
//!
//! Holds the short-lived named contexts that carry slot values across turns.
//! Each session owns a `ContextSet`; it is loaded at the start of a turn,
//! handed to the handler as a snapshot and stored back once the turn has aged it.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Context holding the user's mobile number
pub const GOT_MOBILE: &str = "got_mobile";

/// Context marking that the assistant asked for a mobile number
pub const ASK_MOBILE: &str = "ask_mobile";

/// A named, turn-limited parameter bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub name: String,
    /// Remaining turns; zero means logically deleted
    pub lifespan: u32,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl SessionContext {
    pub fn new(name: impl Into<String>, lifespan: u32, parameters: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            lifespan,
            parameters,
        }
    }

    /// Context that deletes `name` when set
    pub fn expired(name: impl Into<String>) -> Self {
        Self::new(name, 0, Map::new())
    }

    pub fn is_live(&self) -> bool {
        self.lifespan > 0
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

/// All contexts of one session
#[derive(Debug, Clone, Default)]
pub struct ContextSet {
    contexts: BTreeMap<String, SessionContext>,
    /// Names written during the current turn
    touched: BTreeSet<String>,
}

impl ContextSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live context by name
    pub fn get(&self, name: &str) -> Option<&SessionContext> {
        self.contexts.get(name).filter(|ctx| ctx.is_live())
    }

    /// Replace any context with the same name. Parameters are not merged.
    pub fn set(&mut self, context: SessionContext) {
        self.touched.insert(context.name.clone());
        self.contexts.insert(context.name.clone(), context);
    }

    pub fn apply<I>(&mut self, writes: I)
    where
        I: IntoIterator<Item = SessionContext>,
    {
        for context in writes {
            self.set(context);
        }
    }

    /// Age every context not written this turn by one, then drop the dead ones.
    pub fn end_turn(&mut self) {
        for (name, context) in self.contexts.iter_mut() {
            if !self.touched.contains(name) {
                context.lifespan = context.lifespan.saturating_sub(1);
            }
        }
        self.contexts.retain(|_, context| context.is_live());
        self.touched.clear();
    }

    pub fn live(&self) -> impl Iterator<Item = &SessionContext> {
        self.contexts.values().filter(|ctx| ctx.is_live())
    }

    pub fn is_empty(&self) -> bool {
        self.live().next().is_none()
    }
}

/// Trait for session context persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session: &str) -> Result<ContextSet>;
    async fn save(&self, session: &str, contexts: ContextSet) -> Result<()>;
    async fn clear(&self, session: &str) -> Result<()>;
}

/// Sessions untouched for this long are treated as abandoned
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct SessionEntry {
    contexts: ContextSet,
    last_seen: Instant,
}

/// In-memory session store
///
/// Entries idle for longer than the timeout read as empty and are removed by
/// [`InMemorySessionStore::sweep_idle`].
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    idle_timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle past the timeout; returns how many went
    pub async fn sweep_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let timeout = self.idle_timeout;
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= timeout);
        before - sessions.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session: &str) -> Result<ContextSet> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session)
            .filter(|entry| entry.last_seen.elapsed() <= self.idle_timeout)
            .map(|entry| entry.contexts.clone())
            .unwrap_or_default())
    }

    async fn save(&self, session: &str, contexts: ContextSet) -> Result<()> {
        let mut sessions = self.sessions.write().await;

        if contexts.is_empty() {
            sessions.remove(session);
        } else {
            sessions.insert(
                session.to_string(),
                SessionEntry {
                    contexts,
                    last_seen: Instant::now(),
                },
            );
        }

        Ok(())
    }

    async fn clear(&self, session: &str) -> Result<()> {
        self.sessions.write().await.remove(session);
        Ok(())
    }
}

/// Run [`InMemorySessionStore::sweep_idle`] every `every` until the task is dropped
pub fn spawn_idle_sweeper(store: Arc<InMemorySessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.sweep_idle().await;
            if removed > 0 {
                let remaining = store.session_count().await;
                info!(removed, remaining, "Swept idle sessions");
            } else {
                debug!("No idle sessions to sweep");
            }
        }
    })
}
