//! # Session Host
//!
//! Arena of session actors keyed by session id.
//!
//! ## Session Creation
//!
//! 1. Feature gate and terminal identity validation (no side effects yet)
//! 2. Fresh `session_id` and a short code unique among live sessions
//! 3. Initial snapshot written to the store (a failure here aborts creation)
//! 4. `SESSION_CREATED` appended and published
//! 5. Actor spawned
//!
//! Every later mutation goes through the session's [`SessionHandle`].

mod actor;
mod code;
mod error;
mod reply;

pub use code::{generate_session_code, normalize_code, CODE_ALPHABET, CODE_LENGTH};
pub use error::{HostError, HostResult};
pub use reply::{IntentReply, SessionHealth};

use crate::container::{HostPorts, RuntimeConfig};
use actor::{ActorSetup, Command, SessionActor};
use chrono::Utc;
use parking_lot::RwLock;
use pos_telemetry::{CHANNEL_FRAMES_DROPPED, SESSIONS_CREATED};
use rl_01_session_state::{Intent, SessionMachine};
use shared_types::{
    validate_identifier, ChannelEnvelope, ChannelMessage, EventPayload, Session, SessionId,
    SessionMode, Snapshot, TerminalIdentity,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Queued commands per session before callers wait.
const COMMAND_CAPACITY: usize = 64;

/// Attempts at drawing a code not used by a live session.
const MAX_CODE_ATTEMPTS: usize = 16;

/// Result of [`SessionHost::create_session`].
#[derive(Clone)]
pub struct CreatedSession {
    pub session: Session,
    pub customer_url: String,
    pub snapshot: Snapshot,
    pub handle: SessionHandle,
}

/// Cloneable handle to one live session actor.
#[derive(Clone)]
pub struct SessionHandle {
    session: Session,
    commands: mpsc::Sender<Command>,
    health: watch::Receiver<SessionHealth>,
}

impl SessionHandle {
    /// Session identity.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Session id.
    pub fn session_id(&self) -> SessionId {
        self.session.session_id
    }

    /// Run an operator intent and wait for its outcome.
    pub async fn dispatch(&self, intent: Intent) -> HostResult<IntentReply> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Dispatch { intent, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Current in-memory snapshot.
    pub async fn snapshot(&self) -> HostResult<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Latest persistence health.
    pub fn health(&self) -> SessionHealth {
        self.health.borrow().clone()
    }

    /// Watch persistence health changes.
    pub fn watch_health(&self) -> watch::Receiver<SessionHealth> {
        self.health.clone()
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Ask the actor to stop. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    fn closed(&self) -> HostError {
        HostError::SessionClosed(self.session.session_id)
    }
}

struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Owner of every live session on this terminal host.
pub struct SessionHost {
    config: RuntimeConfig,
    ports: HostPorts,
    machine: SessionMachine,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    codes: RwLock<HashMap<String, SessionId>>,
    /// Channel drops already reported to the metrics counter.
    reported_drops: AtomicU64,
}

impl SessionHost {
    /// Create a host. Actors are spawned on the current tokio runtime.
    pub fn new(config: RuntimeConfig, ports: HostPorts) -> Self {
        let machine = SessionMachine::new(config.payment);
        Self {
            config,
            ports,
            machine,
            sessions: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            reported_drops: AtomicU64::new(0),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Shared ports (viewers connect through these).
    pub fn ports(&self) -> &HostPorts {
        &self.ports
    }

    /// Create a session on the given terminal.
    pub async fn create_session(
        &self,
        mode: SessionMode,
        terminal: TerminalIdentity,
    ) -> HostResult<CreatedSession> {
        if !self.config.enabled {
            return Err(HostError::FeatureDisabled);
        }
        validate_identifier("retailer_id", &terminal.retailer_id)?;
        validate_identifier("store_id", &terminal.store_id)?;
        validate_identifier("terminal_id", &terminal.terminal_id)?;

        let session_id = SessionId::new();
        let session_code = self.reserve_code(session_id);
        let now = Utc::now();
        let session = Session {
            session_id,
            session_code: session_code.clone(),
            mode,
            terminal: terminal.clone(),
            created_at: now,
        };
        let snapshot = Snapshot::initial(session_id, terminal, self.config.currency.clone(), now);

        if let Err(e) = self.ports.store.put(&snapshot).await {
            self.codes.write().remove(&session_code);
            warn!(%session_id, code = e.code(), "Initial snapshot write failed: {}", e);
            return Err(e.into());
        }

        let created = EventPayload::SessionCreated {
            session_code: session_code.clone(),
            mode,
            sale_id: snapshot.active_sale_id,
        };
        if let Err(e) = self.ports.log.append(session_id, &created).await {
            warn!(%session_id, code = e.code(), "SESSION_CREATED append failed: {}", e);
        }

        let spawned = SessionActor::spawn(ActorSetup {
            snapshot: snapshot.clone(),
            machine: self.machine.clone(),
            ports: self.ports.clone(),
            issuance_timeout: self.config.gateway.timeout,
            command_capacity: COMMAND_CAPACITY,
        });
        let handle = SessionHandle {
            session: session.clone(),
            commands: spawned.commands,
            health: spawned.health,
        };
        self.sessions.write().insert(
            session_id,
            SessionEntry {
                handle: handle.clone(),
                task: spawned.task,
            },
        );

        let announcement = ChannelEnvelope::new(
            session_id,
            Some(snapshot.active_sale_id),
            ChannelMessage::SessionCreated {
                session_code: session_code.clone(),
                mode,
            },
        );
        if let Err(e) = self.ports.channel.publish(announcement).await {
            warn!(%session_id, "SESSION_CREATED publish failed: {}", e);
        }

        SESSIONS_CREATED.inc();
        info!(
            %session_id,
            session_code = %session_code,
            mode = mode.as_str(),
            "Session created"
        );

        Ok(CreatedSession {
            customer_url: self.config.customer_url(&session_code),
            session,
            snapshot,
            handle,
        })
    }

    /// Create a session on the configured default terminal.
    pub async fn create_default_session(&self, mode: SessionMode) -> HostResult<CreatedSession> {
        self.create_session(mode, self.config.terminal.clone()).await
    }

    fn reserve_code(&self, session_id: SessionId) -> String {
        let mut codes = self.codes.write();
        let mut code = generate_session_code();
        for _ in 0..MAX_CODE_ATTEMPTS {
            if !codes.contains_key(&code) {
                break;
            }
            code = generate_session_code();
        }
        // 31^6 codes; a clash after every attempt only replaces the lookup.
        codes.insert(code.clone(), session_id);
        code
    }

    /// Handle of a live session.
    pub fn handle(&self, session_id: SessionId) -> HostResult<SessionHandle> {
        self.sessions
            .read()
            .get(&session_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| HostError::SessionNotFound(session_id.to_string()))
    }

    /// Look a live session up by its short code (case-insensitive).
    pub fn find_by_code(&self, session_code: &str) -> HostResult<SessionHandle> {
        let code = normalize_code(session_code);
        let session_id = self
            .codes
            .read()
            .get(&code)
            .copied()
            .ok_or(HostError::SessionNotFound(code))?;
        self.handle(session_id)
    }

    /// Run an intent on a session.
    pub async fn dispatch(&self, session_id: SessionId, intent: Intent) -> HostResult<IntentReply> {
        let handle = self.handle(session_id)?;
        handle.dispatch(intent).await
    }

    /// Identities of all live sessions, oldest first.
    pub fn list_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .map(|entry| entry.handle.session.clone())
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Stop a session's actor and forget it. Stored state is kept.
    pub async fn close_session(&self, session_id: SessionId) -> HostResult<()> {
        let entry = self
            .sessions
            .write()
            .remove(&session_id)
            .ok_or_else(|| HostError::SessionNotFound(session_id.to_string()))?;
        self.codes.write().remove(&entry.handle.session.session_code);

        entry.handle.shutdown().await;
        if let Err(e) = entry.task.await {
            warn!(%session_id, "Session actor ended abnormally: {}", e);
        }
        info!(%session_id, "Session closed");
        Ok(())
    }

    /// Stop every session.
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        for session_id in ids {
            let _ = self.close_session(session_id).await;
        }
        self.sync_channel_metrics();
    }

    /// Carry channel-level frame drops over to the metrics counter.
    pub fn sync_channel_metrics(&self) -> u64 {
        let dropped = self.ports.channel.frames_dropped();
        let previous = self.reported_drops.swap(dropped, Ordering::Relaxed);
        if dropped > previous {
            CHANNEL_FRAMES_DROPPED.inc_by((dropped - previous) as f64);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rl_04_receipt_gateway::ScriptedIssuer;
    use shared_types::{EventType, Stage};

    fn host_with(config: RuntimeConfig) -> SessionHost {
        let issuer = Arc::new(ScriptedIssuer::succeeding("https://receipts.test"));
        let ports = HostPorts::in_memory(issuer, 64);
        SessionHost::new(config, ports)
    }

    fn host() -> SessionHost {
        host_with(RuntimeConfig::default())
    }

    #[tokio::test]
    async fn test_create_session_persists_and_logs() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Grocery)
            .await
            .unwrap();
        let id = created.session.session_id;

        assert_eq!(created.snapshot.flow.stage, Stage::Boot);
        assert_eq!(created.session.session_code.len(), CODE_LENGTH);
        assert_eq!(
            created.customer_url,
            format!("http://localhost:3000/s/{}", created.session.session_code)
        );

        let stored = host.ports().store.get(id).await.unwrap();
        assert_eq!(stored, created.snapshot);

        let events = host.ports().log.list(id, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::SessionCreated);
        assert_eq!(events[0].payload["mode"], "GROCERY");
    }

    #[tokio::test]
    async fn test_feature_gate() {
        let config = RuntimeConfig {
            enabled: false,
            ..RuntimeConfig::default()
        };
        let host = host_with(config);
        let err = host
            .create_default_session(SessionMode::Fuel)
            .await
            .err()
            .unwrap();
        assert_eq!(err, HostError::FeatureDisabled);
        assert_eq!(host.session_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_terminal_has_no_side_effects() {
        let host = host();
        let terminal = TerminalIdentity {
            retailer_id: "r1".to_string(),
            store_id: "store one".to_string(),
            terminal_id: "t1".to_string(),
        };
        let err = host
            .create_session(SessionMode::Pharmacy, terminal)
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "RL_FIELD_INVALID");
        assert_eq!(host.session_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_by_code_and_close() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Fashion)
            .await
            .unwrap();
        let id = created.session.session_id;
        let code = created.session.session_code.to_ascii_lowercase();

        let found = host.find_by_code(&code).unwrap();
        assert_eq!(found.session_id(), id);
        assert_eq!(host.list_sessions().len(), 1);

        host.close_session(id).await.unwrap();
        assert!(created.handle.is_closed());
        assert!(matches!(
            host.find_by_code(&code),
            Err(HostError::SessionNotFound(_))
        ));
        assert!(matches!(
            created.handle.dispatch(Intent::Checkout).await,
            Err(HostError::SessionClosed(_))
        ));
        // Closing keeps what was stored.
        assert!(host.ports().store.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_intent_keeps_snapshot() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Grocery)
            .await
            .unwrap();
        let reply = created.handle.dispatch(Intent::Checkout).await.unwrap();
        assert!(!reply.applied);
        assert_eq!(reply.snapshot.revision, 0);
        assert_eq!(reply.snapshot, created.snapshot);
    }
}
