//! # Session Actor
//!
//! One task per live session. It owns the authoritative in-memory
//! `Snapshot` and is its only writer.
//!
//! ## Per-Intent Pipeline
//!
//! ```text
//! intent → machine.apply → snapshot store → event log → channel publish → effects
//! ```
//!
//! Intents run strictly one after another. Follow-up intents requested by a
//! transition (and the auto-issuance trigger) are queued and applied before
//! the next command is taken, so a caller's reply already reflects them.
//!
//! Persistence is write-behind: a failed store or log write is logged,
//! counted and reported through [`SessionHealth`], but the in-memory snapshot
//! still advances and is still published.

use crate::container::HostPorts;
use crate::host::reply::{IntentReply, SessionHealth};
use chrono::Utc;
use pos_telemetry::{
    HistogramTimer, EVENT_APPEND_FAILURES, FALLBACK_PRINTS, INTENTS_APPLIED, INTENTS_REJECTED,
    ISSUANCE_DURATION, ISSUANCE_FAILED, ISSUANCE_STARTED, SESSIONS_ACTIVE, SNAPSHOT_BYTES,
    SNAPSHOT_WRITE_FAILURES,
};
use rl_01_session_state::{auto_issue_due, Effect, Intent, SessionMachine, Transition};
use rl_04_receipt_gateway::IssueReceiptRequest;
use shared_bus::Subscription;
use shared_types::{
    ChannelEnvelope, ChannelMessage, EventPayload, PaymentOutcome, SaleId, SessionId, Snapshot,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Error code reported when the host-side issuance deadline elapses.
const CODE_ISSUANCE_DEADLINE: &str = "RL_UPSTREAM_TIMEOUT";

/// Messages accepted by a session actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Operator intent; the reply carries the outcome.
    Dispatch {
        intent: Intent,
        reply: oneshot::Sender<IntentReply>,
    },
    /// Timer or issuance result fed back by the actor's own tasks.
    Background(Intent),
    /// Current snapshot.
    Snapshot { reply: oneshot::Sender<Snapshot> },
    Shutdown,
}

/// Everything an actor needs at spawn time.
pub(crate) struct ActorSetup {
    pub snapshot: Snapshot,
    pub machine: SessionMachine,
    pub ports: HostPorts,
    pub issuance_timeout: Duration,
    pub command_capacity: usize,
}

/// Handles returned by [`SessionActor::spawn`].
pub(crate) struct SpawnedActor {
    pub commands: mpsc::Sender<Command>,
    pub health: watch::Receiver<SessionHealth>,
    pub task: JoinHandle<()>,
}

pub(crate) struct SessionActor {
    session_id: SessionId,
    snapshot: Snapshot,
    machine: SessionMachine,
    ports: HostPorts,
    issuance_timeout: Duration,
    /// Weak so that pending timers never keep a closed session alive.
    commands: mpsc::WeakSender<Command>,
    payment_timer: Option<JoinHandle<()>>,
    issuance_task: Option<JoinHandle<()>>,
    /// Set once auto-issuance fired for the current sale.
    auto_issue_fired: bool,
    health: watch::Sender<SessionHealth>,
}

impl SessionActor {
    /// Spawn the actor task for an already persisted initial snapshot.
    pub(crate) fn spawn(setup: ActorSetup) -> SpawnedActor {
        let (tx, rx) = mpsc::channel(setup.command_capacity.max(1));
        let (health_tx, health_rx) = watch::channel(SessionHealth::healthy());
        let actor = Self {
            session_id: setup.snapshot.session_id,
            snapshot: setup.snapshot,
            machine: setup.machine,
            ports: setup.ports,
            issuance_timeout: setup.issuance_timeout,
            commands: tx.downgrade(),
            payment_timer: None,
            issuance_task: None,
            auto_issue_fired: false,
            health: health_tx,
        };
        // Subscribed before the task starts, so nothing a viewer publishes
        // right after creation is missed.
        let subscription = actor.ports.channel.subscribe(actor.session_id);
        let task = tokio::spawn(actor.run(rx, subscription));
        SpawnedActor {
            commands: tx,
            health: health_rx,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut subscription: Subscription) {
        info!(session_id = %self.session_id, "Session actor started");
        SESSIONS_ACTIVE.inc();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dispatch { intent, reply }) => {
                        let outcome = self.handle(intent).await;
                        let _ = reply.send(outcome);
                    }
                    Some(Command::Background(intent)) => {
                        self.handle(intent).await;
                    }
                    Some(Command::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot.clone());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                envelope = subscription.recv() => match envelope {
                    Some(envelope) => self.on_channel(envelope).await,
                    None => {
                        debug!(session_id = %self.session_id, "Channel topic closed, resubscribing");
                        subscription = self.ports.channel.subscribe(self.session_id);
                    }
                },
            }
        }

        self.stop();
    }

    fn stop(&mut self) {
        if let Some(timer) = self.payment_timer.take() {
            timer.abort();
        }
        if let Some(task) = self.issuance_task.take() {
            task.abort();
        }
        SESSIONS_ACTIVE.dec();
        info!(session_id = %self.session_id, "Session actor stopped");
    }

    // =========================================================================
    // INTENTS
    // =========================================================================

    /// Apply an intent plus every follow-up it triggers.
    async fn handle(&mut self, intent: Intent) -> IntentReply {
        let mut queue = VecDeque::from([intent]);
        let mut status = None;

        while let Some(next) = queue.pop_front() {
            match self.apply_one(next, &mut queue).await {
                Ok(applied) => status = Some(applied),
                // Only the caller's own intent can be refused; follow-ups
                // that no longer apply are dropped.
                Err(rejection) if status.is_none() => {
                    return IntentReply::rejected(rejection, self.snapshot.clone());
                }
                Err(_) => {}
            }
        }

        IntentReply::applied(status.unwrap_or_default(), self.snapshot.clone())
    }

    /// Returns the status line, or the rejection text.
    async fn apply_one(&mut self, intent: Intent, queue: &mut VecDeque<Intent>) -> Result<String, String> {
        let name = intent.name();
        let transition = match self.machine.apply(&self.snapshot, intent, Utc::now()) {
            Ok(t) => t,
            Err(rejection) => {
                INTENTS_REJECTED.with_label_values(&[name]).inc();
                debug!(
                    session_id = %self.session_id,
                    intent = name,
                    code = rejection.code(),
                    "Intent rejected: {}",
                    rejection
                );
                return Err(rejection.to_string());
            }
        };
        INTENTS_APPLIED.with_label_values(&[name]).inc();

        let Transition {
            snapshot,
            event,
            effects,
            status,
        } = transition;
        self.snapshot = snapshot;

        self.persist(event.as_ref()).await;
        self.publish_transition(event.as_ref()).await;
        if let Some(event) = &event {
            record_event_metrics(event);
        }

        for effect in effects {
            self.run_effect(effect, queue);
        }

        if !self.auto_issue_fired && auto_issue_due(&self.snapshot) {
            self.auto_issue_fired = true;
            debug!(session_id = %self.session_id, sale_id = %self.snapshot.active_sale_id, "Auto-issuance triggered");
            queue.push_back(Intent::IssueReceipt);
        }

        Ok(status)
    }

    // =========================================================================
    // PERSISTENCE (write-behind)
    // =========================================================================

    /// Snapshot first, then the event. Neither failure rolls back the other.
    async fn persist(&mut self, event: Option<&EventPayload>) {
        let mut errors = Vec::new();

        match self.ports.store.put(&self.snapshot).await {
            Ok(()) => {
                if let Ok(bytes) = serde_json::to_vec(&self.snapshot) {
                    SNAPSHOT_BYTES.observe(bytes.len() as f64);
                }
            }
            Err(e) => {
                SNAPSHOT_WRITE_FAILURES.inc();
                warn!(
                    session_id = %self.session_id,
                    revision = self.snapshot.revision,
                    code = e.code(),
                    "Snapshot write failed: {}",
                    e
                );
                errors.push((true, e.to_string()));
            }
        }

        if let Some(event) = event {
            if let Err(e) = self.ports.log.append(self.session_id, event).await {
                EVENT_APPEND_FAILURES.inc();
                warn!(
                    session_id = %self.session_id,
                    event_type = %event.event_type(),
                    code = e.code(),
                    "Event append failed: {}",
                    e
                );
                errors.push((false, e.to_string()));
            }
        }

        self.health.send_modify(|health| {
            health.persisted = errors.is_empty();
            for (snapshot_write, message) in errors {
                if snapshot_write {
                    health.failed_snapshot_writes += 1;
                } else {
                    health.failed_event_appends += 1;
                }
                health.last_error = Some(message);
            }
        });
    }

    // =========================================================================
    // CHANNEL
    // =========================================================================

    async fn publish_transition(&self, event: Option<&EventPayload>) {
        let envelopes = match event {
            Some(EventPayload::CartUpdated { .. }) | Some(EventPayload::CartCleared { .. }) => {
                vec![ChannelEnvelope::cart_updated(&self.snapshot)]
            }
            Some(EventPayload::ResetRequested { sale_id, .. }) => vec![
                ChannelEnvelope::new(
                    self.session_id,
                    Some(*sale_id),
                    ChannelMessage::ResetRequested { sale_id: *sale_id },
                ),
                ChannelEnvelope::snapshot_sync(&self.snapshot),
            ],
            _ => vec![ChannelEnvelope::snapshot_sync(&self.snapshot)],
        };
        for envelope in envelopes {
            self.publish(envelope).await;
        }
    }

    async fn publish(&self, envelope: ChannelEnvelope) {
        let message_type = envelope.message_type();
        if let Err(e) = self.ports.channel.publish(envelope).await {
            warn!(session_id = %self.session_id, %message_type, "Channel publish failed: {}", e);
        }
    }

    /// Viewer-originated messages. Host-originated ones echo back here and
    /// are ignored.
    async fn on_channel(&mut self, envelope: ChannelEnvelope) {
        match envelope.message {
            ChannelMessage::CustomerJoined { viewer_id } => {
                debug!(session_id = %self.session_id, %viewer_id, "Viewer joined, republishing snapshot");
                self.publish(ChannelEnvelope::snapshot_sync(&self.snapshot)).await;
            }
            ChannelMessage::CustomerScanned { outcome, token_id } => {
                if envelope
                    .sale_id
                    .is_some_and(|sale_id| sale_id != self.snapshot.active_sale_id)
                {
                    debug!(session_id = %self.session_id, "Scan for a previous sale ignored");
                    return;
                }
                let reply = self.handle(Intent::Scanned { outcome, token_id }).await;
                if !reply.applied {
                    debug!(session_id = %self.session_id, status = %reply.status, "Scan report not admitted");
                }
            }
            _ => {}
        }
    }

    // =========================================================================
    // EFFECTS
    // =========================================================================

    fn run_effect(&mut self, effect: Effect, queue: &mut VecDeque<Intent>) {
        match effect {
            Effect::SchedulePaymentResolution {
                sale_id,
                outcome,
                delay,
            } => self.schedule_payment(sale_id, outcome, delay),
            Effect::CancelPaymentTimer => {
                if let Some(timer) = self.payment_timer.take() {
                    timer.abort();
                    debug!(session_id = %self.session_id, "Pending payment timer cancelled");
                }
            }
            Effect::CallIssuer { sale_id } => self.call_issuer(sale_id),
            Effect::FollowUp(intent) => queue.push_back(intent),
            Effect::ResetIssuanceGuard => self.auto_issue_fired = false,
        }
    }

    fn schedule_payment(&mut self, sale_id: SaleId, outcome: PaymentOutcome, delay: Duration) {
        if let Some(timer) = self.payment_timer.take() {
            timer.abort();
        }
        let commands = self.commands.clone();
        self.payment_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx
                    .send(Command::Background(Intent::PaymentResolved { sale_id, outcome }))
                    .await;
            }
        }));
    }

    fn call_issuer(&mut self, sale_id: SaleId) {
        let request = IssueReceiptRequest::from_snapshot(&self.snapshot, Utc::now());
        let issuer = Arc::clone(&self.ports.issuer);
        let deadline = self.issuance_timeout;
        let commands = self.commands.clone();
        let session_id = self.session_id;

        self.issuance_task = Some(tokio::spawn(async move {
            let intent = {
                let _timer = HistogramTimer::new(&ISSUANCE_DURATION);
                match tokio::time::timeout(deadline, issuer.issue(&request)).await {
                    Ok(Ok(receipt)) => {
                        info!(%session_id, %sale_id, token_id = %receipt.token_id, "Receipt issued");
                        Intent::IssuanceSucceeded { sale_id, receipt }
                    }
                    Ok(Err(e)) => {
                        warn!(%session_id, %sale_id, code = e.code(), "Receipt issuance failed: {}", e);
                        Intent::IssuanceFailed {
                            sale_id,
                            message: e.to_string(),
                            code: Some(e.code().to_string()),
                            network: false,
                        }
                    }
                    Err(_) => {
                        warn!(%session_id, %sale_id, deadline_ms = deadline.as_millis() as u64, "Receipt issuance timed out");
                        Intent::IssuanceFailed {
                            sale_id,
                            message: format!("Upstream call timed out after {} ms", deadline.as_millis()),
                            code: Some(CODE_ISSUANCE_DEADLINE.to_string()),
                            network: false,
                        }
                    }
                }
            };
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::Background(intent)).await;
            }
        }));
    }
}

fn record_event_metrics(event: &EventPayload) {
    match event {
        EventPayload::ReceiptIssuanceStarted { .. } => ISSUANCE_STARTED.inc(),
        EventPayload::ReceiptIssuanceFailed { code, .. } => ISSUANCE_FAILED
            .with_label_values(&[code.as_deref().unwrap_or("UNKNOWN")])
            .inc(),
        EventPayload::FallbackPrinted { reason, .. } => {
            FALLBACK_PRINTS.with_label_values(&[reason.as_str()]).inc()
        }
        _ => {}
    }
}
