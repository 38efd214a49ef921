//! # Customer Viewer
//!
//! Passive mirror of one session for the customer-facing display.
//!
//! ## Connect Sequence
//!
//! 1. Subscribe to the session channel
//! 2. Load the canonical snapshot from the store
//! 3. Append and publish `CUSTOMER_JOINED` (the host answers with a
//!    `SNAPSHOT_SYNC`)
//!
//! Subscribing before the load means nothing published in between is lost;
//! anything older than the loaded view is discarded by revision.
//!
//! The viewer never writes the snapshot store. Its only outputs are the
//! `CUSTOMER_JOINED` / `CUSTOMER_SCANNED` facts.

use crate::container::HostPorts;
use crate::host::{HostError, HostResult};
use rl_02_snapshot_store::StoreError;
use rl_03_event_log::LiveFeed;
use shared_bus::Subscription;
use shared_types::{
    ChannelEnvelope, ChannelMessage, Event, EventPayload, ScanOutcome, ScanSimulation, ScanState,
    SessionId, Snapshot,
};
use tracing::{debug, info, warn};

/// A connected customer display.
pub struct CustomerViewer {
    ports: HostPorts,
    session_id: SessionId,
    viewer_id: String,
    subscription: Subscription,
    view: Snapshot,
    history: Option<LiveFeed>,
    /// Token the display already simulated a scan for.
    simulated_token: Option<String>,
}

impl CustomerViewer {
    /// Attach to a session.
    pub async fn connect(
        ports: &HostPorts,
        session_id: SessionId,
        viewer_id: impl Into<String>,
    ) -> HostResult<Self> {
        let viewer_id = viewer_id.into();
        let subscription = ports.channel.subscribe(session_id);
        let view = load(ports, session_id).await?;

        let viewer = Self {
            ports: ports.clone(),
            session_id,
            viewer_id,
            subscription,
            view,
            history: None,
            simulated_token: None,
        };
        viewer.announce().await;
        info!(
            %session_id,
            viewer_id = %viewer.viewer_id,
            revision = viewer.view.revision,
            "Customer viewer connected"
        );
        Ok(viewer)
    }

    async fn announce(&self) {
        let sale_id = self.view.active_sale_id;
        let joined = EventPayload::CustomerJoined {
            viewer_id: self.viewer_id.clone(),
            sale_id: Some(sale_id),
        };
        if let Err(e) = self.ports.log.append(self.session_id, &joined).await {
            warn!(session_id = %self.session_id, "CUSTOMER_JOINED append failed: {}", e);
        }
        let envelope = ChannelEnvelope::new(
            self.session_id,
            Some(sale_id),
            ChannelMessage::CustomerJoined {
                viewer_id: self.viewer_id.clone(),
            },
        );
        if let Err(e) = self.ports.channel.publish(envelope).await {
            warn!(session_id = %self.session_id, "CUSTOMER_JOINED publish failed: {}", e);
        }
    }

    /// Current local view.
    pub fn view(&self) -> &Snapshot {
        &self.view
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Fold one envelope into the view. True if the view changed.
    fn absorb(&mut self, envelope: ChannelEnvelope) -> bool {
        let Some(snapshot) = envelope.message.snapshot() else {
            return false;
        };
        if snapshot.revision <= self.view.revision {
            debug!(
                session_id = %self.session_id,
                revision = snapshot.revision,
                current = self.view.revision,
                "Stale snapshot ignored"
            );
            return false;
        }
        self.view = snapshot.clone();
        true
    }

    /// Wait for the next newer snapshot.
    ///
    /// Returns `None` only when the session can no longer be reloaded.
    pub async fn next_update(&mut self) -> Option<Snapshot> {
        loop {
            match self.subscription.recv().await {
                Some(envelope) => {
                    if self.absorb(envelope) {
                        self.simulate_scan().await;
                        return Some(self.view.clone());
                    }
                }
                None => {
                    if let Err(e) = self.resync().await {
                        warn!(session_id = %self.session_id, "Viewer resync failed: {}", e);
                        return None;
                    }
                }
            }
        }
    }

    /// Apply everything already delivered without waiting.
    pub fn poll_updates(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(Some(envelope)) = self.subscription.try_recv() {
            if self.absorb(envelope) {
                changed += 1;
            }
        }
        changed
    }

    /// Resubscribe and re-read the canonical snapshot.
    pub async fn resync(&mut self) -> HostResult<()> {
        self.subscription = self.ports.channel.subscribe(self.session_id);
        let stored = load(&self.ports, self.session_id).await?;
        if stored.revision > self.view.revision {
            self.view = stored;
        }
        debug!(session_id = %self.session_id, revision = self.view.revision, "Viewer resynced");
        Ok(())
    }

    /// Report the outcome of scanning the receipt code.
    pub async fn report_scan(&mut self, outcome: ScanOutcome) -> HostResult<()> {
        let sale_id = self.view.active_sale_id;
        let token_id = self.view.receipt.as_ref().map(|r| r.token_id.clone());

        let scanned = EventPayload::CustomerScanned {
            outcome,
            token_id: token_id.clone(),
            sale_id: Some(sale_id),
        };
        if let Err(e) = self.ports.log.append(self.session_id, &scanned).await {
            warn!(session_id = %self.session_id, "CUSTOMER_SCANNED append failed: {}", e);
        }

        let envelope = ChannelEnvelope::new(
            self.session_id,
            Some(sale_id),
            ChannelMessage::CustomerScanned { outcome, token_id },
        );
        self.ports.channel.publish(envelope).await?;
        info!(session_id = %self.session_id, %sale_id, outcome = ?outcome, "Scan reported");
        Ok(())
    }

    /// Answer a pending scan on its own when the display simulates scans.
    async fn simulate_scan(&mut self) {
        if self.view.scan.state != ScanState::Pending {
            return;
        }
        let outcome = match self.view.toggles.scan_simulation {
            ScanSimulation::Manual => return,
            ScanSimulation::Success => ScanOutcome::Success,
            ScanSimulation::Fail => ScanOutcome::Fail,
        };
        let token = self.view.receipt.as_ref().map(|r| r.token_id.clone());
        if token.is_none() || token == self.simulated_token {
            return;
        }
        self.simulated_token = token;
        if let Err(e) = self.report_scan(outcome).await {
            warn!(session_id = %self.session_id, "Simulated scan failed: {}", e);
        }
    }

    /// The first `limit` events of the session, each counted once.
    ///
    /// Merges a history read with live appends seen since the first call,
    /// re-reading the log when the live watch fell behind.
    pub async fn history(&mut self, limit: Option<usize>) -> HostResult<Vec<Event>> {
        if self.history.is_none() {
            self.history = Some(LiveFeed::open(&*self.ports.log, self.session_id, None).await?);
        }
        let Some(feed) = self.history.as_mut() else {
            return Ok(Vec::new());
        };
        feed.catch_up(&*self.ports.log).await?;
        let events = feed.feed().events();
        let take = limit.unwrap_or(events.len()).min(events.len());
        Ok(events[..take].to_vec())
    }
}

async fn load(ports: &HostPorts, session_id: SessionId) -> HostResult<Snapshot> {
    ports.store.get(session_id).await.map_err(|e| match e {
        StoreError::NotFound { .. } => HostError::SessionNotFound(session_id.to_string()),
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::RuntimeConfig;
    use crate::host::SessionHost;
    use rl_01_session_state::Intent;
    use rl_04_receipt_gateway::ScriptedIssuer;
    use serde_json::json;
    use shared_types::{CatalogItem, EventType, Money, SessionMode};
    use std::sync::Arc;
    use std::time::Duration;

    fn host() -> SessionHost {
        let issuer = Arc::new(ScriptedIssuer::succeeding("https://receipts.test"));
        SessionHost::new(RuntimeConfig::default(), HostPorts::in_memory(issuer, 64))
    }

    fn milk() -> CatalogItem {
        CatalogItem {
            sku: "MILK-1L".to_string(),
            name: "Milk 1L".to_string(),
            unit_price: Money::from_cents(120),
            vat_rate: 0.23,
        }
    }

    async fn next(viewer: &mut CustomerViewer) -> Snapshot {
        tokio::time::timeout(Duration::from_secs(2), viewer.next_update())
            .await
            .expect("no update in time")
            .expect("viewer closed")
    }

    #[tokio::test]
    async fn test_connect_unknown_session() {
        let host = host();
        let err = CustomerViewer::connect(host.ports(), SessionId::new(), "v1")
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "RL_SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_join_logs_and_receives_sync() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Grocery)
            .await
            .unwrap();
        let id = created.session.session_id;
        let mut viewer = CustomerViewer::connect(host.ports(), id, "display-1")
            .await
            .unwrap();
        assert_eq!(viewer.view().revision, 0);

        created
            .handle
            .dispatch(Intent::AddItem {
                item: milk(),
                quantity: 1,
            })
            .await
            .unwrap();

        let view = next(&mut viewer).await;
        assert_eq!(view.revision, 1);
        assert_eq!(view.cart.total, Money::from_cents(148));

        let history = viewer.history(None).await.unwrap();
        let types: Vec<EventType> = history.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::SessionCreated,
                EventType::CustomerJoined,
                EventType::CartUpdated
            ]
        );
        assert_eq!(history[1].payload["viewer_id"], "display-1");
    }

    #[tokio::test]
    async fn test_history_counts_each_event_once() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Grocery)
            .await
            .unwrap();
        let mut viewer = CustomerViewer::connect(host.ports(), created.session.session_id, "v")
            .await
            .unwrap();

        let first = viewer.history(None).await.unwrap();
        created
            .handle
            .dispatch(Intent::AddItem {
                item: milk(),
                quantity: 2,
            })
            .await
            .unwrap();
        let second = viewer.history(None).await.unwrap();
        let third = viewer.history(None).await.unwrap();

        assert_eq!(second.len(), first.len() + 1);
        assert_eq!(third, second);
        assert_eq!(viewer.history(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_survives_burst_of_appends() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Grocery)
            .await
            .unwrap();
        let id = created.session.session_id;
        let mut viewer = CustomerViewer::connect(host.ports(), id, "v")
            .await
            .unwrap();
        assert_eq!(viewer.history(None).await.unwrap().len(), 2);

        for n in 0..300 {
            host.ports()
                .log
                .append_raw(id, EventType::CartCleared, json!({ "removed_lines": n }))
                .await
                .unwrap();
        }

        let merged = viewer.history(None).await.unwrap();
        let stored = host.ports().log.list(id, None).await.unwrap();
        assert_eq!(merged.len(), 302);
        assert_eq!(merged, stored);
    }

    #[tokio::test]
    async fn test_resync_after_missed_messages() {
        let host = host();
        let created = host
            .create_default_session(SessionMode::Grocery)
            .await
            .unwrap();
        let mut viewer = CustomerViewer::connect(host.ports(), created.session.session_id, "v")
            .await
            .unwrap();
        created
            .handle
            .dispatch(Intent::AddItem {
                item: milk(),
                quantity: 1,
            })
            .await
            .unwrap();

        viewer.resync().await.unwrap();
        assert_eq!(viewer.view().revision, 1);
        // The queued sync for revision 1 is now stale.
        viewer.poll_updates();
        assert_eq!(viewer.view().revision, 1);
    }
}
