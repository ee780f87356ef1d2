//! Flood relay
//!
//! Every inbound message goes through the same ordered steps: verify the
//! origin signature, re-triage, claim the id in the seen-set, persist, and
//! only then fan out. A message that could not be stored is never forwarded,
//! and a failed store releases its claim so a later copy can try again.
//!
//! Own messages leave with their full ttl and `hops = 0`. Relayed copies
//! carry `ttl - 1` and `hops + 1` and are sent to every reachable peer except
//! the one the message came from. A peer that connects later is sent the
//! undelivered backlog.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::auth::{MessageSigner, SignatureVerifier};
use crate::codec;
use crate::message::{Message, NewMessage, Source};
use crate::persistence::{MessageStore, SaveOutcome};
use crate::relay::policy::RelayPolicy;
use crate::relay::seen::{Claim, SeenSet};
use crate::relay::stats::{RelayStats, StatsSnapshot};
use crate::transport::{PeerFrame, PeerId, PeerTransport};
use crate::triage;
use crate::utils::error::RelayError;

/// What happened to one inbound message or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Stored for the first time and sent on to `peers` neighbours.
    Forwarded { peers: usize },
    /// A known id came back with a higher priority; stored and sent on.
    Escalated { peers: usize },
    /// Stored, but its hop budget is spent.
    Expired,
    Duplicate,
    /// Signature did not verify. Nothing was stored.
    Rejected,
    /// Not a frame or message this node can accept.
    Malformed,
    Acknowledged,
}

/// Result of creating a message on this node.
#[derive(Debug, Clone, PartialEq)]
pub struct Originated {
    pub message: Message,
    /// Peers that accepted the message.
    pub peers: usize,
    /// Compact payload for an SMS-class channel, set when no peer took it.
    pub sms: Option<String>,
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub pruned: usize,
    pub escalated: usize,
    pub rebroadcast: usize,
}

pub struct FloodRelay {
    policy: RelayPolicy,
    store: Arc<dyn MessageStore>,
    verifier: Arc<dyn SignatureVerifier>,
    transport: Arc<dyn PeerTransport>,
    signer: MessageSigner,
    seen: SeenSet,
    stats: RelayStats,
}

impl FloodRelay {
    pub fn new(
        policy: RelayPolicy,
        store: Arc<dyn MessageStore>,
        verifier: Arc<dyn SignatureVerifier>,
        transport: Arc<dyn PeerTransport>,
        signer: MessageSigner,
    ) -> Self {
        let seen = SeenSet::new(policy.seen_capacity);
        Self {
            policy,
            store,
            verifier,
            transport,
            signer,
            seen,
            stats: RelayStats::default(),
        }
    }

    pub fn policy(&self) -> &RelayPolicy {
        &self.policy
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id).await
    }

    /// Create, triage, sign, store and broadcast a message entered on this node.
    ///
    /// A non-zero `ttl` in `fields` overrides the policy budget, capped at the
    /// largest budget the policy allows. When no peer takes the message it is
    /// also encoded for the SMS fallback; an encoding failure is returned as
    /// an error even though the message stays stored for later peers.
    pub async fn originate(&self, fields: NewMessage) -> Result<Originated, RelayError> {
        let now = now_ms();
        let requested_ttl = fields.ttl;
        let mut message = fields.into_message(now);
        message.validate()?;

        let triaged = message
            .priority
            .max(triage::score_message(&message, now));
        message.priority = triage::bump_for_critical_battery(
            triaged,
            message.battery_percent,
            self.policy.critical_battery_percent,
        );
        message.ttl = if requested_ttl > 0 {
            requested_ttl.min(self.policy.max_ttl())
        } else {
            self.policy.ttl_for(message.priority)
        };
        message.hops = 0;
        message.origin_priority = message.priority;
        self.signer.sign(&mut message);

        let claim = self
            .seen
            .claim(&message.id, message.priority, self.policy.same_id_policy)
            .await;
        if let Err(e) = self.store.save(&message) {
            self.seen.release(&message.id, claim).await;
            return Err(e.into());
        }
        RelayStats::bump(&self.stats.originated);
        RelayStats::bump(&self.stats.stored);

        let peers = self.fan_out(&message, None).await;
        info!(
            "Originated {} as {:?} (ttl {}) to {} peers",
            message.id, message.priority, message.ttl, peers
        );

        let sms = if peers == 0 {
            let payload = codec::encode(&message)?;
            info!("No peer reachable, {} queued for SMS fallback", message.id);
            Some(payload)
        } else {
            None
        };
        Ok(Originated {
            message,
            peers,
            sms,
        })
    }

    /// Entry point for raw text frames arriving from a peer connection.
    pub async fn on_peer_message(&self, raw: &str, from: &PeerId) -> Result<RelayOutcome, RelayError> {
        match PeerFrame::parse(raw) {
            Ok(PeerFrame::Envelope { message }) => self.receive(message, Some(from), Source::Peer).await,
            Ok(PeerFrame::Ack { id }) => {
                self.acknowledge(&id).await?;
                Ok(RelayOutcome::Acknowledged)
            }
            Err(e) => {
                RelayStats::bump(&self.stats.malformed);
                debug!("Malformed frame from {}: {}", from, e);
                Ok(RelayOutcome::Malformed)
            }
        }
    }

    /// Process a message that reached this node from outside.
    pub async fn receive(
        &self,
        mut message: Message,
        from: Option<&PeerId>,
        source: Source,
    ) -> Result<RelayOutcome, RelayError> {
        RelayStats::bump(&self.stats.received);
        message.source = source;
        message.delivered = false;

        if let Err(e) = self.check_shape(&message) {
            RelayStats::bump(&self.stats.malformed);
            debug!("Dropping malformed message {:?}: {}", message.id, e);
            return Ok(RelayOutcome::Malformed);
        }

        // verification is pure, so a forged copy never touches the seen-set
        if !self.verifier.verify(&message) {
            RelayStats::bump(&self.stats.rejected);
            warn!(
                "Rejected {} from {}: signature did not verify",
                message.id,
                from.map_or("local", String::as_str)
            );
            return Ok(RelayOutcome::Rejected);
        }

        // the sender's claimed priority is not signed; only the origin's is
        let accepted = message
            .origin_priority
            .max(triage::score_message(&message, now_ms()));
        if accepted != message.priority {
            debug!(
                "{} claimed {:?}, accepted as {:?}",
                message.id, message.priority, accepted
            );
        }
        message.priority = accepted;

        let claim = self
            .seen
            .claim(&message.id, message.priority, self.policy.same_id_policy)
            .await;
        if claim == Claim::Duplicate {
            RelayStats::bump(&self.stats.duplicates);
            debug!("Duplicate {} ignored", message.id);
            return Ok(RelayOutcome::Duplicate);
        }

        let saved = match self.store.save(&message) {
            Ok(saved) => saved,
            Err(e) => {
                self.seen.release(&message.id, claim).await;
                return Err(e.into());
            }
        };

        let escalated = match saved {
            SaveOutcome::Inserted => {
                RelayStats::bump(&self.stats.stored);
                false
            }
            SaveOutcome::Escalated { previous } => {
                RelayStats::bump(&self.stats.escalations);
                info!(
                    "{} escalated from {:?} to {:?}",
                    message.id, previous, message.priority
                );
                true
            }
            SaveOutcome::Unchanged => {
                RelayStats::bump(&self.stats.duplicates);
                debug!("{} already stored, nothing to forward", message.id);
                return Ok(RelayOutcome::Duplicate);
            }
        };

        if message.is_expired() {
            RelayStats::bump(&self.stats.expired);
            debug!("{} stored with no hops left", message.id);
            return Ok(RelayOutcome::Expired);
        }

        let peers = self.fan_out(&message, from).await;
        Ok(if escalated {
            RelayOutcome::Escalated { peers }
        } else {
            RelayOutcome::Forwarded { peers }
        })
    }

    /// Mark a message delivered. Returns `false` if it already was.
    pub async fn acknowledge(&self, id: &str) -> Result<bool, RelayError> {
        let changed = self.store.mark_delivered(id)?;
        if changed {
            RelayStats::bump(&self.stats.acknowledged);
            info!("{} acknowledged", id);
        }
        Ok(changed)
    }

    /// Send the undelivered backlog to a peer that just connected.
    ///
    /// Highest priority first. Returns how many sends succeeded.
    pub async fn forward_backlog(&self, peer: &PeerId) -> Result<usize, RelayError> {
        let mut pending = self.store.undelivered()?;
        pending.sort_by(|a, b| {
            b.message
                .priority
                .cmp(&a.message.priority)
                .then_with(|| a.message.created_at_ms.cmp(&b.message.created_at_ms))
        });

        let mut sent = 0;
        for stored in &pending {
            let Some(copy) = self.outbound(&stored.message) else {
                continue;
            };
            match self.transport.broadcast(peer, &copy).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    RelayStats::bump(&self.stats.broadcast_failures);
                    warn!("Backlog send of {} to {} failed: {}", copy.id, peer, e);
                }
            }
        }

        RelayStats::add(&self.stats.forwarded, sent);
        if sent > 0 {
            info!("Sent {} backlog messages to {}", sent, peer);
        }
        Ok(sent)
    }

    /// Warm the seen-set from storage so a restart does not re-flood old ids.
    pub async fn restore_seen(&self) -> Result<usize, RelayError> {
        let recent = self.store.get_recent(self.policy.seen_capacity)?;
        // oldest first, so the newest end up most recently used
        for message in recent.iter().rev() {
            self.seen.raise(&message.id, message.priority).await;
        }
        info!("Restored {} ids into the seen-set", recent.len());
        Ok(recent.len())
    }

    /// Retention pruning plus the time-driven escalation sweep.
    pub async fn run_maintenance(&self, now_ms: i64) -> Result<MaintenanceReport, RelayError> {
        let mut report = MaintenanceReport::default();

        if self.policy.retention_ms > 0 {
            report.pruned = self
                .store
                .prune_older_than(now_ms.saturating_sub(self.policy.retention_ms))?;
        }

        let pending = self.store.undelivered()?;
        let messages: Vec<Message> = pending.iter().map(|s| s.message.clone()).collect();
        let scored = triage::calculate_batch(&messages, now_ms);

        for stored in &pending {
            let message = &stored.message;
            let minutes = stored.minutes_since_update(now_ms);
            if !triage::should_escalate(message, minutes, message.priority, now_ms) {
                continue;
            }

            let recomputed = scored
                .get(&message.id)
                .copied()
                .unwrap_or(message.priority)
                .max(message.priority);
            let target = match message.source {
                Source::SelfOrigin => recomputed.max(message.priority.escalated()),
                Source::Peer | Source::Server => recomputed,
            };

            if target <= message.priority {
                if message.source == Source::SelfOrigin {
                    warn!("{} is still undelivered at {:?}", message.id, message.priority);
                }
                self.store.touch(&message.id)?;
                continue;
            }

            if !self.store.escalate(&message.id, target)? {
                continue;
            }
            RelayStats::bump(&self.stats.escalations);
            self.seen.raise(&message.id, target).await;
            report.escalated += 1;
            info!("{} escalated to {:?} by maintenance", message.id, target);

            if message.source == Source::SelfOrigin {
                let mut again = message.clone();
                again.priority = target;
                again.ttl = self.policy.ttl_for(target);
                again.hops = 0;
                self.fan_out(&again, None).await;
                report.rebroadcast += 1;
            }
        }

        Ok(report)
    }

    /// Run `run_maintenance` every `interval` until the task is aborted.
    pub fn start_maintenance_loop(relay: Arc<FloodRelay>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Starting maintenance loop every {}s", interval.as_secs());
            let mut ticker = time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match relay.run_maintenance(now_ms()).await {
                    Ok(report) if report != MaintenanceReport::default() => {
                        info!("Maintenance: {:?}", report)
                    }
                    Ok(_) => debug!("Maintenance: nothing to do"),
                    Err(e) => error!("Maintenance failed: {}", e),
                }
            }
        })
    }

    /// Range checks plus `ttl + hops` staying within what any origin could set.
    fn check_shape(&self, message: &Message) -> Result<(), RelayError> {
        message.validate()?;
        let budget = message.ttl.checked_add(message.hops);
        if budget.is_none_or(|b| b > self.policy.max_ttl()) {
            return Err(RelayError::HopBudget {
                ttl: message.ttl,
                hops: message.hops,
            });
        }
        Ok(())
    }

    /// The copy peers receive. Own messages keep their ttl, start at hop 0
    /// and are re-signed so an escalated priority carries the origin's
    /// signature. Relayed messages spend one hop.
    fn outbound(&self, message: &Message) -> Option<Message> {
        match message.source {
            Source::SelfOrigin if message.is_expired() => None,
            Source::SelfOrigin => {
                let mut copy = message.clone();
                copy.hops = 0;
                copy.delivered = false;
                copy.origin_priority = copy.priority;
                self.signer.sign(&mut copy);
                Some(copy)
            }
            Source::Peer | Source::Server => message.next_hop(),
        }
    }

    /// Send the outbound copy to every reachable peer except `except`.
    /// Returns how many sends succeeded.
    async fn fan_out(&self, message: &Message, except: Option<&PeerId>) -> usize {
        let Some(copy) = self.outbound(message) else {
            return 0;
        };

        let targets: Vec<PeerId> = self
            .transport
            .reachable_peers()
            .await
            .into_iter()
            .filter(|p| Some(p) != except)
            .collect();

        let results = join_all(
            targets
                .iter()
                .map(|peer| self.transport.broadcast(peer, &copy)),
        )
        .await;

        let mut sent = 0;
        for (peer, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    RelayStats::bump(&self.stats.broadcast_failures);
                    warn!("Broadcast of {} to {} failed: {}", copy.id, peer, e);
                }
            }
        }
        RelayStats::add(&self.stats.forwarded, sent);
        sent
    }
}

impl std::fmt::Debug for FloodRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloodRelay")
            .field("policy", &self.policy)
            .field("signer", &self.signer)
            .finish()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
