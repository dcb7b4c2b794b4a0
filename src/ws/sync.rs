use std::sync::Arc;
use std::time::Duration;

use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    CodeChangeMessage, SendMessage, SyncAbandonReason, SyncAbandonedMessage, SyncCodeMessage,
    SyncRequestMessage,
};
use super::registry::{ConnectionId, Participant, SessionRegistry};
use super::router::BroadcastRouter;

/// Extra lifetime granted to pending entries past the wait bound, so the
/// timer always finds its own entry before the cache expires it.
const PENDING_TTL_SLACK: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
struct PendingSync {
    request_id: Uuid,
    relay: ConnectionId,
}

/// What happened to a joiner's state hand-off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandOff {
    /// Nobody else is in the room; the joiner starts with an empty buffer.
    FirstMember,
    /// A sync request went out to `relay`.
    Requested { relay: ConnectionId },
    /// The chosen relay could not be reached; the joiner starts empty.
    RelayUnreachable { relay: ConnectionId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayRejected {
    /// Target is not a current member of the sender's room.
    TargetNotInRoom(ConnectionId),
    /// Target is a member but its outbox refused the frame.
    Undeliverable(ConnectionId),
}

impl std::fmt::Display for RelayRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayRejected::TargetNotInRoom(id) => write!(f, "connection {} is not in this room", id),
            RelayRejected::Undeliverable(id) => write!(f, "connection {} could not be reached", id),
        }
    }
}

/// Hands the current buffer to late joiners.
///
/// On each join the most recently joined other member is asked for its
/// buffer, which it answers with a `sync-code` addressed to the joiner only.
/// The wait is bounded: on timeout, or when the relay leaves first, the joiner
/// gets `sync-abandoned` and keeps its empty buffer.
#[derive(Clone)]
pub struct SyncCoordinator {
    registry: Arc<SessionRegistry>,
    router: BroadcastRouter,
    pending: Cache<ConnectionId, PendingSync>,
    timeout: Duration,
}

impl SyncCoordinator {
    pub fn new(registry: Arc<SessionRegistry>, router: BroadcastRouter, timeout: Duration) -> Self {
        let pending = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(timeout + PENDING_TTL_SLACK)
            .build();
        Self {
            registry,
            router,
            pending,
            timeout,
        }
    }

    /// Start the hand-off for `joiner`. `members` is the snapshot returned by
    /// the join, in join order.
    pub fn on_joined(&self, joiner: &Participant, members: &[Participant]) -> HandOff {
        let Some(relay) = members
            .iter()
            .rev()
            .find(|p| p.connection_id != joiner.connection_id)
        else {
            info!("{} is the first member of room {}, nothing to sync", joiner.display_name, joiner.room_id);
            return HandOff::FirstMember;
        };
        let relay = relay.connection_id;

        let request_id = Uuid::new_v4();
        self.pending.insert(joiner.connection_id, PendingSync { request_id, relay });

        let request = SendMessage::SyncRequest(SyncRequestMessage {
            target_connection_id: joiner.connection_id,
        });
        if !self.router.send_to(relay, &request) {
            self.pending.invalidate(&joiner.connection_id);
            warn!("Sync relay {} for {} is unreachable", relay, joiner.connection_id);
            self.abandon(joiner.connection_id, SyncAbandonReason::RelayUnreachable);
            return HandOff::RelayUnreachable { relay };
        }
        debug!("Asked {} to sync room {} to {}", relay, joiner.room_id, joiner.connection_id);

        let coordinator = self.clone();
        let joiner_id = joiner.connection_id;
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.timeout).await;
            if coordinator.take_pending(joiner_id, request_id) {
                warn!("Sync for {} timed out waiting on {}", joiner_id, relay);
                coordinator.abandon(joiner_id, SyncAbandonReason::TimedOut);
            }
        });

        HandOff::Requested { relay }
    }

    /// Relay a `sync-code` from `from` privately to its target, as a code change.
    pub fn relay_code(&self, from: &Participant, msg: SyncCodeMessage) -> Result<(), RelayRejected> {
        let target = msg.target_connection_id;
        if self.registry.room_of(target).as_deref() != Some(from.room_id.as_str()) {
            return Err(RelayRejected::TargetNotInRoom(target));
        }

        // Settle the hand-off first so a racing timer cannot abandon it after
        // the buffer is already on its way.
        let completed = self.pending.remove(&target).is_some();

        let change = SendMessage::CodeChange(CodeChangeMessage {
            room_id: from.room_id.clone(),
            code: msg.code,
        });
        if !self.router.send_to(target, &change) {
            return Err(RelayRejected::Undeliverable(target));
        }

        if completed {
            info!("Sync for {} completed by {}", target, from.connection_id);
        }
        Ok(())
    }

    /// Forget hand-offs involving a departed connection.
    pub fn on_departed(&self, connection_id: ConnectionId) {
        self.pending.invalidate(&connection_id);

        let orphaned: Vec<ConnectionId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.relay == connection_id)
            .map(|(joiner, _)| *joiner)
            .collect();
        for joiner in orphaned {
            if self.pending.remove(&joiner).is_some() {
                warn!("Sync relay {} left before answering {}", connection_id, joiner);
                self.abandon(joiner, SyncAbandonReason::RelayDeparted);
            }
        }
    }

    pub fn pending_count(&self) -> u64 {
        self.pending.run_pending_tasks();
        self.pending.entry_count()
    }

    /// Remove the pending entry only if it still belongs to `request_id`.
    fn take_pending(&self, joiner: ConnectionId, request_id: Uuid) -> bool {
        let result = self.pending.entry(joiner).and_compute_with(|entry| match entry {
            Some(entry) if entry.value().request_id == request_id => Op::Remove,
            _ => Op::Nop,
        });
        matches!(result, CompResult::Removed(_))
    }

    fn abandon(&self, joiner: ConnectionId, reason: SyncAbandonReason) {
        self.router
            .send_to(joiner, &SendMessage::SyncAbandoned(SyncAbandonedMessage { reason }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{Outbox, OutboxReceiver};

    struct Fixture {
        registry: Arc<SessionRegistry>,
        coordinator: SyncCoordinator,
    }

    impl Fixture {
        fn new(timeout: Duration) -> Self {
            let registry = Arc::new(SessionRegistry::new());
            let router = BroadcastRouter::new(registry.clone());
            let coordinator = SyncCoordinator::new(registry.clone(), router, timeout);
            Self { registry, coordinator }
        }

        fn join(&self, name: &str) -> (Participant, Vec<Participant>, OutboxReceiver) {
            let (tx, mut rx) = Outbox::channel(16);
            let id = Uuid::new_v4();
            let (members, _) = self.registry.join("r1", id, name, tx);
            while rx.try_recv().is_ok() {}
            let me = members.iter().find(|p| p.connection_id == id).unwrap().clone();
            (me, members, rx)
        }
    }

    fn next(rx: &mut OutboxReceiver) -> SendMessage {
        serde_json::from_str(&rx.try_recv().expect("a queued frame")).unwrap()
    }

    /// Skip the membership frames the registry queued for later joins.
    fn drain(rx: &mut OutboxReceiver) {
        while rx.try_recv().is_ok() {}
    }

    fn abandoned(reason: SyncAbandonReason) -> SendMessage {
        SendMessage::SyncAbandoned(SyncAbandonedMessage { reason })
    }

    #[tokio::test]
    async fn first_member_gets_no_request() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (a, members, mut a_rx) = fx.join("a");
        assert_eq!(fx.coordinator.on_joined(&a, &members), HandOff::FirstMember);
        assert!(a_rx.try_recv().is_err());
        assert_eq!(fx.coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn most_recent_member_is_asked() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (_a, _, mut a_rx) = fx.join("a");
        let (b, _, mut b_rx) = fx.join("b");
        let (c, members, _c_rx) = fx.join("c");
        drain(&mut a_rx);
        drain(&mut b_rx);

        assert_eq!(
            fx.coordinator.on_joined(&c, &members),
            HandOff::Requested { relay: b.connection_id }
        );
        assert_eq!(
            next(&mut b_rx),
            SendMessage::SyncRequest(SyncRequestMessage { target_connection_id: c.connection_id })
        );
        assert!(a_rx.try_recv().is_err());
        assert_eq!(fx.coordinator.pending_count(), 1);
    }

    #[tokio::test]
    async fn relayed_code_reaches_only_the_joiner() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (a, _, mut a_rx) = fx.join("a");
        let (b, members, mut b_rx) = fx.join("b");
        drain(&mut a_rx);
        fx.coordinator.on_joined(&b, &members);
        assert!(matches!(next(&mut a_rx), SendMessage::SyncRequest(_)));

        fx.coordinator
            .relay_code(&a, SyncCodeMessage { target_connection_id: b.connection_id, code: "print(1)".into() })
            .unwrap();

        assert_eq!(
            next(&mut b_rx),
            SendMessage::CodeChange(CodeChangeMessage { room_id: "r1".into(), code: "print(1)".into() })
        );
        assert!(a_rx.try_recv().is_err());
        assert_eq!(fx.coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn relay_outside_the_room_is_rejected() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (a, _, _a_rx) = fx.join("a");
        let (tx, _rx) = Outbox::channel(4);
        let stranger = Uuid::new_v4();
        fx.registry.join("elsewhere", stranger, "s", tx);

        let err = fx
            .coordinator
            .relay_code(&a, SyncCodeMessage { target_connection_id: stranger, code: "x".into() })
            .unwrap_err();
        assert_eq!(err, RelayRejected::TargetNotInRoom(stranger));
    }

    #[tokio::test]
    async fn relay_departure_abandons_the_sync() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (a, _, _a_rx) = fx.join("a");
        let (b, members, mut b_rx) = fx.join("b");
        fx.coordinator.on_joined(&b, &members);

        fx.registry.leave(a.connection_id);
        fx.coordinator.on_departed(a.connection_id);

        assert!(matches!(next(&mut b_rx), SendMessage::Disconnected(_)));
        assert_eq!(next(&mut b_rx), abandoned(SyncAbandonReason::RelayDeparted));
        assert_eq!(fx.coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let fx = Fixture::new(Duration::from_millis(50));
        let (_a, _, _a_rx) = fx.join("a");
        let (b, members, mut b_rx) = fx.join("b");
        fx.coordinator.on_joined(&b, &members);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(next(&mut b_rx), abandoned(SyncAbandonReason::TimedOut));
    }

    #[tokio::test]
    async fn answered_request_does_not_time_out() {
        let fx = Fixture::new(Duration::from_millis(50));
        let (a, _, _a_rx) = fx.join("a");
        let (b, members, mut b_rx) = fx.join("b");
        fx.coordinator.on_joined(&b, &members);
        fx.coordinator
            .relay_code(&a, SyncCodeMessage { target_connection_id: b.connection_id, code: "x".into() })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(matches!(next(&mut b_rx), SendMessage::CodeChange(_)));
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn expired_timer_leaves_a_newer_request_alone() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (_a, _, _a_rx) = fx.join("a");
        let (b, members, _b_rx) = fx.join("b");
        fx.coordinator.on_joined(&b, &members);
        let stale = Uuid::new_v4();

        assert!(!fx.coordinator.take_pending(b.connection_id, stale));
        assert_eq!(fx.coordinator.pending_count(), 1);

        let current = fx.coordinator.pending.get(&b.connection_id).unwrap().request_id;
        assert!(fx.coordinator.take_pending(b.connection_id, current));
        assert!(!fx.coordinator.take_pending(b.connection_id, current));
        assert_eq!(fx.coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn superseded_request_is_abandoned_once() {
        let fx = Fixture::new(Duration::from_millis(50));
        let (_a, _, _a_rx) = fx.join("a");
        let (b, members, mut b_rx) = fx.join("b");
        fx.coordinator.on_joined(&b, &members);
        fx.coordinator.on_joined(&b, &members);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(next(&mut b_rx), abandoned(SyncAbandonReason::TimedOut));
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_answer_and_timeout_settle_once() {
        for _ in 0..50 {
            let fx = Fixture::new(Duration::from_millis(5));
            let (a, _, _a_rx) = fx.join("a");
            let (b, members, mut b_rx) = fx.join("b");
            fx.coordinator.on_joined(&b, &members);

            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = fx
                .coordinator
                .relay_code(&a, SyncCodeMessage { target_connection_id: b.connection_id, code: "x".into() });
            tokio::time::sleep(Duration::from_millis(30)).await;

            let mut frames = Vec::new();
            while let Ok(frame) = b_rx.try_recv() {
                frames.push(serde_json::from_str::<SendMessage>(&frame).unwrap());
            }
            let delivered = frames.iter().position(|f| matches!(f, SendMessage::CodeChange(_)));
            let gave_up = frames.iter().position(|f| matches!(f, SendMessage::SyncAbandoned(_)));
            // The buffer never arrives after the joiner was told to stop waiting.
            if let (Some(delivered), Some(gave_up)) = (delivered, gave_up) {
                assert!(gave_up < delivered, "abandoned after the buffer was relayed");
            }
            assert_eq!(fx.coordinator.pending_count(), 0);
        }
    }

    #[tokio::test]
    async fn unreachable_relay_is_reported_to_the_joiner() {
        let fx = Fixture::new(Duration::from_secs(5));
        let (a, _, a_rx) = fx.join("a");
        drop(a_rx);
        let (b, members, mut b_rx) = fx.join("b");

        assert_eq!(
            fx.coordinator.on_joined(&b, &members),
            HandOff::RelayUnreachable { relay: a.connection_id }
        );
        assert_eq!(next(&mut b_rx), abandoned(SyncAbandonReason::RelayUnreachable));
    }
}
