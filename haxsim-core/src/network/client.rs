//! Client Session
//!
//! The extrapolating side. Keeps an authoritative base room that only moves
//! forward through host-confirmed actions, and derives the rendered room by
//! cloning the base and fast-forwarding it through confirmed and local
//! unconfirmed actions. The derived room is rebuilt from scratch whenever
//! the inputs change; it is never mutated incrementally.
//!
//! ```text
//!   base @ ack frame ──clone──▶ + confirmed ──▶ + local ──▶ derived @ target
//!        ▲                                                     (ack + extra)
//!        └── Ack / Snapshot
//! ```

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info, warn};

use crate::action::{Action, ActionEnvelope, PendingQueue, Scheduled};
use crate::core::snapshot::SnapshotCache;
use crate::game::events::GameEvent;
use crate::game::player::PlayerId;
use crate::game::room::Room;
use super::config::ClientConfig;
use super::failure::{AttemptHandle, ConnectionAttempt, ConnectionFailure, RejectionReason};
use super::ping::PingEstimator;
use super::protocol::{unpack_snapshot, ClientMessage, ServerMessage};
use super::NetworkError;

/// Client-side reconciliation state.
pub struct ClientSession {
    id: PlayerId,
    config: ClientConfig,
    attempt: ConnectionAttempt,

    base: Option<Room>,
    confirmed: PendingQueue<ActionEnvelope>,
    local: VecDeque<Scheduled<ActionEnvelope>>,
    sent: u32,
    processed: u32,
    next_seq: u32,
    host_frame: u32,

    ping: PingEstimator,
    checksums: BTreeMap<u32, u32>,
    desync_reported: bool,

    outbox: Vec<ClientMessage>,
    events: Vec<GameEvent>,
    cache: SnapshotCache<u32, Room>,
    generation: u64,
    last_render: Option<f64>,
    last_heard: f64,
}

impl ClientSession {
    /// Create a session for player `id`, connecting at `now_ms`.
    pub fn new(id: PlayerId, config: ClientConfig, now_ms: f64) -> Self {
        let ping = PingEstimator::new(config.ping_capacity, config.ping_decay);
        Self {
            id,
            config,
            attempt: ConnectionAttempt::new(),
            base: None,
            confirmed: PendingQueue::new(),
            local: VecDeque::new(),
            sent: 0,
            processed: 0,
            next_seq: 0,
            host_frame: 0,
            ping,
            checksums: BTreeMap::new(),
            desync_reported: false,
            outbox: Vec::new(),
            events: Vec::new(),
            cache: SnapshotCache::new(),
            generation: 0,
            last_render: None,
            last_heard: now_ms,
        }
    }

    /// Own player id.
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Authoritative base room, once the first snapshot arrived.
    pub fn base(&self) -> Option<&Room> {
        self.base.as_ref()
    }

    /// Latest frame the host acknowledged.
    pub fn host_frame(&self) -> u32 {
        self.host_frame
    }

    /// Own actions not yet confirmed or dropped.
    pub fn unconfirmed(&self) -> usize {
        self.local.len()
    }

    /// Confirmed actions not yet folded into the base.
    pub fn confirmed_pending(&self) -> usize {
        self.confirmed.len()
    }

    /// Whether a checksum mismatch was seen.
    pub fn is_desynced(&self) -> bool {
        self.desync_reported
    }

    /// Current round-trip estimate in ms.
    pub fn ping_estimate(&self) -> Option<f64> {
        self.ping.estimate()
    }

    /// Handle for transport callbacks.
    pub fn handle(&self) -> AttemptHandle {
        self.attempt.handle()
    }

    /// Terminal failure, if the connection ended.
    pub fn failure(&self) -> Option<&ConnectionFailure> {
        self.attempt.failure()
    }

    /// Take messages queued for the host.
    pub fn take_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Drain events from the authoritative base.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    // =========================================================================
    // INCOMING
    // =========================================================================

    /// Handle a host message received at `now_ms`.
    ///
    /// Messages arriving after the attempt failed or was cancelled are
    /// ignored. A malformed snapshot leaves every piece of state untouched.
    pub fn receive(&mut self, msg: ServerMessage, now_ms: f64) -> Result<(), NetworkError> {
        if !self.attempt.is_live() {
            debug!(player = self.id, "message after teardown ignored");
            return Ok(());
        }
        self.last_heard = now_ms;
        match msg {
            ServerMessage::Snapshot { ack_seq, frame, next_seq, payload } => {
                let (room, pending) = unpack_snapshot(&payload)?;
                let stale = ack_seq.saturating_sub(self.processed) as usize;
                for _ in 0..stale.min(self.local.len()) {
                    self.local.pop_front();
                }
                self.processed = self.processed.max(ack_seq);
                self.base = Some(room);
                self.confirmed = pending;
                self.next_seq = next_seq;
                self.host_frame = frame;
                self.checksums.retain(|f, _| *f > frame);
                self.touch();
                info!(player = self.id, frame, next_seq, "snapshot applied");
            }
            ServerMessage::Confirm { seq, frame, envelope } => {
                if self.base.is_none() || seq < self.next_seq {
                    debug!(player = self.id, seq, "stale confirmation ignored");
                    return Ok(());
                }
                self.next_seq = seq.wrapping_add(1);
                if envelope.by == self.id {
                    self.local.pop_front();
                    self.processed = self.processed.wrapping_add(1);
                }
                if let Some(base) = &self.base {
                    if frame < base.frame {
                        warn!(player = self.id, seq, frame, base = base.frame, "late confirmation");
                    }
                }
                self.confirmed.insert(Scheduled::new(frame, seq, envelope));
                self.touch();
            }
            ServerMessage::Ack { frame, last_seq } => {
                if last_seq != self.next_seq {
                    warn!(player = self.id, last_seq, expected = self.next_seq, "confirmation gap");
                }
                self.host_frame = self.host_frame.max(frame);
                self.advance_base(frame);
            }
            ServerMessage::Pong { stamp } => {
                self.ping.add(now_ms - stamp);
            }
            ServerMessage::Checksum { frame, value } => {
                let behind = self.base.as_ref().is_some_and(|b| b.frame < frame);
                if behind {
                    self.checksums.insert(frame, value);
                }
            }
            ServerMessage::ActionDropped => {
                if let Some(dropped) = self.local.pop_front() {
                    debug!(player = self.id, kind = ?dropped.item.action.kind(), "action dropped by host");
                }
                self.processed = self.processed.wrapping_add(1);
                self.touch();
            }
        }
        Ok(())
    }

    /// Move the base forward to `target`, applying confirmed actions.
    fn advance_base(&mut self, target: u32) {
        let Some(base) = self.base.as_mut() else {
            return;
        };
        if base.frame >= target {
            return;
        }
        let mut mismatch = None;
        while base.frame < target {
            for entry in self.confirmed.pop_due(base.frame) {
                entry.item.apply(base);
            }
            base.step();
            self.events.extend(base.take_events());
            if let Some(expected) = self.checksums.remove(&base.frame) {
                let actual = base.checksum();
                if actual != expected && mismatch.is_none() {
                    mismatch = Some((base.frame, expected, actual));
                }
            }
        }
        let reached = base.frame;
        self.checksums.retain(|f, _| *f > reached);
        self.touch();

        if let Some((frame, expected, actual)) = mismatch {
            warn!(
                player = self.id,
                frame,
                expected = %format!("{expected:08x}"),
                actual = %format!("{actual:08x}"),
                "checksum mismatch"
            );
            if !self.desync_reported {
                self.desync_reported = true;
                // Reported once; only the next snapshot repairs the base.
                if let Err(e) = self.send_action(Action::ReportDesync) {
                    warn!(player = self.id, error = %e, "desync report not sent");
                }
            }
        }
    }

    // =========================================================================
    // OUTGOING
    // =========================================================================

    /// Send an own action and predict it locally. Returns the frame it was
    /// predicted at.
    pub fn send_action(&mut self, action: Action) -> Result<u32, NetworkError> {
        if let Some(failure) = self.attempt.failure() {
            return Err(NetworkError::Connection(failure.clone()));
        }
        if self.base.is_none() {
            return Err(NetworkError::NotConnected);
        }
        let frame = self.target_frame();
        let envelope = ActionEnvelope::new(self.id, action);
        self.local.push_back(Scheduled::new(frame, self.sent, envelope.clone()));
        self.sent = self.sent.wrapping_add(1);
        self.outbox.push(ClientMessage::Action { frame, envelope });
        self.touch();
        Ok(frame)
    }

    /// Queue a ping stamped with `now_ms`.
    pub fn ping(&mut self, now_ms: f64) {
        self.outbox.push(ClientMessage::Ping { stamp: now_ms });
    }

    // =========================================================================
    // EXTRAPOLATION
    // =========================================================================

    /// Ticks rendered ahead of the acknowledged frame.
    pub fn extra_ticks(&self) -> u32 {
        let ms = self
            .config
            .manual_extrapolation_ms
            .unwrap_or_else(|| self.ping.estimate().unwrap_or(0.0) / 2.0);
        let handicap = self
            .base
            .as_ref()
            .and_then(|room| room.player(self.id))
            .map_or(0.0, |p| f64::from(p.handicap));
        ((ms - handicap).max(0.0) / self.config.tick_ms()).round() as u32
    }

    /// Frame the derived room is rendered at.
    pub fn target_frame(&self) -> u32 {
        let base = self.base.as_ref().map_or(0, |b| b.frame);
        self.host_frame.max(base).wrapping_add(self.extra_ticks())
    }

    /// Derived room for this render frame, or `None` before the first
    /// snapshot or when called sooner than the minimum frame interval.
    pub fn render(&mut self, now_ms: f64) -> Option<&Room> {
        if let Some(last) = self.last_render {
            if now_ms - last < self.config.min_frame_interval_ms {
                return None;
            }
        }
        self.base.as_ref()?;
        self.last_render = Some(now_ms);
        let target = self.target_frame();
        let Self { base, confirmed, local, cache, generation, .. } = self;
        let base = base.as_ref()?;
        Some(cache.get_or_build(*generation, target, || derive(base, confirmed, local, target)))
    }

    /// Derived room at an explicit frame, bypassing the cache.
    pub fn derived_at(&self, frame: u32) -> Option<Room> {
        let base = self.base.as_ref()?;
        Some(derive(base, &self.confirmed, &self.local, frame))
    }

    /// How often the derived room has been rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.cache.rebuilds()
    }

    // =========================================================================
    // FAILURE
    // =========================================================================

    /// Fail with [`ConnectionFailure::PeerFailed`] if the host was silent
    /// for longer than the timeout.
    pub fn check_timeout(&mut self, now_ms: f64) -> Option<ConnectionFailure> {
        if !self.attempt.is_live() || now_ms - self.last_heard <= self.config.timeout_ms {
            return None;
        }
        self.attempt.fail(ConnectionFailure::PeerFailed)
    }

    /// The host closed the connection with `code`.
    pub fn reject(&mut self, code: u16) -> Option<ConnectionFailure> {
        self.attempt.fail(ConnectionFailure::Rejected(RejectionReason::from_code(code)))
    }

    /// Tear the connection down locally.
    pub fn cancel(&mut self) -> Option<ConnectionFailure> {
        self.attempt.cancel()
    }
}

/// Clone `base` and fast-forward it to `target` through the confirmed
/// actions, then the local ones. Local actions scheduled in the past apply
/// at the base frame.
fn derive(
    base: &Room,
    confirmed: &PendingQueue<ActionEnvelope>,
    local: &VecDeque<Scheduled<ActionEnvelope>>,
    target: u32,
) -> Room {
    let mut room = base.clone();
    let mut queue = confirmed.clone();
    for entry in local {
        queue.insert(Scheduled::new(entry.frame.max(room.frame), u32::MAX, entry.item.clone()));
    }
    while room.frame < target {
        for entry in queue.pop_due(room.frame) {
            entry.item.apply(&mut room);
        }
        room.step();
    }
    room.take_events();
    room
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::team::Team;
    use crate::network::config::HostConfig;
    use crate::network::host::HostSession;
    use crate::stadium::Stadium;

    const TICK_MS: f64 = 1000.0 / 60.0;

    /// Host plus clients joined through a lossless link with fixed per-client
    /// latency, measured in ticks.
    struct Harness {
        host: HostSession,
        clients: Vec<ClientSession>,
        latency: Vec<u32>,
        down: Vec<VecDeque<(u32, ServerMessage)>>,
        up: VecDeque<(u32, PlayerId, ClientMessage)>,
        t: u32,
    }

    impl Harness {
        fn new(latency: &[u32]) -> Self {
            Self::with_config(latency, ClientConfig::default())
        }

        fn with_config(latency: &[u32], config: ClientConfig) -> Self {
            let mut host =
                HostSession::new(Room::new("sync", Stadium::classic()), HostConfig::default());
            let mut clients = Vec::new();
            for i in 0..latency.len() {
                let id = i as PlayerId + 1;
                host.add_client(id, &format!("p{id}"), None, None).unwrap();
                clients.push(ClientSession::new(id, config.clone(), 0.0));
            }
            Self {
                host,
                clients,
                latency: latency.to_vec(),
                down: vec![VecDeque::new(); latency.len()],
                up: VecDeque::new(),
                t: 0,
            }
        }

        fn now(&self) -> f64 {
            self.t as f64 * TICK_MS
        }

        fn collect(&mut self) {
            for (i, client) in self.clients.iter_mut().enumerate() {
                for msg in client.take_outbox() {
                    self.up.push_back((self.t + self.latency[i], client.id(), msg));
                }
            }
            for (id, msgs) in self.host.drain_outboxes() {
                let i = (id - 1) as usize;
                for msg in msgs {
                    self.down[i].push_back((self.t + self.latency[i], msg));
                }
            }
        }

        fn deliver(&mut self, all: bool) {
            while let Some((at, from, msg)) = self.up.front().cloned() {
                if !all && at > self.t {
                    break;
                }
                self.up.pop_front();
                self.host.receive(from, msg).unwrap();
            }
            let now = self.now();
            for (i, queue) in self.down.iter_mut().enumerate() {
                while let Some((at, _)) = queue.front() {
                    if !all && *at > self.t {
                        break;
                    }
                    let (_, msg) = queue.pop_front().unwrap();
                    self.clients[i].receive(msg, now).unwrap();
                }
            }
        }

        fn step(&mut self) {
            self.deliver(false);
            self.collect();
            self.host.tick();
            self.t += 1;
            self.collect();
            self.deliver(false);
        }

        fn flush(&mut self) {
            for _ in 0..3 {
                self.collect();
                self.deliver(true);
            }
        }
    }

    #[test]
    fn test_clients_converge_on_host_state() {
        let mut net = Harness::new(&[3, 6]);
        for _ in 0..220 {
            match net.t {
                12 => {
                    net.clients[0].send_action(Action::SetTeam { player: 1, team: Team::Red }).unwrap();
                    net.clients[1].send_action(Action::SetTeam { player: 2, team: Team::Blue }).unwrap();
                }
                30 => {
                    net.host.submit(Action::StartGame);
                }
                40 => {
                    net.clients[0].send_action(Action::PlayerInput { input: 8 | 16 }).unwrap();
                    net.clients[1].send_action(Action::PlayerInput { input: 4 }).unwrap();
                }
                55 => {
                    net.clients[1].send_action(Action::Chat { text: "gl".into() }).unwrap();
                    net.clients[1].send_action(Action::PlayerInput { input: 0 }).unwrap();
                }
                90 => {
                    net.clients[0].send_action(Action::PlayerInput { input: 0 }).unwrap();
                }
                _ => {}
            }
            if net.t % 20 == 0 {
                let now = net.now();
                for c in &mut net.clients {
                    c.ping(now);
                    c.render(now);
                }
            }
            net.step();
        }
        net.flush();

        let frame = net.host.room.frame;
        let expected = net.host.room.checksum();
        for client in &net.clients {
            assert_eq!(client.unconfirmed(), 0);
            assert!(!client.is_desynced());
            let derived = client.derived_at(frame).unwrap();
            assert_eq!(derived.checksum(), expected, "client {} diverged", client.id());
        }
        assert!(net.host.room.game.is_some());
        assert!(net.clients[0].ping_estimate().is_some());
    }

    #[test]
    fn test_local_action_predicted_before_confirmation() {
        let mut config = ClientConfig::default();
        config.manual_extrapolation_ms = Some(50.0);
        let mut net = Harness::with_config(&[2], config);
        for _ in 0..10 {
            net.step();
        }
        net.clients[0].send_action(Action::SetTeam { player: 1, team: Team::Red }).unwrap();
        // Hold the action back from the host.
        let held = net.clients[0].take_outbox();
        for _ in 0..10 {
            net.step();
        }
        let now = net.now();
        let client = &mut net.clients[0];
        assert_eq!(client.unconfirmed(), 1);
        let rendered = client.render(now).unwrap();
        assert_eq!(rendered.player(1).unwrap().team, Team::Red);
        assert_eq!(client.base().unwrap().player(1).unwrap().team, Team::Spectator);

        for msg in held {
            net.up.push_back((net.t, 1, msg));
        }
        for _ in 0..15 {
            net.step();
        }
        let client = &net.clients[0];
        assert_eq!(client.unconfirmed(), 0);
        assert_eq!(client.base().unwrap().player(1).unwrap().team, Team::Red);
    }

    #[test]
    fn test_dropped_action_is_removed() {
        let mut net = Harness::new(&[1]);
        for _ in 0..5 {
            net.step();
        }
        net.clients[0].send_action(Action::StartGame).unwrap();
        for _ in 0..5 {
            net.step();
        }
        assert_eq!(net.clients[0].unconfirmed(), 0);
        assert!(net.host.room.game.is_none());
        let now = net.now();
        assert!(net.clients[0].render(now).unwrap().game.is_none());
    }

    #[test]
    fn test_checksum_mismatch_reports_desync() {
        let mut net = Harness::new(&[1]);
        for _ in 0..5 {
            net.step();
        }
        if let Some(base) = net.clients[0].base.as_mut() {
            base.score_limit = 9;
        }
        for _ in 0..60 {
            net.step();
        }
        assert!(net.clients[0].is_desynced());
        for _ in 0..5 {
            net.step();
        }
        let host_player = net.host.room.player(1).unwrap();
        assert!(host_player.desynced);
    }

    #[test]
    fn test_desync_after_teardown_is_flagged_but_not_sent() {
        let mut net = Harness::new(&[1]);
        for _ in 0..10 {
            net.step();
        }
        let client = &mut net.clients[0];
        client.take_outbox();
        let frame = client.base().unwrap().frame;
        client.checksums.insert(frame + 1, 0xdead_beef);
        client.cancel();

        client.advance_base(frame + 1);
        assert_eq!(client.base().unwrap().frame, frame + 1);
        assert!(client.is_desynced());
        assert!(client.take_outbox().is_empty());
        assert_eq!(client.unconfirmed(), 0);
    }

    #[test]
    fn test_render_cache_and_frame_cap() {
        let mut config = ClientConfig::default();
        config.min_frame_interval_ms = 10.0;
        let mut net = Harness::with_config(&[1], config);
        for _ in 0..5 {
            net.step();
        }
        let client = &mut net.clients[0];
        assert!(client.render(100.0).is_some());
        assert!(client.render(105.0).is_none());
        assert!(client.render(111.0).is_some());
        assert_eq!(client.rebuilds(), 1);
    }

    #[test]
    fn test_extra_ticks_from_manual_override_and_handicap() {
        let mut config = ClientConfig::default();
        config.manual_extrapolation_ms = Some(100.0);
        let mut net = Harness::with_config(&[1], config);
        for _ in 0..5 {
            net.step();
        }
        assert_eq!(net.clients[0].extra_ticks(), 6);

        net.clients[0].send_action(Action::SetHandicap { handicap: 50 }).unwrap();
        for _ in 0..16 {
            net.step();
        }
        assert_eq!(net.clients[0].extra_ticks(), 3);
    }

    #[test]
    fn test_timeout_and_teardown_fence() {
        let mut client = ClientSession::new(1, ClientConfig::default(), 0.0);
        let handle = client.handle();
        assert_eq!(client.check_timeout(1000.0), None);
        assert_eq!(client.check_timeout(20_000.0), Some(ConnectionFailure::PeerFailed));
        assert!(!handle.is_live());

        // Later messages change nothing.
        client.receive(ServerMessage::Ack { frame: 50, last_seq: 0 }, 20_001.0).unwrap();
        assert_eq!(client.host_frame(), 0);
        assert!(matches!(
            client.send_action(Action::ReportDesync),
            Err(NetworkError::Connection(ConnectionFailure::PeerFailed))
        ));
        assert_eq!(client.reject(4101), None);
    }

    #[test]
    fn test_rejection_reason() {
        let mut client = ClientSession::new(1, ClientConfig::default(), 0.0);
        assert_eq!(
            client.reject(4102),
            Some(ConnectionFailure::Rejected(RejectionReason::WrongPassword))
        );
        assert!(matches!(client.send_action(Action::ReportDesync), Err(NetworkError::Connection(_))));
    }

    #[test]
    fn test_bad_snapshot_leaves_state_untouched() {
        let mut client = ClientSession::new(1, ClientConfig::default(), 0.0);
        let bad = ServerMessage::Snapshot { ack_seq: 0, frame: 5, next_seq: 0, payload: vec![0xff; 8] };
        assert!(matches!(client.receive(bad, 1.0), Err(NetworkError::Codec(_))));
        assert!(client.base().is_none());
        assert!(matches!(client.send_action(Action::ReportDesync), Err(NetworkError::NotConnected)));
    }
}
