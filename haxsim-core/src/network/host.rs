//! Host Session
//!
//! The authoritative side. Owns the room, sequences every accepted action
//! and fans out confirmations, acknowledgements, checksums and periodic
//! snapshots to each connected client's outbox. Transport is left to the
//! caller: feed [`ClientMessage`]s in, drain [`ServerMessage`]s out.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::action::{Action, ActionEnvelope, PendingQueue, RateLimiter, Scheduled};
use crate::game::events::GameEvent;
use crate::game::player::{PlayerId, HOST_ID};
use crate::game::room::Room;
use crate::replay::{ReplayError, ReplayRecorder};
use super::config::HostConfig;
use super::protocol::{pack_snapshot, ClientMessage, ServerMessage};
use super::NetworkError;

/// Per-client bookkeeping.
#[derive(Debug, Default)]
struct ClientLink {
    /// Actions from this client the host confirmed or dropped
    processed: u32,
    /// Messages waiting to be sent
    outbox: Vec<ServerMessage>,
}

/// Authoritative session state.
pub struct HostSession {
    /// The authoritative room
    pub room: Room,
    config: HostConfig,
    /// Confirmed actions not yet applied, ordered by (frame, seq)
    pending: PendingQueue<ActionEnvelope>,
    next_seq: u32,
    clients: BTreeMap<PlayerId, ClientLink>,
    limiter: RateLimiter,
    acc_ms: f64,
    recorder: Option<ReplayRecorder>,
    events: Vec<GameEvent>,
}

impl HostSession {
    /// Host `room` with the given protocol settings.
    pub fn new(room: Room, config: HostConfig) -> Self {
        Self {
            room,
            config,
            pending: PendingQueue::new(),
            next_seq: 0,
            clients: BTreeMap::new(),
            limiter: RateLimiter::new(),
            acc_ms: 0.0,
            recorder: None,
            events: Vec::new(),
        }
    }

    /// Protocol settings.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Confirmed actions waiting for their frame.
    pub fn pending(&self) -> &PendingQueue<ActionEnvelope> {
        &self.pending
    }

    /// Sequence numbers issued so far.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Connected client ids.
    pub fn client_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.clients.keys().copied()
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Admit a client: schedule its join and queue an initial snapshot.
    pub fn add_client(
        &mut self,
        id: PlayerId,
        name: &str,
        country: Option<String>,
        avatar: Option<String>,
    ) -> Result<(), NetworkError> {
        if id == HOST_ID || self.clients.contains_key(&id) || self.room.player(id).is_some() {
            return Err(NetworkError::DuplicateClient(id));
        }
        self.submit(Action::PlayerJoin {
            id,
            name: name.to_string(),
            country,
            avatar,
        });
        self.clients.insert(id, ClientLink::default());
        self.send_snapshot(id);
        info!(player = id, name, frame = self.room.frame, "client admitted");
        Ok(())
    }

    /// Drop a client and schedule its leave.
    pub fn remove_client(&mut self, id: PlayerId) -> bool {
        if self.clients.remove(&id).is_none() {
            return false;
        }
        self.limiter.forget(id);
        self.submit(Action::PlayerLeave { id, reason: None, ban: false });
        info!(player = id, frame = self.room.frame, "client removed");
        true
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Sequence a host action and broadcast it. Returns its target frame.
    pub fn submit(&mut self, action: Action) -> u32 {
        self.schedule(ActionEnvelope::host(action))
    }

    fn schedule(&mut self, envelope: ActionEnvelope) -> u32 {
        let frame = if envelope.action.kind().is_delayed() {
            self.room.frame.wrapping_add(self.config.input_delay)
        } else {
            self.room.frame
        };
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        debug!(seq, frame, by = envelope.by, kind = ?envelope.action.kind(), "action confirmed");
        self.broadcast(ServerMessage::Confirm { seq, frame, envelope: envelope.clone() });
        self.pending.insert(Scheduled::new(frame, seq, envelope));
        frame
    }

    /// Handle a message from a connected client.
    pub fn receive(&mut self, from: PlayerId, msg: ClientMessage) -> Result<(), NetworkError> {
        if !self.clients.contains_key(&from) {
            return Err(NetworkError::UnknownClient(from));
        }
        match msg {
            ClientMessage::Ping { stamp } => {
                self.send(from, ServerMessage::Pong { stamp });
            }
            ClientMessage::Action { frame, envelope } => {
                let envelope = ActionEnvelope::new(from, envelope.action);
                let kind = envelope.action.kind();
                let accepted = kind.is_confirmable()
                    && envelope.action.is_authorized(&self.room, from)
                    && self.limiter.check(from, kind, self.room.frame);
                if let Some(link) = self.clients.get_mut(&from) {
                    link.processed = link.processed.wrapping_add(1);
                }
                if accepted {
                    debug!(player = from, client_frame = frame, ?kind, "client action accepted");
                    self.schedule(envelope);
                } else {
                    warn!(player = from, ?kind, frame = self.room.frame, "client action dropped");
                    self.send(from, ServerMessage::ActionDropped);
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Account for `elapsed_ms` of wall time and run the ticks it covers.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, elapsed_ms: f64) -> u32 {
        if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
            self.acc_ms += elapsed_ms;
        }
        let tick_ms = self.config.tick_ms();
        let mut ran = 0;
        while self.acc_ms >= tick_ms && ran < self.config.max_catch_up {
            self.acc_ms -= tick_ms;
            self.tick();
            ran += 1;
        }
        if ran == self.config.max_catch_up && self.acc_ms >= tick_ms {
            warn!(behind_ms = self.acc_ms, "host fell behind, dropping time");
            self.acc_ms = 0.0;
        }
        ran
    }

    /// Run exactly one tick.
    pub fn tick(&mut self) {
        for entry in self.pending.pop_due(self.room.frame) {
            if let Some(rec) = self.recorder.as_mut() {
                if let Err(e) = rec.record(self.room.frame, &entry.item) {
                    warn!(frame = self.room.frame, error = %e, "recording aborted");
                    self.recorder = None;
                }
            }
            entry.item.apply(&mut self.room);
        }
        self.room.step();

        let events = self.room.take_events();
        if let Some(rec) = self.recorder.as_mut() {
            rec.observe(&events);
        }
        self.events.extend(events);

        let frame = self.room.frame;
        if every(frame, self.config.checksum_interval) {
            let value = self.room.checksum();
            self.broadcast(ServerMessage::Checksum { frame, value });
        }
        if every(frame, self.config.ack_interval) {
            self.broadcast(ServerMessage::Ack { frame, last_seq: self.next_seq });
        }
        if every(frame, self.config.snapshot_interval) {
            let ids: Vec<PlayerId> = self.clients.keys().copied().collect();
            for id in ids {
                self.send_snapshot(id);
            }
            debug!(frame, clients = self.clients.len(), "snapshots queued");
        }
    }

    /// Drain room events collected by [`tick`](Self::tick).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // RECORDING
    // =========================================================================

    /// Begin a replay from the current room state.
    pub fn start_recording(&mut self) {
        info!(frame = self.room.frame, "recording started");
        self.recorder = Some(ReplayRecorder::new(&self.room));
    }

    /// Whether a replay is being recorded.
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Stop recording and return the `.hbr2` bytes, or `None` when nothing
    /// was being recorded.
    pub fn finish_recording(&mut self) -> Result<Option<Vec<u8>>, ReplayError> {
        let Some(rec) = self.recorder.take() else {
            return Ok(None);
        };
        info!(frame = self.room.frame, actions = rec.action_count(), "recording finished");
        rec.finish(self.room.frame).map(Some)
    }

    // =========================================================================
    // OUTBOXES
    // =========================================================================

    fn send(&mut self, to: PlayerId, msg: ServerMessage) {
        if let Some(link) = self.clients.get_mut(&to) {
            link.outbox.push(msg);
        }
    }

    fn broadcast(&mut self, msg: ServerMessage) {
        for link in self.clients.values_mut() {
            link.outbox.push(msg.clone());
        }
    }

    fn send_snapshot(&mut self, to: PlayerId) {
        let Some(link) = self.clients.get(&to) else {
            return;
        };
        let payload = match pack_snapshot(&self.room, &self.pending) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(player = to, error = %e, "snapshot not sent");
                return;
            }
        };
        let msg = ServerMessage::Snapshot {
            ack_seq: link.processed,
            frame: self.room.frame,
            next_seq: self.next_seq,
            payload,
        };
        self.send(to, msg);
    }

    /// Take the queued messages for one client.
    pub fn take_outbox(&mut self, id: PlayerId) -> Vec<ServerMessage> {
        self.clients
            .get_mut(&id)
            .map(|link| std::mem::take(&mut link.outbox))
            .unwrap_or_default()
    }

    /// Take every client's queued messages.
    pub fn drain_outboxes(&mut self) -> Vec<(PlayerId, Vec<ServerMessage>)> {
        self.clients
            .iter_mut()
            .filter(|(_, link)| !link.outbox.is_empty())
            .map(|(id, link)| (*id, std::mem::take(&mut link.outbox)))
            .collect()
    }
}

fn every(frame: u32, interval: u32) -> bool {
    interval != 0 && frame % interval == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::team::Team;
    use crate::stadium::Stadium;

    fn host() -> HostSession {
        HostSession::new(Room::new("host", Stadium::classic()), HostConfig::default())
    }

    #[test]
    fn test_join_sends_snapshot_with_pending_join() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        let out = h.take_outbox(1);
        assert_eq!(out.len(), 1);
        let ServerMessage::Snapshot { ack_seq, next_seq, payload, .. } = &out[0] else {
            panic!("expected snapshot, got {:?}", out[0]);
        };
        assert_eq!(*ack_seq, 0);
        assert_eq!(*next_seq, 1);
        let (_, pending) = crate::network::protocol::unpack_snapshot(payload).unwrap();
        assert_eq!(pending.len(), 1);

        assert!(matches!(h.add_client(1, "again", None, None), Err(NetworkError::DuplicateClient(1))));
    }

    #[test]
    fn test_delayed_action_applies_after_input_delay() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        h.tick();
        h.tick();
        assert!(h.room.player(1).is_none());
        h.tick();
        assert!(h.room.player(1).is_some());
    }

    #[test]
    fn test_confirm_broadcast_to_every_client() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        h.add_client(2, "bo", None, None).unwrap();
        for _ in 0..3 {
            h.tick();
        }
        h.drain_outboxes();

        let env = ActionEnvelope::new(1, Action::SetTeam { player: 1, team: Team::Red });
        h.receive(1, ClientMessage::Action { frame: 3, envelope: env }).unwrap();
        for id in [1, 2] {
            let out = h.take_outbox(id);
            assert!(matches!(
                &out[..],
                [ServerMessage::Confirm { frame: 5, envelope, .. }] if envelope.by == 1
            ));
        }
    }

    #[test]
    fn test_spoofed_sender_is_rewritten() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        h.add_client(2, "bo", None, None).unwrap();
        for _ in 0..3 {
            h.tick();
        }
        h.drain_outboxes();

        // Client 1 claims to be 2; the host attributes it to 1.
        let env = ActionEnvelope::new(2, Action::Chat { text: "hi".into() });
        h.receive(1, ClientMessage::Action { frame: 0, envelope: env }).unwrap();
        let out = h.take_outbox(2);
        assert!(matches!(&out[..], [ServerMessage::Confirm { envelope, .. }] if envelope.by == 1));
    }

    #[test]
    fn test_unauthorized_and_rate_limited_actions_dropped() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        for _ in 0..3 {
            h.tick();
        }
        h.drain_outboxes();

        h.receive(1, ClientMessage::Action { frame: 0, envelope: ActionEnvelope::new(1, Action::StartGame) })
            .unwrap();
        assert_eq!(h.take_outbox(1), vec![ServerMessage::ActionDropped]);

        for _ in 0..4 {
            let env = ActionEnvelope::new(1, Action::Chat { text: "spam".into() });
            h.receive(1, ClientMessage::Action { frame: 0, envelope: env }).unwrap();
        }
        let env = ActionEnvelope::new(1, Action::Chat { text: "spam".into() });
        h.receive(1, ClientMessage::Action { frame: 0, envelope: env }).unwrap();
        let out = h.take_outbox(1);
        assert_eq!(out.len(), 5);
        assert_eq!(out[4], ServerMessage::ActionDropped);
    }

    #[test]
    fn test_periodic_messages() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        h.take_outbox(1);
        for _ in 0..600 {
            h.tick();
        }
        let out = h.take_outbox(1);
        let acks = out.iter().filter(|m| matches!(m, ServerMessage::Ack { .. })).count();
        let sums = out.iter().filter(|m| matches!(m, ServerMessage::Checksum { .. })).count();
        let snaps = out.iter().filter(|m| matches!(m, ServerMessage::Snapshot { .. })).count();
        assert_eq!(acks, 600 / 7);
        assert_eq!(sums, 10);
        assert_eq!(snaps, 1);
    }

    #[test]
    fn test_advance_accumulates_wall_time() {
        let mut h = host();
        assert_eq!(h.advance(10.0), 0);
        assert_eq!(h.advance(10.0), 1);
        assert_eq!(h.advance(1000.0), 60);
        assert_eq!(h.room.frame, 61);
    }

    #[test]
    fn test_ping_and_unknown_client() {
        let mut h = host();
        h.add_client(1, "ana", None, None).unwrap();
        h.take_outbox(1);
        h.receive(1, ClientMessage::Ping { stamp: 42.0 }).unwrap();
        assert_eq!(h.take_outbox(1), vec![ServerMessage::Pong { stamp: 42.0 }]);
        assert!(matches!(
            h.receive(9, ClientMessage::Ping { stamp: 0.0 }),
            Err(NetworkError::UnknownClient(9))
        ));
    }

    #[test]
    fn test_recording_through_host() {
        let mut h = host();
        h.start_recording();
        h.add_client(1, "ana", None, None).unwrap();
        h.submit(Action::SetTeam { player: 1, team: Team::Red });
        h.submit(Action::StartGame);
        for _ in 0..120 {
            h.tick();
        }
        let bytes = h.finish_recording().unwrap().unwrap();
        assert!(!h.is_recording());

        let replay = crate::replay::ReplayReader::read(&bytes).unwrap();
        assert_eq!(replay.actions.len(), 3);
        assert_eq!(replay.play_to_end().checksum(), h.room.checksum());
    }
}
