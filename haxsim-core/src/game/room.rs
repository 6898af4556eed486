//! Room
//!
//! The top-level mutable aggregate: roster, stadium, rules and the running
//! game. Every mutation is a plain method that silently ignores requests that
//! do not apply (unknown ids, unchanged values, stadium swaps mid-game).
//!
//! Serialization writes a fixed field order in the writer's byte order. The
//! same bytes feed snapshots, replays and the desync checksum.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::checksum::fold_checksum;
use crate::core::codec::{CodecError, CodecResult, Endian, StreamReader, StreamWriter};
use crate::physics::DiscPatch;
use crate::stadium::{binary, Stadium};
use super::events::{GameEvent, GameEventData};
use super::input::InputFrame;
use super::player::{Player, PlayerId, HOST_ID, MAX_HANDICAP};
use super::state::{Game, KickRateLimit};
use super::team::{Team, TeamColors};
use super::tick::tick;

/// Default goals needed to win.
pub const DEFAULT_SCORE_LIMIT: u32 = 3;

/// Default match length in minutes.
pub const DEFAULT_TIME_LIMIT: u32 = 3;

/// A game room.
#[derive(Clone, Debug)]
pub struct Room {
    /// Room name
    pub name: String,
    /// Roster; order is part of the shared state
    pub players: Vec<Player>,
    /// Running match
    pub game: Option<Game>,
    /// Current stadium
    pub stadium: Arc<Stadium>,
    /// Only admins may change teams
    pub teams_lock: bool,
    /// Goals needed to win, 0 for none
    pub score_limit: u32,
    /// Match minutes, 0 for none
    pub time_limit: u32,
    /// Kick rate limit handed to new games
    pub kick_rate: KickRateLimit,
    /// Red team colors
    pub red_colors: TeamColors,
    /// Blue team colors
    pub blue_colors: TeamColors,
    /// Joining players are moved onto the smaller team
    pub auto_balance: bool,
    /// Ticks since the room was created
    pub frame: u32,
    events: Vec<GameEvent>,
}

impl Room {
    /// Create an empty room.
    pub fn new(name: impl Into<String>, stadium: Stadium) -> Self {
        Self {
            name: name.into(),
            players: Vec::new(),
            game: None,
            stadium: Arc::new(stadium),
            teams_lock: false,
            score_limit: DEFAULT_SCORE_LIMIT,
            time_limit: DEFAULT_TIME_LIMIT,
            kick_rate: KickRateLimit::default(),
            red_colors: TeamColors::default_for(Team::Red),
            blue_colors: TeamColors::default_for(Team::Blue),
            auto_balance: false,
            frame: 0,
            events: Vec::new(),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Look up a player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Look up a player mutably.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn index_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    /// Whether `id` has admin rights. The host always does.
    pub fn is_admin(&self, id: PlayerId) -> bool {
        id == HOST_ID || self.player(id).is_some_and(|p| p.admin)
    }

    /// Number of players on a team.
    pub fn team_size(&self, team: Team) -> usize {
        self.players.iter().filter(|p| p.team == team).count()
    }

    /// Colors of a playing team.
    pub fn team_colors(&self, team: Team) -> Option<&TeamColors> {
        match team {
            Team::Red => Some(&self.red_colors),
            Team::Blue => Some(&self.blue_colors),
            Team::Spectator => None,
        }
    }

    /// Events emitted since the last drain.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Drain the emitted events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, data: GameEventData) {
        self.events.push(GameEvent::new(self.frame, data));
    }

    // =========================================================================
    // ROSTER
    // =========================================================================

    /// Add a spectator. Ignored when the id is already present.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        name: &str,
        country: Option<String>,
        avatar: Option<String>,
    ) -> bool {
        if self.player(id).is_some() {
            return false;
        }
        let mut player = Player::new(id, name);
        player.country = country;
        player.avatar = avatar;
        self.players.push(player);
        info!(player = id, name, "player joined");
        self.emit(GameEventData::PlayerJoined { player_id: id, name: name.to_string() });

        if self.auto_balance {
            self.auto_balance_one();
        }
        true
    }

    /// Remove a player, releasing their disc. Ignored for unknown ids.
    pub fn remove_player(
        &mut self,
        id: PlayerId,
        reason: Option<String>,
        ban: bool,
        by: PlayerId,
    ) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        if let Some(game) = self.game.as_mut() {
            game.release_disc(&mut self.players, i);
        }
        self.players.remove(i);
        info!(player = id, ban, "player left");
        self.events.push(GameEvent::player_left(self.frame, id, reason, ban, by));
        true
    }

    /// Move a player to a team. Ignored when nothing changes.
    pub fn set_player_team(&mut self, by: PlayerId, target: PlayerId, team: Team) -> bool {
        let Some(i) = self.index_of(target) else {
            return false;
        };
        if self.players[i].team == team {
            return false;
        }
        if let Some(game) = self.game.as_mut() {
            game.release_disc(&mut self.players, i);
        }
        self.players[i].team = team;
        if let Some(game) = self.game.as_mut() {
            game.bind_players(&mut self.players, &self.stadium);
        }
        debug!(player = target, team = team.name(), "team changed");
        self.events.push(GameEvent::team_changed(self.frame, target, team, by));
        true
    }

    /// Move the first spectator onto the smaller team, red on a tie.
    pub fn auto_balance_one(&mut self) -> bool {
        let Some(id) = self.players.iter().find(|p| p.team == Team::Spectator).map(|p| p.id) else {
            return false;
        };
        let team = if self.team_size(Team::Blue) < self.team_size(Team::Red) {
            Team::Blue
        } else {
            Team::Red
        };
        self.set_player_team(HOST_ID, id, team)
    }

    /// Move the listed players to the top (or bottom) of the roster, in the
    /// listed order. Unknown ids are skipped.
    pub fn reorder_players(&mut self, ids: &[PlayerId], to_top: bool) {
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(i) = self.index_of(*id) {
                moved.push(self.players.remove(i));
            }
        }
        if to_top {
            moved.append(&mut self.players);
            self.players = moved;
        } else {
            self.players.append(&mut moved);
        }
    }

    /// Grant or revoke admin rights.
    pub fn set_admin(&mut self, by: PlayerId, target: PlayerId, admin: bool) -> bool {
        let Some(player) = self.player_mut(target) else {
            return false;
        };
        if player.admin == admin {
            return false;
        }
        player.admin = admin;
        self.emit(GameEventData::AdminChanged { player_id: target, admin, by });
        true
    }

    /// Set a player's input word.
    pub fn set_input(&mut self, id: PlayerId, input: InputFrame) {
        if let Some(p) = self.player_mut(id) {
            p.input = input;
        }
    }

    /// Set a player's typing indicator.
    pub fn set_chat_indicator(&mut self, id: PlayerId, active: bool) {
        if let Some(p) = self.player_mut(id) {
            p.chat_indicator = active;
        }
    }

    /// Set a player's own avatar.
    pub fn set_avatar(&mut self, id: PlayerId, avatar: Option<String>) {
        if let Some(p) = self.player_mut(id) {
            p.avatar = avatar;
        }
    }

    /// Set the host-controlled avatar of a player.
    pub fn set_headless_avatar(&mut self, id: PlayerId, avatar: Option<String>) {
        if let Some(p) = self.player_mut(id) {
            p.headless_avatar = avatar;
        }
    }

    /// Set a player's handicap, clamped to the allowed range.
    pub fn set_handicap(&mut self, id: PlayerId, handicap: u16) {
        if let Some(p) = self.player_mut(id) {
            p.handicap = handicap.min(MAX_HANDICAP);
        }
    }

    /// Flag a player as desynced.
    pub fn mark_desynced(&mut self, id: PlayerId) {
        let Some(p) = self.player_mut(id) else {
            return;
        };
        if !p.desynced {
            p.desynced = true;
            self.emit(GameEventData::Desync { player_id: id });
        }
    }

    /// Assign pings in roster order.
    pub fn set_pings(&mut self, pings: &[u32]) {
        for (player, ping) in self.players.iter_mut().zip(pings) {
            player.ping = *ping;
        }
    }

    /// Record a chat line.
    pub fn chat(&mut self, id: PlayerId, text: &str) {
        if self.player(id).is_some() || id == HOST_ID {
            self.emit(GameEventData::Chat { player_id: id, text: text.to_string() });
        }
    }

    /// Record a host announcement.
    pub fn announce(&mut self, text: &str, color: i32, style: u8, sound: u8) {
        self.emit(GameEventData::Announcement { text: text.to_string(), color, style, sound });
    }

    // =========================================================================
    // RULES
    // =========================================================================

    /// Lock or unlock team changes.
    pub fn set_teams_lock(&mut self, locked: bool) {
        self.teams_lock = locked;
    }

    /// Change the score limit. Ignored while a game runs.
    pub fn set_score_limit(&mut self, limit: u32) -> bool {
        if self.game.is_some() {
            return false;
        }
        self.score_limit = limit;
        true
    }

    /// Change the time limit. Ignored while a game runs.
    pub fn set_time_limit(&mut self, minutes: u32) -> bool {
        if self.game.is_some() {
            return false;
        }
        self.time_limit = minutes;
        true
    }

    /// Change the kick rate limit, including for the running game.
    pub fn set_kick_rate_limit(&mut self, limit: KickRateLimit) {
        self.kick_rate = limit;
        if let Some(game) = self.game.as_mut() {
            game.kick_rate = limit;
        }
    }

    /// Replace a playing team's colors.
    pub fn set_team_colors(&mut self, team: Team, colors: TeamColors) {
        match team {
            Team::Red => self.red_colors = colors,
            Team::Blue => self.blue_colors = colors,
            Team::Spectator => {}
        }
    }

    /// Replace the stadium. Ignored while a game runs.
    pub fn set_stadium(&mut self, stadium: Stadium, by: PlayerId) -> bool {
        if self.game.is_some() {
            return false;
        }
        let name = stadium.name.clone();
        self.stadium = Arc::new(stadium);
        info!(stadium = %name, "stadium changed");
        self.emit(GameEventData::StadiumChanged { name, by });
        true
    }

    // =========================================================================
    // GAME LIFECYCLE
    // =========================================================================

    /// Start a match. Ignored when one is running.
    pub fn start_game(&mut self, by: PlayerId) -> bool {
        if self.game.is_some() {
            return false;
        }
        let mut game = Game::new(&self.stadium, self.score_limit, self.time_limit, self.kick_rate);
        game.bind_players(&mut self.players, &self.stadium);
        game.begin_kickoff(Team::Red, &self.players, &self.stadium);
        self.game = Some(game);
        info!(stadium = %self.stadium.name, "game started");
        self.emit(GameEventData::GameStarted { by });
        true
    }

    /// Stop the match immediately. Ignored when none is running.
    pub fn stop_game(&mut self, by: Option<PlayerId>) -> bool {
        if self.game.take().is_none() {
            return false;
        }
        for p in &mut self.players {
            p.unbind();
        }
        info!("game stopped");
        self.emit(GameEventData::GameStopped { by });
        true
    }

    /// Pause or resume the match.
    pub fn set_paused(&mut self, by: PlayerId, paused: bool) -> bool {
        let Some(game) = self.game.as_mut() else {
            return false;
        };
        if game.paused == paused {
            return false;
        }
        game.paused = paused;
        self.emit(GameEventData::GamePaused { paused, by });
        true
    }

    /// Overwrite fields of a disc, addressed by world index or by player id.
    pub fn update_disc(&mut self, disc: i32, is_player: bool, patch: &DiscPatch) {
        let index = if is_player {
            self.player(disc).and_then(|p| p.disc)
        } else {
            usize::try_from(disc).ok()
        };
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if let Some(target) = index.and_then(|i| game.world.discs.get_mut(i)) {
            patch.apply(target);
        }
    }

    /// Advance one tick.
    pub fn step(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if game.paused {
            return;
        }
        let result = tick(game, &mut self.players, &self.stadium, self.frame);
        self.events.extend(result.events);
        if result.game_over {
            self.stop_game(None);
        }
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Write the full room state.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_string(&self.name);
        w.write_u32(self.frame);
        binary::encode(&self.stadium, w);
        w.write_bool(self.teams_lock);
        w.write_u32(self.score_limit);
        w.write_u32(self.time_limit);
        self.kick_rate.encode(w);
        self.red_colors.encode(w);
        self.blue_colors.encode(w);
        w.write_bool(self.auto_balance);
        w.write_varint(self.players.len() as u32);
        for p in &self.players {
            p.encode(w);
        }
        match &self.game {
            Some(game) => {
                w.write_bool(true);
                game.encode(w);
            }
            None => w.write_bool(false),
        }
    }

    /// Read a room written by [`Room::encode`] into a fresh value.
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        let name = r.read_string()?;
        let frame = r.read_u32()?;
        let stadium = binary::decode(r)?;
        let teams_lock = r.read_bool()?;
        let score_limit = r.read_u32()?;
        let time_limit = r.read_u32()?;
        let kick_rate = KickRateLimit::decode(r)?;
        let red_colors = TeamColors::decode(r)?;
        let blue_colors = TeamColors::decode(r)?;
        let auto_balance = r.read_bool()?;
        let count = r.read_varint()? as usize;
        let mut players = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            players.push(Player::decode(r)?);
        }
        let game = if r.read_bool()? { Some(Game::decode(r)?) } else { None };
        check_bindings(&players, game.as_ref(), &stadium)?;
        Ok(Self {
            name,
            players,
            game,
            stadium: Arc::new(stadium),
            teams_lock,
            score_limit,
            time_limit,
            kick_rate,
            red_colors,
            blue_colors,
            auto_balance,
            frame,
            events: Vec::new(),
        })
    }

    /// Encoded state in the given byte order.
    pub fn to_bytes(&self, endian: Endian) -> Vec<u8> {
        let mut w = StreamWriter::new(endian);
        self.encode(&mut w);
        w.into_bytes()
    }

    /// XOR fold of the little-endian encoding.
    pub fn checksum(&self) -> u32 {
        fold_checksum(&self.to_bytes(Endian::Little))
    }
}

/// Player discs must sit after the stadium discs, inside the world, one per
/// player. Without a game nobody is bound.
fn check_bindings(players: &[Player], game: Option<&Game>, stadium: &Stadium) -> CodecResult<()> {
    let invalid = |reason: String| CodecError::Invalid { kind: "room", reason };
    let Some(game) = game else {
        return match players.iter().find(|p| p.disc.is_some()) {
            Some(p) => Err(invalid(format!("player {} bound without a game", p.id))),
            None => Ok(()),
        };
    };
    let range = stadium.discs.len()..game.world.discs.len();
    let mut seen = BTreeSet::new();
    for p in players {
        let Some(disc) = p.disc else {
            continue;
        };
        if !range.contains(&disc) {
            return Err(invalid(format!("player {} bound to disc {disc} outside {range:?}", p.id)));
        }
        if !seen.insert(disc) {
            return Err(invalid(format!("disc {disc} bound twice")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::point::Point;
    use crate::game::state::GameState;

    fn room_with(n: i32) -> Room {
        let mut room = Room::new("test", Stadium::classic());
        for id in 1..=n {
            room.add_player(id, &format!("p{id}"), None, None);
        }
        room.take_events();
        room
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut room = room_with(2);
        let before = room.to_bytes(Endian::Little);
        assert!(!room.remove_player(99, None, false, HOST_ID));
        assert_eq!(room.to_bytes(Endian::Little), before);
        assert!(room.take_events().is_empty());
    }

    #[test]
    fn test_same_team_is_noop() {
        let mut room = room_with(1);
        room.set_player_team(HOST_ID, 1, Team::Red);
        room.take_events();
        assert!(!room.set_player_team(HOST_ID, 1, Team::Red));
        assert!(room.take_events().is_empty());
    }

    #[test]
    fn test_duplicate_join_ignored() {
        let mut room = room_with(1);
        assert!(!room.add_player(1, "again", None, None));
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[0].name, "p1");
    }

    #[test]
    fn test_kickoff_scenario() {
        let mut room = room_with(2);
        room.set_player_team(HOST_ID, 1, Team::Red);
        room.set_player_team(HOST_ID, 2, Team::Blue);
        room.start_game(HOST_ID);

        let game = room.game.as_ref().unwrap();
        let d = room.stadium.spawn_distance;
        assert_eq!(game.state, GameState::Kickoff);
        assert_eq!(game.ball().unwrap().pos, Point::ZERO);
        assert_eq!(game.world.discs[room.players[0].disc.unwrap()].pos, Point::new(-d, 0.0));
        assert_eq!(game.world.discs[room.players[1].disc.unwrap()].pos, Point::new(d, 0.0));
    }

    #[test]
    fn test_leaving_player_shifts_disc_indices() {
        let mut room = room_with(3);
        for id in 1..=3 {
            room.set_player_team(HOST_ID, id, Team::Red);
        }
        room.start_game(HOST_ID);
        let third = room.players[2].disc.unwrap();
        room.remove_player(1, Some("bye".into()), false, HOST_ID);

        assert_eq!(room.player(3).unwrap().disc, Some(third - 1));
        let game = room.game.as_ref().unwrap();
        assert_eq!(game.world.discs.len(), room.stadium.discs.len() + 2);
    }

    #[test]
    fn test_stadium_locked_during_game() {
        let mut room = room_with(0);
        room.start_game(HOST_ID);
        assert!(!room.set_stadium(Stadium::big(), HOST_ID));
        assert_eq!(room.stadium.name, "Classic");
        room.stop_game(Some(HOST_ID));
        assert!(room.set_stadium(Stadium::big(), HOST_ID));
        assert_eq!(room.stadium.name, "Big");
    }

    #[test]
    fn test_auto_balance_prefers_smaller_team() {
        let mut room = room_with(3);
        room.auto_balance_one();
        room.auto_balance_one();
        room.auto_balance_one();
        let teams: Vec<Team> = room.players.iter().map(|p| p.team).collect();
        assert_eq!(teams, vec![Team::Red, Team::Blue, Team::Red]);
    }

    #[test]
    fn test_reorder_players() {
        let mut room = room_with(4);
        room.reorder_players(&[3, 1, 42], true);
        let ids: Vec<PlayerId> = room.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2, 4]);
        room.reorder_players(&[3], false);
        let ids: Vec<PlayerId> = room.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 4, 3]);
    }

    #[test]
    fn test_paused_game_does_not_step() {
        let mut room = room_with(1);
        room.set_player_team(HOST_ID, 1, Team::Red);
        room.start_game(HOST_ID);
        room.set_paused(HOST_ID, true);
        room.game.as_mut().unwrap().world.discs[0].vel = Point::new(1.0, 0.0);
        room.step();
        assert_eq!(room.game.as_ref().unwrap().world.discs[0].pos, Point::ZERO);
    }

    #[test]
    fn test_encoding_roundtrip_and_checksum() {
        let mut room = room_with(2);
        room.set_player_team(HOST_ID, 1, Team::Red);
        room.set_player_team(HOST_ID, 2, Team::Blue);
        room.start_game(HOST_ID);
        for _ in 0..30 {
            room.step();
        }

        for endian in [Endian::Little, Endian::Big] {
            let bytes = room.to_bytes(endian);
            let back = Room::decode(&mut StreamReader::new(&bytes, endian)).unwrap();
            assert_eq!(back.to_bytes(endian), bytes);
        }
        let copy = Room::decode(&mut StreamReader::little(&room.to_bytes(Endian::Little))).unwrap();
        assert_eq!(copy.checksum(), room.checksum());
    }

    #[test]
    fn test_two_rooms_stay_identical() {
        let mut a = room_with(2);
        a.set_player_team(HOST_ID, 1, Team::Red);
        a.set_player_team(HOST_ID, 2, Team::Blue);
        a.start_game(HOST_ID);
        let mut b = a.clone();
        for i in 0..600u32 {
            let input = InputFrame::new(i % 32);
            a.set_input(1, input);
            b.set_input(1, input);
            a.step();
            b.step();
        }
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.to_bytes(Endian::Little), b.to_bytes(Endian::Little));
    }

    #[test]
    fn test_decode_rejects_broken_disc_bindings() {
        let mut room = room_with(2);
        room.set_player_team(HOST_ID, 1, Team::Red);
        room.set_player_team(HOST_ID, 2, Team::Blue);
        room.start_game(HOST_ID);
        let world_len = room.game.as_ref().unwrap().world.discs.len();
        let first = room.players[0].disc;

        let decode = |room: &Room| Room::decode(&mut StreamReader::little(&room.to_bytes(Endian::Little)));

        let mut past_end = room.clone();
        past_end.players[1].disc = Some(world_len);
        assert!(matches!(decode(&past_end), Err(CodecError::Invalid { kind: "room", .. })));

        let mut on_ball = room.clone();
        on_ball.players[1].disc = Some(0);
        assert!(matches!(decode(&on_ball), Err(CodecError::Invalid { .. })));

        let mut shared = room.clone();
        shared.players[1].disc = first;
        assert!(matches!(decode(&shared), Err(CodecError::Invalid { .. })));

        let mut no_game = room.clone();
        no_game.game = None;
        assert!(matches!(decode(&no_game), Err(CodecError::Invalid { .. })));

        assert!(decode(&room).is_ok());
    }
}
