//! Match State
//!
//! One running match: the dynamic world, the score, the clock and the
//! kickoff / goal / end sub-states. Player discs live in the world and are
//! bound to roster entries by index.

use serde::{Serialize, Deserialize};

use crate::core::codec::{CodecError, CodecResult, StreamReader, StreamWriter};
use crate::core::point::Point;
use crate::physics::{CollisionFlags, Disc, World};
use crate::stadium::{KickOffReset, Stadium};
use super::player::Player;
use super::team::Team;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Ticks the game waits after a goal before the next kickoff.
pub const GOAL_PAUSE_TICKS: u32 = 150;

/// Ticks the game waits after a victory before it is destroyed.
pub const END_PAUSE_TICKS: u32 = 300;

/// Surface gap under which a player can kick a disc.
pub const KICK_RANGE: f64 = 4.0;

/// Vertical distance between default spawn rows.
pub const SPAWN_ROW_SPACING: f64 = 55.0;

/// Match seconds added per playing tick.
pub const SECONDS_PER_TICK: f64 = 1.0 / 60.0;

// =============================================================================
// GAME STATE
// =============================================================================

/// Sub-state of a running match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameState {
    /// Waiting for the kicking team to move the ball
    #[default]
    Kickoff = 0,
    /// Live play
    Playing = 1,
    /// Short pause after a goal
    GoalPause = 2,
    /// Pause after a victory, then the game is destroyed
    EndPause = 3,
}

impl GameState {
    /// Wire id.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Parse a wire id.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Kickoff),
            1 => Some(Self::Playing),
            2 => Some(Self::GoalPause),
            3 => Some(Self::EndPause),
            _ => None,
        }
    }

    /// Whether kicks have any effect.
    pub fn kicks_allowed(self) -> bool {
        matches!(self, Self::Kickoff | Self::Playing)
    }
}

// =============================================================================
// KICK RATE LIMIT
// =============================================================================

/// Per-player kick rate limit.
///
/// `min` is the cooldown after each kick. `rate` is the cost of a kick in a
/// budget that regains one per tick, capped at `rate * burst`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KickRateLimit {
    /// Cooldown ticks after a kick
    pub min: i32,
    /// Budget cost of a kick
    pub rate: i32,
    /// Kicks that can be banked
    pub burst: i32,
}

impl Default for KickRateLimit {
    fn default() -> Self {
        Self { min: 2, rate: 0, burst: 0 }
    }
}

impl KickRateLimit {
    /// Budget cap.
    pub fn budget(&self) -> i32 {
        self.rate.saturating_mul(self.burst)
    }

    /// Write `min, rate, burst`.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_i32(self.min);
        w.write_i32(self.rate);
        w.write_i32(self.burst);
    }

    /// Read `min, rate, burst`.
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            min: r.read_i32()?,
            rate: r.read_i32()?,
            burst: r.read_i32()?,
        })
    }
}

// =============================================================================
// GAME
// =============================================================================

/// A running match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Dynamic discs; index 0 is the ball
    pub world: World,
    /// Current sub-state
    pub state: GameState,
    /// Ticks left in the current pause
    pub timer: u32,
    /// Red goals
    pub red_score: u32,
    /// Blue goals
    pub blue_score: u32,
    /// Elapsed playing time in seconds
    pub match_time: f64,
    /// Team taking (or about to take) the kickoff
    pub kickoff_team: Team,
    /// Paused games do not step
    pub paused: bool,
    /// Time ran out with a tie
    pub overtime: bool,
    /// Set once a team has won
    pub winner: Option<Team>,
    /// Goals needed to win, 0 for none
    pub score_limit: u32,
    /// Minutes of play, 0 for none
    pub time_limit: u32,
    /// Kick rate limit
    pub kick_rate: KickRateLimit,
}

impl Game {
    /// Create a game with the stadium's discs at their template positions.
    pub fn new(stadium: &Stadium, score_limit: u32, time_limit: u32, kick_rate: KickRateLimit) -> Self {
        Self {
            world: World::from_stadium(stadium),
            state: GameState::Kickoff,
            timer: 0,
            red_score: 0,
            blue_score: 0,
            match_time: 0.0,
            kickoff_team: Team::Red,
            paused: false,
            overtime: false,
            winner: None,
            score_limit,
            time_limit,
            kick_rate,
        }
    }

    /// The ball disc.
    pub fn ball(&self) -> Option<&Disc> {
        self.world.discs.first()
    }

    /// Goals scored by a team.
    pub fn score(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red_score,
            Team::Blue => self.blue_score,
            Team::Spectator => 0,
        }
    }

    /// Credit a goal to a team, returning its new score.
    pub fn add_goal(&mut self, team: Team) -> u32 {
        match team {
            Team::Red => {
                self.red_score += 1;
                self.red_score
            }
            Team::Blue => {
                self.blue_score += 1;
                self.blue_score
            }
            Team::Spectator => 0,
        }
    }

    /// Team ahead on goals, if any.
    pub fn leader(&self) -> Option<Team> {
        match self.red_score.cmp(&self.blue_score) {
            std::cmp::Ordering::Greater => Some(Team::Red),
            std::cmp::Ordering::Less => Some(Team::Blue),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Whether either team reached the score limit.
    pub fn score_limit_reached(&self) -> bool {
        self.score_limit > 0 && (self.red_score >= self.score_limit || self.blue_score >= self.score_limit)
    }

    /// Whether the time limit has elapsed.
    pub fn time_up(&self) -> bool {
        self.time_limit > 0 && self.match_time >= self.time_limit as f64 * 60.0
    }

    /// Collision mask for player discs in the current sub-state.
    ///
    /// Before the kickoff is taken, the defending team also collides with the
    /// kickoff barrier.
    pub fn player_mask(&self) -> CollisionFlags {
        if self.state == GameState::Kickoff {
            CollisionFlags::PLAYER_MASK | self.kickoff_team.opponent().ko_flag()
        } else {
            CollisionFlags::PLAYER_MASK
        }
    }

    /// Push the current player mask onto every bound disc.
    pub fn apply_player_masks(&mut self, players: &[Player]) {
        let mask = self.player_mask();
        for index in players.iter().filter_map(|p| p.disc) {
            if let Some(disc) = self.world.discs.get_mut(index) {
                disc.c_mask = mask;
            }
        }
    }

    // =========================================================================
    // DISC BINDING
    // =========================================================================

    /// Allocate and release player discs so that every playing team member
    /// has exactly one and nobody else does.
    pub fn bind_players(&mut self, players: &mut [Player], stadium: &Stadium) {
        for i in 0..players.len() {
            let team = players[i].team;
            if let Some(index) = players[i].disc {
                let stale = !team.is_playing()
                    || self
                        .world
                        .discs
                        .get(index)
                        .map_or(true, |d| !d.c_group.contains(team.c_group()));
                if stale {
                    self.release_disc(players, i);
                }
            }
            if team.is_playing() && players[i].disc.is_none() {
                let slot = lowest_free_slot(players, team);
                let disc = self.player_disc(stadium, team, slot);
                let player = &mut players[i];
                player.slot = slot;
                player.disc = Some(self.world.push(disc));
                player.zc = self.kick_rate.budget();
                player.bc = 0;
                player.kick_consumed = false;
            }
        }
    }

    /// Remove the disc of `players[i]` from the world and shift the indices
    /// of every disc bound after it.
    pub fn release_disc(&mut self, players: &mut [Player], i: usize) {
        let Some(index) = players[i].disc else {
            return;
        };
        self.world.remove(index);
        players[i].unbind();
        for other in players.iter_mut() {
            if let Some(d) = other.disc.as_mut() {
                if *d > index {
                    *d -= 1;
                }
            }
        }
    }

    fn player_disc(&self, stadium: &Stadium, team: Team, slot: u8) -> Disc {
        let pp = &stadium.player_physics;
        Disc {
            pos: spawn_position(stadium, team, slot),
            vel: Point::ZERO,
            gravity: pp.gravity,
            radius: pp.radius,
            b_coef: pp.b_coef,
            inv_mass: pp.inv_mass,
            damping: pp.damping,
            c_mask: self.player_mask(),
            c_group: team.c_group() | pp.c_group,
            ..Disc::default()
        }
    }

    // =========================================================================
    // KICKOFF
    // =========================================================================

    /// Enter the kickoff sub-state with `team` kicking off.
    pub fn begin_kickoff(&mut self, team: Team, players: &[Player], stadium: &Stadium) {
        self.state = GameState::Kickoff;
        self.timer = 0;
        self.kickoff_team = team;
        self.reset_positions(players, stadium);
        self.apply_player_masks(players);
    }

    /// Put discs back in their kickoff places.
    ///
    /// A full reset restores every stadium disc, a partial one only the ball.
    /// Player discs return to their spawn slots at rest.
    pub fn reset_positions(&mut self, players: &[Player], stadium: &Stadium) {
        let restore = match stadium.kick_off_reset {
            KickOffReset::Full => stadium.discs.len(),
            KickOffReset::Partial => stadium.discs.len().min(1),
        };
        for (disc, template) in self.world.discs.iter_mut().zip(&stadium.discs).take(restore) {
            *disc = template.clone();
        }

        for player in players {
            let Some(disc) = player.disc.and_then(|i| self.world.discs.get_mut(i)) else {
                continue;
            };
            disc.pos = spawn_position(stadium, player.team, player.slot);
            disc.vel = Point::ZERO;
        }
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Write the full match state.
    pub fn encode(&self, w: &mut StreamWriter) {
        self.world.encode(w);
        w.write_u8(self.state.id());
        w.write_u32(self.timer);
        w.write_u32(self.red_score);
        w.write_u32(self.blue_score);
        w.write_f64(self.match_time);
        w.write_u8(self.kickoff_team.id());
        w.write_bool(self.paused);
        w.write_bool(self.overtime);
        w.write_u8(self.winner.map_or(0, Team::id));
        w.write_u32(self.score_limit);
        w.write_u32(self.time_limit);
        self.kick_rate.encode(w);
    }

    /// Read a match written by [`Game::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        let world = World::decode(r)?;
        let state_id = r.read_u8()?;
        let state = GameState::from_id(state_id).ok_or(CodecError::InvalidValue {
            field: "game state",
            value: state_id as i64,
        })?;
        let timer = r.read_u32()?;
        let red_score = r.read_u32()?;
        let blue_score = r.read_u32()?;
        let match_time = r.read_f64()?;
        let kickoff_team = Team::decode(r)?;
        let paused = r.read_bool()?;
        let overtime = r.read_bool()?;
        let winner = match Team::decode(r)? {
            Team::Spectator => None,
            team => Some(team),
        };
        Ok(Self {
            world,
            state,
            timer,
            red_score,
            blue_score,
            match_time,
            kickoff_team,
            paused,
            overtime,
            winner,
            score_limit: r.read_u32()?,
            time_limit: r.read_u32()?,
            kick_rate: KickRateLimit::decode(r)?,
        })
    }
}

/// Spawn point of the player in `slot` (1-based) of `team`.
///
/// Explicit spawn points are used in order, the last one repeating. Without
/// them players line up on the team's spawn line, alternating above and below
/// the centre.
pub fn spawn_position(stadium: &Stadium, team: Team, slot: u8) -> Point {
    let i = slot.saturating_sub(1) as usize;
    let points = stadium.spawn_points(team);
    if let Some(last) = points.last() {
        return points.get(i).copied().unwrap_or(*last);
    }
    let k = ((i + 1) / 2) as f64;
    let y = if i % 2 == 1 { -SPAWN_ROW_SPACING * k } else { SPAWN_ROW_SPACING * k };
    Point::new(team.side() * stadium.spawn_distance, y)
}

/// Lowest positive slot not taken by a bound member of `team`.
fn lowest_free_slot(players: &[Player], team: Team) -> u8 {
    let taken: Vec<u8> = players
        .iter()
        .filter(|p| p.team == team && p.disc.is_some())
        .map(|p| p.slot)
        .collect();
    (1..=u8::MAX).find(|s| !taken.contains(s)).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Player> {
        let mut red = Player::new(1, "r");
        red.team = Team::Red;
        let mut blue = Player::new(2, "b");
        blue.team = Team::Blue;
        let spec = Player::new(3, "s");
        vec![red, blue, spec]
    }

    #[test]
    fn test_default_spawn_rows_alternate() {
        let stadium = Stadium::classic();
        let d = stadium.spawn_distance;
        assert_eq!(spawn_position(&stadium, Team::Red, 1), Point::new(-d, 0.0));
        assert_eq!(spawn_position(&stadium, Team::Red, 2), Point::new(-d, -55.0));
        assert_eq!(spawn_position(&stadium, Team::Blue, 3), Point::new(d, 55.0));
        assert_eq!(spawn_position(&stadium, Team::Blue, 4), Point::new(d, -110.0));
    }

    #[test]
    fn test_explicit_spawn_points_repeat_last() {
        let mut stadium = Stadium::classic();
        stadium.red_spawn_points = vec![Point::new(-1.0, 0.0), Point::new(-2.0, 0.0)];
        assert_eq!(spawn_position(&stadium, Team::Red, 1), Point::new(-1.0, 0.0));
        assert_eq!(spawn_position(&stadium, Team::Red, 5), Point::new(-2.0, 0.0));
    }

    #[test]
    fn test_bind_allocates_and_releases() {
        let stadium = Stadium::classic();
        let mut players = roster();
        let mut game = Game::new(&stadium, 3, 3, KickRateLimit::default());
        game.bind_players(&mut players, &stadium);

        let base = stadium.discs.len();
        assert_eq!(game.world.discs.len(), base + 2);
        assert_eq!(players[0].disc, Some(base));
        assert_eq!(players[1].disc, Some(base + 1));
        assert_eq!(players[2].disc, None);
        assert_eq!(players[0].slot, 1);

        players[0].team = Team::Spectator;
        game.bind_players(&mut players, &stadium);
        assert_eq!(game.world.discs.len(), base + 1);
        assert_eq!(players[0].disc, None);
        assert_eq!(players[1].disc, Some(base));
        assert_eq!(game.world.discs[base].c_group, CollisionFlags::BLUE);
    }

    #[test]
    fn test_slots_fill_lowest_gap() {
        let stadium = Stadium::classic();
        let mut players: Vec<Player> = (1..=3)
            .map(|id| {
                let mut p = Player::new(id, "x");
                p.team = Team::Red;
                p
            })
            .collect();
        let mut game = Game::new(&stadium, 0, 0, KickRateLimit::default());
        game.bind_players(&mut players, &stadium);
        assert_eq!(players.iter().map(|p| p.slot).collect::<Vec<_>>(), vec![1, 2, 3]);

        game.release_disc(&mut players, 1);
        players.push({
            let mut p = Player::new(9, "late");
            p.team = Team::Red;
            p
        });
        players[1].team = Team::Spectator;
        game.bind_players(&mut players, &stadium);
        assert_eq!(players[3].slot, 2);
    }

    #[test]
    fn test_kickoff_mask_blocks_defenders() {
        let stadium = Stadium::classic();
        let mut players = roster();
        let mut game = Game::new(&stadium, 3, 3, KickRateLimit::default());
        game.bind_players(&mut players, &stadium);
        game.begin_kickoff(Team::Blue, &players, &stadium);

        let red_disc = &game.world.discs[players[0].disc.unwrap()];
        assert!(red_disc.c_mask.contains(CollisionFlags::RED_KO));
        assert!(!red_disc.c_mask.contains(CollisionFlags::BLUE_KO));

        game.state = GameState::Playing;
        game.apply_player_masks(&players);
        let red_disc = &game.world.discs[players[0].disc.unwrap()];
        assert_eq!(red_disc.c_mask, CollisionFlags::PLAYER_MASK);
    }

    #[test]
    fn test_encode_decode_preserves_state() {
        let stadium = Stadium::big();
        let mut players = roster();
        let mut game = Game::new(&stadium, 5, 7, KickRateLimit { min: 3, rate: 2, burst: 4 });
        game.bind_players(&mut players, &stadium);
        game.red_score = 2;
        game.winner = Some(Team::Red);
        game.state = GameState::EndPause;
        game.timer = 123;

        let mut w = StreamWriter::little();
        game.encode(&mut w);
        let bytes = w.into_bytes();
        let back = Game::decode(&mut StreamReader::little(&bytes)).unwrap();
        assert_eq!(back, game);
    }
}
