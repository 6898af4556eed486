//! Authoritative Simulation Tick
//!
//! The per-tick game loop. Every peer runs it with the same inputs and gets
//! bit-identical results.

use tracing::{debug, info};

use crate::core::point::Point;
use crate::physics::CollisionFlags;
use crate::stadium::{KickOffReset, Stadium};
use super::events::{GameEvent, GameEventData};
use super::player::Player;
use super::state::{
    Game, GameState, END_PAUSE_TICKS, GOAL_PAUSE_TICKS, KICK_RANGE, SECONDS_PER_TICK,
};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// The end pause ran out; the caller should destroy the game
    pub game_over: bool,
}

/// Run one simulation tick.
///
/// `frame` only stamps the emitted events.
pub fn tick(game: &mut Game, players: &mut [Player], stadium: &Stadium, frame: u32) -> TickResult {
    let mut result = TickResult::default();

    // 1. Bind discs to team members
    game.bind_players(players, stadium);

    // 2. Apply player inputs and kicks
    apply_inputs(game, players, stadium, frame, &mut result);

    // 3. Step physics
    let ball_before = game.ball().map(|b| b.pos);
    game.world.step(stadium);
    let ball_after = game.ball().map(|b| b.pos);

    // 4. Advance the match state machine
    match game.state {
        GameState::Kickoff => {
            let spawn = stadium.discs.first().map(|d| d.pos);
            let live = match stadium.kick_off_reset {
                KickOffReset::Full => true,
                KickOffReset::Partial => ball_after.is_some() && ball_after != spawn,
            };
            if live {
                game.state = GameState::Playing;
                game.apply_player_masks(players);
                debug!(team = game.kickoff_team.name(), "kickoff taken");
                result.events.push(GameEvent::new(
                    frame,
                    GameEventData::KickoffTaken { team: game.kickoff_team },
                ));
            }
        }
        GameState::Playing => {
            game.match_time += SECONDS_PER_TICK;
            if let (Some(from), Some(to)) = (ball_before, ball_after) {
                check_goals(game, stadium, from, to, frame, &mut result);
            }
            if game.state == GameState::Playing && game.time_up() {
                match game.leader() {
                    Some(team) => end_match(game, team, frame, &mut result),
                    None if !game.overtime => {
                        game.overtime = true;
                        info!("overtime");
                        result.events.push(GameEvent::new(frame, GameEventData::Overtime));
                    }
                    None => {}
                }
            }
        }
        GameState::GoalPause => {
            game.timer = game.timer.saturating_sub(1);
            if game.timer == 0 {
                let winner = if game.score_limit_reached() || (game.time_up() && game.leader().is_some()) {
                    game.leader()
                } else {
                    None
                };
                match winner {
                    Some(team) => end_match(game, team, frame, &mut result),
                    None => game.begin_kickoff(game.kickoff_team, players, stadium),
                }
            }
        }
        GameState::EndPause => {
            game.timer = game.timer.saturating_sub(1);
            if game.timer == 0 {
                result.game_over = true;
            }
        }
    }

    result
}

/// Apply movement and kicks for every bound player, in roster order.
fn apply_inputs(
    game: &mut Game,
    players: &mut [Player],
    stadium: &Stadium,
    frame: u32,
    result: &mut TickResult,
) {
    let pp = &stadium.player_physics;
    let kicks_allowed = game.state.kicks_allowed();
    let budget = game.kick_rate.budget();

    for player in players.iter_mut() {
        let Some(index) = player.disc else {
            continue;
        };
        let kicking = player.input.kick();
        if !kicking {
            player.kick_consumed = false;
        }
        if player.zc < budget {
            player.zc += 1;
        }
        if player.bc > 0 {
            player.bc -= 1;
        }

        let Some(disc) = game.world.discs.get_mut(index) else {
            continue;
        };
        let accel = if kicking { pp.kicking_acceleration } else { pp.acceleration };
        disc.damping = if kicking { pp.kicking_damping } else { pp.damping };
        disc.vel += player.input.direction() * accel;

        if !(kicking && kicks_allowed && !player.kick_consumed) {
            continue;
        }

        let can_kick = player.bc == 0 && player.zc >= 0;
        let mut kicked = false;
        let mut blocked = false;
        for target in 0..game.world.discs.len() {
            let Some((me, other)) = game.world.pair_mut(index, target) else {
                continue;
            };
            if !other.c_group.contains(CollisionFlags::KICK) {
                continue;
            }
            let delta = other.pos - me.pos;
            let dist = delta.length();
            if dist - me.radius - other.radius >= KICK_RANGE {
                continue;
            }
            let normal = if dist > 0.0 { delta * (1.0 / dist) } else { Point::new(1.0, 0.0) };
            if can_kick {
                other.vel += normal * pp.kick_strength;
                me.vel -= normal * pp.kickback;
                kicked = true;
            } else {
                other.pos = me.pos + normal * (me.radius + other.radius + KICK_RANGE);
                blocked = true;
            }
        }

        if kicked {
            player.kick_consumed = true;
            player.bc = game.kick_rate.min;
            player.zc -= game.kick_rate.rate;
            result.events.push(GameEvent::new(
                frame,
                GameEventData::PlayerKicked { player_id: player.id },
            ));
        } else if blocked {
            player.bc = game.kick_rate.min;
            debug!(player = player.id, "kick blocked by rate limit");
            result.events.push(GameEvent::new(
                frame,
                GameEventData::KickBlocked { player_id: player.id },
            ));
        }
    }
}

/// Score the first goal line the ball crossed this tick.
fn check_goals(
    game: &mut Game,
    stadium: &Stadium,
    from: Point,
    to: Point,
    frame: u32,
    result: &mut TickResult,
) {
    let Some(goal) = stadium.goals.iter().find(|g| g.crossed_by(from, to)) else {
        return;
    };
    let scorer = goal.team.opponent();
    game.add_goal(scorer);
    game.kickoff_team = goal.team;
    game.state = GameState::GoalPause;
    game.timer = GOAL_PAUSE_TICKS;
    info!(
        team = scorer.name(),
        red = game.red_score,
        blue = game.blue_score,
        "goal"
    );
    result.events.push(GameEvent::goal(frame, scorer, game.red_score, game.blue_score));
}

fn end_match(game: &mut Game, winner: super::team::Team, frame: u32, result: &mut TickResult) {
    game.state = GameState::EndPause;
    game.timer = END_PAUSE_TICKS;
    game.winner = Some(winner);
    info!(team = winner.name(), red = game.red_score, blue = game.blue_score, "victory");
    result.events.push(GameEvent::new(frame, GameEventData::TeamVictory { team: winner }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::{InputFrame, INPUT_KICK, INPUT_RIGHT};
    use crate::game::state::KickRateLimit;
    use crate::game::team::Team;

    fn setup() -> (Game, Vec<Player>, Stadium) {
        let stadium = Stadium::classic();
        let mut red = Player::new(1, "red");
        red.team = Team::Red;
        let mut blue = Player::new(2, "blue");
        blue.team = Team::Blue;
        let mut players = vec![red, blue];
        let mut game = Game::new(&stadium, 3, 3, KickRateLimit::default());
        game.bind_players(&mut players, &stadium);
        game.begin_kickoff(Team::Red, &players, &stadium);
        (game, players, stadium)
    }

    #[test]
    fn test_kickoff_spawns() {
        let (game, players, stadium) = setup();
        let d = stadium.spawn_distance;
        assert_eq!(game.ball().unwrap().pos, Point::ZERO);
        assert_eq!(game.world.discs[players[0].disc.unwrap()].pos, Point::new(-d, 0.0));
        assert_eq!(game.world.discs[players[1].disc.unwrap()].pos, Point::new(d, 0.0));
    }

    #[test]
    fn test_kick_sets_ball_moving_and_ends_kickoff() {
        let (mut game, mut players, stadium) = setup();
        let red_disc = players[0].disc.unwrap();
        let gap = game.world.discs[red_disc].radius + game.world.discs[0].radius + 1.0;
        game.world.discs[red_disc].pos = Point::new(-gap, 0.0);
        players[0].input = InputFrame::new(INPUT_KICK);

        let result = tick(&mut game, &mut players, &stadium, 1);
        assert!(game.world.discs[0].vel.x > 4.0);
        assert_eq!(game.state, GameState::Playing);
        assert!(players[0].kick_consumed);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::PlayerKicked { player_id: 1 })));

        // Holding the button does not kick again.
        let vel = game.world.discs[0].vel;
        tick(&mut game, &mut players, &stadium, 2);
        assert!(game.world.discs[0].vel.x <= vel.x);
    }

    #[test]
    fn test_goal_then_kickoff_after_pause() {
        let (mut game, mut players, stadium) = setup();
        game.state = GameState::Playing;
        game.apply_player_masks(&players);

        // Drive the ball into the left goal (owned by red).
        game.world.discs[0].pos = Point::new(-360.0, 0.0);
        game.world.discs[0].vel = Point::new(-8.0, 0.0);

        let mut frame = 0;
        while game.state == GameState::Playing && frame < 60 {
            frame += 1;
            tick(&mut game, &mut players, &stadium, frame);
        }
        assert_eq!(game.state, GameState::GoalPause);
        assert_eq!(game.blue_score, 1);
        assert_eq!(game.red_score, 0);
        assert_eq!(game.kickoff_team, Team::Red);

        players[0].input = InputFrame::new(INPUT_RIGHT);
        for _ in 0..GOAL_PAUSE_TICKS - 1 {
            frame += 1;
            tick(&mut game, &mut players, &stadium, frame);
            assert_eq!(game.state, GameState::GoalPause);
        }
        players[0].input = InputFrame::NONE;
        tick(&mut game, &mut players, &stadium, frame + 1);
        assert_eq!(game.state, GameState::Kickoff);
        assert_eq!(game.ball().unwrap().pos, Point::ZERO);
        let d = stadium.spawn_distance;
        assert_eq!(game.world.discs[players[0].disc.unwrap()].pos, Point::new(-d, 0.0));
    }

    #[test]
    fn test_score_limit_ends_match() {
        let (mut game, mut players, stadium) = setup();
        game.score_limit = 1;
        game.state = GameState::Playing;
        game.world.discs[0].pos = Point::new(360.0, 0.0);
        game.world.discs[0].vel = Point::new(8.0, 0.0);

        let mut frame = 0;
        while game.state != GameState::EndPause && frame < 400 {
            frame += 1;
            tick(&mut game, &mut players, &stadium, frame);
        }
        assert_eq!(game.winner, Some(Team::Red));

        let mut over = false;
        for _ in 0..END_PAUSE_TICKS {
            frame += 1;
            over = tick(&mut game, &mut players, &stadium, frame).game_over;
        }
        assert!(over);
    }

    #[test]
    fn test_time_limit_tie_goes_to_overtime() {
        let (mut game, mut players, stadium) = setup();
        game.time_limit = 1;
        game.state = GameState::Playing;
        game.match_time = 60.0;

        let result = tick(&mut game, &mut players, &stadium, 1);
        assert!(game.overtime);
        assert_eq!(game.state, GameState::Playing);
        assert!(result.events.iter().any(|e| e.data == GameEventData::Overtime));

        game.red_score = 1;
        tick(&mut game, &mut players, &stadium, 2);
        assert_eq!(game.state, GameState::EndPause);
        assert_eq!(game.winner, Some(Team::Red));
    }

    #[test]
    fn test_rate_limited_kick_nudges_ball() {
        let (mut game, mut players, stadium) = setup();
        game.state = GameState::Playing;
        let red_disc = players[0].disc.unwrap();
        let touching = game.world.discs[red_disc].radius + game.world.discs[0].radius;
        game.world.discs[red_disc].pos = Point::new(-touching, 0.0);
        players[0].bc = 5;
        players[0].input = InputFrame::new(INPUT_KICK);

        let result = tick(&mut game, &mut players, &stadium, 1);
        assert!(!players[0].kick_consumed);
        assert_eq!(players[0].bc, KickRateLimit::default().min);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::KickBlocked { player_id: 1 })));
    }

    #[test]
    fn test_partial_reset_kickoff_waits_for_ball() {
        let (mut game, mut players, stadium) = setup();
        assert_eq!(stadium.kick_off_reset, KickOffReset::Partial);
        for frame in 1..=120 {
            tick(&mut game, &mut players, &stadium, frame);
        }
        assert_eq!(game.state, GameState::Kickoff);
        assert_eq!(game.ball().unwrap().pos, Point::ZERO);
    }

    #[test]
    fn test_full_reset_kickoff_goes_live_immediately() {
        let (mut game, mut players, mut stadium) = setup();
        stadium.kick_off_reset = KickOffReset::Full;

        let result = tick(&mut game, &mut players, &stadium, 1);
        assert_eq!(game.state, GameState::Playing);
        assert_eq!(game.ball().unwrap().pos, Point::ZERO);
        assert!(result
            .events
            .iter()
            .any(|e| e.data == GameEventData::KickoffTaken { team: Team::Red }));
    }
}
