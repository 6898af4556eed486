//! Haxsim demo
//!
//! Plays a scripted match on a stadium (a built-in name or a JSON file given
//! as the first argument), records it, and verifies that the replay
//! reproduces the final state bit for bit.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use haxsim::{
    Action, ActionEnvelope, Endian, ReplayReader, ReplayRecorder, Room, Stadium, Team, TICK_RATE,
    VERSION,
    game::events::GameEventData,
    game::input::{INPUT_DOWN, INPUT_KICK, INPUT_LEFT, INPUT_RIGHT, INPUT_UP},
    game::player::HOST_ID,
    stadium::builtin,
};

/// Ticks the demo runs for (two minutes).
const DEMO_TICKS: u32 = 2 * 60 * TICK_RATE;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Haxsim v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let stadium = load_stadium(std::env::args().nth(1).as_deref())?;
    info!(
        "Stadium: {} (fingerprint {})",
        stadium.name,
        &stadium.fingerprint_hex()[..16]
    );

    demo_match(stadium)
}

fn load_stadium(arg: Option<&str>) -> Result<Stadium> {
    let Some(arg) = arg else {
        return Ok(Stadium::classic());
    };
    if let Some(stadium) = builtin::by_name(arg) {
        return Ok(stadium);
    }
    let text = std::fs::read_to_string(arg).with_context(|| format!("reading {arg}"))?;
    Stadium::from_json(&text).with_context(|| format!("parsing {arg}"))
}

/// Input word for a player at tick `t`: a slow sweep with periodic kicks.
fn scripted_input(slot: i32, t: u32) -> u32 {
    let phase = (t / 45 + slot as u32 * 3) % 8;
    let dir = match phase {
        0 => INPUT_RIGHT,
        1 => INPUT_RIGHT | INPUT_DOWN,
        2 => INPUT_DOWN,
        3 => INPUT_LEFT | INPUT_DOWN,
        4 => INPUT_LEFT,
        5 => INPUT_LEFT | INPUT_UP,
        6 => INPUT_UP,
        _ => INPUT_RIGHT | INPUT_UP,
    };
    if t % 30 < 4 { dir | INPUT_KICK } else { dir }
}

fn demo_match(stadium: Stadium) -> Result<()> {
    info!("=== Starting Demo Match ===");

    let mut room = Room::new("demo", stadium);
    let mut recorder = ReplayRecorder::new(&room);

    let apply = |room: &mut Room, recorder: &mut ReplayRecorder, env: ActionEnvelope| -> Result<()> {
        recorder.record(room.frame, &env)?;
        env.apply(room);
        Ok(())
    };

    let roster = [(1, "ana", Team::Red), (2, "bo", Team::Blue), (3, "cy", Team::Red), (4, "dee", Team::Blue)];
    for (id, name, _) in roster {
        let join = Action::PlayerJoin { id, name: name.into(), country: None, avatar: None };
        apply(&mut room, &mut recorder, ActionEnvelope::host(join))?;
    }
    for (id, _, team) in roster {
        apply(&mut room, &mut recorder, ActionEnvelope::new(HOST_ID, Action::SetTeam { player: id, team }))?;
    }
    apply(&mut room, &mut recorder, ActionEnvelope::host(Action::StartGame))?;

    let mut goals = 0;
    for t in 0..DEMO_TICKS {
        if t % 15 == 0 {
            for (id, _, _) in roster {
                let input = scripted_input(id, t);
                apply(&mut room, &mut recorder, ActionEnvelope::new(id, Action::PlayerInput { input }))?;
            }
        }
        room.step();

        let events = room.take_events();
        recorder.observe(&events);
        for event in &events {
            match &event.data {
                GameEventData::Goal { team, red, blue } => {
                    goals += 1;
                    info!("Tick {}: goal for {} ({} - {})", event.frame, team.name(), red, blue);
                }
                GameEventData::TeamVictory { team } => {
                    info!("Tick {}: {} wins", event.frame, team.name());
                }
                _ => {}
            }
        }
        if t % 600 == 0 {
            info!("Tick {}: checksum {:08x}", t, room.checksum());
        }
        if room.game.is_none() {
            info!("Match ended at tick {}", t);
            break;
        }
    }

    info!("=== Match Results ===");
    let checksum = room.checksum();
    let fingerprint = haxsim::core::checksum::fingerprint(&room.to_bytes(Endian::Little));
    info!("Goals: {}", goals);
    info!("Final checksum: {:08x}", checksum);
    info!("Final fingerprint: {}", hex::encode(fingerprint));

    info!("=== Verifying Determinism ===");
    let bytes = recorder.finish(room.frame).context("finishing the replay")?;
    info!("Replay size: {} bytes", bytes.len());
    let replay = ReplayReader::read(&bytes).context("reading back the replay")?;
    let replayed = replay.play_to_end();
    info!("Replay checksum: {:08x}", replayed.checksum());

    if replayed.checksum() != checksum {
        bail!("determinism failure: {:08x} != {:08x}", replayed.checksum(), checksum);
    }
    info!("DETERMINISM VERIFIED: checksums match");
    Ok(())
}
