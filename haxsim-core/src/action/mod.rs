//! Actions
//!
//! Every mutation of a room travels as an [`Action`] wrapped in an
//! [`ActionEnvelope`] naming its sender. Actions are a closed sum type; the
//! wire tag selects the payload decoder and the per-kind properties
//! (delayed, host-only, admin-only, rate limit).
//!
//! Envelope layout: `[by: i32][tag: u8][payload]`.

pub mod queue;
pub mod rate_limit;

use tracing::{debug, warn};

use crate::core::codec::{CodecError, CodecResult, StreamReader, StreamWriter};
use crate::core::compress::{deflate, inflate};
use crate::game::input::InputFrame;
use crate::game::player::{PlayerId, HOST_ID, MAX_HANDICAP};
use crate::game::room::Room;
use crate::game::state::KickRateLimit;
use crate::game::team::{Team, TeamColors};
use crate::physics::DiscPatch;
use crate::stadium::{binary, Stadium};

pub use queue::{PendingQueue, Scheduled};
pub use rate_limit::{BucketSpec, RateLimiter, TokenBucket};

/// Longest announcement in characters.
pub const MAX_ANNOUNCEMENT: usize = 1000;
/// Longest chat line in characters.
pub const MAX_CHAT: usize = 140;
/// Longest kick reason in characters.
pub const MAX_REASON: usize = 100;
/// Longest avatar in characters.
pub const MAX_AVATAR: usize = 2;

// =============================================================================
// KINDS
// =============================================================================

/// Tag of an action kind. Values are stable wire identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ActionKind {
    /// Host announcement
    Announce = 0,
    /// Typing indicator
    ChatIndicator = 1,
    /// Replace the stadium
    SetStadium = 2,
    /// Player input word
    PlayerInput = 3,
    /// Chat line
    Chat = 4,
    /// New player
    PlayerJoin = 5,
    /// Leave, kick or ban
    PlayerLeave = 6,
    /// Start the match
    StartGame = 7,
    /// Stop the match
    StopGame = 8,
    /// Pause toggle
    SetPaused = 9,
    /// Score or time limit
    SetGameSetting = 10,
    /// Own input handicap
    SetHandicap = 11,
    /// Team move
    SetTeam = 12,
    /// Teams lock
    SetTeamsLock = 13,
    /// Admin rights
    SetAdmin = 14,
    /// Move a spectator onto a team
    AutoTeamBalance = 15,
    /// Checksum mismatch report
    ReportDesync = 16,
    /// Ping table
    BroadcastPings = 17,
    /// Own avatar
    SetAvatar = 18,
    /// Team colors
    SetTeamColors = 19,
    /// Roster order
    ReorderPlayers = 20,
    /// Kick rate limit
    SetKickRateLimit = 21,
    /// Host-set avatar
    SetHeadlessAvatar = 22,
    /// Direct disc overwrite
    DiscUpdate = 23,
}

impl ActionKind {
    /// Every kind, indexed by tag.
    pub const ALL: [ActionKind; 24] = [
        Self::Announce,
        Self::ChatIndicator,
        Self::SetStadium,
        Self::PlayerInput,
        Self::Chat,
        Self::PlayerJoin,
        Self::PlayerLeave,
        Self::StartGame,
        Self::StopGame,
        Self::SetPaused,
        Self::SetGameSetting,
        Self::SetHandicap,
        Self::SetTeam,
        Self::SetTeamsLock,
        Self::SetAdmin,
        Self::AutoTeamBalance,
        Self::ReportDesync,
        Self::BroadcastPings,
        Self::SetAvatar,
        Self::SetTeamColors,
        Self::ReorderPlayers,
        Self::SetKickRateLimit,
        Self::SetHeadlessAvatar,
        Self::DiscUpdate,
    ];

    /// Wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Whether the action applies at a scheduled future frame.
    pub fn is_delayed(self) -> bool {
        !matches!(
            self,
            Self::Chat
                | Self::ChatIndicator
                | Self::Announce
                | Self::BroadcastPings
                | Self::ReportDesync
                | Self::SetAvatar
        )
    }

    /// Whether only the host may send it.
    pub fn is_host_only(self) -> bool {
        matches!(
            self,
            Self::Announce
                | Self::PlayerJoin
                | Self::PlayerLeave
                | Self::BroadcastPings
                | Self::ReorderPlayers
                | Self::SetHeadlessAvatar
                | Self::DiscUpdate
        )
    }

    /// Whether a client sending it expects a sequence-numbered echo.
    pub fn is_confirmable(self) -> bool {
        !self.is_host_only() || self == Self::PlayerLeave
    }

    /// Whether the sender needs admin rights.
    pub fn is_admin_only(self) -> bool {
        matches!(
            self,
            Self::SetStadium
                | Self::StartGame
                | Self::StopGame
                | Self::SetPaused
                | Self::SetGameSetting
                | Self::SetTeamsLock
                | Self::SetAdmin
                | Self::AutoTeamBalance
                | Self::SetTeamColors
                | Self::SetKickRateLimit
        )
    }

    /// Per-sender token bucket, if the kind is rate limited.
    pub fn rate_limit(self) -> Option<BucketSpec> {
        let (capacity, refill_ticks) = match self {
            Self::Chat => (4, 120),
            Self::ChatIndicator => (4, 60),
            Self::SetAvatar => (2, 180),
            Self::SetHandicap => (2, 180),
            Self::SetTeam => (8, 30),
            _ => return None,
        };
        Some(BucketSpec { capacity, refill_ticks })
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Which room rule a [`Action::SetGameSetting`] changes.
pub const SETTING_SCORE_LIMIT: i32 = 0;
/// See [`SETTING_SCORE_LIMIT`].
pub const SETTING_TIME_LIMIT: i32 = 1;

/// A room mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Host announcement
    Announce {
        /// Message
        text: String,
        /// Text color
        color: i32,
        /// Style index
        style: u8,
        /// Sound index
        sound: u8,
    },
    /// Typing indicator
    ChatIndicator {
        /// Typing
        active: bool,
    },
    /// Replace the stadium
    SetStadium {
        /// New stadium
        stadium: Box<Stadium>,
    },
    /// Sender's input word
    PlayerInput {
        /// Input bits
        input: u32,
    },
    /// Chat line from the sender
    Chat {
        /// Message
        text: String,
    },
    /// New player
    PlayerJoin {
        /// Assigned id
        id: PlayerId,
        /// Display name
        name: String,
        /// Country code
        country: Option<String>,
        /// Avatar
        avatar: Option<String>,
    },
    /// Player leaves, or is kicked or banned
    PlayerLeave {
        /// Target
        id: PlayerId,
        /// Kick reason, `None` for a leave
        reason: Option<String>,
        /// Ban
        ban: bool,
    },
    /// Start the match
    StartGame,
    /// Stop the match
    StopGame,
    /// Pause or resume
    SetPaused {
        /// New value
        paused: bool,
    },
    /// Change a room rule
    SetGameSetting {
        /// [`SETTING_SCORE_LIMIT`] or [`SETTING_TIME_LIMIT`]
        setting: i32,
        /// New value
        value: i32,
    },
    /// Sender's handicap in ms
    SetHandicap {
        /// Handicap
        handicap: u16,
    },
    /// Move a player
    SetTeam {
        /// Target
        player: PlayerId,
        /// Destination
        team: Team,
    },
    /// Lock or unlock teams
    SetTeamsLock {
        /// New value
        locked: bool,
    },
    /// Grant or revoke admin
    SetAdmin {
        /// Target
        player: PlayerId,
        /// New value
        admin: bool,
    },
    /// Move the first spectator onto the smaller team
    AutoTeamBalance,
    /// Sender saw a checksum mismatch
    ReportDesync,
    /// Pings in roster order
    BroadcastPings {
        /// Milliseconds
        pings: Vec<u32>,
    },
    /// Sender's avatar
    SetAvatar {
        /// Avatar
        avatar: Option<String>,
    },
    /// Team colors
    SetTeamColors {
        /// Team
        team: Team,
        /// Colors
        colors: TeamColors,
    },
    /// Move players to the top or bottom of the roster
    ReorderPlayers {
        /// Top or bottom
        to_top: bool,
        /// Players, in order
        ids: Vec<PlayerId>,
    },
    /// Kick rate limit
    SetKickRateLimit {
        /// Cooldown ticks
        min: i32,
        /// Kick cost
        rate: i32,
        /// Banked kicks
        burst: i32,
    },
    /// Host-set avatar of a player
    SetHeadlessAvatar {
        /// Avatar
        avatar: Option<String>,
        /// Target
        player: PlayerId,
    },
    /// Overwrite disc fields
    DiscUpdate {
        /// World index, or player id when `player` is set
        disc: i32,
        /// Whether `disc` is a player id
        player: bool,
        /// Fields to overwrite
        patch: DiscPatch,
    },
}

impl Action {
    /// Kind of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Announce { .. } => ActionKind::Announce,
            Self::ChatIndicator { .. } => ActionKind::ChatIndicator,
            Self::SetStadium { .. } => ActionKind::SetStadium,
            Self::PlayerInput { .. } => ActionKind::PlayerInput,
            Self::Chat { .. } => ActionKind::Chat,
            Self::PlayerJoin { .. } => ActionKind::PlayerJoin,
            Self::PlayerLeave { .. } => ActionKind::PlayerLeave,
            Self::StartGame => ActionKind::StartGame,
            Self::StopGame => ActionKind::StopGame,
            Self::SetPaused { .. } => ActionKind::SetPaused,
            Self::SetGameSetting { .. } => ActionKind::SetGameSetting,
            Self::SetHandicap { .. } => ActionKind::SetHandicap,
            Self::SetTeam { .. } => ActionKind::SetTeam,
            Self::SetTeamsLock { .. } => ActionKind::SetTeamsLock,
            Self::SetAdmin { .. } => ActionKind::SetAdmin,
            Self::AutoTeamBalance => ActionKind::AutoTeamBalance,
            Self::ReportDesync => ActionKind::ReportDesync,
            Self::BroadcastPings { .. } => ActionKind::BroadcastPings,
            Self::SetAvatar { .. } => ActionKind::SetAvatar,
            Self::SetTeamColors { .. } => ActionKind::SetTeamColors,
            Self::ReorderPlayers { .. } => ActionKind::ReorderPlayers,
            Self::SetKickRateLimit { .. } => ActionKind::SetKickRateLimit,
            Self::SetHeadlessAvatar { .. } => ActionKind::SetHeadlessAvatar,
            Self::DiscUpdate { .. } => ActionKind::DiscUpdate,
        }
    }

    /// Whether `by` may perform this action in `room`.
    pub fn is_authorized(&self, room: &Room, by: PlayerId) -> bool {
        let kind = self.kind();
        if by != HOST_ID && room.player(by).is_none() {
            return false;
        }
        match self {
            Self::PlayerLeave { id, .. } => by == HOST_ID || *id == by,
            Self::SetTeam { player, .. } => {
                (*player == by && !room.teams_lock) || room.is_admin(by)
            }
            _ if kind.is_host_only() => by == HOST_ID,
            _ if kind.is_admin_only() => room.is_admin(by),
            _ => true,
        }
    }

    /// Apply to `room` on behalf of `by`. Unauthorized actions do nothing.
    pub fn apply(&self, room: &mut Room, by: PlayerId) {
        if !self.is_authorized(room, by) {
            debug!(kind = ?self.kind(), by, "unauthorized action ignored");
            return;
        }
        match self {
            Self::Announce { text, color, style, sound } => {
                room.announce(text, *color, *style, *sound)
            }
            Self::ChatIndicator { active } => room.set_chat_indicator(by, *active),
            Self::SetStadium { stadium } => {
                room.set_stadium(stadium.as_ref().clone(), by);
            }
            Self::PlayerInput { input } => room.set_input(by, InputFrame::new(*input)),
            Self::Chat { text } => room.chat(by, text),
            Self::PlayerJoin { id, name, country, avatar } => {
                room.add_player(*id, name, country.clone(), avatar.clone());
            }
            Self::PlayerLeave { id, reason, ban } => {
                room.remove_player(*id, reason.clone(), *ban, by);
            }
            Self::StartGame => {
                room.start_game(by);
            }
            Self::StopGame => {
                room.stop_game(Some(by));
            }
            Self::SetPaused { paused } => {
                room.set_paused(by, *paused);
            }
            Self::SetGameSetting { setting, value } => {
                let Ok(value) = u32::try_from(*value) else {
                    return;
                };
                match *setting {
                    SETTING_SCORE_LIMIT => {
                        room.set_score_limit(value);
                    }
                    SETTING_TIME_LIMIT => {
                        room.set_time_limit(value);
                    }
                    _ => {}
                }
            }
            Self::SetHandicap { handicap } => room.set_handicap(by, *handicap),
            Self::SetTeam { player, team } => {
                room.set_player_team(by, *player, *team);
            }
            Self::SetTeamsLock { locked } => room.set_teams_lock(*locked),
            Self::SetAdmin { player, admin } => {
                room.set_admin(by, *player, *admin);
            }
            Self::AutoTeamBalance => {
                room.auto_balance_one();
            }
            Self::ReportDesync => {
                warn!(player = by, frame = room.frame, "desync reported");
                room.mark_desynced(by);
            }
            Self::BroadcastPings { pings } => room.set_pings(pings),
            Self::SetAvatar { avatar } => room.set_avatar(by, avatar.clone()),
            Self::SetTeamColors { team, colors } => room.set_team_colors(*team, colors.clone()),
            Self::ReorderPlayers { to_top, ids } => room.reorder_players(ids, *to_top),
            Self::SetKickRateLimit { min, rate, burst } => room.set_kick_rate_limit(KickRateLimit {
                min: (*min).max(0),
                rate: (*rate).max(0),
                burst: (*burst).max(0),
            }),
            Self::SetHeadlessAvatar { avatar, player } => {
                room.set_headless_avatar(*player, avatar.clone())
            }
            Self::DiscUpdate { disc, player, patch } => room.update_disc(*disc, *player, patch),
        }
    }

    /// Write `[tag][payload]`. Fails only when a stadium payload cannot be
    /// deflated.
    pub fn encode(&self, w: &mut StreamWriter) -> CodecResult<()> {
        w.write_u8(self.kind().tag());
        match self {
            Self::Announce { text, color, style, sound } => {
                w.write_string(text);
                w.write_i32(*color);
                w.write_u8(*style);
                w.write_u8(*sound);
            }
            Self::ChatIndicator { active } => w.write_bool(*active),
            Self::SetStadium { stadium } => {
                let mut inner = StreamWriter::new(w.endian());
                binary::encode(stadium, &mut inner);
                w.write_len_bytes(&deflate(inner.as_bytes())?);
            }
            Self::PlayerInput { input } => w.write_u32(*input),
            Self::Chat { text } => w.write_string(text),
            Self::PlayerJoin { id, name, country, avatar } => {
                w.write_i32(*id);
                w.write_string(name);
                w.write_opt_string(country.as_deref());
                w.write_opt_string(avatar.as_deref());
            }
            Self::PlayerLeave { id, reason, ban } => {
                w.write_i32(*id);
                w.write_opt_string(reason.as_deref());
                w.write_bool(*ban);
            }
            Self::StartGame | Self::StopGame | Self::AutoTeamBalance | Self::ReportDesync => {}
            Self::SetPaused { paused } => w.write_bool(*paused),
            Self::SetGameSetting { setting, value } => {
                w.write_i32(*setting);
                w.write_i32(*value);
            }
            Self::SetHandicap { handicap } => w.write_u16(*handicap),
            Self::SetTeam { player, team } => {
                w.write_i32(*player);
                w.write_u8(team.id());
            }
            Self::SetTeamsLock { locked } => w.write_bool(*locked),
            Self::SetAdmin { player, admin } => {
                w.write_i32(*player);
                w.write_bool(*admin);
            }
            Self::BroadcastPings { pings } => {
                w.write_varint(pings.len() as u32);
                for p in pings {
                    w.write_varint(*p);
                }
            }
            Self::SetAvatar { avatar } => w.write_opt_string(avatar.as_deref()),
            Self::SetTeamColors { team, colors } => {
                w.write_u8(team.id());
                colors.encode(w);
            }
            Self::ReorderPlayers { to_top, ids } => {
                w.write_bool(*to_top);
                let count = ids.len().min(u8::MAX as usize);
                w.write_u8(count as u8);
                for id in &ids[..count] {
                    w.write_i32(*id);
                }
            }
            Self::SetKickRateLimit { min, rate, burst } => {
                w.write_i32(*min);
                w.write_i32(*rate);
                w.write_i32(*burst);
            }
            Self::SetHeadlessAvatar { avatar, player } => {
                w.write_opt_string(avatar.as_deref());
                w.write_i32(*player);
            }
            Self::DiscUpdate { disc, player, patch } => {
                w.write_i32(*disc);
                w.write_bool(*player);
                patch.encode(w);
            }
        }
        Ok(())
    }

    /// Read `[tag][payload]`. Unknown tags fail the whole decode.
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        let tag = r.read_u8()?;
        let kind = ActionKind::from_tag(tag).ok_or(CodecError::UnknownTag { kind: "action", tag })?;
        let action = match kind {
            ActionKind::Announce => Self::Announce {
                text: r.read_string_max(MAX_ANNOUNCEMENT)?,
                color: r.read_i32()?,
                style: r.read_u8()?,
                sound: r.read_u8()?,
            },
            ActionKind::ChatIndicator => Self::ChatIndicator { active: r.read_bool()? },
            ActionKind::SetStadium => {
                let packed = inflate(r.read_len_bytes()?)?;
                let mut inner = StreamReader::new(&packed, r.endian());
                Self::SetStadium { stadium: Box::new(binary::decode(&mut inner)?) }
            }
            ActionKind::PlayerInput => Self::PlayerInput { input: r.read_u32()? },
            ActionKind::Chat => Self::Chat { text: r.read_string_max(MAX_CHAT)? },
            ActionKind::PlayerJoin => Self::PlayerJoin {
                id: r.read_i32()?,
                name: r.read_string()?,
                country: r.read_opt_string()?,
                avatar: r.read_opt_string_max(MAX_AVATAR)?,
            },
            ActionKind::PlayerLeave => Self::PlayerLeave {
                id: r.read_i32()?,
                reason: r.read_opt_string_max(MAX_REASON)?,
                ban: r.read_bool()?,
            },
            ActionKind::StartGame => Self::StartGame,
            ActionKind::StopGame => Self::StopGame,
            ActionKind::SetPaused => Self::SetPaused { paused: r.read_bool()? },
            ActionKind::SetGameSetting => Self::SetGameSetting {
                setting: r.read_i32()?,
                value: r.read_i32()?,
            },
            ActionKind::SetHandicap => Self::SetHandicap {
                handicap: r.read_u16()?.min(MAX_HANDICAP),
            },
            ActionKind::SetTeam => Self::SetTeam {
                player: r.read_i32()?,
                team: Team::decode(r)?,
            },
            ActionKind::SetTeamsLock => Self::SetTeamsLock { locked: r.read_bool()? },
            ActionKind::SetAdmin => Self::SetAdmin {
                player: r.read_i32()?,
                admin: r.read_bool()?,
            },
            ActionKind::AutoTeamBalance => Self::AutoTeamBalance,
            ActionKind::ReportDesync => Self::ReportDesync,
            ActionKind::BroadcastPings => {
                let count = r.read_varint()? as usize;
                let mut pings = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    pings.push(r.read_varint()?);
                }
                Self::BroadcastPings { pings }
            }
            ActionKind::SetAvatar => Self::SetAvatar {
                avatar: r.read_opt_string_max(MAX_AVATAR)?,
            },
            ActionKind::SetTeamColors => {
                let team = Team::decode(r)?;
                if !team.is_playing() {
                    return Err(CodecError::InvalidValue { field: "team colors team", value: 0 });
                }
                Self::SetTeamColors { team, colors: TeamColors::decode(r)? }
            }
            ActionKind::ReorderPlayers => {
                let to_top = r.read_bool()?;
                let count = r.read_u8()? as usize;
                let mut ids = Vec::with_capacity(count);
                for _ in 0..count {
                    ids.push(r.read_i32()?);
                }
                Self::ReorderPlayers { to_top, ids }
            }
            ActionKind::SetKickRateLimit => Self::SetKickRateLimit {
                min: r.read_i32()?,
                rate: r.read_i32()?,
                burst: r.read_i32()?,
            },
            ActionKind::SetHeadlessAvatar => Self::SetHeadlessAvatar {
                avatar: r.read_opt_string_max(MAX_AVATAR)?,
                player: r.read_i32()?,
            },
            ActionKind::DiscUpdate => Self::DiscUpdate {
                disc: r.read_i32()?,
                player: r.read_bool()?,
                patch: DiscPatch::decode(r)?,
            },
        };
        Ok(action)
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// An action together with its sender.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionEnvelope {
    /// Sender, [`HOST_ID`] for the host
    pub by: PlayerId,
    /// The action
    pub action: Action,
}

impl ActionEnvelope {
    /// Wrap an action.
    pub fn new(by: PlayerId, action: Action) -> Self {
        Self { by, action }
    }

    /// Wrap a host action.
    pub fn host(action: Action) -> Self {
        Self::new(HOST_ID, action)
    }

    /// Apply to a room.
    pub fn apply(&self, room: &mut Room) {
        self.action.apply(room, self.by);
    }

    /// Write `[by][tag][payload]`.
    pub fn encode(&self, w: &mut StreamWriter) -> CodecResult<()> {
        w.write_i32(self.by);
        self.action.encode(w)
    }

    /// Read an envelope written by [`ActionEnvelope::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            by: r.read_i32()?,
            action: Action::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::Endian;

    fn every_kind() -> Vec<Action> {
        let mut patch = DiscPatch::default();
        patch.floats[0] = Some(12.5);
        patch.ints[0] = Some(0x00FF00);
        let mut custom = Stadium::small();
        custom.builtin = None;
        vec![
            Action::Announce { text: "welcome".into(), color: 0xFFCC00, style: 1, sound: 2 },
            Action::ChatIndicator { active: true },
            Action::SetStadium { stadium: Box::new(custom) },
            Action::PlayerInput { input: 17 },
            Action::Chat { text: "gg".into() },
            Action::PlayerJoin {
                id: 4,
                name: "dana".into(),
                country: Some("br".into()),
                avatar: None,
            },
            Action::PlayerLeave { id: 4, reason: Some("afk".into()), ban: true },
            Action::StartGame,
            Action::StopGame,
            Action::SetPaused { paused: true },
            Action::SetGameSetting { setting: SETTING_TIME_LIMIT, value: 5 },
            Action::SetHandicap { handicap: 120 },
            Action::SetTeam { player: 4, team: Team::Blue },
            Action::SetTeamsLock { locked: true },
            Action::SetAdmin { player: 4, admin: true },
            Action::AutoTeamBalance,
            Action::ReportDesync,
            Action::BroadcastPings { pings: vec![12, 300, 70_000] },
            Action::SetAvatar { avatar: Some("⚽".into()) },
            Action::SetTeamColors {
                team: Team::Red,
                colors: TeamColors { angle: 60, text_color: 0xFFFFFF, stripes: vec![0xFF0000, 0x000000] },
            },
            Action::ReorderPlayers { to_top: true, ids: vec![3, 1] },
            Action::SetKickRateLimit { min: 3, rate: 6, burst: 2 },
            Action::SetHeadlessAvatar { avatar: Some("7".into()), player: 4 },
            Action::DiscUpdate { disc: 0, player: false, patch },
        ]
    }

    #[test]
    fn test_every_kind_roundtrips() {
        let actions = every_kind();
        assert_eq!(actions.len(), ActionKind::ALL.len());
        for (action, kind) in actions.iter().zip(ActionKind::ALL) {
            assert_eq!(action.kind(), kind);
            for endian in [Endian::Little, Endian::Big] {
                let env = ActionEnvelope::new(9, action.clone());
                let mut w = StreamWriter::new(endian);
                env.encode(&mut w).unwrap();
                let bytes = w.into_bytes();
                let mut r = StreamReader::new(&bytes, endian);
                assert_eq!(ActionEnvelope::decode(&mut r).unwrap(), env);
                assert!(r.is_empty());
            }
        }
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let bytes = [0, 0, 0, 0, 99];
        let err = ActionEnvelope::decode(&mut StreamReader::little(&bytes)).unwrap_err();
        assert_eq!(err, CodecError::UnknownTag { kind: "action", tag: 99 });
    }

    #[test]
    fn test_chat_length_enforced() {
        let mut w = StreamWriter::little();
        w.write_u8(ActionKind::Chat.tag());
        w.write_string(&"x".repeat(MAX_CHAT + 1));
        let bytes = w.into_bytes();
        assert!(matches!(
            Action::decode(&mut StreamReader::little(&bytes)),
            Err(CodecError::StringTooLong { .. })
        ));
    }

    #[test]
    fn test_kind_flags() {
        assert!(!ActionKind::Chat.is_delayed());
        assert!(ActionKind::PlayerInput.is_delayed());
        assert!(ActionKind::SetTeam.is_confirmable());
        assert!(!ActionKind::DiscUpdate.is_confirmable());
        assert!(ActionKind::StartGame.is_admin_only());
        assert_eq!(ActionKind::Chat.rate_limit().unwrap().capacity, 4);
        assert!(ActionKind::StartGame.rate_limit().is_none());
        assert_eq!(ActionKind::from_tag(23), Some(ActionKind::DiscUpdate));
        assert_eq!(ActionKind::from_tag(24), None);
    }

    #[test]
    fn test_authorization() {
        let mut room = Room::new("r", Stadium::classic());
        ActionEnvelope::host(Action::PlayerJoin { id: 1, name: "a".into(), country: None, avatar: None })
            .apply(&mut room);
        ActionEnvelope::host(Action::PlayerJoin { id: 2, name: "b".into(), country: None, avatar: None })
            .apply(&mut room);

        // Non-admin cannot start, can move self.
        ActionEnvelope::new(1, Action::StartGame).apply(&mut room);
        assert!(room.game.is_none());
        ActionEnvelope::new(1, Action::SetTeam { player: 1, team: Team::Red }).apply(&mut room);
        assert_eq!(room.player(1).unwrap().team, Team::Red);

        // Cannot move others, nor join as someone.
        ActionEnvelope::new(1, Action::SetTeam { player: 2, team: Team::Red }).apply(&mut room);
        assert_eq!(room.player(2).unwrap().team, Team::Spectator);
        ActionEnvelope::new(1, Action::PlayerJoin { id: 5, name: "x".into(), country: None, avatar: None })
            .apply(&mut room);
        assert!(room.player(5).is_none());

        // Locked teams need admin even for self.
        ActionEnvelope::host(Action::SetTeamsLock { locked: true }).apply(&mut room);
        ActionEnvelope::new(2, Action::SetTeam { player: 2, team: Team::Blue }).apply(&mut room);
        assert_eq!(room.player(2).unwrap().team, Team::Spectator);

        ActionEnvelope::host(Action::SetAdmin { player: 2, admin: true }).apply(&mut room);
        ActionEnvelope::new(2, Action::SetTeam { player: 2, team: Team::Blue }).apply(&mut room);
        ActionEnvelope::new(2, Action::StartGame).apply(&mut room);
        assert_eq!(room.player(2).unwrap().team, Team::Blue);
        assert!(room.game.is_some());

        // Anyone may leave on their own.
        ActionEnvelope::new(1, Action::PlayerLeave { id: 1, reason: None, ban: false }).apply(&mut room);
        assert!(room.player(1).is_none());
    }

    #[test]
    fn test_leave_twice_is_noop() {
        let mut room = Room::new("r", Stadium::classic());
        ActionEnvelope::host(Action::PlayerJoin { id: 1, name: "a".into(), country: None, avatar: None })
            .apply(&mut room);
        let leave = ActionEnvelope::host(Action::PlayerLeave { id: 1, reason: None, ban: false });
        leave.apply(&mut room);
        let once = room.to_bytes(Endian::Little);
        leave.apply(&mut room);
        assert_eq!(room.to_bytes(Endian::Little), once);
    }
}
