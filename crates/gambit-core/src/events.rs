//! Records from the two server feeds, decoded into closed sets of variants.
//!
//! Both feeds are newline-delimited JSON objects tagged by a `type` field.
//! Decoding happens once, at the stream boundary; nothing downstream looks
//! at raw JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::game::{split_moves, Side, TerminalStatus};
use crate::ids::{ChallengeId, SessionId};

/// A record that could not be turned into an event.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("record has no string `type` tag")]
    MissingTag,
    #[error("malformed `{tag}` record: {message}")]
    Payload { tag: String, message: String },
}

/// The opponent that issued a challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenger {
    pub id: Option<String>,
    pub bot: bool,
}

/// A freshly created challenge awaiting accept/decline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub variant: Option<String>,
    pub challenger: Option<Challenger>,
}

/// Records from the account-wide event feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    ChallengeCreated(Challenge),
    /// A challenge record in any status other than `created`.
    ChallengeUpdate { id: ChallengeId, status: String },
    SessionStart(SessionId),
    Unknown { tag: String },
}

/// Move list and status as carried by both snapshot records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub moves: Vec<String>,
    pub status: Option<String>,
}

impl GameState {
    pub fn terminal(&self) -> Option<TerminalStatus> {
        self.status.as_deref().and_then(TerminalStatus::parse)
    }
}

/// First record of a session feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullState {
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    /// Explicit side hint, used only when the participant ids are inconclusive.
    pub bot_side: Option<Side>,
    /// `None` when the record arrived without its embedded state.
    pub state: Option<GameState>,
}

impl FullState {
    /// Which side `local_id` plays, by id comparison first, then the explicit hint.
    pub fn side_for(&self, local_id: &str) -> Option<Side> {
        if self.white_id.as_deref() == Some(local_id) {
            Some(Side::White)
        } else if self.black_id.as_deref() == Some(local_id) {
            Some(Side::Black)
        } else {
            self.bot_side
        }
    }
}

/// Records from a single session's feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Full(FullState),
    State(GameState),
    Chat {
        username: String,
        room: String,
        text: String,
    },
    OpponentGone {
        gone: bool,
        claim_win_in_seconds: Option<u64>,
    },
    Unknown { tag: String },
}

// --- Wire shapes ---

#[derive(Deserialize)]
struct WireChallengeEnvelope {
    challenge: WireChallenge,
}

#[derive(Deserialize)]
struct WireChallenge {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    variant: Option<WireVariant>,
    #[serde(default)]
    challenger: Option<WirePlayer>,
}

#[derive(Deserialize)]
struct WireVariant {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Deserialize)]
struct WirePlayer {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    bot: Option<bool>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct WireGameStartEnvelope {
    game: WireGameRef,
}

#[derive(Deserialize)]
struct WireGameRef {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "gameId")]
    game_id: Option<String>,
}

#[derive(Deserialize)]
struct WireGameFull {
    #[serde(default)]
    white: Option<WirePlayer>,
    #[serde(default)]
    black: Option<WirePlayer>,
    #[serde(default, rename = "botSide")]
    bot_side: Option<String>,
    #[serde(default)]
    state: Option<WireGameState>,
}

#[derive(Deserialize)]
struct WireGameState {
    #[serde(default)]
    moves: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct WireChatLine {
    #[serde(default)]
    username: String,
    #[serde(default)]
    room: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct WireOpponentGone {
    #[serde(default)]
    gone: bool,
    #[serde(default, rename = "claimWinInSeconds")]
    claim_win_in_seconds: Option<u64>,
}

impl From<WireGameState> for GameState {
    fn from(w: WireGameState) -> Self {
        Self {
            moves: split_moves(&w.moves),
            status: w.status,
        }
    }
}

fn split_tag(line: &str) -> Result<(String, Value), DecodeError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| DecodeError::Json(e.to_string()))?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingTag)?
        .to_string();
    Ok((tag, value))
}

fn payload<T: for<'de> Deserialize<'de>>(tag: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::Payload {
        tag: tag.to_string(),
        message: e.to_string(),
    })
}

impl LifecycleEvent {
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let (tag, value) = split_tag(line)?;
        match tag.as_str() {
            "challenge" => {
                let env: WireChallengeEnvelope = payload(&tag, value)?;
                let c = env.challenge;
                let id = ChallengeId::from_raw(c.id);
                match c.status.as_deref() {
                    Some("created") => Ok(Self::ChallengeCreated(Challenge {
                        id,
                        variant: c.variant.and_then(|v| v.key),
                        challenger: c.challenger.map(|p| Challenger {
                            bot: p.bot == Some(true) || p.title.as_deref() == Some("BOT"),
                            id: p.id,
                        }),
                    })),
                    other => Ok(Self::ChallengeUpdate {
                        id,
                        status: other.unwrap_or_default().to_string(),
                    }),
                }
            }
            "gameStart" => {
                let env: WireGameStartEnvelope = payload(&tag, value)?;
                let id = env
                    .game
                    .id
                    .or(env.game.game_id)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| DecodeError::Payload {
                        tag: tag.clone(),
                        message: "missing game id".into(),
                    })?;
                Ok(Self::SessionStart(SessionId::from_raw(id)))
            }
            _ => Ok(Self::Unknown { tag }),
        }
    }
}

impl SessionEvent {
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let (tag, value) = split_tag(line)?;
        match tag.as_str() {
            "gameFull" => {
                let w: WireGameFull = payload(&tag, value)?;
                Ok(Self::Full(FullState {
                    white_id: w.white.and_then(|p| p.id),
                    black_id: w.black.and_then(|p| p.id),
                    bot_side: w.bot_side.as_deref().and_then(Side::from_wire),
                    state: w.state.map(GameState::from),
                }))
            }
            "gameState" => {
                let w: WireGameState = payload(&tag, value)?;
                Ok(Self::State(w.into()))
            }
            "chatLine" => {
                let w: WireChatLine = payload(&tag, value)?;
                Ok(Self::Chat {
                    username: w.username,
                    room: w.room,
                    text: w.text,
                })
            }
            "opponentGone" => {
                let w: WireOpponentGone = payload(&tag, value)?;
                Ok(Self::OpponentGone {
                    gone: w.gone,
                    claim_win_in_seconds: w.claim_win_in_seconds,
                })
            }
            _ => Ok(Self::Unknown { tag }),
        }
    }
}
