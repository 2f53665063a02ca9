use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::OracleError;

/// Which side of the board a participant plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Side to move after `move_count` plies: white on even, black on odd.
    pub fn to_move(move_count: usize) -> Self {
        if move_count % 2 == 0 {
            Self::White
        } else {
            Self::Black
        }
    }

    /// Whether this side makes the first move of a game.
    pub fn moves_first(self) -> bool {
        self == Self::White
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "white" => Some(Self::White),
            "black" => Some(Self::Black),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A move in UCI notation (`e2e4`, `e7e8q`).
///
/// Only the shape is checked: four or five characters with no whitespace.
/// Legality is decided by the remote authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveToken(String);

impl MoveToken {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 5;

    /// Trim and validate a raw suggestion.
    pub fn parse(raw: &str) -> Result<Self, OracleError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        let len = trimmed.chars().count();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len)
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(OracleError::ImplausibleMove {
                raw: raw.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a space-separated UCI move list as sent by the server.
pub fn split_moves(moves: &str) -> Vec<String> {
    moves.split_whitespace().map(str::to_string).collect()
}

/// Closed set of statuses that end a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalStatus {
    Mate,
    Resign,
    Stalemate,
    Timeout,
    Draw,
    OutOfTime,
    Cheat,
    Aborted,
    VariantEnd,
    NoStart,
}

impl TerminalStatus {
    /// Returns `None` for statuses of a game still in progress (`started`, `created`, ...).
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "mate" => Some(Self::Mate),
            "resign" => Some(Self::Resign),
            "stalemate" => Some(Self::Stalemate),
            "timeout" => Some(Self::Timeout),
            "draw" => Some(Self::Draw),
            "outoftime" => Some(Self::OutOfTime),
            "cheat" => Some(Self::Cheat),
            "aborted" => Some(Self::Aborted),
            "variantEnd" => Some(Self::VariantEnd),
            "noStart" => Some(Self::NoStart),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mate => "mate",
            Self::Resign => "resign",
            Self::Stalemate => "stalemate",
            Self::Timeout => "timeout",
            Self::Draw => "draw",
            Self::OutOfTime => "outoftime",
            Self::Cheat => "cheat",
            Self::Aborted => "aborted",
            Self::VariantEnd => "variantEnd",
            Self::NoStart => "noStart",
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
