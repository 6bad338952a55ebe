//! Game modes and AI difficulty tiers.

use derive_more::{Display, Error};
use std::str::FromStr;

/// AI difficulty tier. String form matches the wire format (`EASY`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Difficulty {
    /// Reactive bot: immediate wins, otherwise random.
    Easy,
    /// Shallow minimax search.
    Medium,
    /// Deep minimax search with a sharper evaluator.
    Hard,
}

impl Difficulty {
    /// Difficulty used when the client omits one.
    pub const DEFAULT: Difficulty = Difficulty::Easy;
}

/// Error produced when a mode string cannot be interpreted.
#[derive(Debug, Clone, Display, Error)]
#[display("Unsupported game mode: {mode}")]
pub struct ModeParseError {
    /// The offending mode string.
    pub mode: String,
}

/// How the two seats of a game are occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// Human vs human.
    Pvp,
    /// Human (side A) vs AI (side B) at the given difficulty.
    Pve(Difficulty),
    /// Two AI seats, spectated; difficulties for side A and side B.
    Ava(Difficulty, Difficulty),
}

impl GameMode {
    /// Database/wire string, e.g. `PVP`, `PVE_EASY`, `AVA_EASY_VS_HARD`.
    pub fn as_db_string(&self) -> String {
        match self {
            GameMode::Pvp => "PVP".to_string(),
            GameMode::Pve(d) => format!("PVE_{d}"),
            GameMode::Ava(a, b) => format!("AVA_{a}_VS_{b}"),
        }
    }

    /// Parses the stored mode string.
    pub fn from_db_str(s: &str) -> Result<Self, ModeParseError> {
        let err = || ModeParseError { mode: s.to_string() };
        if s == "PVP" {
            return Ok(GameMode::Pvp);
        }
        if let Some(rest) = s.strip_prefix("PVE_") {
            let d = Difficulty::from_str(rest).map_err(|_| err())?;
            return Ok(GameMode::Pve(d));
        }
        if let Some(rest) = s.strip_prefix("AVA_") {
            let (a, b) = rest.split_once("_VS_").ok_or_else(err)?;
            let a = Difficulty::from_str(a).map_err(|_| err())?;
            let b = Difficulty::from_str(b).map_err(|_| err())?;
            return Ok(GameMode::Ava(a, b));
        }
        Err(err())
    }

    /// True for AI-vs-AI games, where clients are spectators only.
    pub fn is_ava(&self) -> bool {
        matches!(self, GameMode::Ava(_, _))
    }

    /// True for human-vs-AI games.
    pub fn is_pve(&self) -> bool {
        matches!(self, GameMode::Pve(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in [
            GameMode::Pvp,
            GameMode::Pve(Difficulty::Medium),
            GameMode::Ava(Difficulty::Easy, Difficulty::Hard),
        ] {
            let s = mode.as_db_string();
            assert_eq!(GameMode::from_db_str(&s).expect("parse failed"), mode);
        }
    }

    #[test]
    fn test_mode_strings_match_wire_format() {
        assert_eq!(GameMode::Pve(Difficulty::Easy).as_db_string(), "PVE_EASY");
        assert_eq!(
            GameMode::Ava(Difficulty::Medium, Difficulty::Hard).as_db_string(),
            "AVA_MEDIUM_VS_HARD"
        );
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(GameMode::from_db_str("PVE_IMPOSSIBLE").is_err());
        assert!(GameMode::from_db_str("AVA_EASY").is_err());
        assert!(GameMode::from_db_str("chess").is_err());
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::from_str("HARD").ok(), Some(Difficulty::Hard));
        assert!(Difficulty::from_str("BRUTAL").is_err());
    }
}
