//! Seat identity: who occupies each side of a game.
//!
//! The database stores seat occupants as token strings (opaque client
//! tokens for humans, `AI_<DIFFICULTY>_PLAYER_<N>` for AI seats). Tokens
//! are decoded into [`SeatOccupant`] once when a record is loaded and
//! carried structurally from then on; gameplay never re-parses them.

use super::mode::Difficulty;
use super::types::Piece;
use std::str::FromStr;

/// Prefix marking a synthetic AI token.
const AI_TOKEN_PREFIX: &str = "AI_";

/// One of the two competing positions in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    /// Side A, plays X, moves first.
    A,
    /// Side B, plays O.
    B,
}

impl Seat {
    /// The piece this seat plays.
    pub fn piece(self) -> Piece {
        match self {
            Seat::A => Piece::X,
            Seat::B => Piece::O,
        }
    }

    /// The opposing seat.
    pub fn other(self) -> Seat {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }
}

/// The occupant of a seat: a human participant or a synthetic AI identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatOccupant {
    /// Human participant identified by their session token.
    Human(String),
    /// AI participant with its difficulty tier and seat.
    Ai {
        /// Search strength tier.
        difficulty: Difficulty,
        /// Which side the AI occupies.
        seat: Seat,
    },
}

impl SeatOccupant {
    /// Creates an AI occupant for the given tier and seat.
    pub fn ai(difficulty: Difficulty, seat: Seat) -> Self {
        SeatOccupant::Ai { difficulty, seat }
    }

    /// The token string persisted and sent over the wire for this occupant.
    pub fn token(&self) -> String {
        match self {
            SeatOccupant::Human(token) => token.clone(),
            SeatOccupant::Ai { difficulty, seat } => {
                let n = match seat {
                    Seat::A => 1,
                    Seat::B => 2,
                };
                format!("{AI_TOKEN_PREFIX}{difficulty}_PLAYER_{n}")
            }
        }
    }

    /// Decodes a stored token. Anything without the AI prefix is a human
    /// token; malformed AI-prefixed tokens also fall back to human, since
    /// an opaque client token may legally start with the same characters.
    pub fn from_token(token: &str) -> Self {
        let Some(rest) = token.strip_prefix(AI_TOKEN_PREFIX) else {
            return SeatOccupant::Human(token.to_string());
        };
        let (difficulty, seat) = if let Some(d) = rest.strip_suffix("_PLAYER_1") {
            (d, Seat::A)
        } else if let Some(d) = rest.strip_suffix("_PLAYER_2") {
            (d, Seat::B)
        } else if let Some(d) = rest.strip_suffix("_PLAYER") {
            // Legacy PvE form with no seat suffix; the AI is always side B.
            (d, Seat::B)
        } else {
            return SeatOccupant::Human(token.to_string());
        };
        match Difficulty::from_str(difficulty) {
            Ok(difficulty) => SeatOccupant::Ai { difficulty, seat },
            Err(_) => SeatOccupant::Human(token.to_string()),
        }
    }

    /// True for AI occupants.
    pub fn is_ai(&self) -> bool {
        matches!(self, SeatOccupant::Ai { .. })
    }

    /// The AI difficulty, if this occupant is an AI.
    pub fn ai_difficulty(&self) -> Option<Difficulty> {
        match self {
            SeatOccupant::Ai { difficulty, .. } => Some(*difficulty),
            SeatOccupant::Human(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_token_round_trip() {
        let occupant = SeatOccupant::ai(Difficulty::Medium, Seat::A);
        assert_eq!(occupant.token(), "AI_MEDIUM_PLAYER_1");
        assert_eq!(SeatOccupant::from_token(&occupant.token()), occupant);
    }

    #[test]
    fn test_human_token_round_trip() {
        let occupant = SeatOccupant::Human("p1".to_string());
        assert_eq!(occupant.token(), "p1");
        assert_eq!(SeatOccupant::from_token("p1"), occupant);
    }

    #[test]
    fn test_legacy_pve_token_decodes_as_side_b() {
        assert_eq!(
            SeatOccupant::from_token("AI_HARD_PLAYER"),
            SeatOccupant::ai(Difficulty::Hard, Seat::B)
        );
    }

    #[test]
    fn test_ai_prefixed_garbage_is_a_human_token() {
        let occupant = SeatOccupant::from_token("AI_CE_FAN_42");
        assert_eq!(occupant, SeatOccupant::Human("AI_CE_FAN_42".to_string()));
        assert!(!occupant.is_ai());
    }

    #[test]
    fn test_seat_pieces() {
        assert_eq!(Seat::A.piece(), Piece::X);
        assert_eq!(Seat::B.piece(), Piece::O);
        assert_eq!(Seat::A.other(), Seat::B);
    }
}
