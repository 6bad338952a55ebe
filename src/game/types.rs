//! Core domain types for Side-Stacker.

use serde::{Deserialize, Serialize};

/// Number of rows on the board.
pub const ROWS: usize = 7;

/// Number of columns on the board.
pub const COLS: usize = 7;

/// Number of consecutive pieces required to win.
pub const CONNECT_N: usize = 4;

/// A player piece. Side A plays X and moves first; side B plays O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Piece {
    /// Side A's piece.
    X,
    /// Side B's piece.
    O,
}

impl Piece {
    /// Returns the opposing piece.
    pub fn opponent(self) -> Self {
        match self {
            Piece::X => Piece::O,
            Piece::O => Piece::X,
        }
    }

    /// Single-character label used in board rendering.
    pub fn symbol(self) -> char {
        match self {
            Piece::X => 'X',
            Piece::O => 'O',
        }
    }
}

/// The edge of a row a piece slides in from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntrySide {
    /// Piece enters from the left edge.
    #[serde(rename = "L")]
    Left,
    /// Piece enters from the right edge.
    #[serde(rename = "R")]
    Right,
}

impl EntrySide {
    /// Parses a client-supplied side string (`"L"` or `"R"`, case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Some(EntrySide::Left),
            "R" => Some(EntrySide::Right),
            _ => None,
        }
    }
}

/// A move intent: which row to play and which edge to slide in from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Target row index.
    pub row: usize,
    /// Entry edge.
    pub side: EntrySide,
}

impl Move {
    /// Creates a new move.
    pub fn new(row: usize, side: EntrySide) -> Self {
        Self { row, side }
    }
}

/// Lifecycle status of a game record.
///
/// Serialized values follow the wire/database format
/// (`waiting_for_player2`, `active`, `player_x_wins`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// PvP game created, second seat still open.
    #[serde(rename = "waiting_for_player2")]
    WaitingForOpponent,
    /// Game in progress.
    #[serde(rename = "active")]
    Active,
    /// Side A (X) won.
    #[serde(rename = "player_x_wins")]
    XWins,
    /// Side B (O) won.
    #[serde(rename = "player_o_wins")]
    OWins,
    /// Board filled with no winner.
    #[serde(rename = "draw")]
    Draw,
    /// Game abandoned before completion, no winner.
    #[serde(rename = "abandoned")]
    Abandoned,
    /// An AI seat failed to produce a usable move.
    #[serde(rename = "error_ai_stuck")]
    AiStuck,
}

impl GameStatus {
    /// Database/wire string for this status.
    pub fn as_db_str(self) -> &'static str {
        match self {
            GameStatus::WaitingForOpponent => "waiting_for_player2",
            GameStatus::Active => "active",
            GameStatus::XWins => "player_x_wins",
            GameStatus::OWins => "player_o_wins",
            GameStatus::Draw => "draw",
            GameStatus::Abandoned => "abandoned",
            GameStatus::AiStuck => "error_ai_stuck",
        }
    }

    /// Parses the stored status string.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "waiting_for_player2" => Some(GameStatus::WaitingForOpponent),
            "active" => Some(GameStatus::Active),
            "player_x_wins" => Some(GameStatus::XWins),
            "player_o_wins" => Some(GameStatus::OWins),
            "draw" => Some(GameStatus::Draw),
            "abandoned" => Some(GameStatus::Abandoned),
            "error_ai_stuck" => Some(GameStatus::AiStuck),
            _ => None,
        }
    }

    /// The won-status for the given piece.
    pub fn win_for(piece: Piece) -> Self {
        match piece {
            Piece::X => GameStatus::XWins,
            Piece::O => GameStatus::OWins,
        }
    }

    /// True once the game can no longer accept moves.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            GameStatus::WaitingForOpponent | GameStatus::Active
        )
    }
}

/// Winner-token sentinel recorded for drawn games.
pub const DRAW_WINNER_TOKEN: &str = "draw";

/// Token reported to AVA spectators in place of a seat token.
pub const SPECTATOR_TOKEN: &str = "SPECTATOR";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            GameStatus::WaitingForOpponent,
            GameStatus::Active,
            GameStatus::XWins,
            GameStatus::OWins,
            GameStatus::Draw,
            GameStatus::Abandoned,
            GameStatus::AiStuck,
        ] {
            assert_eq!(GameStatus::from_db_str(status.as_db_str()), Some(status));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!GameStatus::WaitingForOpponent.is_terminal());
        assert!(!GameStatus::Active.is_terminal());
        assert!(GameStatus::XWins.is_terminal());
        assert!(GameStatus::Draw.is_terminal());
        assert!(GameStatus::Abandoned.is_terminal());
        assert!(GameStatus::AiStuck.is_terminal());
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(EntrySide::parse("l"), Some(EntrySide::Left));
        assert_eq!(EntrySide::parse("R"), Some(EntrySide::Right));
        assert_eq!(EntrySide::parse("X"), None);
    }
}
