//! In-memory view of a persisted game: the Game Record.

use super::board::Board;
use super::mode::GameMode;
use super::seat::{Seat, SeatOccupant};
use super::types::{GameStatus, Piece};
use derive_getters::Getters;
use derive_more::{Display, Error};
use std::collections::HashMap;

/// Error produced when a stored game row cannot be decoded.
#[derive(Debug, Clone, Display, Error)]
#[display("Corrupt game record {game_id}: {detail}")]
pub struct RecordDecodeError {
    /// Id of the offending record.
    pub game_id: String,
    /// What failed to decode.
    pub detail: String,
}

/// A decoded game record.
///
/// Seat tokens are parsed into [`SeatOccupant`] values exactly once, here;
/// all gameplay logic works with the structured form. The record is a
/// read-only snapshot — mutations go through the repository's atomic
/// update and a fresh load.
#[derive(Debug, Clone, Getters)]
pub struct GameRecord {
    /// Opaque unique game id.
    id: String,
    /// How the seats are occupied.
    mode: GameMode,
    /// Side A occupant (absent only for corrupt rows).
    seat_a: Option<SeatOccupant>,
    /// Side B occupant (absent while a PvP game waits for an opponent).
    seat_b: Option<SeatOccupant>,
    /// Token of the seat that owns the current turn; absent once terminal.
    current_turn: Option<String>,
    /// Board snapshot.
    board: Board,
    /// Lifecycle status.
    status: GameStatus,
    /// Winning seat's token, or the draw sentinel.
    winner: Option<String>,
}

impl GameRecord {
    /// Decodes a record from its stored representation.
    pub fn from_parts(
        id: String,
        mode: &str,
        seat_a_token: Option<&str>,
        seat_b_token: Option<&str>,
        current_turn: Option<String>,
        board_json: &str,
        status: &str,
        winner: Option<String>,
    ) -> Result<Self, RecordDecodeError> {
        let fail = |detail: String| RecordDecodeError {
            game_id: id.clone(),
            detail,
        };
        let mode = GameMode::from_db_str(mode).map_err(|e| fail(e.to_string()))?;
        let status = GameStatus::from_db_str(status)
            .ok_or_else(|| fail(format!("unknown status '{status}'")))?;
        let board: Board = serde_json::from_str(board_json)
            .map_err(|e| fail(format!("bad board state: {e}")))?;
        Ok(Self {
            id,
            mode,
            seat_a: seat_a_token.map(SeatOccupant::from_token),
            seat_b: seat_b_token.map(SeatOccupant::from_token),
            current_turn,
            board,
            status,
            winner,
        })
    }

    /// The occupant of the given seat, if assigned.
    pub fn occupant(&self, seat: Seat) -> Option<&SeatOccupant> {
        match seat {
            Seat::A => self.seat_a.as_ref(),
            Seat::B => self.seat_b.as_ref(),
        }
    }

    /// The token bound to the given seat, if assigned.
    pub fn token_of(&self, seat: Seat) -> Option<String> {
        self.occupant(seat).map(SeatOccupant::token)
    }

    /// Finds which seat a token occupies.
    pub fn seat_of_token(&self, token: &str) -> Option<Seat> {
        if self.token_of(Seat::A).as_deref() == Some(token) {
            Some(Seat::A)
        } else if self.token_of(Seat::B).as_deref() == Some(token) {
            Some(Seat::B)
        } else {
            None
        }
    }

    /// The piece a token plays, if it occupies a seat.
    pub fn piece_for_token(&self, token: &str) -> Option<Piece> {
        self.seat_of_token(token).map(Seat::piece)
    }

    /// The token of the seat opposing the given token.
    pub fn opposing_token(&self, token: &str) -> Option<String> {
        let seat = self.seat_of_token(token)?;
        self.token_of(seat.other())
    }

    /// The occupant that owns the current turn.
    pub fn current_occupant(&self) -> Option<&SeatOccupant> {
        let token = self.current_turn.as_deref()?;
        let seat = self.seat_of_token(token)?;
        self.occupant(seat)
    }

    /// Token-to-piece map of all assigned seats, as sent in `GAME_START`.
    pub fn players(&self) -> HashMap<String, Piece> {
        let mut players = HashMap::new();
        if let Some(token) = self.token_of(Seat::A) {
            players.insert(token, Piece::X);
        }
        if let Some(token) = self.token_of(Seat::B) {
            players.insert(token, Piece::O);
        }
        players
    }

    /// True if the token occupies either seat.
    pub fn is_participant(&self, token: &str) -> bool {
        self.seat_of_token(token).is_some()
    }
}
