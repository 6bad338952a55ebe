//! Wire protocol: client intents and server messages.
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": {...}}`. The
//! envelope type is matched first so an unknown type can be answered with
//! a typed error instead of a generic parse failure.

use crate::game::{Board, EntrySide, GameStatus, Piece};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client intent: create a game.
pub const MSG_CREATE_GAME: &str = "CREATE_GAME";
/// Client intent: join an existing PvP game.
pub const MSG_JOIN_GAME: &str = "JOIN_GAME";
/// Client intent: submit a move.
pub const MSG_MAKE_MOVE: &str = "MAKE_MOVE";

/// Inbound message envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload; defaults to an empty object.
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Envelope {
    /// Parses a raw text frame into an envelope.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Payload of `CREATE_GAME`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGamePayload {
    /// Caller-chosen identity; falls back to the connection's client id.
    pub player_temp_id: Option<String>,
    /// Requested mode: `PVP`, `PVE` or `AVA` (case-insensitive).
    pub mode: Option<String>,
    /// PvE opponent difficulty.
    pub difficulty: Option<String>,
    /// AVA side-A difficulty.
    pub ai1_difficulty: Option<String>,
    /// AVA side-B difficulty.
    pub ai2_difficulty: Option<String>,
}

/// Payload of `JOIN_GAME`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinGamePayload {
    /// Id of the game to join.
    pub game_id: Option<String>,
    /// Caller-chosen identity; falls back to the connection's client id.
    pub player_temp_id: Option<String>,
}

/// Payload of `MAKE_MOVE`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MakeMovePayload {
    /// Token of the seat submitting the move.
    pub player_token: Option<String>,
    /// Target row.
    pub row: Option<i64>,
    /// Entry side, `"L"` or `"R"`.
    pub side: Option<String>,
}

/// Detail of the most recent placement, included in `GAME_UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastMove {
    /// Token of the mover.
    pub player_token: String,
    /// Piece of the mover.
    pub player_piece: Piece,
    /// Row where the piece landed.
    pub row: usize,
    /// Column where the piece landed.
    pub col: usize,
    /// Edge the piece entered from.
    pub side_played: EntrySide,
}

/// Outbound server message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Acknowledges game creation to the creator.
    #[serde(rename = "GAME_CREATED")]
    GameCreated {
        /// New game id.
        game_id: String,
        /// The caller's token, or the spectator sentinel for AVA.
        player_token: String,
        /// The caller's piece; absent for spectators.
        player_piece: Option<Piece>,
        /// Mode string, e.g. `PVE_EASY`.
        game_mode: String,
        /// Human-readable summary.
        message: String,
    },
    /// PvP game waiting for an opponent.
    #[serde(rename = "WAITING_FOR_PLAYER")]
    WaitingForPlayer {
        /// Game id to share with the opponent.
        game_id: String,
        /// Human-readable prompt.
        message: String,
    },
    /// Acknowledges a successful join to the joiner.
    #[serde(rename = "GAME_JOINED")]
    GameJoined {
        /// Joined game id.
        game_id: String,
        /// The joiner's token.
        player_token: String,
        /// The joiner's piece.
        player_piece: Piece,
        /// The creator's token.
        opponent_token: String,
        /// Mode string.
        game_mode: String,
        /// Human-readable summary.
        message: String,
    },
    /// Game is underway; carries the full starting state.
    #[serde(rename = "GAME_START")]
    GameStart {
        /// Game id.
        game_id: String,
        /// Board snapshot.
        board: Board,
        /// Token of the seat to move.
        current_player_token: Option<String>,
        /// Token-to-piece map of the seats.
        players: HashMap<String, Piece>,
        /// The recipient's piece; absent for spectators.
        your_piece: Option<Piece>,
        /// The recipient's token; spectator sentinel for AVA.
        your_token: Option<String>,
        /// Mode string.
        game_mode: String,
    },
    /// A move was applied and the game continues.
    #[serde(rename = "GAME_UPDATE")]
    GameUpdate {
        /// Game id.
        game_id: String,
        /// Board after the move.
        board: Board,
        /// Token of the seat to move next.
        current_player_token: Option<String>,
        /// The placement that produced this update.
        last_move: Option<LastMove>,
    },
    /// The game reached a terminal state.
    #[serde(rename = "GAME_OVER")]
    GameOver {
        /// Game id.
        game_id: String,
        /// Final board.
        board: Board,
        /// Terminal status.
        status: GameStatus,
        /// Winning seat's token, or the draw sentinel.
        winner_token: Option<String>,
        /// Winning piece; absent on draws and error endings.
        winning_player_piece: Option<Piece>,
        /// Why the game ended, when not decided on the board.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A request failed; sent only to the offending connection.
    #[serde(rename = "ERROR")]
    Error {
        /// What went wrong.
        message: String,
    },
}

impl ServerMessage {
    /// Builds a typed error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
