//! Game domain: board engine, modes, seats and the game record.

mod board;
mod mode;
mod record;
mod seat;
mod types;

pub use board::{Board, Cell};
pub use mode::{Difficulty, GameMode, ModeParseError};
pub use record::{GameRecord, RecordDecodeError};
pub use seat::{Seat, SeatOccupant};
pub use types::{
    COLS, CONNECT_N, DRAW_WINNER_TOKEN, EntrySide, GameStatus, Move, Piece, ROWS,
    SPECTATOR_TOKEN,
};

pub(crate) use board::window_coords;
