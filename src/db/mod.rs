//! Persistence layer: SQLite via diesel.

mod error;
mod models;
mod repository;
pub(crate) mod schema;

pub use error::DbError;
pub use models::{GameOutcome, GameRow, GameStateUpdate, NewGame, NewUser, User, UserGameStats};
pub use repository::{GameRepository, MIGRATIONS};
