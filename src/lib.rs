//! Side-Stacker game server library.
//!
//! A turn-based connect-four variant where pieces slide in from the left
//! or right edge of a row, played over persistent WebSocket connections.
//!
//! # Architecture
//!
//! - **game**: pure board engine, modes, seats and the game record
//! - **ai**: three bot tiers (reactive, shallow minimax, deep minimax)
//! - **db**: SQLite persistence for games, users and statistics
//! - **registry**: connection-to-room bindings, broadcast and teardown
//! - **orchestrator**: the turn state machine tying it all together
//! - **server**: the axum WebSocket boundary
//!
//! # Example
//!
//! ```no_run
//! use side_stacker::{ConnectionRegistry, GameOrchestrator, GameRepository, ServerConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default();
//! let repo = GameRepository::new(config.database_path().clone())?;
//! repo.run_migrations()?;
//! let orchestrator = GameOrchestrator::new(ConnectionRegistry::new(), repo, config);
//! let app = side_stacker::server::app(orchestrator);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod ai;
mod ava;
pub mod config;
pub mod db;
pub mod game;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use config::ServerConfig;
pub use db::{GameRepository, GameRow};
pub use game::{Board, Difficulty, EntrySide, GameMode, GameRecord, GameStatus, Move, Piece};
pub use orchestrator::{ClientFault, GameOrchestrator};
pub use protocol::ServerMessage;
pub use registry::{ClientConnection, ConnectionRegistry};
