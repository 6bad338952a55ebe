//! Game orchestrator: validates client intents, drives the turn state
//! machine, persists results and notifies rooms.
//!
//! All mutation of a game record flows through here. Moves within one room
//! are serialized by a per-room async lock held for the whole
//! validate-apply-persist-broadcast sequence; nothing else may apply two
//! moves concurrently against the same record.

use crate::ai;
use crate::config::ServerConfig;
use crate::db::{DbError, GameRepository, GameRow, GameStateUpdate, NewGame};
use crate::game::{
    Board, DRAW_WINNER_TOKEN, GameMode, GameStatus, Piece, SPECTATOR_TOKEN, Seat, SeatOccupant,
};
use crate::protocol::{
    CreateGamePayload, JoinGamePayload, LastMove, MakeMovePayload, ServerMessage,
};
use crate::registry::{ClientConnection, ConnectionRegistry};
use crate::{ava, stats};
use derive_more::{Display, Error};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

const NOT_YOUR_TURN: &str = "Not your turn.";
const GAME_NOT_ACTIVE_PREFIX: &str = "Game is not active. Status: ";
const SPECTATOR_CANNOT_MOVE: &str = "Spectators cannot make moves in AI vs AI games.";
const INVALID_MOVE_PAYLOAD: &str = "Invalid MAKE_MOVE payload.";
const GAME_NOT_FOUND: &str = "Game not found.";
const PLAYER_TOKEN_MISMATCH: &str = "Player token mismatch for game.";
const INVALID_BOARD_MOVE: &str = "Invalid move on board.";
const APPLY_MOVE_FAILED: &str = "Failed to apply move.";
const SAVE_MOVE_FAILED: &str = "Failed to save move.";
const JOIN_GAME_ID_MISSING: &str = "game_id not provided for JOIN_GAME.";
const JOIN_INVALID_GAME_ID: &str = "Invalid game_id format for JOIN_GAME.";
const JOIN_GAME_NOT_FOUND: &str = "Game not found to join.";
const JOIN_NOT_PVP: &str = "This game is not a PvP game.";
const JOIN_GAME_FULL: &str = "Game is already full or you cannot rejoin with a different ID.";
const JOIN_OWN_GAME: &str = "You cannot join a game you created as Player 2.";
const JOIN_UPDATE_FAILED: &str = "Failed to update game state on join.";
const JOIN_NOT_JOINABLE: &str = "This game can no longer be joined.";
const NO_ACTIVE_GAME: &str = "No active game. Create or join first.";
const INTERNAL_ERROR: &str = "Error processing your request.";
const PVE_DIFFICULTY_INVALID: &str = "Invalid AI difficulty for PVE.";
const AVA_DIFFICULTY_INVALID: &str = "Invalid AI difficulties for AVA.";

/// Reason string carried in a forfeit `GAME_OVER` broadcast.
pub const OPPONENT_DISCONNECTED_REASON: &str = "opponent_disconnected";

/// A rejected client intent.
///
/// Sent as a typed `ERROR` to the offending connection only; the game
/// record is never mutated on this path. `invalidates_session` marks
/// faults after which the connection's room binding no longer makes sense
/// (e.g. the game vanished).
#[derive(Debug, Clone, Display, Error)]
#[display("{message}")]
pub struct ClientFault {
    /// Message delivered to the client.
    pub message: String,
    /// Whether the connection should forget its active room.
    pub invalidates_session: bool,
}

impl ClientFault {
    /// A fault that leaves the connection's room binding intact.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invalidates_session: false,
        }
    }

    /// A fault after which the connection's room binding is stale.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invalidates_session: true,
        }
    }
}

impl From<DbError> for ClientFault {
    fn from(err: DbError) -> Self {
        error!(error = %err, "Infrastructure failure while handling client intent");
        ClientFault::new(INTERNAL_ERROR)
    }
}

/// What an AI turn did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AiTurnOutcome {
    /// A move was applied and the game continues.
    Continue,
    /// The game reached a terminal state.
    Terminal,
    /// Nothing to do: game missing, not active, or not an AI's turn.
    Idle,
}

/// The turn state machine and room supervisor.
///
/// Cheap to clone; every clone shares the registry, repository handle,
/// per-room locks and the AVA task supervisor.
#[derive(Clone)]
pub struct GameOrchestrator {
    registry: ConnectionRegistry,
    repo: GameRepository,
    config: Arc<ServerConfig>,
    room_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    ava_tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl GameOrchestrator {
    /// Creates an orchestrator over the given registry, repository and
    /// configuration.
    pub fn new(registry: ConnectionRegistry, repo: GameRepository, config: ServerConfig) -> Self {
        info!("Creating game orchestrator");
        Self {
            registry,
            repo,
            config: Arc::new(config),
            room_locks: Arc::new(Mutex::new(HashMap::new())),
            ava_tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The shared repository handle.
    pub fn repository(&self) -> &GameRepository {
        &self.repo
    }

    /// Handles `CREATE_GAME`: validates the requested mode, persists a new
    /// record, binds the connection into the room and announces the game.
    /// Returns the new room id.
    #[instrument(skip(self, connection, payload), fields(connection_id = connection.id(), client_id))]
    pub fn create_game(
        &self,
        connection: &ClientConnection,
        client_id: &str,
        payload: CreateGamePayload,
    ) -> Result<String, ClientFault> {
        let token = payload
            .player_temp_id
            .clone()
            .unwrap_or_else(|| client_id.to_string());
        let mode = parse_requested_mode(&payload)?;

        let (seat_a, seat_b, status) = match mode {
            GameMode::Pvp => (
                SeatOccupant::Human(token.clone()),
                None,
                GameStatus::WaitingForOpponent,
            ),
            GameMode::Pve(difficulty) => (
                SeatOccupant::Human(token.clone()),
                Some(SeatOccupant::ai(difficulty, Seat::B)),
                GameStatus::Active,
            ),
            GameMode::Ava(first, second) => (
                SeatOccupant::ai(first, Seat::A),
                Some(SeatOccupant::ai(second, Seat::B)),
                GameStatus::Active,
            ),
        };

        let seat_a_token = seat_a.token();
        let seat_b_token = seat_b.as_ref().map(SeatOccupant::token);

        // Attribute the creator to a durable account when one exists for
        // this display name; anonymous tokens stay unlinked.
        let creator_user_id = match &seat_a {
            SeatOccupant::Human(name) => self.repo.get_user_by_name(name)?.map(|u| *u.id()),
            SeatOccupant::Ai { .. } => None,
        };

        let game_id = uuid::Uuid::new_v4().to_string();
        let board_json = encode_board(&Board::new()).map_err(ClientFault::from)?;
        let row = self.repo.create_game(NewGame::new(
            game_id.clone(),
            Some(seat_a_token.clone()),
            seat_b_token,
            Some(seat_a_token.clone()),
            board_json,
            status.as_db_str().to_string(),
            mode.as_db_string(),
            creator_user_id,
            None,
        ))?;

        // Spectators bind under their connection identity, players under
        // their seat token so targeted sends can find them.
        let binding_token = if mode.is_ava() { client_id } else { token.as_str() };
        self.registry.connect(connection.clone(), &game_id, binding_token);

        let mut message = format!("Game mode: {}.", mode.as_db_string());
        let (announce_token, announce_piece) = match mode {
            GameMode::Pvp => {
                message.push_str(" Waiting for Player 2...");
                (token.clone(), Some(Piece::X))
            }
            GameMode::Pve(_) => {
                message.push_str(" You are Player 1 (X).");
                (token.clone(), Some(Piece::X))
            }
            GameMode::Ava(_, _) => {
                message.push_str(" Spectating AI vs AI.");
                (SPECTATOR_TOKEN.to_string(), None)
            }
        };

        self.registry.send(
            connection,
            ServerMessage::GameCreated {
                game_id: game_id.clone(),
                player_token: announce_token.clone(),
                player_piece: announce_piece,
                game_mode: mode.as_db_string(),
                message,
            },
        );

        if mode == GameMode::Pvp {
            self.registry.send(
                connection,
                ServerMessage::WaitingForPlayer {
                    game_id: game_id.clone(),
                    message: "Waiting for another player. Share the Game ID.".to_string(),
                },
            );
        } else {
            let record = row.decode()?;
            self.registry.broadcast(
                &game_id,
                &ServerMessage::GameStart {
                    game_id: game_id.clone(),
                    board: record.board().clone(),
                    current_player_token: record.current_turn().clone(),
                    players: record.players(),
                    your_piece: announce_piece,
                    your_token: Some(announce_token),
                    game_mode: mode.as_db_string(),
                },
                None,
            );

            if mode.is_ava() && record.current_occupant().is_some_and(SeatOccupant::is_ai) {
                info!(game_id = %game_id, "Scheduling AI vs AI loop");
                self.spawn_ava_loop(game_id.clone());
            }
        }

        info!(game_id = %game_id, mode = %mode.as_db_string(), "Game created");
        Ok(game_id)
    }

    /// Handles `JOIN_GAME`: validates the target PvP record, assigns side
    /// B, activates the game and announces the start to both seats.
    /// Returns the joined room id.
    #[instrument(skip(self, connection, payload), fields(connection_id = connection.id(), client_id))]
    pub fn join_game(
        &self,
        connection: &ClientConnection,
        client_id: &str,
        payload: JoinGamePayload,
    ) -> Result<String, ClientFault> {
        let joiner = payload
            .player_temp_id
            .clone()
            .unwrap_or_else(|| client_id.to_string());
        let game_id = payload
            .game_id
            .clone()
            .ok_or_else(|| ClientFault::new(JOIN_GAME_ID_MISSING))?;
        uuid::Uuid::parse_str(&game_id)
            .map_err(|_| ClientFault::new(JOIN_INVALID_GAME_ID))?;

        let row = self
            .repo
            .get_game(&game_id)?
            .ok_or_else(|| ClientFault::new(JOIN_GAME_NOT_FOUND))?;
        let record = row.decode()?;

        if record.mode() != &GameMode::Pvp {
            return Err(ClientFault::new(JOIN_NOT_PVP));
        }
        let Some(creator_token) = record.token_of(Seat::A) else {
            error!(game_id = %game_id, "PvP record has no side-A occupant");
            return Err(ClientFault::new(INTERNAL_ERROR));
        };
        if let Some(existing) = record.token_of(Seat::B) {
            if existing != joiner {
                return Err(ClientFault::new(JOIN_GAME_FULL));
            }
        }
        if creator_token == joiner {
            return Err(ClientFault::new(JOIN_OWN_GAME));
        }
        // Joinable only while waiting for an opponent, or as the same
        // identity reconnecting into a game already underway.
        let rejoining = record.token_of(Seat::B).as_deref() == Some(joiner.as_str());
        let joinable = record.status() == &GameStatus::WaitingForOpponent
            || (record.status() == &GameStatus::Active && rejoining);
        if !joinable {
            return Err(ClientFault::new(JOIN_NOT_JOINABLE));
        }

        self.registry.connect(connection.clone(), &game_id, &joiner);

        let mut update = GameStateUpdate::default().with_player2_token(joiner.clone());
        if record.status() == &GameStatus::WaitingForOpponent {
            update = update.with_status(GameStatus::Active.as_db_str().to_string());
        }
        if let Some(user) = self.repo.get_user_by_name(&joiner)? {
            update = update.with_player2_user_id(Some(*user.id()));
        }

        let Some(updated) = self.repo.update_game_state(&game_id, update)? else {
            self.registry.disconnect(connection.id());
            return Err(ClientFault::new(JOIN_UPDATE_FAILED));
        };
        let record = updated.decode()?;

        self.registry.send(
            connection,
            ServerMessage::GameJoined {
                game_id: game_id.clone(),
                player_token: joiner.clone(),
                player_piece: Piece::O,
                opponent_token: creator_token.clone(),
                game_mode: record.mode().as_db_string(),
                message: "Successfully joined game. You are Player 2 (O).".to_string(),
            },
        );

        let start = |your_piece: Piece, your_token: &str| ServerMessage::GameStart {
            game_id: game_id.clone(),
            board: record.board().clone(),
            current_player_token: record.current_turn().clone(),
            players: record.players(),
            your_piece: Some(your_piece),
            your_token: Some(your_token.to_string()),
            game_mode: record.mode().as_db_string(),
        };

        // The creator's connection is found by token; the game proceeds
        // for the joiner even if the creator has meanwhile gone away.
        match self.registry.lookup(&game_id, &creator_token) {
            Some(creator_connection) => {
                self.registry
                    .send(&creator_connection, start(Piece::X, &creator_token));
            }
            None => warn!(
                game_id = %game_id,
                creator_token = %creator_token,
                "No connection found for creator to receive GAME_START"
            ),
        }
        self.registry.send(connection, start(Piece::O, &joiner));

        info!(game_id = %game_id, joiner = %joiner, "Player joined game");
        Ok(game_id)
    }

    /// Handles `MAKE_MOVE`: validates the mover and the move against the
    /// current record, applies it, persists the transition atomically and
    /// broadcasts the outcome. For PvE games it then chains exactly one AI
    /// reply.
    #[instrument(skip(self, payload), fields(room_id = ?room_id))]
    pub async fn make_move(
        &self,
        room_id: Option<&str>,
        payload: MakeMovePayload,
    ) -> Result<(), ClientFault> {
        let room_id = room_id.ok_or_else(|| ClientFault::new(NO_ACTIVE_GAME))?;

        let token = payload
            .player_token
            .clone()
            .ok_or_else(|| ClientFault::new(INVALID_MOVE_PAYLOAD))?;
        let row_index = payload
            .row
            .filter(|r| *r >= 0)
            .ok_or_else(|| ClientFault::new(INVALID_MOVE_PAYLOAD))? as usize;
        let side = payload
            .side
            .as_deref()
            .and_then(crate::game::EntrySide::parse)
            .ok_or_else(|| ClientFault::new(INVALID_MOVE_PAYLOAD))?;

        let lock = self.room_lock(room_id);
        let guard = lock.lock().await;

        let row = self
            .repo
            .get_game(room_id)?
            .ok_or_else(|| ClientFault::fatal(GAME_NOT_FOUND))?;
        let record = row.decode()?;

        if record.status() != &GameStatus::Active {
            return Err(ClientFault::new(format!(
                "{GAME_NOT_ACTIVE_PREFIX}{}",
                record.status().as_db_str()
            )));
        }
        if record.mode().is_ava() {
            return Err(ClientFault::new(SPECTATOR_CANNOT_MOVE));
        }
        if record.current_turn().as_deref() != Some(token.as_str()) {
            warn!(
                room_id,
                token = %token,
                expected = ?record.current_turn(),
                "Move submitted out of turn"
            );
            return Err(ClientFault::new(NOT_YOUR_TURN));
        }
        let piece = record
            .piece_for_token(&token)
            .ok_or_else(|| ClientFault::new(PLAYER_TOKEN_MISMATCH))?;

        let mut board = record.board().clone();
        if !board.is_valid_move(row_index, side) {
            return Err(ClientFault::new(INVALID_BOARD_MOVE));
        }
        let (landed_row, landed_col) = board
            .apply_move(row_index, side, piece)
            .ok_or_else(|| ClientFault::new(APPLY_MOVE_FAILED))?;

        let last_move = LastMove {
            player_token: token.clone(),
            player_piece: piece,
            row: landed_row,
            col: landed_col,
            side_played: side,
        };

        // Win is checked for the mover's piece before the draw check.
        if board.check_win(piece) {
            let updated = self
                .finalize_game(
                    room_id,
                    &board,
                    GameStatus::win_for(piece),
                    Some(token.clone()),
                    Some(piece),
                    None,
                    None,
                )?
                .ok_or_else(|| ClientFault::new(SAVE_MOVE_FAILED))?;
            debug!(game_id = %updated.id(), "Game won by move");
            return Ok(());
        }
        if board.is_full() {
            self.finalize_game(
                room_id,
                &board,
                GameStatus::Draw,
                Some(DRAW_WINNER_TOKEN.to_string()),
                None,
                None,
                None,
            )?
            .ok_or_else(|| ClientFault::new(SAVE_MOVE_FAILED))?;
            return Ok(());
        }

        let next_token = record.opposing_token(&token);
        let update = GameStateUpdate::default()
            .with_board_state(encode_board(&board)?)
            .with_current_player_token(next_token.clone())
            .with_status(GameStatus::Active.as_db_str().to_string())
            .with_winner_token(None);
        self.repo
            .update_game_state(room_id, update)?
            .ok_or_else(|| ClientFault::new(SAVE_MOVE_FAILED))?;

        self.registry.broadcast(
            room_id,
            &ServerMessage::GameUpdate {
                game_id: room_id.to_string(),
                board: board.clone(),
                current_player_token: next_token.clone(),
                last_move: Some(last_move),
            },
            None,
        );

        // PvE: chain exactly one AI reply per human move.
        let opposing_occupant = record
            .seat_of_token(&token)
            .map(Seat::other)
            .and_then(|seat| record.occupant(seat));
        let ai_difficulty = match opposing_occupant {
            Some(SeatOccupant::Ai { difficulty, .. }) if record.mode().is_pve() => {
                Some(*difficulty)
            }
            _ => None,
        };
        drop(guard);

        if let Some(difficulty) = ai_difficulty {
            tokio::time::sleep(self.config.ai_reply_delay(difficulty)).await;
            if let Err(e) = self.take_ai_turn(room_id).await {
                error!(room_id, error = %e, "AI reply failed after human move");
            }
        }

        Ok(())
    }

    /// Handles a closed connection.
    ///
    /// Unbinds it from the registry; if it belonged to a participant of a
    /// live game, the opposing seat wins by forfeit (or the record is
    /// marked abandoned when no opponent ever joined). Safe to call twice:
    /// the second call finds no binding and returns immediately.
    #[instrument(skip(self))]
    pub async fn connection_closed(&self, connection_id: u64) {
        let Some((room_id, token)) = self.registry.disconnect(connection_id) else {
            return;
        };
        info!(room_id = %room_id, token = %token, "Connection closed");

        let lock = self.room_lock(&room_id);
        let _guard = lock.lock().await;

        let row = match self.repo.get_game(&room_id) {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Failed to load game after disconnect");
                return;
            }
        };
        let record = match row.decode() {
            Ok(record) => record,
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Failed to decode game after disconnect");
                return;
            }
        };

        if !record.is_participant(&token) {
            debug!(room_id = %room_id, token = %token, "Spectator disconnected");
            return;
        }
        if record.status().is_terminal() {
            return;
        }

        let result = match record.opposing_token(&token) {
            Some(opponent_token) => {
                let winner_piece = record
                    .piece_for_token(&opponent_token)
                    .unwrap_or(Piece::O);
                info!(
                    room_id = %room_id,
                    winner = %opponent_token,
                    abandoned_by = %token,
                    "Participant disconnected, awarding forfeit"
                );
                self.finalize_game(
                    &room_id,
                    record.board(),
                    GameStatus::win_for(winner_piece),
                    Some(opponent_token),
                    Some(winner_piece),
                    Some(OPPONENT_DISCONNECTED_REASON),
                    Some(&token),
                )
            }
            None => {
                info!(room_id = %room_id, "Game abandoned before an opponent joined");
                self.finalize_game(
                    &room_id,
                    record.board(),
                    GameStatus::Abandoned,
                    None,
                    None,
                    None,
                    Some(&token),
                )
            }
        };
        if let Err(e) = result {
            error!(room_id = %room_id, error = %e, "Failed to record forfeit");
        }
    }

    /// Plays one AI turn for the room, if its record is active and the
    /// turn owner is an AI seat.
    ///
    /// An engine that returns no move resolves the game as a draw when the
    /// board is full and as an AI-stuck error otherwise; an engine move
    /// the board rejects also ends the game in the error state. The record
    /// never silently stalls on an AI failure.
    pub(crate) async fn take_ai_turn(&self, game_id: &str) -> Result<AiTurnOutcome, DbError> {
        let lock = self.room_lock(game_id);
        let _guard = lock.lock().await;

        let Some(row) = self.repo.get_game(game_id)? else {
            return Ok(AiTurnOutcome::Idle);
        };
        let record = row.decode()?;
        if record.status() != &GameStatus::Active {
            return Ok(AiTurnOutcome::Idle);
        }
        let Some(token) = record.current_turn().clone() else {
            return Ok(AiTurnOutcome::Idle);
        };
        let Some(SeatOccupant::Ai { difficulty, .. }) = record.current_occupant() else {
            return Ok(AiTurnOutcome::Idle);
        };
        let difficulty = *difficulty;
        let Some(piece) = record.piece_for_token(&token) else {
            return Ok(AiTurnOutcome::Idle);
        };

        debug!(game_id, %token, ?difficulty, "AI turn\n{}", record.board().display());
        let bot = ai::bot_for(
            difficulty,
            piece,
            *self.config.medium_search_depth(),
            *self.config.hard_search_depth(),
        );

        // The search is CPU-bound; keep it off the async workers so one
        // room's deep search cannot stall unrelated connections.
        let search_board = record.board().clone();
        let chosen = match tokio::task::spawn_blocking(move || bot.choose_move(&search_board)).await
        {
            Ok(chosen) => chosen,
            Err(e) => {
                error!(game_id, error = %e, "AI search task failed");
                self.finalize_game(game_id, record.board(), GameStatus::AiStuck, None, None, None, None)?;
                return Ok(AiTurnOutcome::Terminal);
            }
        };

        let Some(mv) = chosen else {
            // No legal move: a full board is a draw, anything else means
            // the engine is stuck.
            return if record.board().is_full() {
                self.finalize_game(
                    game_id,
                    record.board(),
                    GameStatus::Draw,
                    Some(DRAW_WINNER_TOKEN.to_string()),
                    None,
                    None,
                    None,
                )?;
                Ok(AiTurnOutcome::Terminal)
            } else {
                error!(game_id, %token, "AI found no move on a non-full board");
                self.finalize_game(game_id, record.board(), GameStatus::AiStuck, None, None, None, None)?;
                Ok(AiTurnOutcome::Terminal)
            };
        };

        let mut board = record.board().clone();
        let Some((landed_row, landed_col)) = board.apply_move(mv.row, mv.side, piece) else {
            error!(game_id, %token, ?mv, "AI chose a move the board engine rejects");
            self.finalize_game(game_id, record.board(), GameStatus::AiStuck, None, None, None, None)?;
            return Ok(AiTurnOutcome::Terminal);
        };

        if board.check_win(piece) {
            self.finalize_game(
                game_id,
                &board,
                GameStatus::win_for(piece),
                Some(token),
                Some(piece),
                None,
                None,
            )?;
            return Ok(AiTurnOutcome::Terminal);
        }
        if board.is_full() {
            self.finalize_game(
                game_id,
                &board,
                GameStatus::Draw,
                Some(DRAW_WINNER_TOKEN.to_string()),
                None,
                None,
                None,
            )?;
            return Ok(AiTurnOutcome::Terminal);
        }

        let next_token = record.opposing_token(&token);
        let update = GameStateUpdate::default()
            .with_board_state(encode_board(&board)?)
            .with_current_player_token(next_token.clone())
            .with_status(GameStatus::Active.as_db_str().to_string())
            .with_winner_token(None);
        if self.repo.update_game_state(game_id, update)?.is_none() {
            return Err(DbError::new(format!(
                "Game {game_id} vanished while applying an AI move"
            )));
        }

        self.registry.broadcast(
            game_id,
            &ServerMessage::GameUpdate {
                game_id: game_id.to_string(),
                board,
                current_player_token: next_token,
                last_move: Some(LastMove {
                    player_token: token,
                    player_piece: piece,
                    row: landed_row,
                    col: landed_col,
                    side_played: mv.side,
                }),
            },
            None,
        );
        Ok(AiTurnOutcome::Continue)
    }

    /// Forces a still-active room into the AI-stuck terminal state. Used
    /// by the AVA loop when it hits an unexpected failure, so the record
    /// is never left active with no one able to move.
    pub(crate) async fn force_ai_error(&self, game_id: &str) {
        let lock = self.room_lock(game_id);
        let _guard = lock.lock().await;

        let board = match self.repo.get_game(game_id) {
            Ok(Some(row)) => match row.decode() {
                Ok(record) if !record.status().is_terminal() => record.board().clone(),
                Ok(_) => return,
                Err(e) => {
                    error!(game_id, error = %e, "Failed to decode game while forcing error state");
                    Board::new()
                }
            },
            Ok(None) => return,
            Err(e) => {
                error!(game_id, error = %e, "Failed to load game while forcing error state");
                return;
            }
        };
        if let Err(e) =
            self.finalize_game(game_id, &board, GameStatus::AiStuck, None, None, None, None)
        {
            error!(game_id, error = %e, "Failed to force error state");
        }
    }

    /// Terminates a game: persists the terminal transition atomically,
    /// notifies the stats service and broadcasts `GAME_OVER` to the room.
    /// Returns `None` when the record no longer exists.
    fn finalize_game(
        &self,
        game_id: &str,
        board: &Board,
        status: GameStatus,
        winner_token: Option<String>,
        winning_piece: Option<Piece>,
        reason: Option<&str>,
        abandoned_by: Option<&str>,
    ) -> Result<Option<GameRow>, DbError> {
        let update = GameStateUpdate::default()
            .with_board_state(encode_board(board)?)
            .with_current_player_token(None)
            .with_status(status.as_db_str().to_string())
            .with_winner_token(winner_token.clone());
        let Some(updated) = self.repo.update_game_state(game_id, update)? else {
            warn!(game_id, "Finalize matched no game record");
            return Ok(None);
        };

        stats::record_game_result(&self.repo, &updated, abandoned_by);

        self.registry.broadcast(
            game_id,
            &ServerMessage::GameOver {
                game_id: game_id.to_string(),
                board: board.clone(),
                status,
                winner_token,
                winning_player_piece: winning_piece,
                reason: reason.map(str::to_string),
            },
            None,
        );

        info!(game_id, status = status.as_db_str(), "Game finalized");
        Ok(Some(updated))
    }

    /// The mutual-exclusion lock serializing all move application for a
    /// room.
    fn room_lock(&self, room_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.room_locks
            .lock()
            .unwrap()
            .entry(room_id.to_string())
            .or_default()
            .clone()
    }

    /// Starts the supervised background loop for an AVA room.
    fn spawn_ava_loop(&self, game_id: String) {
        let orchestrator = self.clone();
        let pacing = self.config.ava_pacing();
        let handle = tokio::spawn(ava::run_ava_loop(orchestrator, game_id.clone(), pacing));
        self.ava_tasks.lock().unwrap().insert(game_id, handle);
    }

    /// Drops a finished AVA loop from the supervisor map.
    pub(crate) fn ava_task_finished(&self, game_id: &str) {
        self.ava_tasks.lock().unwrap().remove(game_id);
    }

    /// Aborts every supervised AVA loop. Called on server shutdown so no
    /// background task outlives its room.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let mut tasks = self.ava_tasks.lock().unwrap();
        for (game_id, handle) in tasks.drain() {
            info!(game_id = %game_id, "Aborting AVA loop");
            handle.abort();
        }
    }
}

/// Validates the requested mode and difficulties against the allow-list.
fn parse_requested_mode(payload: &CreateGamePayload) -> Result<GameMode, ClientFault> {
    let requested = payload
        .mode
        .as_deref()
        .unwrap_or("PVP")
        .to_ascii_uppercase();
    match requested.as_str() {
        "PVP" => Ok(GameMode::Pvp),
        "PVE" => {
            let difficulty = parse_difficulty(payload.difficulty.as_deref())
                .ok_or_else(|| ClientFault::new(PVE_DIFFICULTY_INVALID))?;
            Ok(GameMode::Pve(difficulty))
        }
        "AVA" => {
            let first = parse_difficulty(payload.ai1_difficulty.as_deref())
                .ok_or_else(|| ClientFault::new(AVA_DIFFICULTY_INVALID))?;
            let second = parse_difficulty(payload.ai2_difficulty.as_deref())
                .ok_or_else(|| ClientFault::new(AVA_DIFFICULTY_INVALID))?;
            Ok(GameMode::Ava(first, second))
        }
        other => Err(ClientFault::new(format!("Unsupported game mode: {other}"))),
    }
}

fn parse_difficulty(value: Option<&str>) -> Option<crate::game::Difficulty> {
    match value {
        None => Some(crate::game::Difficulty::DEFAULT),
        Some(s) => crate::game::Difficulty::from_str(&s.to_ascii_uppercase()).ok(),
    }
}

fn encode_board(board: &Board) -> Result<String, DbError> {
    serde_json::to_string(board)
        .map_err(|e| DbError::new(format!("Board serialization failed: {e}")))
}
