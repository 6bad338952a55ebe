//! Database repository for game records, user profiles and statistics.
//!
//! Every operation opens a short-lived connection and releases it before
//! returning, so no handle is ever held across a network wait.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument, warn};

use crate::db::models::{GameOutcome, GameRow, GameStateUpdate, NewGame, NewUser, User, UserGameStats};
use crate::db::{DbError, schema};

/// Embedded schema migrations, applied at startup.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Repository over the server's SQLite database.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository connected to the database at the given path.
    ///
    /// Use `":memory:"` for an in-memory database (useful for tests).
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))
    }

    /// Applies any pending embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails to apply.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Persists a new game record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, game), fields(game_id = %game.id(), game_mode = %game.game_mode()))]
    pub fn create_game(&self, game: NewGame) -> Result<GameRow, DbError> {
        debug!("Creating game record");
        let mut conn = self.connection()?;

        let row = diesel::insert_into(schema::games::table)
            .values(&game)
            .returning(GameRow::as_returning())
            .get_result(&mut conn)?;

        info!(game_id = %row.id(), status = %row.status(), "Game record created");
        Ok(row)
    }

    /// Loads a game record by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_game(&self, game_id: &str) -> Result<Option<GameRow>, DbError> {
        debug!(game_id, "Loading game record");
        let mut conn = self.connection()?;

        let row = schema::games::table
            .find(game_id)
            .first::<GameRow>(&mut conn)
            .optional()?;

        if row.is_none() {
            debug!(game_id, "Game record not found");
        }
        Ok(row)
    }

    /// Applies an atomic state update to a game record and returns the new
    /// row, or `None` if no record with that id exists.
    ///
    /// Board, turn owner, status and winner travel in one UPDATE so the
    /// stored record can never reflect a partial transition.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, update))]
    pub fn update_game_state(
        &self,
        game_id: &str,
        update: GameStateUpdate,
    ) -> Result<Option<GameRow>, DbError> {
        debug!(game_id, "Updating game state");
        let mut conn = self.connection()?;

        let now = chrono::Utc::now().naive_utc();
        let row = diesel::update(schema::games::table.find(game_id))
            .set((&update, schema::games::updated_at.eq(now)))
            .returning(GameRow::as_returning())
            .get_result(&mut conn)
            .optional()?;

        match &row {
            Some(row) => info!(game_id, status = %row.status(), "Game state updated"),
            None => warn!(game_id, "Update matched no game record"),
        }
        Ok(row)
    }

    /// Creates a new user profile.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the display name is already taken or a
    /// database error occurs.
    #[instrument(skip(self))]
    pub fn create_user(&self, display_name: String) -> Result<User, DbError> {
        debug!(display_name = %display_name, "Creating user");
        let mut conn = self.connection()?;

        let new_user = NewUser::new(display_name);
        let user = diesel::insert_into(schema::users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)?;

        info!(user_id = user.id(), display_name = %user.display_name(), "User created");
        Ok(user)
    }

    /// Gets a user by display name. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user_by_name(&self, display_name: &str) -> Result<Option<User>, DbError> {
        debug!(display_name = %display_name, "Looking up user by name");
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::display_name.eq(display_name))
            .first::<User>(&mut conn)
            .optional()?;

        Ok(user)
    }

    /// Resolves a display name to a user, creating the account on first
    /// sight. Anonymous tokens that never pass through here remain valid.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn resolve_or_create_user(&self, display_name: &str) -> Result<User, DbError> {
        if let Some(user) = self.get_user_by_name(display_name)? {
            return Ok(user);
        }
        self.create_user(display_name.to_string())
    }

    /// Records a terminal outcome against one account, incrementing the
    /// matching counter and, when `count_game` is set, the games-played
    /// total. An abandonment records both the abandonment and the loss;
    /// callers pass `count_game = false` for the second increment.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn record_outcome(
        &self,
        user_id: i32,
        outcome: GameOutcome,
        count_game: bool,
    ) -> Result<(), DbError> {
        use schema::user_game_stats::dsl;

        debug!(user_id, ?outcome, count_game, "Recording outcome");
        let mut conn = self.connection()?;

        diesel::insert_into(dsl::user_game_stats)
            .values(dsl::user_id.eq(user_id))
            .on_conflict(dsl::user_id)
            .do_nothing()
            .execute(&mut conn)?;

        let now = chrono::Utc::now().naive_utc();
        let target = dsl::user_game_stats.find(user_id);
        let games_bump = if count_game { 1 } else { 0 };
        let updated = match outcome {
            GameOutcome::Win => diesel::update(target)
                .set((
                    dsl::wins.eq(dsl::wins + 1),
                    dsl::games_played.eq(dsl::games_played + games_bump),
                    dsl::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            GameOutcome::Loss => diesel::update(target)
                .set((
                    dsl::losses.eq(dsl::losses + 1),
                    dsl::games_played.eq(dsl::games_played + games_bump),
                    dsl::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            GameOutcome::Draw => diesel::update(target)
                .set((
                    dsl::draws.eq(dsl::draws + 1),
                    dsl::games_played.eq(dsl::games_played + games_bump),
                    dsl::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            GameOutcome::Abandoned => diesel::update(target)
                .set((
                    dsl::abandoned.eq(dsl::abandoned + 1),
                    dsl::games_played.eq(dsl::games_played + games_bump),
                    dsl::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
        };

        info!(user_id, ?outcome, rows = updated, "Outcome recorded");
        Ok(())
    }

    /// Loads the aggregate statistics row for a user, if any games were
    /// ever recorded for them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_stats(&self, user_id: i32) -> Result<Option<UserGameStats>, DbError> {
        debug!(user_id, "Loading user stats");
        let mut conn = self.connection()?;

        let stats = schema::user_game_stats::table
            .find(user_id)
            .first::<UserGameStats>(&mut conn)
            .optional()?;

        Ok(stats)
    }
}
