//! Database models and row-to-domain decoding.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use derive_setters::Setters;
use diesel::prelude::*;

use crate::db::{DbError, schema};
use crate::game::GameRecord;

/// User profile database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
pub struct User {
    id: i32,
    display_name: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Insertable user model for creating new users.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    display_name: String,
}

/// Per-user aggregate game statistics.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::user_game_stats)]
#[diesel(primary_key(user_id))]
#[diesel(belongs_to(User))]
pub struct UserGameStats {
    user_id: i32,
    games_played: i32,
    wins: i32,
    losses: i32,
    draws: i32,
    abandoned: i32,
    updated_at: NaiveDateTime,
}

/// A terminal outcome recorded against one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameOutcome {
    /// User won the game.
    Win,
    /// User lost the game.
    Loss,
    /// Game ended in a draw.
    Draw,
    /// User abandoned the game.
    Abandoned,
}

/// Game record database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRow {
    id: String,
    player1_token: Option<String>,
    player2_token: Option<String>,
    current_player_token: Option<String>,
    board_state: String,
    status: String,
    game_mode: String,
    winner_token: Option<String>,
    player1_user_id: Option<i32>,
    player2_user_id: Option<i32>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl GameRow {
    /// Decodes the stored row into the structured [`GameRecord`] used by
    /// gameplay. Seat tokens are parsed exactly once here.
    pub fn decode(&self) -> Result<GameRecord, DbError> {
        let record = GameRecord::from_parts(
            self.id.clone(),
            &self.game_mode,
            self.player1_token.as_deref(),
            self.player2_token.as_deref(),
            self.current_player_token.clone(),
            &self.board_state,
            &self.status,
            self.winner_token.clone(),
        )?;
        Ok(record)
    }
}

/// Insertable game model for creating new games.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::games)]
pub struct NewGame {
    id: String,
    player1_token: Option<String>,
    player2_token: Option<String>,
    current_player_token: Option<String>,
    board_state: String,
    status: String,
    game_mode: String,
    player1_user_id: Option<i32>,
    player2_user_id: Option<i32>,
}

/// Atomic changeset for a game record.
///
/// Unset fields are left untouched; the nested-option fields distinguish
/// "leave alone" (`None`) from "clear to NULL" (`Some(None)`). The
/// orchestrator always submits board, turn, status and winner together so
/// the update is all-or-nothing.
#[derive(Debug, Clone, Default, AsChangeset, Setters)]
#[diesel(table_name = schema::games)]
#[setters(prefix = "with_", strip_option)]
pub struct GameStateUpdate {
    /// New board snapshot (JSON).
    board_state: Option<String>,
    /// New turn owner; `Some(None)` clears it on terminal transitions.
    current_player_token: Option<Option<String>>,
    /// New status string.
    status: Option<String>,
    /// Winner token; `Some(None)` clears it.
    winner_token: Option<Option<String>>,
    /// Second seat assignment, set when a PvP opponent joins.
    player2_token: Option<String>,
    /// Durable account link for the second seat.
    player2_user_id: Option<Option<i32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_clear_from_untouched() {
        let update = GameStateUpdate::default()
            .with_status("draw".to_string())
            .with_current_player_token(None)
            .with_winner_token(Some("draw".to_string()));
        assert_eq!(update.board_state, None);
        assert_eq!(update.current_player_token, Some(None));
        assert_eq!(update.winner_token, Some(Some("draw".to_string())));
    }
}
