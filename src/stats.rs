//! Statistics bookkeeping for finished games.

use crate::db::{GameOutcome, GameRepository, GameRow};
use crate::game::DRAW_WINNER_TOKEN;
use tracing::{info, instrument, warn};

/// Records a terminal game against the durable accounts of its
/// participants, if any are linked.
///
/// Anonymous seats (no user id on the row) are skipped. A best-effort
/// operation: failures are logged and never propagate into the game-over
/// path, since the match itself already concluded.
#[instrument(skip(repo, game), fields(game_id = %game.id(), status = %game.status()))]
pub fn record_game_result(repo: &GameRepository, game: &GameRow, abandoned_by: Option<&str>) {
    let p1_user = *game.player1_user_id();
    let p2_user = *game.player2_user_id();
    if p1_user.is_none() && p2_user.is_none() {
        return;
    }

    let winner = game.winner_token().as_deref();
    let is_draw = winner == Some(DRAW_WINNER_TOKEN);

    if is_draw {
        for user_id in [p1_user, p2_user].into_iter().flatten() {
            record(repo, user_id, GameOutcome::Draw, true);
        }
        info!("Draw recorded for linked accounts");
        return;
    }

    let (winner_user, loser_user) = if winner == game.player1_token().as_deref() {
        (p1_user, p2_user)
    } else if winner == game.player2_token().as_deref() {
        (p2_user, p1_user)
    } else {
        (None, None)
    };

    if let Some(abandoner_token) = abandoned_by {
        let abandoner_user = if Some(abandoner_token) == game.player1_token().as_deref() {
            p1_user
        } else if Some(abandoner_token) == game.player2_token().as_deref() {
            p2_user
        } else {
            None
        };
        if let Some(user_id) = abandoner_user {
            // One played game, counted once across the two increments.
            record(repo, user_id, GameOutcome::Abandoned, true);
            record(repo, user_id, GameOutcome::Loss, false);
        }
        if let Some(user_id) = winner_user {
            if abandoner_user != Some(user_id) {
                record(repo, user_id, GameOutcome::Win, true);
            }
        }
        info!(abandoner = ?abandoner_user, winner = ?winner_user, "Abandonment recorded");
        return;
    }

    if winner.is_some() {
        if let Some(user_id) = winner_user {
            record(repo, user_id, GameOutcome::Win, true);
        }
        if let Some(user_id) = loser_user {
            record(repo, user_id, GameOutcome::Loss, true);
        }
        if winner_user.is_none() && loser_user.is_none() {
            warn!(
                winner_token = ?winner,
                "Game ended with a winner but neither seat is a tracked account"
            );
        }
    } else {
        warn!("Terminal game has no winner token and is not a draw; no stats recorded");
    }
}

fn record(repo: &GameRepository, user_id: i32, outcome: GameOutcome, count_game: bool) {
    if let Err(e) = repo.record_outcome(user_id, outcome, count_game) {
        warn!(user_id, ?outcome, error = %e, "Failed to record outcome");
    }
}
