//! Autonomous AI-vs-AI game loop.

use crate::orchestrator::{AiTurnOutcome, GameOrchestrator};
use std::time::Duration;
use tracing::{error, info, instrument};

/// Drives an AVA room to completion without any client input.
///
/// Each iteration sleeps the pacing interval, reloads the record and plays
/// one AI turn. The loop exits as soon as the game is terminal, missing,
/// or no longer an AI seat's turn; an unexpected failure forces the room
/// into a terminal error state with a broadcast instead of leaving the
/// record stuck active. The task removes itself from the supervisor map
/// on the way out.
#[instrument(skip_all, fields(game_id = %game_id))]
pub(crate) async fn run_ava_loop(
    orchestrator: GameOrchestrator,
    game_id: String,
    pacing: Duration,
) {
    info!("AI vs AI loop started");
    loop {
        tokio::time::sleep(pacing).await;
        match orchestrator.take_ai_turn(&game_id).await {
            Ok(AiTurnOutcome::Continue) => {}
            Ok(AiTurnOutcome::Terminal) => {
                info!("AI vs AI game reached a terminal state");
                break;
            }
            Ok(AiTurnOutcome::Idle) => {
                info!("AI vs AI loop ending, game no longer awaiting an AI move");
                break;
            }
            Err(e) => {
                error!(error = %e, "AI vs AI loop failed, forcing error state");
                orchestrator.force_ai_error(&game_id).await;
                break;
            }
        }
    }
    orchestrator.ava_task_finished(&game_id);
    info!("AI vs AI loop ended");
}
