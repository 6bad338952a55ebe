//! Shallow-search tier.

use super::evaluator::{Evaluator, WindowWeights};
use super::minimax::search_best_move;
use super::{Bot, block_opponent_win, immediate_win, shuffled_legal_moves};
use crate::game::{Board, Move, Piece};
use tracing::debug;

/// Tier-2 bot: immediate win, then single-ply block, then minimax with
/// alpha-beta pruning over the shallow evaluator (default depth 2).
#[derive(Debug, Clone)]
pub struct MediumBot {
    piece: Piece,
    depth: u32,
    evaluator: Evaluator,
}

impl MediumBot {
    /// Creates a shallow-search bot for the given piece and depth.
    pub fn new(piece: Piece, depth: u32) -> Self {
        Self {
            piece,
            depth,
            evaluator: Evaluator::new(piece, WindowWeights::shallow()),
        }
    }
}

impl Bot for MediumBot {
    fn piece(&self) -> Piece {
        self.piece
    }

    fn choose_move(&self, board: &Board) -> Option<Move> {
        if board.legal_moves().is_empty() {
            return None;
        }

        if let Some(mv) = immediate_win(board, self.piece) {
            debug!(?mv, "medium bot takes immediate win");
            return Some(mv);
        }
        if let Some(mv) = block_opponent_win(board, self.piece) {
            debug!(?mv, "medium bot blocks opponent win");
            return Some(mv);
        }

        search_best_move(board, self.piece, self.depth, &self.evaluator)
            .or_else(|| shuffled_legal_moves(board).first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::EntrySide;

    #[test]
    fn test_blocks_opponent_three_in_a_row() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.apply_move(0, EntrySide::Left, Piece::O);
        }
        board.apply_move(1, EntrySide::Left, Piece::X);
        board.apply_move(2, EntrySide::Left, Piece::X);

        let bot = MediumBot::new(Piece::X, 2);
        let mv = bot.choose_move(&board).expect("no move");
        let mut probe = board.clone();
        assert_eq!(probe.apply_move(mv.row, mv.side, Piece::X), Some((0, 3)));
    }

    #[test]
    fn test_prefers_win_over_block() {
        let mut board = Board::new();
        // Both sides threaten; X to move must take its own win.
        for _ in 0..3 {
            board.apply_move(0, EntrySide::Left, Piece::O);
            board.apply_move(1, EntrySide::Left, Piece::X);
        }
        let bot = MediumBot::new(Piece::X, 2);
        let mv = bot.choose_move(&board).expect("no move");
        let mut probe = board.clone();
        probe.apply_move(mv.row, mv.side, Piece::X);
        assert!(probe.check_win(Piece::X));
    }

    #[test]
    fn test_single_remaining_move_taken() {
        let mut board = Board::new();
        for r in 0..crate::game::ROWS {
            let fill = if r == 6 { crate::game::COLS - 1 } else { crate::game::COLS };
            for i in 0..fill {
                board.apply_move(
                    r,
                    EntrySide::Left,
                    if (r + i) % 2 == 0 { Piece::X } else { Piece::O },
                );
            }
        }
        let bot = MediumBot::new(Piece::O, 2);
        let mv = bot.choose_move(&board).expect("no move");
        assert_eq!(mv.row, 6);
    }
}
