//! Deep-search tier.

use super::evaluator::{Evaluator, WindowWeights};
use super::minimax::search_best_move;
use super::{Bot, block_opponent_win, immediate_win, shuffled_legal_moves};
use crate::game::{Board, Move, Piece};
use tracing::debug;

/// Tier-3 bot: same structure as the medium tier but searching deeper
/// (default depth 3) with the sharper deep evaluator.
#[derive(Debug, Clone)]
pub struct HardBot {
    piece: Piece,
    depth: u32,
    evaluator: Evaluator,
}

impl HardBot {
    /// Creates a deep-search bot for the given piece and depth.
    pub fn new(piece: Piece, depth: u32) -> Self {
        Self {
            piece,
            depth,
            evaluator: Evaluator::new(piece, WindowWeights::deep()),
        }
    }
}

impl Bot for HardBot {
    fn piece(&self) -> Piece {
        self.piece
    }

    fn choose_move(&self, board: &Board) -> Option<Move> {
        if board.legal_moves().is_empty() {
            return None;
        }

        if let Some(mv) = immediate_win(board, self.piece) {
            debug!(?mv, "hard bot takes immediate win");
            return Some(mv);
        }
        if let Some(mv) = block_opponent_win(board, self.piece) {
            debug!(?mv, "hard bot blocks opponent win");
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
    fn test_blocks_diagonal_threat() {
        let mut board = Board::new();
        // O holds the down-diagonal (0,0) (1,1) (2,2); row 3 is filled up
        // to (3,2), so (3,3) is the winning cell, reachable from the left.
        board.apply_move(0, EntrySide::Left, Piece::O);
        board.apply_move(1, EntrySide::Left, Piece::X);
        board.apply_move(1, EntrySide::Left, Piece::O);
        board.apply_move(2, EntrySide::Left, Piece::O);
        board.apply_move(2, EntrySide::Left, Piece::X);
        board.apply_move(2, EntrySide::Left, Piece::O);
        board.apply_move(3, EntrySide::Left, Piece::X);
        board.apply_move(3, EntrySide::Left, Piece::O);
        board.apply_move(3, EntrySide::Left, Piece::X);

        let bot = HardBot::new(Piece::X, 3);
        let mv = bot.choose_move(&board).expect("no move");
        let mut probe = board.clone();
        assert_eq!(probe.apply_move(mv.row, mv.side, Piece::X), Some((3, 3)));
    }

    #[test]
    fn test_takes_win_even_with_own_threat_elsewhere() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.apply_move(4, EntrySide::Right, Piece::O);
        }
        board.apply_move(0, EntrySide::Left, Piece::X);
        let bot = HardBot::new(Piece::O, 3);
        let mv = bot.choose_move(&board).expect("no move");
        let mut probe = board.clone();
        probe.apply_move(mv.row, mv.side, Piece::O);
        assert!(probe.check_win(Piece::O));
    }
}
