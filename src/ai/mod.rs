//! AI decision engine: three strategies of increasing strength.
//!
//! Every strategy implements [`Bot`] and returns either a legal move or
//! `None` when no legal move exists. Callers must treat `None` as "board
//! full" and resolve the game as a draw, never as a bot failure.

mod easy;
mod evaluator;
mod hard;
mod medium;
mod minimax;

pub use easy::EasyBot;
pub use evaluator::{Evaluator, WindowWeights};
pub use hard::HardBot;
pub use medium::MediumBot;

use crate::game::{Board, Difficulty, Move, Piece};
use rand::seq::SliceRandom;

/// A move-choosing strategy for one side.
pub trait Bot: Send {
    /// The piece this bot plays.
    fn piece(&self) -> Piece;

    /// Chooses a move for the current board, or `None` if no legal move
    /// exists. Never returns a move the board engine would reject.
    fn choose_move(&self, board: &Board) -> Option<Move>;
}

/// Builds the bot for a difficulty tier and seat piece.
///
/// `medium_depth` and `hard_depth` come from server configuration.
pub fn bot_for(
    difficulty: Difficulty,
    piece: Piece,
    medium_depth: u32,
    hard_depth: u32,
) -> Box<dyn Bot> {
    match difficulty {
        Difficulty::Easy => Box::new(EasyBot::new(piece)),
        Difficulty::Medium => Box::new(MediumBot::new(piece, medium_depth)),
        Difficulty::Hard => Box::new(HardBot::new(piece, hard_depth)),
    }
}

/// Legal moves in randomized order, so equal-scoring moves do not break
/// ties deterministically.
pub(crate) fn shuffled_legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = board.legal_moves();
    moves.shuffle(&mut rand::rng());
    moves
}

/// Finds a move that wins immediately for `piece`, if one exists.
pub(crate) fn immediate_win(board: &Board, piece: Piece) -> Option<Move> {
    for mv in board.legal_moves() {
        let mut probe = board.clone();
        if probe.apply_move(mv.row, mv.side, piece).is_some() && probe.check_win(piece) {
            return Some(mv);
        }
    }
    None
}

/// Finds a move that occupies the exact cell the opponent would win on if
/// given their next turn.
///
/// Each opponent move is simulated against the *current* board; when one
/// wins and the same `(row, side)` intent is legal for the bot, playing it
/// lands on the same cell and denies the win.
pub(crate) fn block_opponent_win(board: &Board, piece: Piece) -> Option<Move> {
    let opponent = piece.opponent();
    for mv in board.legal_moves() {
        let mut probe = board.clone();
        if probe.apply_move(mv.row, mv.side, opponent).is_some() && probe.check_win(opponent) {
            return Some(mv);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::EntrySide;
    use rand::Rng;

    fn random_board(moves: usize) -> Board {
        let mut rng = rand::rng();
        let mut board = Board::new();
        let mut piece = Piece::X;
        for _ in 0..moves {
            let legal = board.legal_moves();
            if legal.is_empty() {
                break;
            }
            let mv = legal[rng.random_range(0..legal.len())];
            board.apply_move(mv.row, mv.side, piece);
            piece = piece.opponent();
        }
        board
    }

    #[test]
    fn test_all_tiers_return_only_legal_moves() {
        for _ in 0..20 {
            let board = random_board(12);
            for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
                let bot = bot_for(difficulty, Piece::O, 2, 2);
                let mv = bot
                    .choose_move(&board)
                    .expect("board with open rows must yield a move");
                assert!(
                    board.is_valid_move(mv.row, mv.side),
                    "{difficulty:?} chose illegal move {mv:?}\n{}",
                    board.display()
                );
            }
        }
    }

    #[test]
    fn test_immediate_win_found_from_right_edge() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.apply_move(2, EntrySide::Right, Piece::O);
        }
        let mv = immediate_win(&board, Piece::O).expect("winning move missed");
        let mut probe = board.clone();
        probe.apply_move(mv.row, mv.side, Piece::O);
        assert!(probe.check_win(Piece::O));
    }

    #[test]
    fn test_block_targets_opponent_winning_cell() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.apply_move(5, EntrySide::Left, Piece::X);
        }
        let mv = block_opponent_win(&board, Piece::O).expect("block missed");
        let mut probe = board.clone();
        let landed = probe.apply_move(mv.row, mv.side, Piece::O);
        // O must land on (5,3), the cell X would win on.
        assert_eq!(landed, Some((5, 3)));
    }

    #[test]
    fn test_no_block_when_no_threat() {
        let board = Board::new();
        assert!(block_opponent_win(&board, Piece::O).is_none());
    }
}
