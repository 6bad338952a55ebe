//! Heuristic board evaluation over length-4 windows.

use crate::game::{Board, CONNECT_N, Piece, ROWS, window_coords};

/// Scoring weights applied to every length-4 window.
///
/// The magnitudes enforce a strict preference ordering: winning outright
/// beats blocking an opponent win, which beats building toward an own win,
/// which beats conceding opponent progress. Denying opponent threats is
/// weighted more heavily than building equivalent threats of one's own.
#[derive(Debug, Clone, Copy)]
pub struct WindowWeights {
    /// Window already won by the bot.
    pub win: i32,
    /// Window already won by the opponent.
    pub loss: i32,
    /// Bot has three of four, one empty.
    pub own_three: i32,
    /// Bot has two of four, two empty.
    pub own_two: i32,
    /// Bot has one of four, three empty.
    pub own_one: i32,
    /// Opponent has three of four, one empty (urgent block).
    pub opp_three: i32,
    /// Opponent has two of four, two empty.
    pub opp_two: i32,
    /// Opponent has one of four, three empty.
    pub opp_one: i32,
    /// Per-cell bonus for occupying the central rows. Zero disables it.
    pub center_row: i32,
}

impl WindowWeights {
    /// Weights for the shallow (medium tier) evaluator.
    pub fn shallow() -> Self {
        Self {
            win: 100_000,
            loss: -100_000,
            own_three: 1_000,
            own_two: 100,
            own_one: 0,
            opp_three: -5_000,
            opp_two: -150,
            opp_one: 0,
            center_row: 0,
        }
    }

    /// Weights for the deep (hard tier) evaluator: sharper threat
    /// asymmetry, credit for lone pieces, and a central-row bonus.
    pub fn deep() -> Self {
        Self {
            win: 1_000_000,
            loss: -1_000_000,
            own_three: 5_000,
            own_two: 500,
            own_one: 50,
            opp_three: -20_000,
            opp_two: -600,
            opp_one: -20,
            center_row: 2,
        }
    }
}

/// Heuristic evaluator for a fixed bot piece.
#[derive(Debug, Clone)]
pub struct Evaluator {
    piece: Piece,
    weights: WindowWeights,
}

impl Evaluator {
    /// Creates an evaluator scoring boards from `piece`'s perspective.
    pub fn new(piece: Piece, weights: WindowWeights) -> Self {
        Self { piece, weights }
    }

    /// The score used for terminal win/loss positions in search.
    pub fn win_score(&self) -> i32 {
        self.weights.win
    }

    /// Scores the whole board from the bot's perspective.
    pub fn score(&self, board: &Board) -> i32 {
        let opponent = self.piece.opponent();
        let mut score = 0;

        for window in window_coords() {
            let mut own = 0;
            let mut opp = 0;
            for (r, c) in window {
                match board.get(r, c) {
                    Some(p) if p == self.piece => own += 1,
                    Some(_) => opp += 1,
                    None => {}
                }
            }
            let empty = CONNECT_N - own - opp;
            score += self.score_window(own, opp, empty);
        }

        if self.weights.center_row != 0 {
            let middle = (ROWS / 2 - 1)..=(ROWS / 2 + 1);
            for r in middle {
                for c in 0..crate::game::COLS {
                    match board.get(r, c) {
                        Some(p) if p == self.piece => score += self.weights.center_row,
                        Some(p) if p == opponent => score -= self.weights.center_row,
                        _ => {}
                    }
                }
            }
        }

        score
    }

    fn score_window(&self, own: usize, opp: usize, empty: usize) -> i32 {
        let w = &self.weights;
        if own == CONNECT_N {
            return w.win;
        }
        if opp == CONNECT_N {
            return w.loss;
        }
        let mut score = 0;
        if own == CONNECT_N - 1 && empty == 1 {
            score += w.own_three;
        } else if own == CONNECT_N - 2 && empty == 2 {
            score += w.own_two;
        } else if own == CONNECT_N - 3 && empty == 3 {
            score += w.own_one;
        }
        if opp == CONNECT_N - 1 && empty == 1 {
            score += w.opp_three;
        } else if opp == CONNECT_N - 2 && empty == 2 {
            score += w.opp_two;
        } else if opp == CONNECT_N - 3 && empty == 3 {
            score += w.opp_one;
        }
        score
    }
}
