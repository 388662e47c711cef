//! An agent to solve the game of Connect 4

use log::debug;

use crate::{
    move_sorter::MoveSorter, opening_book::OpeningBook, position::Position,
    transposition_table::TranspositionTable, HEIGHT, WIDTH,
};

use std::cmp::Ordering;
use std::sync::Arc;

/// The minimum possible score of a position
pub const MIN_SCORE: i32 = -((WIDTH * HEIGHT) as i32) / 2 + 3;
/// The maximum possible score of a postion
pub const MAX_SCORE: i32 = ((WIDTH * HEIGHT) as i32 + 1) / 2 - 3;

/// Score reported by [`Solver::analyze`] for columns that can't be played
pub const INVALID_MOVE: i32 = -1000;

const CELLS: i32 = (WIDTH * HEIGHT) as i32;

/// Returns the columns ordered from the middle outwards, as
/// the middle columns are often better moves
pub const fn move_order() -> [usize; WIDTH] {
    let mut move_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        move_order[i] = (WIDTH / 2) + (i % 2) * (i / 2 + 1) - (1 - i % 2) * (i / 2);
        i += 1;
    }
    move_order
}

/// Score of a position where the player to move wins immediately
fn immediate_win_score(position: &Position) -> i32 {
    (CELLS + 1 - position.nb_moves() as i32) / 2
}

/// An agent to solve Connect 4 positions
///
/// # Notes
/// This agent uses a classical game tree search with various optimisations to
/// find the mathematically best move(s) in any position, thus 'solving' the game
///
/// # Position Scoring
/// A position is scored from the point of view of the player to move, by how early
/// the forced result happens. Winning with your last possible stone (the 21st on a 7x6
/// board) scores 1, winning with your 4th stone scores 18, and losses are the negated
/// scores of the opponent's win. A drawn position has a score of 0.
pub struct Solver {
    node_count: usize,
    column_order: [usize; WIDTH],
    transposition_table: TranspositionTable,
    opening_book: Option<Arc<OpeningBook>>,
}

impl Solver {
    pub fn new() -> Self {
        Self::with_transposition_table(TranspositionTable::new())
    }

    /// Creates a new `Solver` using the given transposition table
    pub fn with_transposition_table(transposition_table: TranspositionTable) -> Self {
        Self {
            node_count: 0,
            column_order: move_order(),
            transposition_table,
            opening_book: None,
        }
    }

    /// Adds an opening book to an existing `Solver`
    pub fn with_opening_book(mut self, opening_book: Arc<OpeningBook>) -> Self {
        self.opening_book = Some(opening_book);
        self
    }

    /// The number of nodes searched by this `Solver` so far (for diagnostics only)
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Clears the node counter and the transposition table
    pub fn reset(&mut self) {
        self.node_count = 0;
        self.transposition_table.reset();
    }

    /// Performs game tree search within the window `[alpha, beta]`
    ///
    /// The position must not be won and the player to move must not be able to
    /// win immediately. The result is exact when it lies inside the window, an
    /// upper bound when at or below `alpha`, and a lower bound at or above `beta`.
    fn negamax(&mut self, position: &Position, mut alpha: i32, mut beta: i32) -> i32 {
        debug_assert!(alpha < beta);
        self.node_count += 1;

        // look for moves that don't give the opponent a next turn win
        let non_losing_moves = position.possible_non_losing_moves();
        if non_losing_moves == 0 {
            return -(CELLS - position.nb_moves() as i32) / 2;
        }

        // the last two cells can't produce an alignment for either player
        if position.nb_moves() as i32 >= CELLS - 2 {
            return 0;
        }

        // lower bound, the opponent can't win with their next move
        let min = -(CELLS - 2 - position.nb_moves() as i32) / 2;
        if alpha < min {
            alpha = min;
            if alpha >= beta {
                return alpha;
            }
        }

        // upper bound, we can't win with this move
        let max = (CELLS - 1 - position.nb_moves() as i32) / 2;
        if beta > max {
            beta = max;
            if alpha >= beta {
                return beta;
            }
        }

        // try to fetch the upper/lower bound of the score from the transposition table
        let key = position.key();
        let value = self.transposition_table.get(key) as i32;
        if value != 0 {
            // check if lower bound
            if value > MAX_SCORE - MIN_SCORE + 1 {
                let min = value + 2 * MIN_SCORE - MAX_SCORE - 2;
                if alpha < min {
                    alpha = min;
                    if alpha >= beta {
                        // prune the exploration
                        return alpha;
                    }
                }
            // else upper bound
            } else {
                let max = value + MIN_SCORE - 1;
                if beta > max {
                    beta = max;
                    if alpha >= beta {
                        // prune the exploration
                        return beta;
                    }
                }
            }
        }

        // book scores are exact
        if let Some(book) = &self.opening_book {
            let value = book.get(position) as i32;
            if value != 0 {
                return value + MIN_SCORE - 1;
            }
        }

        let mut moves = MoveSorter::new();
        // reversing move order to put edges first reduces the amount of sorting
        // as these moves are worse on average
        for &column in self.column_order.iter().rev() {
            let candidate = non_losing_moves & Position::column_mask(column);
            if candidate != 0 {
                moves.add(candidate, position.move_score(candidate));
            }
        }

        // search the next level of the tree
        for move_bitmap in moves {
            let mut next = *position;
            next.play(move_bitmap);
            // the search window is flipped for the other player
            let score = -self.negamax(&next, -beta, -alpha);
            // if a child node's score is better than beta, we can prune the tree
            // here because a perfect opponent will not pick this branch
            if score >= beta {
                // save a lower bound of the score
                self.transposition_table
                    .put(key, (score + MAX_SCORE - 2 * MIN_SCORE + 2) as u8);
                return score;
            }
            if score > alpha {
                alpha = score;
            }
        }

        // offset of one to prevent putting a 0, which represents an empty entry
        self.transposition_table
            .put(key, (alpha - MIN_SCORE + 1) as u8);
        alpha
    }

    /// Calculates the score of a position (see [Position Scoring])
    ///
    /// A `weak` solve only tells wins, draws and losses apart, only the sign of its
    /// result is meaningful.
    ///
    /// [Position Scoring]: #position-scoring
    pub fn solve(&mut self, position: &Position, weak: bool) -> i32 {
        // negamax does not handle immediate wins
        if position.can_win_next() {
            return immediate_win_score(position);
        }

        let (mut min, mut max) = if weak {
            (-1, 1)
        } else {
            (
                -(CELLS - position.nb_moves() as i32) / 2,
                (CELLS + 1 - position.nb_moves() as i32) / 2,
            )
        };

        // iteratively narrow the search window
        while min < max {
            let mut mid = min + (max - min) / 2;
            // most scores are close to 0, so search nearer to it
            if mid <= 0 && min / 2 < mid {
                mid = min / 2
            } else if mid >= 0 && max / 2 > mid {
                mid = max / 2
            }

            // use a null-window to determine if the actual score is greater or less that mid
            let r = self.negamax(position, mid, mid + 1);
            debug!(
                "null-window probe at {} in [{}, {}] returned {} ({} nodes)",
                mid, min, max, r, self.node_count
            );

            // r is not necessarily the exact true score, but its value indicates
            // whether the true score is above or below the search target
            if r <= mid {
                max = r
            } else {
                min = r;
            }
        }
        // min and max are equal here
        min
    }

    /// Scores every column of a position from the point of view of the player to move
    ///
    /// Columns that can't be played score [`INVALID_MOVE`].
    pub fn analyze(&mut self, position: &Position, weak: bool) -> [i32; WIDTH] {
        let mut scores = [INVALID_MOVE; WIDTH];

        for (column, score) in scores.iter_mut().enumerate() {
            if !position.can_play(column) {
                continue;
            }
            *score = if position.is_winning_move(column) {
                immediate_win_score(position)
            } else {
                let mut next = *position;
                next.play_col(column);
                -self.solve(&next, weak)
            };
            debug!("column {} scored {}", column, score);
        }
        scores
    }

    /// The playable column with the best score, preferring central columns on ties
    pub fn best_move(&mut self, position: &Position, weak: bool) -> Option<usize> {
        let scores = self.analyze(position, weak);
        self.best_move_from_scores(&scores)
    }

    /// Picks the best column from the output of [`Solver::analyze`]
    pub fn best_move_from_scores(&self, scores: &[i32; WIDTH]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for &column in self.column_order.iter() {
            if scores[column] == INVALID_MOVE {
                continue;
            }
            match best {
                Some(current) if scores[current] >= scores[column] => {}
                _ => best = Some(column),
            }
        }
        best
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a position score to a win distance in a single player's moves
pub fn score_to_win_distance(position: &Position, score: i32) -> usize {
    match score.cmp(&0) {
        Ordering::Equal => WIDTH * HEIGHT - position.nb_moves(),
        Ordering::Greater => {
            (WIDTH * HEIGHT / 2 + 1 - score as usize) - position.nb_moves() / 2
        }
        Ordering::Less => {
            (WIDTH * HEIGHT / 2 + 1) - (-score as usize) - position.nb_moves() / 2
        }
    }
}
