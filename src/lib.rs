//! A perfect solver for the board game 'Connect 4'
//!
//! Positions are stored as bitboards and scored with a negamax search using
//! alpha-beta pruning, a transposition table, move ordering and an optional
//! opening book. The crate exposes a small move/query interface so that any
//! presentation layer can drive a game and ask for per-column scores.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_solver::{position::Position, solver::{Solver, INVALID_MOVE}};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! // player 1 has three stones stacked in the first column
//! let position = Position::from_moves("121212")?;
//! let mut solver = Solver::with_transposition_table(
//!     connect4_solver::transposition_table::TranspositionTable::with_size(1_000_003),
//! );
//!
//! assert!(position.is_winning_move(0));
//! assert_eq!(solver.solve(&position, false), 18);
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod transposition_table;

pub mod position;

pub mod move_sorter;

pub mod opening_book;

pub mod solver;

mod test;

/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

// ensure that the given dimensions fit in a u64 for the bitboard representation
const_assert!(WIDTH * (HEIGHT + 1) < 64);
// an opening book can't be deeper than the board
const_assert!(opening_book::MAX_BOOK_DEPTH <= WIDTH * HEIGHT);
