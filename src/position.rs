//! Bitboard representation of a Connect 4 position
//!
//! Each column is stored on `HEIGHT + 1` bits, bottom to top, with the extra
//! top bit always empty. For a 7x6 board the bit indices are:
//!
//! ```text
//! .  .  .  .  .  .  .
//! 5 12 19 26 33 40 47
//! 4 11 18 25 32 39 46
//! 3 10 17 24 31 38 45
//! 2  9 16 23 30 37 44
//! 1  8 15 22 29 36 43
//! 0  7 14 21 28 35 42
//! ```
//!
//! All queries are relative to the player about to move.

use anyhow::{anyhow, Result};

use crate::{HEIGHT, WIDTH};

mod static_masks {
    use crate::{HEIGHT, WIDTH};

    pub const fn bottom_mask() -> u64 {
        let mut mask = 0;
        let mut column = 0;
        while column < WIDTH {
            mask |= 1 << (column * (HEIGHT + 1));
            column += 1;
        }
        mask
    }
    pub const fn full_board_mask() -> u64 {
        bottom_mask() * ((1 << HEIGHT as u64) - 1)
    }
}

/// One of the two players, numbered by move order
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }
}

/// A Connect 4 game state
///
/// Positions are small values, copying one is the intended way to explore
/// a branch without touching the original.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    // mask of the stones of the player about to move
    current_player_mask: u64,
    // mask of all stones
    stones_mask: u64,
    num_moves: usize,
}

impl Position {
    pub fn new() -> Self {
        Self {
            current_player_mask: 0,
            stones_mask: 0,
            num_moves: 0,
        }
    }

    /// Parses a sequence of 1-indexed column digits, e.g. `"4453"`
    ///
    /// Fails on unknown characters, full columns and moves that would end the game.
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut position = Self::new();

        for column_char in moves.as_ref().chars() {
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => {
                    let column = column - 1;
                    if !position.can_play(column) {
                        return Err(anyhow!("Invalid move, column {} full", column + 1));
                    }
                    // abort if the position is won at any point
                    if position.is_winning_move(column) {
                        return Err(anyhow!("Invalid position, game is over"));
                    }
                    position.play_col(column);
                }
                _ => return Err(anyhow!("could not parse '{}' as a valid move", column_char)),
            }
        }
        Ok(position)
    }

    fn top_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1) + (HEIGHT - 1))
    }

    fn bottom_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1))
    }

    /// Mask of every playable cell of a column, 0 outside the board
    pub fn column_mask(column: usize) -> u64 {
        if column >= WIDTH {
            return 0;
        }
        ((1 << HEIGHT) - 1) << (column * (HEIGHT + 1))
    }

    /// Mask of the single cell at `column`, `row`, as used by [`Position::winning_pieces`]
    ///
    /// Cells outside the board give 0.
    pub fn cell_mask(column: usize, row: usize) -> u64 {
        if column >= WIDTH || row >= HEIGHT {
            return 0;
        }
        Self::bottom_mask(column) << row
    }

    pub fn column_from_move(move_bitmap: u64) -> usize {
        for column in 0..WIDTH {
            if move_bitmap & Self::column_mask(column) != 0 {
                return column;
            }
        }
        // WIDTH is always an invalid column
        WIDTH
    }

    pub fn nb_moves(&self) -> usize {
        self.num_moves
    }

    pub fn player_to_move(&self) -> Player {
        if self.num_moves % 2 == 0 {
            Player::One
        } else {
            Player::Two
        }
    }

    /// The owner of the stone at `column`, `row` (row 0 is the bottom), if any
    pub fn stone_at(&self, column: usize, row: usize) -> Option<Player> {
        if column >= WIDTH || row >= HEIGHT {
            return None;
        }
        let cell = Self::cell_mask(column, row);
        if self.stones_mask & cell == 0 {
            None
        } else if self.current_player_mask & cell != 0 {
            Some(self.player_to_move())
        } else {
            Some(self.player_to_move().other())
        }
    }

    /// Compact key for the transposition table, unique for every position
    pub fn key(&self) -> u64 {
        self.current_player_mask + self.stones_mask + static_masks::bottom_mask()
    }

    /// Base-3 key shared by a position and its horizontal mirror
    ///
    /// Columns are read bottom to top, a stone of the player to move is the
    /// digit 1, an opponent stone 2, and each column ends with a 0. The key is
    /// the smaller of the left-to-right and right-to-left readings, without
    /// the final 0 digit. It fits in a `u64` up to 34 stones.
    pub fn key3(&self) -> u128 {
        let key_forward = (0..WIDTH).fold(0, |key, column| self.partial_key3(key, column));
        let key_reverse = (0..WIDTH)
            .rev()
            .fold(0, |key, column| self.partial_key3(key, column));

        key_forward.min(key_reverse) / 3
    }

    fn partial_key3(&self, mut key: u128, column: usize) -> u128 {
        let mut cell = Self::bottom_mask(column);
        while cell & self.stones_mask != 0 {
            key *= 3;
            if cell & self.current_player_mask != 0 {
                key += 1;
            } else {
                key += 2;
            }
            cell <<= 1;
        }
        key * 3
    }

    pub fn can_play(&self, column: usize) -> bool {
        column < WIDTH && Self::top_mask(column) & self.stones_mask == 0
    }

    /// Plays a single-bit move for the current player
    pub fn play(&mut self, move_bitmap: u64) {
        // switch the current player
        self.current_player_mask ^= self.stones_mask;
        // add a stone of the previous player to the correct column
        self.stones_mask |= move_bitmap;
        self.num_moves += 1;
    }

    /// Drops a stone in `column`
    ///
    /// # Panics
    /// If the column is full or out of range.
    pub fn play_col(&mut self, column: usize) {
        assert!(self.can_play(column), "column {} cannot be played", column);
        self.play((self.stones_mask + Self::bottom_mask(column)) & Self::column_mask(column));
    }

    /// Does playing `column` complete an alignment for the current player?
    pub fn is_winning_move(&self, column: usize) -> bool {
        self.can_play(column)
            && self.winning_position() & self.possible() & Self::column_mask(column) != 0
    }

    pub fn can_win_next(&self) -> bool {
        self.winning_position() & self.possible() != 0
    }

    /// Bitmap of the lowest free cell of every column that isn't full
    pub fn possible(&self) -> u64 {
        (self.stones_mask + static_masks::bottom_mask()) & static_masks::full_board_mask()
    }

    /// Bitmap of the moves that don't hand the opponent an immediate win
    ///
    /// # Panics
    /// If the current player can win on this move, as a winning move could be
    /// filtered out in favour of a block.
    pub fn possible_non_losing_moves(&self) -> u64 {
        assert!(
            !self.can_win_next(),
            "non-losing moves requested for a position with a winning move"
        );
        let mut possible_moves = self.possible();
        let opponent_winning_positions = self.opponent_winning_position();
        let forced_moves = possible_moves & opponent_winning_positions;

        if forced_moves != 0 {
            // if more than one forced move exists, you can't prevent the opponent winning
            if forced_moves & (forced_moves - 1) != 0 {
                return 0;
            } else {
                possible_moves = forced_moves
            }
        }
        // avoid playing below an opponent's winning move
        possible_moves & !(opponent_winning_positions >> 1)
    }

    /// Number of open cells completing an alignment after playing `candidate`
    pub fn move_score(&self, candidate: u64) -> i32 {
        Self::compute_winning_position(self.current_player_mask | candidate, self.stones_mask)
            .count_ones() as i32
    }

    fn winning_position(&self) -> u64 {
        Self::compute_winning_position(self.current_player_mask, self.stones_mask)
    }

    fn opponent_winning_position(&self) -> u64 {
        Self::compute_winning_position(
            self.current_player_mask ^ self.stones_mask,
            self.stones_mask,
        )
    }

    // create a bitmap of open cells that complete alignments for the stones in `player_mask`
    fn compute_winning_position(player_mask: u64, stones_mask: u64) -> u64 {
        // vertical
        // find the top ends of 3-alignemnts
        let mut r = (player_mask << 1) & (player_mask << 2) & (player_mask << 3);

        // horizontal, then both diagonals
        for &shift in [HEIGHT + 1, HEIGHT, HEIGHT + 2].iter() {
            let mut p = (player_mask << shift) & (player_mask << (2 * shift));
            // find the right ends of 3-alignments
            r |= p & (player_mask << (3 * shift));
            // find holes of the type ...O O _ O...
            r |= p & (player_mask >> shift);

            p = (player_mask >> shift) & (player_mask >> (2 * shift));
            // find the left ends of 3-alignments
            r |= p & (player_mask >> (3 * shift));
            // find holes of the type ...O _ O O...
            r |= p & (player_mask << shift);
        }

        r & (static_masks::full_board_mask() ^ stones_mask)
    }

    /// Bitmap of the stones forming a completed alignment, 0 if there is none
    ///
    /// Only the player who just moved can own an alignment.
    pub fn winning_pieces(&self) -> u64 {
        let stones = self.current_player_mask ^ self.stones_mask;
        let mut pieces = 0;

        // vertical, horizontal, and both diagonals
        for &shift in [1, HEIGHT + 1, HEIGHT, HEIGHT + 2].iter() {
            // mark all runs of 2
            let pairs = stones & (stones >> shift);
            // bottom/left ends of runs of 4
            let mut run = pairs & (pairs >> (2 * shift));
            run |= run << shift;
            run |= run << (2 * shift);
            pieces |= run;
        }
        pieces
    }

    /// Is the board full or the game won?
    pub fn is_game_over(&self) -> bool {
        self.num_moves == WIDTH * HEIGHT || self.winning_pieces() != 0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}
