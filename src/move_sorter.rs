use crate::WIDTH;

/// Orders candidate moves by a heuristic score
///
/// Moves are insertion sorted as they are added, which is cheap for at most
/// `WIDTH` entries and nearly free when they arrive in roughly increasing order.
/// Draining returns the highest score first.
pub struct MoveSorter {
    size: usize,
    // move bitmap and score, ascending by score
    moves: [(u64, i32); WIDTH],
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            size: 0,
            moves: [(0, 0); WIDTH],
        }
    }

    /// # Panics
    /// If `WIDTH` moves have already been added.
    pub fn add(&mut self, new_move: u64, score: i32) {
        assert!(self.size < WIDTH, "move sorter holds at most {} moves", WIDTH);
        let mut pos = self.size;
        self.size += 1;
        while pos != 0 && self.moves[pos - 1].1 > score {
            self.moves[pos] = self.moves[pos - 1];
            pos -= 1;
        }
        self.moves[pos] = (new_move, score);
    }

    /// Removes and returns the remaining move with the highest score
    pub fn get_next(&mut self) -> Option<u64> {
        match self.size {
            0 => None,
            _ => {
                self.size -= 1;
                Some(self.moves[self.size].0)
            }
        }
    }

    pub fn reset(&mut self) {
        self.size = 0;
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Iterator for MoveSorter {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next()
    }
}

impl Default for MoveSorter {
    fn default() -> Self {
        Self::new()
    }
}
