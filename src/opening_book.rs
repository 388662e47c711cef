//! Precomputed exact scores of early positions
//!
//! A book file holds the exact score of every position up to a given depth,
//! keyed by the mirror-symmetric [`Position::key3`] so that a position and its
//! mirror image share one record.
//!
//! File format, big endian:
//! - 1 byte: board width
//! - 1 byte: board height
//! - 1 byte: depth, the highest stone count of a stored position
//! - 4 bytes: number of records
//! - per record, 8 bytes of key and 1 byte of value

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indicatif::*;
use log::{info, warn};
use once_cell::sync::OnceCell;
use rayon::prelude::*;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    position::Position,
    solver::{Solver, MAX_SCORE, MIN_SCORE},
    transposition_table::{next_prime, TranspositionTable},
    HEIGHT, WIDTH,
};

pub const DEFAULT_BOOK_PATH: &str = "opening_book.bin";

/// Deepest book supported, the base-3 key of any deeper position may overflow a u64
pub const MAX_BOOK_DEPTH: usize = 34;

// positions solved by one solver during generation
const GENERATION_CHUNK: usize = 4096;

static INSTALLED_BOOK: OnceCell<Arc<OpeningBook>> = OnceCell::new();

/// Makes `book` the process-wide opening book, this can only happen once
pub fn install(book: OpeningBook) -> Result<Arc<OpeningBook>> {
    let book = Arc::new(book);
    INSTALLED_BOOK
        .set(book.clone())
        .map_err(|_| anyhow!("an opening book is already installed"))?;
    info!(
        "installed opening book with {} positions up to depth {}",
        book.len(),
        book.depth()
    );
    Ok(book)
}

/// The process-wide opening book, if one was installed
pub fn installed() -> Option<Arc<OpeningBook>> {
    INSTALLED_BOOK.get().cloned()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BookEntry {
    pub key3: u64,
    /// score - MIN_SCORE + 1, never 0
    pub value: u8,
}

impl BookEntry {
    pub fn from_score(key3: u64, score: i32) -> Self {
        Self {
            key3,
            value: (score - MIN_SCORE + 1) as u8,
        }
    }

    pub fn score(&self) -> i32 {
        self.value as i32 + MIN_SCORE - 1
    }
}

/// The records of a book file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookData {
    pub depth: usize,
    pub entries: Vec<BookEntry>,
}

impl BookData {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open opening book {}", path.display()))?;
        let data = Self::read_from(BufReader::new(file))
            .with_context(|| format!("failed to read opening book {}", path.display()))?;
        info!(
            "loaded {} book positions up to depth {} from {}",
            data.entries.len(),
            data.depth,
            path.display()
        );
        Ok(data)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create opening book {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!("wrote {} book positions to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let width = reader.read_u8()? as usize;
        let height = reader.read_u8()? as usize;
        if (width, height) != (WIDTH, HEIGHT) {
            bail!(
                "book is for a {}x{} board, expected {}x{}",
                width,
                height,
                WIDTH,
                HEIGHT
            );
        }
        let depth = reader.read_u8()? as usize;
        if depth > MAX_BOOK_DEPTH {
            bail!("book depth {} exceeds the maximum of {}", depth, MAX_BOOK_DEPTH);
        }

        let count = reader.read_u32::<BigEndian>()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key3 = reader.read_u64::<BigEndian>()?;
            let value = reader.read_u8()?;
            if value == 0 || value as i32 > MAX_SCORE - MIN_SCORE + 1 {
                bail!("invalid book value {} for key {}", value, key3);
            }
            entries.push(BookEntry { key3, value });
        }
        Ok(Self { depth, entries })
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u8(WIDTH as u8)?;
        writer.write_u8(HEIGHT as u8)?;
        writer.write_u8(self.depth as u8)?;
        writer.write_u32::<BigEndian>(self.entries.len() as u32)?;
        for entry in self.entries.iter() {
            writer.write_u64::<BigEndian>(entry.key3)?;
            writer.write_u8(entry.value)?;
        }
        Ok(())
    }

    /// Solves every position with at most `depth` stones
    ///
    /// Positions where the player to move wins immediately are skipped, the
    /// solver settles those before consulting the book.
    pub fn generate(depth: usize) -> Result<Self> {
        if depth > MAX_BOOK_DEPTH {
            bail!("book depth {} exceeds the maximum of {}", depth, MAX_BOOK_DEPTH);
        }
        let start = Instant::now();

        let positions = unique_positions(depth);
        info!(
            "found {} unique positions up to depth {} in {:.1}s",
            positions.len(),
            depth,
            start.elapsed().as_secs_f64()
        );

        let progress = ProgressBar::new(positions.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("Solving book positions: {bar:40.cyan/blue} {pos}/{len} ~{eta} remaining")
                .progress_chars("█▓▒░  "),
        );

        let chunks: Vec<Vec<BookEntry>> = positions
            .par_chunks(GENERATION_CHUNK)
            .map(|chunk| {
                // transposition table entries stay valid across positions
                let mut solver = Solver::new();
                chunk
                    .iter()
                    .map(|(key3, position)| {
                        let score = solver.solve(position, false);
                        progress.inc(1);
                        BookEntry::from_score(*key3, score)
                    })
                    .collect()
            })
            .collect();
        progress.finish();

        let mut entries: Vec<BookEntry> = chunks.into_iter().flatten().collect();
        entries.sort_unstable();

        info!(
            "opening book generation completed in {}",
            HumanDuration(start.elapsed())
        );
        Ok(Self { depth, entries })
    }
}

// every reachable position with at most `depth` stones, one per symmetric key
pub(crate) fn unique_positions(depth: usize) -> Vec<(u64, Position)> {
    let mut visited = HashSet::new();
    let mut unique = HashMap::new();

    let root = Position::new();
    visited.insert(root.key());
    let mut stack = vec![root];

    while let Some(position) = stack.pop() {
        if !position.can_win_next() {
            if let Ok(key3) = u64::try_from(position.key3()) {
                unique.entry(key3).or_insert(position);
            }
        }
        if position.nb_moves() == depth {
            continue;
        }
        for column in 0..WIDTH {
            // winning moves end the game
            if position.can_play(column) && !position.is_winning_move(column) {
                let mut next = position;
                next.play_col(column);
                if visited.insert(next.key()) {
                    stack.push(next);
                }
            }
        }
    }

    let mut positions: Vec<(u64, Position)> = unique.into_iter().collect();
    positions.sort_unstable_by_key(|(key3, _)| *key3);
    positions
}

/// A read-only lookup of exact early-game scores
pub struct OpeningBook {
    depth: usize,
    positions: usize,
    table: TranspositionTable<u64>,
}

impl OpeningBook {
    pub fn new(data: &BookData) -> Self {
        let mut table = TranspositionTable::with_size(next_prime(4 * data.entries.len()));
        for entry in data.entries.iter() {
            table.put(entry.key3, entry.value);
        }

        let shadowed = data
            .entries
            .iter()
            .filter(|entry| table.get(entry.key3) != entry.value)
            .count();
        if shadowed != 0 {
            warn!(
                "{} of {} book positions were overwritten by bucket collisions",
                shadowed,
                data.entries.len()
            );
        }

        Self {
            depth: data.depth,
            positions: data.entries.len(),
            table,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(&BookData::load(path)?))
    }

    /// Returns the encoded score of `position` (score - MIN_SCORE + 1), or 0 if unknown
    pub fn get(&self, position: &Position) -> u8 {
        if position.nb_moves() > self.depth {
            return 0;
        }
        match u64::try_from(position.key3()) {
            Ok(key3) => self.table.get(key3),
            Err(_) => 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of positions the book was built from
    pub fn len(&self) -> usize {
        self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions == 0
    }
}
