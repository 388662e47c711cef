#[cfg(test)]
pub mod test {
    use anyhow::Result;
    use std::sync::Arc;

    use crate::{
        move_sorter::MoveSorter,
        opening_book::{self, unique_positions, BookData, BookEntry, OpeningBook},
        position::{Player, Position},
        solver::{move_order, score_to_win_distance, Solver, INVALID_MOVE, MIN_SCORE},
        transposition_table::{next_prime, TranspositionTable},
        HEIGHT, WIDTH,
    };

    const INV: i32 = INVALID_MOVE;

    // end game positions with their score and the score of every column
    const END_GAMES: [(&str, i32, [i32; WIDTH]); 6] = [
        ("733222714456256651771522663544", 1, [-5, INV, 0, 1, -5, -5, -5]),
        ("22573427247177176444534655", 0, [-8, -8, -8, INV, -8, 0, INV]),
        ("357134143374441651777433", -1, [-2, -2, INV, INV, -1, -2, -2]),
        ("5357113575332732721643", 9, [-6, -6, INV, 9, -7, 9, -7]),
        ("25414526443322655645", 3, [0, 2, 2, 0, 3, 0, 0]),
        ("61663224175564411224446677711322", 3, [INV, INV, 1, INV, 1, INV, 3]),
    ];

    fn solver() -> Solver {
        Solver::with_transposition_table(TranspositionTable::with_size(1_000_003))
    }

    fn mirror(moves: &str) -> String {
        moves
            .chars()
            .map(|c| {
                let column = c.to_digit(10).unwrap() as usize;
                std::char::from_digit((WIDTH + 1 - column) as u32, 10).unwrap()
            })
            .collect()
    }

    fn play_columns(columns: &[usize]) -> Position {
        let mut position = Position::new();
        for &column in columns {
            position.play_col(column);
        }
        position
    }

    #[test]
    pub fn parse_moves() -> Result<()> {
        let position = Position::from_moves("4453")?;
        assert_eq!(position.nb_moves(), 4);
        assert_eq!(position.player_to_move(), Player::One);
        assert_eq!(position.stone_at(3, 0), Some(Player::One));
        assert_eq!(position.stone_at(3, 1), Some(Player::Two));
        assert_eq!(position.stone_at(4, 0), Some(Player::One));
        assert_eq!(position.stone_at(2, 0), Some(Player::Two));
        assert_eq!(position.stone_at(3, 2), None);

        assert!(Position::from_moves("48").is_err());
        assert!(Position::from_moves("4a").is_err());
        assert!(Position::from_moves("1111111").is_err());
        // the 7th move completes a vertical alignment
        assert!(Position::from_moves("1212121").is_err());
        Ok(())
    }

    #[test]
    pub fn empty_board() {
        let position = Position::new();
        assert_eq!(position.nb_moves(), 0);
        assert_eq!(position.winning_pieces(), 0);
        assert!(!position.is_game_over());
        assert!(!position.can_win_next());
        assert_eq!(position.key(), 4432676798593);
        assert_eq!(position.key3(), 0);
        assert!((0..WIDTH).all(|column| position.can_play(column)));
    }

    #[test]
    pub fn copies_are_independent() -> Result<()> {
        let original = Position::from_moves("4453")?;
        let mut copy = original;
        assert_eq!(copy.key(), original.key());

        copy.play_col(0);
        assert_ne!(copy.key(), original.key());
        assert_eq!(original.nb_moves(), 4);
        assert_eq!(original.stone_at(0, 0), None);
        Ok(())
    }

    #[test]
    pub fn column_fills_up() {
        let mut position = Position::new();
        for _ in 0..HEIGHT {
            assert!(position.can_play(3));
            position.play_col(3);
        }
        assert!(!position.can_play(3));
        assert!(position.can_play(2));
        assert!(!position.can_play(WIDTH));
        assert!(!position.can_play(100));
        assert!(!position.is_winning_move(WIDTH));
    }

    #[test]
    #[should_panic]
    pub fn overfilled_column() {
        let mut position = Position::new();
        for _ in 0..=HEIGHT {
            position.play_col(3);
        }
    }

    #[test]
    pub fn symmetric_key() -> Result<()> {
        assert_eq!(Position::from_moves("4")?.key3(), 54);
        assert_eq!(Position::from_moves("43")?.key3(), 99);
        assert_eq!(Position::from_moves("45")?.key3(), 99);
        assert_eq!(Position::from_moves("4455")?.key3(), 1260);

        for (moves, _, _) in END_GAMES.iter() {
            let position = Position::from_moves(moves)?;
            let mirrored = Position::from_moves(mirror(moves))?;
            assert_eq!(position.key3(), mirrored.key3());
            assert_ne!(position.key(), mirrored.key());
        }
        Ok(())
    }

    #[test]
    pub fn no_alignment_below_seven_stones() {
        fn visit(position: Position, depth: usize) {
            assert_eq!(position.winning_pieces(), 0);
            if depth == 0 {
                return;
            }
            for column in 0..WIDTH {
                let mut next = position;
                next.play_col(column);
                visit(next, depth - 1);
            }
        }
        visit(Position::new(), 6);
    }

    #[test]
    pub fn winning_pieces() {
        // vertical
        let position = play_columns(&[0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(position.winning_pieces(), 0b1111);
        assert!(position.is_game_over());

        // horizontal
        let position = play_columns(&[0, 0, 1, 1, 2, 2, 3]);
        assert_eq!(
            position.winning_pieces(),
            Position::cell_mask(0, 0)
                | Position::cell_mask(1, 0)
                | Position::cell_mask(2, 0)
                | Position::cell_mask(3, 0)
        );

        // diagonal /
        let position = play_columns(&[0, 0, 1, 2, 1, 2, 2, 3, 3, 3, 3]);
        assert_eq!(position.winning_pieces(), 16843009);

        // diagonal \
        let position = play_columns(&[0, 0, 0, 1, 0, 0, 3, 1, 1, 2, 2]);
        assert_eq!(position.winning_pieces(), 2130440);
        assert!(position.is_game_over());
    }

    #[test]
    pub fn full_board() -> Result<()> {
        let position = Position::from_moves("467542311242375735765675733135661624214421")?;
        assert_eq!(position.nb_moves(), WIDTH * HEIGHT);
        assert_eq!(position.winning_pieces(), 0);
        assert!(position.is_game_over());

        let mut solver = solver();
        assert_eq!(solver.solve(&position, false), 0);
        assert_eq!(solver.analyze(&position, false), [INVALID_MOVE; WIDTH]);
        assert_eq!(solver.best_move(&position, false), None);
        Ok(())
    }

    #[test]
    pub fn immediate_wins() -> Result<()> {
        let position = Position::from_moves("121212")?;
        assert!(position.can_win_next());
        assert!(position.is_winning_move(0));
        assert!((1..WIDTH).all(|column| !position.is_winning_move(column)));

        let mut solver = solver();
        assert_eq!(solver.solve(&position, false), 18);
        assert_eq!(solver.solve(&position, true), 18);
        Ok(())
    }

    #[test]
    #[should_panic]
    pub fn non_losing_moves_with_a_winning_move() {
        if let Ok(position) = Position::from_moves("121212") {
            position.possible_non_losing_moves();
        }
    }

    #[test]
    pub fn non_losing_moves() -> Result<()> {
        // the only move is to block the vertical alignment
        let position = Position::from_moves("12121")?;
        assert_eq!(position.possible_non_losing_moves(), Position::cell_mask(0, 3));

        // two open ends can't both be blocked
        let position = Position::from_moves("22334")?;
        assert_eq!(position.possible_non_losing_moves(), 0);

        let position = Position::new();
        assert_eq!(position.possible_non_losing_moves(), position.possible());
        Ok(())
    }

    #[test]
    pub fn move_scores() -> Result<()> {
        let position = Position::from_moves("4455")?;
        // completing three in a row opens both ends
        let candidate = position.possible() & Position::column_mask(5);
        assert_eq!(position.move_score(candidate), 2);
        assert_eq!(Position::column_from_move(candidate), 5);
        Ok(())
    }

    #[test]
    pub fn move_sorter() {
        let mut sorter = MoveSorter::new();
        for (i, score) in [5, 1, 9, 3].iter().enumerate() {
            sorter.add(1 << i, *score);
        }
        assert_eq!(sorter.len(), 4);
        let drained: Vec<u64> = std::iter::from_fn(|| sorter.get_next()).collect();
        assert_eq!(drained, vec![1 << 2, 1 << 0, 1 << 3, 1 << 1]);
        assert_eq!(sorter.get_next(), None);

        sorter.add(7, 0);
        sorter.reset();
        assert!(sorter.is_empty());
        assert_eq!(sorter.next(), None);
    }

    #[test]
    #[should_panic]
    pub fn move_sorter_capacity() {
        let mut sorter = MoveSorter::new();
        for i in 0..=WIDTH {
            sorter.add(1 << i, i as i32);
        }
    }

    #[test]
    pub fn transposition_table() {
        let size = next_prime(TranspositionTable::<u32>::min_size());
        let mut table: TranspositionTable = TranspositionTable::with_size(size);
        assert_eq!(table.len(), size);
        assert_eq!(table.get(5), 0);

        table.put(5, 12);
        assert_eq!(table.get(5), 12);
        table.put(5, 13);
        assert_eq!(table.get(5), 13);

        // same bucket, the last write wins
        let other = 5 + size as u64;
        table.put(other, 40);
        assert_eq!(table.get(other), 40);
        assert_eq!(table.get(5), 0);

        table.reset();
        assert_eq!(table.get(other), 0);

        // keys beyond 32 bits in the same bucket are told apart
        let mut table: TranspositionTable<u64> = TranspositionTable::with_size(101);
        let key = 101 << 32;
        table.put(key, 3);
        assert_eq!(table.get(key), 3);
        assert_eq!(table.get(key + (101 << 40)), 0);
    }

    #[test]
    pub fn table_sizes() {
        assert_eq!(TranspositionTable::<u32>::min_size(), (1 << 17) + 1);
        assert_eq!(TranspositionTable::<u64>::min_size(), 1);

        // full keys are told apart at any size
        let mut table: TranspositionTable<u64> = TranspositionTable::with_size(101);
        table.put(5, 12);
        assert_eq!(table.get(5 + (101 << 32)), 0);
    }

    #[test]
    #[should_panic]
    pub fn table_too_small_for_partial_keys() {
        // 5 and 5 + (101 << 32) would share a bucket and their low 32 bits
        let _table: TranspositionTable = TranspositionTable::with_size(101);
    }

    #[test]
    #[should_panic]
    pub fn table_of_even_size() {
        let _table: TranspositionTable = TranspositionTable::with_size(1 << 20);
    }

    #[test]
    pub fn smallest_table_solves_exactly() -> Result<()> {
        let size = next_prime(TranspositionTable::<u32>::min_size());
        for (moves, score, _) in END_GAMES.iter() {
            let position = Position::from_moves(moves)?;
            let mut solver =
                Solver::with_transposition_table(TranspositionTable::with_size(size));
            assert_eq!(solver.solve(&position, false), *score);
        }
        Ok(())
    }

    #[test]
    pub fn masks_outside_the_board() {
        assert_eq!(Position::column_mask(WIDTH), 0);
        assert_eq!(Position::column_mask(usize::MAX), 0);
        assert_eq!(Position::cell_mask(WIDTH, 0), 0);
        assert_eq!(Position::cell_mask(0, HEIGHT), 0);
        assert_eq!(Position::column_mask(0), 0b111111);
    }

    #[test]
    pub fn primes() {
        assert_eq!(next_prime(0), 2);
        assert_eq!(next_prime(100), 101);
        assert_eq!(next_prime(101), 101);
        assert_eq!(next_prime(1 << 23), (1 << 23) + 9);
    }

    #[test]
    pub fn end_games() -> Result<()> {
        for (moves, score, column_scores) in END_GAMES.iter() {
            let position = Position::from_moves(moves)?;
            assert!(!position.can_win_next());

            let mut solver = solver();
            assert_eq!(solver.solve(&position, false), *score, "{}", moves);
            assert!(solver.node_count() > 0);
            assert_eq!(solver.analyze(&position, false), *column_scores, "{}", moves);

            // the table holds bounds only, a fresh table must agree
            solver.reset();
            assert_eq!(solver.node_count(), 0);
            assert_eq!(solver.solve(&position, false), *score, "{}", moves);
        }
        Ok(())
    }

    #[test]
    pub fn weak_solve() -> Result<()> {
        for (moves, score, column_scores) in END_GAMES.iter() {
            let position = Position::from_moves(moves)?;
            let mut solver = solver();

            // only the sign of a weak score is meaningful
            assert_eq!(solver.solve(&position, true).signum(), score.signum(), "{}", moves);
            let weak_scores = solver.analyze(&position, true);
            for (weak, exact) in weak_scores.iter().zip(column_scores.iter()) {
                if *exact == INVALID_MOVE {
                    assert_eq!(*weak, INVALID_MOVE);
                } else {
                    assert_eq!(weak.signum(), exact.signum(), "{}", moves);
                }
            }
        }
        Ok(())
    }

    #[test]
    pub fn mirrored_positions_score_the_same() -> Result<()> {
        for (moves, score, column_scores) in END_GAMES.iter() {
            let mirrored = Position::from_moves(mirror(moves))?;
            let mut solver = solver();
            assert_eq!(solver.solve(&mirrored, false), *score);

            let mut expected = *column_scores;
            expected.reverse();
            assert_eq!(solver.analyze(&mirrored, false), expected);
        }
        Ok(())
    }

    #[test]
    pub fn best_move() -> Result<()> {
        for (moves, score, _) in END_GAMES.iter() {
            let position = Position::from_moves(moves)?;
            let mut solver = solver();
            let best = solver.best_move(&position, false).unwrap();

            // the opponent's best score after the best move is the negated score
            let mut next = position;
            next.play_col(best);
            assert_eq!(-solver.solve(&next, false), *score, "{}", moves);
        }

        // ties go to the central column
        let position = Position::from_moves("5357113575332732721643")?;
        assert_eq!(solver().best_move(&position, false), Some(3));
        let position = Position::from_moves("25414526443322655645")?;
        assert_eq!(solver().best_move(&position, false), Some(4));
        Ok(())
    }

    #[test]
    pub fn center_out_order() {
        assert_eq!(move_order(), [3, 4, 2, 5, 1, 6, 0]);
    }

    #[test]
    pub fn win_distance() -> Result<()> {
        let position = Position::new();
        assert_eq!(score_to_win_distance(&position, 0), 42);
        assert_eq!(score_to_win_distance(&position, 18), 4);
        assert_eq!(score_to_win_distance(&position, -18), 4);
        Ok(())
    }

    #[test]
    pub fn book_lookup() -> Result<()> {
        let data = BookData {
            depth: 2,
            entries: vec![
                BookEntry::from_score(Position::from_moves("43")?.key3() as u64, 5),
                BookEntry::from_score(Position::from_moves("4")?.key3() as u64, -2),
            ],
        };
        assert_eq!(data.entries[0].score(), 5);

        let book = OpeningBook::new(&data);
        assert_eq!(book.depth(), 2);
        assert_eq!(book.len(), 2);

        assert_eq!(book.get(&Position::from_moves("43")?) as i32, 5 - MIN_SCORE + 1);
        // the mirror image shares the entry
        assert_eq!(book.get(&Position::from_moves("45")?) as i32, 5 - MIN_SCORE + 1);
        assert_eq!(book.get(&Position::from_moves("4")?) as i32, -2 - MIN_SCORE + 1);
        assert_eq!(book.get(&Position::from_moves("44")?), 0);
        // too deep for the book
        assert_eq!(book.get(&Position::from_moves("434")?), 0);
        Ok(())
    }

    #[test]
    pub fn book_file_format() -> Result<()> {
        let data = BookData {
            depth: 3,
            entries: vec![BookEntry::from_score(99, 1), BookEntry::from_score(1260, -3)],
        };
        let mut bytes = Vec::new();
        data.write_to(&mut bytes)?;
        assert_eq!(bytes.len(), 3 + 4 + 2 * 9);
        assert_eq!(&bytes[..3], &[WIDTH as u8, HEIGHT as u8, 3]);
        assert_eq!(BookData::read_from(&bytes[..])?, data);

        // wrong board size
        let mut other_board = bytes.clone();
        other_board[0] = 8;
        assert!(BookData::read_from(&other_board[..]).is_err());

        // 0 marks missing entries and can't be stored
        let mut zero_value = bytes.clone();
        let last = zero_value.len() - 1;
        zero_value[last] = 0;
        assert!(BookData::read_from(&zero_value[..]).is_err());

        // truncated
        assert!(BookData::read_from(&bytes[..bytes.len() - 1]).is_err());
        Ok(())
    }

    #[test]
    pub fn solver_uses_book() -> Result<()> {
        let position = Position::from_moves("44")?;
        // a made-up score only the book could produce this fast
        let data = BookData {
            depth: 2,
            entries: vec![BookEntry::from_score(position.key3() as u64, 5)],
        };
        let mut solver = solver().with_opening_book(Arc::new(OpeningBook::new(&data)));
        assert_eq!(solver.solve(&position, false), 5);
        Ok(())
    }

    #[test]
    pub fn book_positions() {
        let counts: Vec<usize> = (0..4).map(|depth| unique_positions(depth).len()).collect();
        assert_eq!(counts, vec![1, 5, 30, 151]);

        for (key3, position) in unique_positions(3) {
            assert_eq!(position.key3(), key3 as u128);
            assert!(!position.can_win_next());
        }
    }

    #[test]
    pub fn book_installation() -> Result<()> {
        let empty = BookData {
            depth: 0,
            entries: vec![],
        };
        let book = opening_book::install(OpeningBook::new(&empty))?;
        assert!(book.is_empty());
        let installed = opening_book::installed().ok_or_else(|| anyhow::anyhow!("no book"))?;
        assert!(Arc::ptr_eq(&book, &installed));
        assert!(opening_book::install(OpeningBook::new(&empty)).is_err());
        Ok(())
    }

    #[test]
    #[ignore = "solves the empty board, takes minutes"]
    pub fn full_search() {
        let mut solver = Solver::new();
        assert_eq!(solver.solve(&Position::new(), false), 1);
    }
}
