use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use std::cmp::Ordering;
use std::io::{stdin, stdout, Write};
use std::path::{Path, PathBuf};

use connect4_solver::{
    opening_book::{self, BookData, OpeningBook, DEFAULT_BOOK_PATH},
    position::Position,
    solver::{score_to_win_distance, Solver, INVALID_MOVE},
    HEIGHT, WIDTH,
};

mod display;
use display::*;

#[derive(Parser, Debug)]
#[command(name = "connect4_solver")]
#[command(about = "Play or analyse Connect 4 with a perfect solver")]
struct Cli {
    /// Opening book file
    #[arg(long, global = true, default_value = DEFAULT_BOOK_PATH)]
    book: PathBuf,

    /// Only tell wins, draws and losses apart (faster)
    #[arg(long, global = true, default_value_t = false)]
    weak: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a game in the terminal (default)
    Play,
    /// Print the score of every column after a sequence of 1-indexed moves
    Analyze {
        /// Moves played so far, e.g. 4453
        moves: String,
    },
    /// Solve every position up to a depth and write an opening book
    GenerateBook {
        #[arg(long, default_value_t = 8)]
        depth: usize,
        /// Output file, defaults to the --book path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => play(&cli.book, cli.weak),
        Command::Analyze { moves } => analyze(&cli.book, &moves, cli.weak),
        Command::GenerateBook { depth, output } => {
            let data = BookData::generate(depth)?;
            data.save(output.unwrap_or(cli.book))
        }
    }
}

// install the opening book if the file exists, the solver works without it
fn solver_with_book(path: &Path) -> Result<Solver> {
    let solver = Solver::new();
    if !path.exists() {
        warn!(
            "opening book {} not found, expect early AI moves to take a long time",
            path.display()
        );
        return Ok(solver);
    }
    let book = match opening_book::installed() {
        Some(book) => book,
        None => opening_book::install(OpeningBook::load(path)?)?,
    };
    Ok(solver.with_opening_book(book))
}

fn analyze(book: &Path, moves: &str, weak: bool) -> Result<()> {
    let position = Position::from_moves(moves)?;
    if position.nb_moves() == WIDTH * HEIGHT {
        return Err(anyhow!("the board is full"));
    }
    let mut solver = solver_with_book(book)?;

    let scores = solver.analyze(&position, weak);
    info!("searched {} nodes", solver.node_count());

    for (column, score) in scores.iter().enumerate() {
        if *score == INVALID_MOVE {
            println!("column {}: full", column + 1);
        } else {
            println!("column {}: {}", column + 1, score);
        }
    }
    Ok(())
}

fn ask_yes_no(question: &str) -> Result<bool> {
    let stdin = stdin();
    loop {
        let mut buffer = String::new();
        print!("{} y/n: ", question);
        stdout().flush()?;
        stdin.read_line(&mut buffer)?;
        match buffer.to_lowercase().chars().next() {
            Some('y') => return Ok(true),
            Some('n') => return Ok(false),
            _ => println!("Unknown answer given"),
        }
    }
}

fn play(book: &Path, weak: bool) -> Result<()> {
    println!("Welcome to Connect 4\n");

    // keep the solver out here so its transposition table is re-used between moves
    let mut solver = solver_with_book(book)?;
    let mut position = Position::new();

    let ai_players = (
        ask_yes_no("Is player 1 AI controlled?")?,
        ask_yes_no("Is player 2 AI controlled?")?,
    );

    let stdin = stdin();

    // game loop
    loop {
        draw(&position)?;

        if position.is_game_over() {
            if position.winning_pieces() != 0 {
                // the winner is the player who just moved
                let winner = player_number(position.player_to_move().other());
                println!("Player {} wins!", winner);
            } else {
                println!("Draw!");
            }
            break;
        }

        let player = player_number(position.player_to_move());
        let ai_turn = if player == 1 { ai_players.0 } else { ai_players.1 };

        let column = if ai_turn {
            println!("AI is thinking...");
            stdout().flush()?;

            // slow down play if both players are AI
            if ai_players == (true, true) {
                std::thread::sleep(std::time::Duration::new(3, 0));
            }

            let scores = solver.analyze(&position, weak);
            let best_move = solver
                .best_move_from_scores(&scores)
                .ok_or_else(|| anyhow!("no playable column left"))?;
            let score = scores[best_move];

            let win_distance = score_to_win_distance(&position, score);
            let move_string = if win_distance == 1 { "move" } else { "moves" };
            match score.cmp(&0) {
                Ordering::Greater => println!(
                    "Player {} can force a win in at most {} {}.",
                    player, win_distance, move_string
                ),
                Ordering::Less => println!(
                    "Player {} can force a win in at most {} {}.",
                    3 - player,
                    win_distance,
                    move_string
                ),
                Ordering::Equal => println!(
                    "Player {} can at best force a draw, {} {} remaining",
                    player, win_distance, move_string
                ),
            }

            println!("Best move: {}", best_move + 1);
            best_move

        // human player
        } else {
            print!("Player {} move input > ", player);
            stdout().flush()?;
            let mut input_str = String::new();
            stdin.read_line(&mut input_str)?;

            match input_str.trim().parse::<usize>() {
                Ok(column @ 1..=WIDTH) if position.can_play(column - 1) => column - 1,
                Ok(column @ 1..=WIDTH) => {
                    println!("Invalid move, column {} full", column);
                    continue;
                }
                _ => {
                    println!(
                        "Invalid move: {}, columns must be between 1 and {}",
                        input_str.trim(),
                        WIDTH
                    );
                    continue;
                }
            }
        };

        position.play_col(column);
    }
    Ok(())
}
