use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    style::{style, Attribute, Color, PrintStyledContent},
    QueueableCommand,
};

use std::io::{stdout, Write};

use connect4_solver::{
    position::{Player, Position},
    HEIGHT, WIDTH,
};

/// Draws the board below the cursor, marking the stones of a completed alignment
pub fn draw(position: &Position) -> Result<()> {
    let mut stdout = stdout();

    let cols: String = (1..=WIDTH).map(|x| x.to_string()).collect();
    stdout.queue(PrintStyledContent(style(cols + "\n")))?;
    for _ in 0..HEIGHT {
        stdout.queue(PrintStyledContent(style("\n")))?;
    }
    stdout.flush()?;

    let (origin_x, origin_y) = crossterm::cursor::position()?;
    let winning_pieces = position.winning_pieces();

    for column in 0..WIDTH {
        for row in 0..HEIGHT {
            let (pos_x, pos_y) = (origin_x + column as u16, origin_y - row as u16);
            let winning = winning_pieces & Position::cell_mask(column, row) != 0;

            stdout
                .queue(MoveTo(pos_x, pos_y))?
                .queue(PrintStyledContent(
                    style(if winning { "X" } else { "O" })
                        .attribute(Attribute::Bold)
                        .on(Color::DarkBlue)
                        .with(match position.stone_at(column, row) {
                            Some(Player::One) => Color::Red,
                            Some(Player::Two) => Color::Yellow,
                            None => Color::DarkBlue,
                        }),
                ))?;
        }
    }
    stdout
        .queue(MoveTo(origin_x + WIDTH as u16, origin_y))?
        .queue(PrintStyledContent(style("\n")))?;
    stdout.flush()?;
    Ok(())
}

pub fn player_number(player: Player) -> usize {
    match player {
        Player::One => 1,
        Player::Two => 2,
    }
}
