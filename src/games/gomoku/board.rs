//! Square k-in-a-row board.
//!
//! Cells are stored in row-major order; action `a` is the cell at row
//! `a / size`, column `a % size`. A line wins only when it is exactly
//! `win_length` stones long, so overlines do not count.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Action, GameState, MoveError, Reward};

/// Line directions checked after each move: down-right, down, down-left, right.
const DIRECTIONS: [(isize, isize); 4] = [(1, 1), (1, 0), (1, -1), (0, 1)];

/// Stone color. Black moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    fn symbol(self) -> char {
        match self {
            Stone::Black => 'X',
            Stone::White => 'O',
        }
    }
}

/// Game status after the latest move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ongoing,
    Win(Stone),
    Draw,
}

/// A `size` x `size` board where `win_length` in a row wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    size: usize,
    win_length: usize,
    cells: Vec<Option<Stone>>,
    turn: Stone,
    status: Status,
    moves_played: u32,
    last_action: Option<Action>,
}

impl Board {
    /// Create an empty board.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0 or `win_length` is not in `1..=size`.
    pub fn new(size: usize, win_length: usize) -> Self {
        assert!(size > 0, "board size must be positive");
        assert!(
            (1..=size).contains(&win_length),
            "win length must be between 1 and the board size"
        );
        Self {
            size,
            win_length,
            cells: vec![None; size * size],
            turn: Stone::Black,
            status: Status::Ongoing,
            moves_played: 0,
            last_action: None,
        }
    }

    /// 3x3, three in a row.
    pub fn tictactoe() -> Self {
        Self::new(3, 3)
    }

    /// 15x15, exactly five in a row.
    pub fn gomoku() -> Self {
        Self::new(15, 5)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn win_length(&self) -> usize {
        self.win_length
    }

    /// Number of cells (and actions).
    pub fn area(&self) -> usize {
        self.cells.len()
    }

    /// Player to move.
    pub fn turn(&self) -> Stone {
        self.turn
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn moves_played(&self) -> u32 {
        self.moves_played
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    /// Stone on the cell for `action`, if any. Out-of-range cells are empty.
    pub fn stone(&self, action: Action) -> Option<Stone> {
        self.cells.get(action as usize).copied().flatten()
    }

    /// Action for `(row, col)`, if the coordinate is on the board.
    pub fn action_at(&self, row: usize, col: usize) -> Option<Action> {
        if row < self.size && col < self.size {
            Action::try_from(row * self.size + col).ok()
        } else {
            None
        }
    }

    /// `(row, col)` of `action`.
    pub fn coords(&self, action: Action) -> (usize, usize) {
        let idx = action as usize;
        (idx / self.size, idx % self.size)
    }

    /// Human-readable coordinate, column letter then 1-based row (`"b3"`).
    pub fn coord_string(&self, action: Action) -> String {
        let (row, col) = self.coords(action);
        let letter = (b'a' + (col % 26) as u8) as char;
        format!("{letter}{}", row + 1)
    }

    /// Empty cells in ascending order, or nothing once the game is over.
    pub fn legal_actions(&self) -> Vec<Action> {
        if self.status != Status::Ongoing {
            return Vec::new();
        }
        (0..self.cells.len() as Action)
            .filter(|&action| self.cells[action as usize].is_none())
            .collect()
    }

    fn check_status(&self, action: Action) -> Status {
        let Some(color) = self.stone(action) else {
            return Status::Ongoing;
        };
        let (row, col) = self.coords(action);

        for (dr, dc) in DIRECTIONS {
            let run = 1 + self.run(color, row, col, dr, dc) + self.run(color, row, col, -dr, -dc);
            if run == self.win_length {
                return Status::Win(color);
            }
        }

        if self.moves_played as usize >= self.cells.len() {
            Status::Draw
        } else {
            Status::Ongoing
        }
    }

    /// Consecutive `color` stones starting one step from `(row, col)`.
    fn run(&self, color: Stone, row: usize, col: usize, dr: isize, dc: isize) -> usize {
        let mut count = 0;
        let (mut r, mut c) = (row as isize + dr, col as isize + dc);
        let size = self.size as isize;
        while (0..size).contains(&r) && (0..size).contains(&c) {
            if self.cells[(r * size + c) as usize] != Some(color) {
                break;
            }
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }
}

impl GameState for Board {
    fn apply(&mut self, action: Action) -> Result<(), MoveError> {
        if self.status != Status::Ongoing {
            return Err(MoveError::GameOver);
        }
        let cell = self
            .cells
            .get_mut(action as usize)
            .ok_or(MoveError::OutOfRange(action))?;
        if cell.is_some() {
            return Err(MoveError::Occupied(action));
        }

        *cell = Some(self.turn);
        self.turn = self.turn.opponent();
        self.moves_played += 1;
        self.last_action = Some(action);
        self.status = self.check_status(action);
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.status != Status::Ongoing
    }

    fn terminal_reward(&self) -> Reward {
        match self.status {
            Status::Win(_) => 1.0,
            Status::Ongoing | Status::Draw => 0.0,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.last_action.map(|action| self.coords(action));

        write!(f, "    ")?;
        for col in 0..self.size {
            write!(f, "{} ", (b'a' + (col % 26) as u8) as char)?;
        }
        writeln!(f)?;

        for row in 0..self.size {
            write!(f, "{:>3}", row + 1)?;
            write!(f, "{}", if last == Some((row, 0)) { '[' } else { ' ' })?;
            for col in 0..self.size {
                let symbol = self.cells[row * self.size + col].map_or('.', Stone::symbol);
                // Brackets mark the last move.
                let after = if last == Some((row, col + 1)) {
                    '['
                } else if last == Some((row, col)) {
                    ']'
                } else {
                    ' '
                };
                write!(f, "{symbol}{after}")?;
            }
            writeln!(f)?;
        }

        let status = match self.status {
            Status::Ongoing => "ongoing",
            Status::Win(Stone::Black) => "black wins",
            Status::Win(Stone::White) => "white wins",
            Status::Draw => "draw",
        };
        write!(f, "TURN: {} {} - {status}", self.moves_played, self.turn.symbol())
    }
}
