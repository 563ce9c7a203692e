use crate::error::{GameError, Result};
use itertools::Itertools;
use ndarray::Array2;
use std::{fmt, str::FromStr};

/// A cell index in `0..CELLS`, row-major from the top-left corner.
pub type Action = usize;

pub const CELLS: usize = 9;

/// The eight winning triples: rows, then columns, then diagonals.
pub const LINES: [[Action; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Mark {
    Cross,
    Nought,
}

#[derive(Debug, PartialEq)]
pub enum IsGameOver {
    InPlay,
    Drawn,
    Win,
}

/// Immutable snapshot of the 3x3 grid.
///
/// Moves never mutate a board in place: `apply` hands back a new value, so a
/// board held as a Q-table key or as a player's previous state stays valid.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Board {
    cells: [Option<Mark>; CELLS],
}

impl Mark {
    pub fn other(self) -> Self {
        match self {
            Self::Cross => Mark::Nought,
            Self::Nought => Mark::Cross,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Self::Cross => 'X',
            Self::Nought => 'O',
        }
    }
}

fn cell_char(cell: Option<Mark>) -> char {
    cell.map_or('-', Mark::as_char)
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    pub fn cell(&self, action: Action) -> Option<Mark> {
        self.cells.get(action).copied().flatten()
    }

    /// Empty cells in ascending index order. Empty when the board is full.
    pub fn legal_actions(&self) -> Vec<Action> {
        (0..CELLS).filter(|&i| self.cells[i].is_none()).collect()
    }

    pub fn occupied(&self) -> Vec<Action> {
        (0..CELLS).filter(|&i| self.cells[i].is_some()).collect()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Number of marks on the board, i.e. turns played so far.
    pub fn turns(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Returns a new board with `mark` placed at `action`.
    pub fn apply(&self, action: Action, mark: Mark) -> Result<Board> {
        match self.cells.get(action) {
            Some(None) => {
                let mut next = *self;
                next.cells[action] = Some(mark);
                Ok(next)
            }
            _ => Err(GameError::InvalidAction { action }),
        }
    }

    pub fn is_winning(&self, mark: Mark) -> bool {
        LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.cells[i] == Some(mark)))
    }

    /// Status from the point of view of the player who just placed `mark`.
    pub fn is_game_over(&self, mark: Mark) -> IsGameOver {
        match self.is_winning(mark) {
            true => IsGameOver::Win,
            false => {
                if self.is_full() {
                    IsGameOver::Drawn
                } else {
                    IsGameOver::InPlay
                }
            }
        }
    }

    pub fn grid(&self) -> Array2<Option<Mark>> {
        Array2::from_shape_fn((3, 3), |(row, col)| self.cells[3 * row + col])
    }

    pub fn to_state_key(&self) -> String {
        self.cells.iter().copied().map(cell_char).collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rows = self
            .grid()
            .rows()
            .into_iter()
            .map(|row| row.iter().copied().map(cell_char).join(" "))
            .join("\n");
        write!(f, "{}", rows)
    }
}

impl FromStr for Board {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GameError::InvalidBoard {
            input: s.to_owned(),
        };
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != CELLS {
            return Err(invalid());
        }
        let mut board = Board::new();
        for (i, c) in chars.into_iter().enumerate() {
            board.cells[i] = match c {
                'X' | 'x' => Some(Mark::Cross),
                'O' | 'o' => Some(Mark::Nought),
                ' ' | '-' => None,
                _ => return Err(invalid()),
            };
        }
        Ok(board)
    }
}
