use thiserror::Error;

/// Errors raised by the board, the game loop and the players.
///
/// None of these are recoverable inside an episode: they mean a player or
/// the caller is broken, so they are handed straight back to the driver.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("invalid action: cell {action} is not a legal move")]
    InvalidAction { action: usize },

    #[error("asked to select an action with no legal actions left")]
    EmptyActionSet,

    #[error("cannot parse board from {input:?}: expected 9 cells of 'X', 'O', ' ' or '-'")]
    InvalidBoard { input: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type Result<T> = std::result::Result<T, GameError>;
