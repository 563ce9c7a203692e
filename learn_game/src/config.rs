use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};

pub const NUM_EPISODES: usize = 10_000_usize;
pub const EVAL_EPISODES: usize = 1_000_usize;
pub const HISTORY_TAIL: usize = 5_usize;

/// Hyper-parameters of a tabular Q player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QConfig {
    /// Learning rate α.
    pub alpha: f64,
    /// Discount γ.
    pub gamma: f64,
    /// Base exploration rate ε, divided by `episodes + 1` at selection time.
    pub epsilon: f64,
    /// Optimistic value of unseen (state, action) pairs.
    pub q_init: f64,
}

impl Default for QConfig {
    fn default() -> Self {
        QConfig {
            alpha: 0.3,
            gamma: 0.9,
            epsilon: 0.1,
            q_init: 0.8,
        }
    }
}

impl QConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(GameError::InvalidConfig {
                    message: format!("{name} must be within [0, 1], got {value}"),
                })
            }
        };
        unit("alpha", self.alpha)?;
        unit("gamma", self.gamma)?;
        unit("epsilon", self.epsilon)?;
        if !self.q_init.is_finite() {
            return Err(GameError::InvalidConfig {
                message: format!("q_init must be finite, got {}", self.q_init),
            });
        }
        Ok(())
    }
}
