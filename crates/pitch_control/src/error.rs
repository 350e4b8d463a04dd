use thiserror::Error;

use crate::player::{PlayerId, Side};

#[derive(Error, Debug)]
pub enum PitchControlError {
    #[error("Invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter { name: &'static str, value: f64, reason: &'static str },

    #[error("Empty {side} roster")]
    EmptyRoster { side: Side },

    #[error("Defending goalkeeper {id} not found in defending roster")]
    MissingGoalkeeper { id: String },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error(
        "Negative control increment {increment:.6} for {side} player {player} at T={time:.3}s"
    )]
    NegativeIncrement { player: PlayerId, side: Side, time: f64, increment: f64 },

    #[error(
        "Control sum {total:.4} at ({x:.2}, {y:.2}) exceeds 1 + {tolerance}: \
         summed step claim reached {step_claim:.3} (must stay at or below 1)"
    )]
    ControlOverflow { x: f64, y: f64, total: f64, tolerance: f64, step_claim: f64 },

    #[error("Checksum failed: {checksum:.4} (residual {residual:.4}, tolerance {tolerance})")]
    ChecksumFailed { checksum: f64, residual: f64, tolerance: f64 },

    #[error("Integration budget exhausted: {consumed} steps used, limit {limit}")]
    BudgetExhausted { limit: u64, consumed: u64 },

    #[error("Tracking data error: {0}")]
    Tracking(String),

    #[error("Parameter decoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PitchControlError {
    /// Malformed input: bad parameters, rosters, grids or tracking rows.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PitchControlError::InvalidParameter { .. }
                | PitchControlError::EmptyRoster { .. }
                | PitchControlError::MissingGoalkeeper { .. }
                | PitchControlError::InvalidGrid(_)
                | PitchControlError::Tracking(_)
                | PitchControlError::Json(_)
        )
    }

    /// The discretisation broke down for the chosen parameters.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            PitchControlError::NegativeIncrement { .. }
                | PitchControlError::ControlOverflow { .. }
                | PitchControlError::ChecksumFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PitchControlError>;
