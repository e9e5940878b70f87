//! Recoverable failure kinds shared by the ledger and the session orchestrator.
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog or inventory entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Fish,
    Species,
    Rod,
    Bait,
    Location,
    Achievement,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fish => "fish",
            Self::Species => "species",
            Self::Rod => "rod",
            Self::Bait => "bait",
            Self::Location => "location",
            Self::Achievement => "achievement",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every ledger or session operation that can fail returns one of these and
/// leaves the player state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("insufficient funds: need {needed} gold, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("no {bait_id} left in stock")]
    InsufficientBait { bait_id: String },
    #[error("level {required} required (current level {current})")]
    LevelTooLow { required: u32, current: u32 },
    #[error("{id} is already owned")]
    AlreadyOwned { id: String },
    #[error("unknown {kind} '{id}'")]
    NotFound { kind: EntityKind, id: String },
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
}

impl GameError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;

/// Errors raised when session or minigame configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} minimum {min:.2} exceeds maximum {max:.2}")]
    MinExceedsMax {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("configuration JSON is malformed: {0}")]
    Parse(String),
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}
