//! Weight and price rolls for a landed fish.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Species;
use crate::numbers::{floor_f64_to_u64, u64_to_f64};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchYield {
    /// Kilograms, within the species weight range
    pub weight: f64,
    pub price: u64,
}

/// Yield for a uniform draw in [0, 1). A fish at the top of its weight
/// range is worth up to twice the base price.
#[must_use]
pub fn yield_for_draw(species: &Species, draw: f64) -> CatchYield {
    let draw = draw.clamp(0.0, 1.0);
    let weight = species.min_weight + draw * (species.max_weight - species.min_weight);
    let value_multiplier = 1.0 + draw;
    CatchYield {
        weight,
        price: floor_f64_to_u64(u64_to_f64(species.base_price) * value_multiplier),
    }
}

pub fn roll_yield(species: &Species, rng: &mut impl Rng) -> CatchYield {
    yield_for_draw(species, rng.r#gen())
}
