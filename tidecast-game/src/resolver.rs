//! Catch resolution: location pool, bait-scaled rarity thresholds, tier fallback.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Bait, Catalog, Rarity, Species};

const BASE_LEGENDARY_CHANCE: f64 = 0.02;
const BASE_EPIC_CHANCE: f64 = 0.08;
const BASE_RARE_CHANCE: f64 = 0.15;

/// Upper tier boundaries on the unit interval. A draw above `legendary`
/// selects Legendary, above `epic` selects Epic, above `rare` selects Rare,
/// anything else Common.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarityThresholds {
    pub legendary: f64,
    pub epic: f64,
    pub rare: f64,
}

impl RarityThresholds {
    /// Thresholds for a bait's rarity-bonus multiplier. Large bonuses push
    /// the thresholds below zero, which simply means the highest tier wins.
    #[must_use]
    pub fn for_bonus(rarity_bonus: f64) -> Self {
        let legendary = 1.0 - BASE_LEGENDARY_CHANCE * rarity_bonus;
        let epic = legendary - BASE_EPIC_CHANCE * rarity_bonus;
        let rare = epic - BASE_RARE_CHANCE * rarity_bonus;
        Self {
            legendary,
            epic,
            rare,
        }
    }

    /// Tier whose interval contains `draw`, checked top-down.
    #[must_use]
    pub fn tier_for(&self, draw: f64) -> Rarity {
        if draw > self.legendary {
            Rarity::Legendary
        } else if draw > self.epic {
            Rarity::Epic
        } else if draw > self.rare {
            Rarity::Rare
        } else {
            Rarity::Common
        }
    }
}

/// Pin down the species for a bite from two uniform draws in [0, 1).
///
/// Returns `None` only when the location has no species at all, which a
/// validated catalog rules out.
#[must_use]
pub fn resolve_bite_with_draws<'a>(
    location_id: &str,
    bait: &Bait,
    catalog: &'a Catalog,
    rarity_draw: f64,
    pick_draw: f64,
) -> Option<&'a Species> {
    let pool = catalog.location_pool(location_id);
    if pool.is_empty() {
        return None;
    }

    let rolled = RarityThresholds::for_bonus(bait.rarity_bonus).tier_for(rarity_draw);
    let candidates = candidates_for(&pool, rolled);
    let candidates = if candidates.is_empty() {
        pool
    } else {
        candidates
    };

    let index = pick_index(candidates.len(), pick_draw);
    candidates.get(index).copied()
}

/// Pin down the species for a bite, drawing from `rng`.
#[must_use]
pub fn resolve_bite<'a>(
    location_id: &str,
    bait: &Bait,
    catalog: &'a Catalog,
    rng: &mut impl Rng,
) -> Option<&'a Species> {
    let rarity_draw: f64 = rng.r#gen();
    let pick_draw: f64 = rng.r#gen();
    resolve_bite_with_draws(location_id, bait, catalog, rarity_draw, pick_draw)
}

/// Walk down from the rolled tier until some species of that tier lives in the pool.
fn candidates_for<'a>(pool: &[&'a Species], rolled: Rarity) -> Vec<&'a Species> {
    let mut tier = Some(rolled);
    while let Some(rarity) = tier {
        let matching: Vec<&Species> = pool
            .iter()
            .copied()
            .filter(|species| species.rarity == rarity)
            .collect();
        if !matching.is_empty() {
            return matching;
        }
        tier = rarity.demote();
    }
    Vec::new()
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn pick_index(len: usize, draw: f64) -> usize {
    let scaled = (draw.clamp(0.0, 1.0) * len as f64).floor() as usize;
    scaled.min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn catalog() -> Catalog {
        Catalog::load_from_static().unwrap()
    }

    fn bait<'a>(catalog: &'a Catalog, id: &str) -> &'a Bait {
        catalog.bait(id).unwrap()
    }

    #[test]
    fn default_bait_thresholds_match_base_chances() {
        let t = RarityThresholds::for_bonus(1.0);
        assert!((t.legendary - 0.98).abs() < 1e-12);
        assert!((t.epic - 0.90).abs() < 1e-12);
        assert!((t.rare - 0.75).abs() < 1e-12);
    }

    #[test]
    fn thresholds_stay_ordered_for_any_bonus() {
        for step in 0..=200 {
            let bonus = 1.0 + f64::from(step) * 0.05;
            let t = RarityThresholds::for_bonus(bonus);
            assert!(t.rare <= t.epic && t.epic <= t.legendary && t.legendary <= 1.0);
        }
    }

    #[test]
    fn tiers_follow_draw_intervals() {
        let t = RarityThresholds::for_bonus(1.0);
        assert_eq!(t.tier_for(0.0), Rarity::Common);
        assert_eq!(t.tier_for(0.7), Rarity::Common);
        assert_eq!(t.tier_for(0.76), Rarity::Rare);
        assert_eq!(t.tier_for(0.95), Rarity::Epic);
        assert_eq!(t.tier_for(0.99), Rarity::Legendary);
    }

    #[test]
    fn huge_bonus_degenerates_to_top_tier() {
        let t = RarityThresholds::for_bonus(60.0);
        assert_eq!(t.tier_for(0.0), Rarity::Legendary);
    }

    #[test]
    fn beach_legendary_roll_falls_back_to_epic() {
        let catalog = catalog();
        let bread = bait(&catalog, "bait_bread");
        let species =
            resolve_bite_with_draws("loc_beach", bread, &catalog, 0.999, 0.0).unwrap();
        assert_eq!(species.id, "fish_turtle");
        assert_eq!(species.rarity, Rarity::Epic);
    }

    #[test]
    fn arctic_epic_roll_cascades_down_to_rare() {
        let catalog = catalog();
        let bread = bait(&catalog, "bait_bread");
        let species =
            resolve_bite_with_draws("loc_arctic", bread, &catalog, 0.95, 0.5).unwrap();
        assert_eq!(species.id, "fish_kingcrab");
    }

    #[test]
    fn deep_sea_common_roll_falls_back_to_whole_pool() {
        let catalog = catalog();
        let bread = bait(&catalog, "bait_bread");
        let species =
            resolve_bite_with_draws("loc_deep_sea", bread, &catalog, 0.1, 0.0).unwrap();
        assert!(species.found_at("loc_deep_sea"));
        assert_eq!(species.id, "fish_tuna");
    }

    #[test]
    fn unknown_location_resolves_nothing() {
        let catalog = catalog();
        let bread = bait(&catalog, "bait_bread");
        assert!(resolve_bite_with_draws("loc_moon", bread, &catalog, 0.5, 0.5).is_none());
    }

    #[test]
    fn random_bites_never_leave_the_location_pool() {
        let catalog = catalog();
        let mut rng = ChaCha20Rng::seed_from_u64(0x00F1_5400);
        for location in &catalog.locations {
            for bait in &catalog.baits {
                for _ in 0..200 {
                    let species = resolve_bite(&location.id, bait, &catalog, &mut rng).unwrap();
                    assert!(species.found_at(&location.id));
                }
            }
        }
    }

    #[test]
    fn pick_index_stays_in_bounds() {
        assert_eq!(pick_index(3, 0.0), 0);
        assert_eq!(pick_index(3, 0.999_999), 2);
        assert_eq!(pick_index(3, 1.0), 2);
    }
}
