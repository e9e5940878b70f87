//! Static catalog: species, rods, baits, locations, achievements and the experience curve.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::error::{EntityKind, GameError, GameResult};
use crate::numbers::{floor_f64_to_u64, u64_to_f64};

const DEFAULT_CATALOG_DATA: &str = include_str!("../data/catalog.json");

/// Rarity tiers, ordered ascending in value and scarcity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// All tiers from lowest to highest.
    pub const ALL: [Self; 4] = [Self::Common, Self::Rare, Self::Epic, Self::Legendary];

    /// The next tier down, or `None` for `Common`.
    #[must_use]
    pub const fn demote(self) -> Option<Self> {
        match self {
            Self::Legendary => Some(Self::Epic),
            Self::Epic => Some(Self::Rare),
            Self::Rare => Some(Self::Common),
            Self::Common => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catchable fish species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub base_price: u64,
    /// 1-100, drives target speed in the minigame
    pub difficulty: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    #[serde(default)]
    pub icon: String,
    pub location_ids: Vec<String>,
}

impl Species {
    #[must_use]
    pub fn found_at(&self, location_id: &str) -> bool {
        self.location_ids.iter().any(|id| id == location_id)
    }
}

/// Rod: power widens the capture band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rod {
    pub id: String,
    pub name: String,
    pub power: f64,
    pub price: u64,
    #[serde(default = "default_level_req")]
    pub level_req: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bait {
    pub id: String,
    pub name: String,
    pub price: u64,
    #[serde(default)]
    pub description: String,
    /// Multiplier applied to the rare, epic and legendary chances
    #[serde(default = "default_bonus")]
    pub rarity_bonus: f64,
    /// Divides the wait-for-bite duration (1.5 = 50% faster)
    #[serde(default = "default_bonus")]
    pub speed_bonus: f64,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default = "default_level_req")]
    pub level_req: u32,
    #[serde(default)]
    pub description: String,
}

/// Statistic an achievement tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    TotalCatch,
    SpeciesCount,
    GoldEarned,
    LegendaryCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub kind: AchievementKind,
    pub target: u64,
    #[serde(default)]
    pub reward_gold: u64,
    #[serde(default)]
    pub reward_xp: u64,
}

/// Geometric experience curve: each level needs `floor(previous * scaling_factor)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperienceCurve {
    #[serde(default = "ExperienceCurve::default_first_requirement")]
    pub first_requirement: u64,
    #[serde(default = "ExperienceCurve::default_scaling_factor")]
    pub scaling_factor: f64,
}

impl ExperienceCurve {
    const fn default_first_requirement() -> u64 {
        100
    }

    const fn default_scaling_factor() -> f64 {
        1.5
    }

    /// Requirement for the level after the one that needed `previous`.
    #[must_use]
    pub fn next_requirement(&self, previous: u64) -> u64 {
        floor_f64_to_u64(u64_to_f64(previous) * self.scaling_factor).max(previous)
    }
}

impl Default for ExperienceCurve {
    fn default() -> Self {
        Self {
            first_requirement: Self::default_first_requirement(),
            scaling_factor: Self::default_scaling_factor(),
        }
    }
}

const fn default_level_req() -> u32 {
    1
}

const fn default_bonus() -> f64 {
    1.0
}

/// Errors raised when catalog data violates its integrity preconditions.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("location '{0}' has no species")]
    EmptyLocationPool(String),
    #[error("{kind} '{id}' is referenced but not defined")]
    UnknownReference { kind: EntityKind, id: String },
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: EntityKind, id: String },
    #[error("species '{id}' has weight range {min}..{max}")]
    InvalidWeightRange { id: String, min: f64, max: f64 },
    #[error("free bait '{0}' must cost nothing")]
    PricedFreeBait(String),
    #[error("experience curve must start above zero and scale by more than 1.0 (got {first} x {factor})")]
    InvalidCurve { first: u64, factor: f64 },
}

/// Read-only reference data loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub starter_rod_id: String,
    pub starting_location_id: String,
    pub free_bait_id: String,
    #[serde(default)]
    pub experience: ExperienceCurve,
    pub locations: Vec<Location>,
    pub baits: Vec<Bait>,
    pub rods: Vec<Rod>,
    pub species: Vec<Species>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl Catalog {
    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the JSON is malformed or violates integrity rules.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the embedded data fails validation.
    pub fn load_from_static() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_CATALOG_DATA)
    }

    /// Check the startup-time data invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_unique(EntityKind::Location, self.locations.iter().map(|l| &l.id))?;
        check_unique(EntityKind::Bait, self.baits.iter().map(|b| &b.id))?;
        check_unique(EntityKind::Rod, self.rods.iter().map(|r| &r.id))?;
        check_unique(EntityKind::Species, self.species.iter().map(|s| &s.id))?;
        check_unique(
            EntityKind::Achievement,
            self.achievements.iter().map(|a| &a.id),
        )?;

        let curve = self.experience;
        if curve.first_requirement == 0 || curve.scaling_factor <= 1.0 {
            return Err(CatalogError::InvalidCurve {
                first: curve.first_requirement,
                factor: curve.scaling_factor,
            });
        }

        if self.rod(&self.starter_rod_id).is_err() {
            return Err(unknown(EntityKind::Rod, &self.starter_rod_id));
        }
        if self.location(&self.starting_location_id).is_err() {
            return Err(unknown(EntityKind::Location, &self.starting_location_id));
        }
        match self.bait(&self.free_bait_id) {
            Ok(bait) if bait.price > 0 => {
                return Err(CatalogError::PricedFreeBait(bait.id.clone()));
            }
            Ok(_) => {}
            Err(_) => return Err(unknown(EntityKind::Bait, &self.free_bait_id)),
        }

        for species in &self.species {
            let weights_valid = species.min_weight.is_finite()
                && species.max_weight.is_finite()
                && species.min_weight >= 0.0
                && species.min_weight <= species.max_weight;
            if !weights_valid {
                return Err(CatalogError::InvalidWeightRange {
                    id: species.id.clone(),
                    min: species.min_weight,
                    max: species.max_weight,
                });
            }
            if let Some(missing) = species
                .location_ids
                .iter()
                .find(|id| self.location(id).is_err())
            {
                return Err(unknown(EntityKind::Location, missing));
            }
        }

        for location in &self.locations {
            if self.location_pool(&location.id).is_empty() {
                return Err(CatalogError::EmptyLocationPool(location.id.clone()));
            }
        }
        Ok(())
    }

    /// Species that can appear at the location, in catalog order.
    #[must_use]
    pub fn location_pool(&self, location_id: &str) -> Vec<&Species> {
        self.species
            .iter()
            .filter(|species| species.found_at(location_id))
            .collect()
    }

    /// # Errors
    ///
    /// Returns `GameError::NotFound` for an unknown id.
    pub fn species(&self, id: &str) -> GameResult<&Species> {
        self.species
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| GameError::not_found(EntityKind::Species, id))
    }

    /// # Errors
    ///
    /// Returns `GameError::NotFound` for an unknown id.
    pub fn rod(&self, id: &str) -> GameResult<&Rod> {
        self.rods
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| GameError::not_found(EntityKind::Rod, id))
    }

    /// # Errors
    ///
    /// Returns `GameError::NotFound` for an unknown id.
    pub fn bait(&self, id: &str) -> GameResult<&Bait> {
        self.baits
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| GameError::not_found(EntityKind::Bait, id))
    }

    /// # Errors
    ///
    /// Returns `GameError::NotFound` for an unknown id.
    pub fn location(&self, id: &str) -> GameResult<&Location> {
        self.locations
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| GameError::not_found(EntityKind::Location, id))
    }

    /// # Errors
    ///
    /// Returns `GameError::NotFound` for an unknown id.
    pub fn achievement(&self, id: &str) -> GameResult<&Achievement> {
        self.achievements
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| GameError::not_found(EntityKind::Achievement, id))
    }

    #[must_use]
    pub fn is_free_bait(&self, bait_id: &str) -> bool {
        self.free_bait_id == bait_id
    }
}

fn check_unique<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a String>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(CatalogError::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(())
}

fn unknown(kind: EntityKind, id: &str) -> CatalogError {
    CatalogError::UnknownReference {
        kind,
        id: id.to_string(),
    }
}
