use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tidecast_game::{Bait, Catalog, MinigameView, PlayerState};

/// Chance per frame that the angler keeps its previous input instead of reacting.
const SLIP_CHANCE: f64 = 0.05;

/// Setup step an angler takes while idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopAction {
    BuyBait { bait_id: String, quantity: u32 },
    BuyRod { rod_id: String },
    SelectBait { bait_id: String },
    SwitchLocation { location_id: String },
}

/// Policy interface for automated anglers.
pub trait AnglerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Whether to hold the reel for this frame.
    fn steer(&mut self, view: &MinigameView) -> bool;

    /// Purchases and setup before the next cast.
    fn plan_shopping(&self, catalog: &Catalog, state: &PlayerState) -> Vec<ShopAction>;
}

/// Built-in angler strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnglerStrategy {
    /// Buys cheap bait in packs and upgrades rods only with a cushion
    Thrifty,
    /// Spends on the best gear it can afford
    Spender,
}

impl AnglerStrategy {
    pub const ALL: [Self; 2] = [Self::Thrifty, Self::Spender];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Thrifty => "thrifty",
            Self::Spender => "spender",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn AnglerPolicy + Send> {
        let reflexes = Reflexes::new(seed);
        match self {
            Self::Thrifty => Box::new(ThriftyAngler { reflexes }),
            Self::Spender => Box::new(SpenderAngler { reflexes }),
        }
    }
}

impl fmt::Display for AnglerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Chase the target with the band center, occasionally missing a frame.
struct Reflexes {
    rng: ChaCha20Rng,
    holding: bool,
}

impl Reflexes {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed ^ 0xA4C1_E500),
            holding: false,
        }
    }

    fn react(&mut self, view: &MinigameView) -> bool {
        if !self.rng.gen_bool(SLIP_CHANCE) {
            self.holding = view.band_position + view.band_size / 2.0 < view.target_position;
        }
        self.holding
    }
}

struct ThriftyAngler {
    reflexes: Reflexes,
}

struct SpenderAngler {
    reflexes: Reflexes,
}

impl AnglerPolicy for ThriftyAngler {
    fn name(&self) -> &'static str {
        "thrifty"
    }

    fn steer(&mut self, view: &MinigameView) -> bool {
        self.reflexes.react(view)
    }

    fn plan_shopping(&self, catalog: &Catalog, state: &PlayerState) -> Vec<ShopAction> {
        let mut actions = Vec::new();
        move_to_deepest(catalog, state, &mut actions);

        let mut gold = state.gold;
        if let Some(rod) = catalog
            .rods
            .iter()
            .filter(|rod| !state.unlocked_rods.contains(&rod.id) && rod.level_req <= state.level)
            .min_by_key(|rod| rod.price)
            .filter(|rod| rod.price.saturating_mul(2) <= gold)
        {
            gold -= rod.price;
            actions.push(ShopAction::BuyRod {
                rod_id: rod.id.clone(),
            });
        }

        let Some(cheap) = paid_baits(catalog).min_by_key(|bait| bait.price) else {
            return actions;
        };
        let mut stock = state.bait_count(&cheap.id);
        if stock == 0 && gold >= cheap.price.saturating_mul(10) {
            actions.push(ShopAction::BuyBait {
                bait_id: cheap.id.clone(),
                quantity: 5,
            });
            stock = 5;
        }
        let wanted = if stock > 0 {
            cheap.id.clone()
        } else {
            catalog.free_bait_id.clone()
        };
        select_if_changed(state, wanted, &mut actions);
        actions
    }
}

impl AnglerPolicy for SpenderAngler {
    fn name(&self) -> &'static str {
        "spender"
    }

    fn steer(&mut self, view: &MinigameView) -> bool {
        self.reflexes.react(view)
    }

    fn plan_shopping(&self, catalog: &Catalog, state: &PlayerState) -> Vec<ShopAction> {
        let mut actions = Vec::new();
        move_to_deepest(catalog, state, &mut actions);

        let mut gold = state.gold;
        if let Some(rod) = catalog
            .rods
            .iter()
            .filter(|rod| {
                !state.unlocked_rods.contains(&rod.id)
                    && rod.level_req <= state.level
                    && rod.price <= gold
            })
            .max_by(|a, b| a.power.total_cmp(&b.power))
        {
            gold -= rod.price;
            actions.push(ShopAction::BuyRod {
                rod_id: rod.id.clone(),
            });
        }

        let best_stocked = paid_baits(catalog)
            .filter(|bait| state.bait_count(&bait.id) > 0)
            .max_by(|a, b| a.rarity_bonus.total_cmp(&b.rarity_bonus));
        let wanted = match best_stocked {
            Some(bait) => bait.id.clone(),
            None => match paid_baits(catalog)
                .filter(|bait| bait.price.saturating_mul(2) <= gold)
                .max_by(|a, b| a.rarity_bonus.total_cmp(&b.rarity_bonus))
            {
                Some(bait) => {
                    actions.push(ShopAction::BuyBait {
                        bait_id: bait.id.clone(),
                        quantity: 1,
                    });
                    bait.id.clone()
                }
                None => catalog.free_bait_id.clone(),
            },
        };
        select_if_changed(state, wanted, &mut actions);
        actions
    }
}

fn paid_baits(catalog: &Catalog) -> impl Iterator<Item = &Bait> {
    catalog
        .baits
        .iter()
        .filter(|bait| !catalog.is_free_bait(&bait.id))
}

fn move_to_deepest(catalog: &Catalog, state: &PlayerState, actions: &mut Vec<ShopAction>) {
    let deepest = catalog
        .locations
        .iter()
        .filter(|location| location.level_req <= state.level)
        .max_by_key(|location| location.level_req);
    if let Some(location) = deepest
        && location.id != state.current_location_id
    {
        actions.push(ShopAction::SwitchLocation {
            location_id: location.id.clone(),
        });
    }
}

fn select_if_changed(state: &PlayerState, bait_id: String, actions: &mut Vec<ShopAction>) {
    if state.selected_bait_id != bait_id {
        actions.push(ShopAction::SelectBait { bait_id });
    }
}
