use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tidecast_game::{
    Catalog, GameError, Phase, Rarity, Session, SessionConfig, SessionEvent,
};

use crate::logic::policy::{AnglerPolicy, AnglerStrategy, ShopAction};

/// Frames an attempt may take before the harness gives up on it.
const FRAME_BUDGET: u32 = 200_000;

/// Configuration for one automated campaign.
#[derive(Debug, Clone, Copy)]
pub struct CampaignPlan {
    pub strategy: AnglerStrategy,
    pub casts: usize,
    pub frame_ms: u64,
    /// Sell every fish right after it is landed
    pub sell_catch: bool,
    /// Abort every Nth cast part-way through
    pub abort_every: Option<usize>,
}

impl CampaignPlan {
    #[must_use]
    pub const fn new(strategy: AnglerStrategy, casts: usize) -> Self {
        Self {
            strategy,
            casts,
            frame_ms: 16,
            sell_catch: true,
            abort_every: None,
        }
    }

    #[must_use]
    pub const fn keep_catch(mut self) -> Self {
        self.sell_catch = false;
        self
    }

    #[must_use]
    pub const fn with_aborts(mut self, every: usize) -> Self {
        self.abort_every = Some(every);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CastOutcome {
    Landed {
        fish_id: u64,
        species_id: String,
        rarity: Rarity,
        price: u64,
    },
    Escaped {
        species_id: String,
    },
    Aborted {
        phase: Phase,
    },
    Rejected(GameError),
}

/// Snapshot taken after each cast.
#[derive(Debug, Clone)]
pub struct CastRecord {
    pub index: usize,
    pub location_id: String,
    pub bait_id: String,
    pub outcome: CastOutcome,
    pub gold_after: u64,
    pub level_after: u32,
    pub completed_after: BTreeSet<String>,
}

/// Everything a scenario needs to judge a campaign.
#[derive(Debug)]
pub struct CampaignSummary {
    pub seed: u64,
    pub strategy: AnglerStrategy,
    pub casts: Vec<CastRecord>,
    pub events: Vec<SessionEvent>,
    /// Harness-detected contract breaches
    pub violations: Vec<String>,
    pub session: Session,
}

impl CampaignSummary {
    #[must_use]
    pub fn landed(&self) -> usize {
        self.casts
            .iter()
            .filter(|cast| matches!(cast.outcome, CastOutcome::Landed { .. }))
            .count()
    }

    #[must_use]
    pub fn rejected(&self) -> usize {
        self.casts
            .iter()
            .filter(|cast| matches!(cast.outcome, CastOutcome::Rejected(_)))
            .count()
    }
}

/// Play `plan.casts` casts on a fresh session seeded with `seed`.
///
/// # Errors
///
/// Returns an error if the session cannot be created.
pub fn run_campaign(
    catalog: &Arc<Catalog>,
    seed: u64,
    plan: CampaignPlan,
) -> Result<CampaignSummary> {
    let session = Session::new(Arc::clone(catalog), seed, SessionConfig::default())
        .context("creating session")?;
    let mut runner = Runner {
        catalog: Arc::clone(catalog),
        session,
        policy: plan.strategy.create_policy(seed),
        abort_rng: ChaCha20Rng::seed_from_u64(seed.rotate_left(17)),
        events: Vec::new(),
        violations: Vec::new(),
    };

    let mut casts = Vec::with_capacity(plan.casts);
    for index in 0..plan.casts {
        runner.shop();
        let location_id = runner.session.state().current_location_id.clone();
        let bait_id = runner.session.state().selected_bait_id.clone();
        let abort = plan
            .abort_every
            .is_some_and(|every| every > 0 && (index + 1) % every == 0);
        let outcome = runner.play_cast(plan.frame_ms, abort);
        if plan.sell_catch
            && let CastOutcome::Landed { fish_id, .. } = outcome
        {
            runner.sell(fish_id);
        }

        let state = runner.session.state();
        casts.push(CastRecord {
            index,
            location_id,
            bait_id,
            outcome,
            gold_after: state.gold,
            level_after: state.level,
            completed_after: state.completed_achievements.clone(),
        });
    }

    debug!(
        "campaign seed {seed} ({}) finished: {} casts, {} rng draws",
        plan.strategy,
        casts.len(),
        runner.session.rng_draws()
    );
    Ok(CampaignSummary {
        seed,
        strategy: plan.strategy,
        casts,
        events: runner.events,
        violations: runner.violations,
        session: runner.session,
    })
}

struct Runner {
    catalog: Arc<Catalog>,
    session: Session,
    policy: Box<dyn AnglerPolicy + Send>,
    abort_rng: ChaCha20Rng,
    events: Vec<SessionEvent>,
    violations: Vec<String>,
}

impl Runner {
    fn shop(&mut self) {
        let actions = self
            .policy
            .plan_shopping(&self.catalog, self.session.state());
        for action in actions {
            let before = self.session.state().clone();
            let result = match &action {
                ShopAction::BuyBait { bait_id, quantity } => {
                    self.session.buy_bait(bait_id, *quantity)
                }
                ShopAction::BuyRod { rod_id } => self.session.buy_rod(rod_id),
                ShopAction::SelectBait { bait_id } => self.session.select_bait(bait_id),
                ShopAction::SwitchLocation { location_id } => {
                    self.session.switch_location(location_id)
                }
            };
            if let Err(err) = result {
                warn!("{} shop action {action:?} rejected: {err}", self.policy.name());
                if self.session.state() != &before {
                    self.violations
                        .push(format!("rejected {action:?} still changed the player state"));
                }
            }
        }
    }

    fn sell(&mut self, fish_id: u64) {
        let before = self.session.state().gold;
        let Some(price) = self.session.state().fish(fish_id).map(|fish| fish.price) else {
            self.violations
                .push(format!("landed fish {fish_id} missing from inventory"));
            return;
        };
        match self.session.sell(fish_id) {
            Ok((sale, events)) => {
                let rewards: u64 = sale
                    .achievements
                    .iter()
                    .filter_map(|id| self.catalog.achievement(id).ok())
                    .map(|achievement| achievement.reward_gold)
                    .sum();
                if sale.gold != price || self.session.state().gold != before + price + rewards {
                    self.violations.push(format!(
                        "sale of fish {fish_id} credited {} (price {price}, rewards {rewards})",
                        self.session.state().gold.saturating_sub(before)
                    ));
                }
                self.events.extend(events);
            }
            Err(err) => self
                .violations
                .push(format!("selling owned fish {fish_id} failed: {err}")),
        }
    }

    fn play_cast(&mut self, frame_ms: u64, abort: bool) -> CastOutcome {
        match self.session.cast() {
            Ok(events) => self.events.extend(events),
            Err(err) => return CastOutcome::Rejected(err),
        }
        let abort_after = abort.then(|| self.abort_rng.gen_range(1..360_u32));

        let mut frames = 0_u32;
        loop {
            if abort_after == Some(frames) {
                return self.abort();
            }
            if let Some(view) = self.session.view().minigame {
                let hold = self.policy.steer(&view);
                let input = if hold {
                    self.session.press()
                } else {
                    self.session.release()
                };
                if let Err(err) = input {
                    self.violations
                        .push(format!("reel input rejected mid-minigame: {err}"));
                }
            }

            let mut outcome = None;
            for event in self.session.advance(frame_ms) {
                match &event {
                    SessionEvent::Caught { fish } => {
                        outcome = Some(CastOutcome::Landed {
                            fish_id: fish.id,
                            species_id: fish.species_id.clone(),
                            rarity: fish.rarity,
                            price: fish.price,
                        });
                    }
                    SessionEvent::Escaped { species_id } => {
                        outcome = Some(CastOutcome::Escaped {
                            species_id: species_id.clone(),
                        });
                    }
                    _ => {}
                }
                self.events.push(event);
            }
            if let Some(outcome) = outcome {
                if let Err(err) = self.session.acknowledge() {
                    self.violations
                        .push(format!("resolved attempt could not be acknowledged: {err}"));
                }
                return outcome;
            }

            frames += 1;
            if frames >= FRAME_BUDGET {
                self.violations
                    .push(format!("attempt stuck in {}", self.session.phase().as_str()));
                return self.abort();
            }
        }
    }

    fn abort(&mut self) -> CastOutcome {
        let phase = self.session.phase();
        let stale = self.session.pending_timer();
        let inventory = self.session.state().inventory.len();
        let caught = self.session.state().stats.total_caught;
        self.events.extend(self.session.abort());

        if let Some((token, _)) = stale
            && self.session.fire_timer(token).is_some()
        {
            self.violations
                .push(format!("cancelled timer fired after abort in {}", phase.as_str()));
        }
        if self.session.phase() != Phase::Idle {
            self.violations.push("abort did not return to idle".to_string());
        }
        if self.session.state().inventory.len() != inventory
            || self.session.state().stats.total_caught != caught
        {
            self.violations.push("abort changed the catch record".to_string());
        }
        CastOutcome::Aborted { phase }
    }
}
