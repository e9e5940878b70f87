//! Session orchestrator: the cast cycle state machine.
//!
//! `Idle -> Casting -> Waiting -> Biting -> InMinigame -> Resolved -> Idle`
//!
//! The session owns the ledger, the RNG streams, at most one pending timer and
//! the active minigame. Hosts either feed elapsed time through
//! [`Session::advance`] or run their own scheduler and call
//! [`Session::fire_timer`] with the token of the timer that expired.
use std::sync::Arc;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::catalog::{Catalog, Rarity};
use crate::catch_yield::roll_yield;
use crate::error::{ConfigError, GameError, GameResult, check_range};
use crate::flavor::{FlavorPatch, FlavorRequest, FlavorSource, resolve_flavor};
use crate::ledger::{CaughtFish, PlayerState, ProgressionLedger, SaleReport};
use crate::minigame::{FixedStep, Minigame, MinigameConfig, MinigameStatus, MinigameView};
use crate::numbers::{millis_from_f64, u64_to_f64};
use crate::resolver::resolve_bite;
use crate::rng::RngBundle;

const MAX_TIMER_MS: f64 = 60_000.0;

/// Timing configuration for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_cast_delay_ms")]
    pub cast_delay_ms: u64,
    #[serde(default = "SessionConfig::default_wait_min_ms")]
    pub wait_min_ms: u64,
    #[serde(default = "SessionConfig::default_wait_max_ms")]
    pub wait_max_ms: u64,
    #[serde(default = "SessionConfig::default_bite_alert_ms")]
    pub bite_alert_ms: u64,
    /// Return to `Idle` as soon as a result is shown
    #[serde(default)]
    pub auto_acknowledge: bool,
    #[serde(default)]
    pub minigame: MinigameConfig,
}

impl SessionConfig {
    const fn default_cast_delay_ms() -> u64 {
        1_000
    }

    const fn default_wait_min_ms() -> u64 {
        2_000
    }

    const fn default_wait_max_ms() -> u64 {
        6_000
    }

    const fn default_bite_alert_ms() -> u64 {
        1_000
    }

    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when parsing fails or validation rejects a field.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates its bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "session.cast_delay_ms",
            u64_to_f64(self.cast_delay_ms),
            1.0,
            MAX_TIMER_MS,
        )?;
        check_range(
            "session.wait_min_ms",
            u64_to_f64(self.wait_min_ms),
            1.0,
            MAX_TIMER_MS,
        )?;
        check_range(
            "session.wait_max_ms",
            u64_to_f64(self.wait_max_ms),
            1.0,
            MAX_TIMER_MS,
        )?;
        if self.wait_min_ms > self.wait_max_ms {
            return Err(ConfigError::MinExceedsMax {
                field: "session.wait_ms",
                min: u64_to_f64(self.wait_min_ms),
                max: u64_to_f64(self.wait_max_ms),
            });
        }
        check_range(
            "session.bite_alert_ms",
            u64_to_f64(self.bite_alert_ms),
            1.0,
            MAX_TIMER_MS,
        )?;
        self.minigame.validate()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cast_delay_ms: Self::default_cast_delay_ms(),
            wait_min_ms: Self::default_wait_min_ms(),
            wait_max_ms: Self::default_wait_max_ms(),
            bite_alert_ms: Self::default_bite_alert_ms(),
            auto_acknowledge: false,
            minigame: MinigameConfig::default(),
        }
    }
}

/// How the last attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Resolution {
    Landed { fish_id: u64 },
    Escaped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Casting,
    Waiting,
    Biting,
    InMinigame,
    Resolved(Resolution),
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Casting => "casting",
            Self::Waiting => "waiting",
            Self::Biting => "biting",
            Self::InMinigame => "in_minigame",
            Self::Resolved(_) => "resolved",
        }
    }
}

/// Identity of a scheduled single-shot timer. Tokens are never reused
/// within a session, so a stale token can never fire into a later state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    CastDelay,
    WaitForBite,
    BiteAlert,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    token: TimerToken,
    kind: TimerKind,
    remaining_ms: u64,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum SessionEvent {
    Cast { bait_id: String },
    WaitStarted { wait_ms: u64 },
    Bite { species_id: String },
    MinigameStarted { species_id: String, band_size: f64 },
    Caught { fish: CaughtFish },
    Escaped { species_id: String },
    LevelUp { level: u32, gained: u32 },
    AchievementUnlocked { id: String },
    Aborted { from: Phase },
}

pub type SessionEvents = SmallVec<[SessionEvent; 4]>;

/// Snapshot for rendering.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub phase: Phase,
    pub player: &'a PlayerState,
    pub minigame: Option<MinigameView>,
    pub muted: bool,
    /// Milliseconds until the pending timer fires
    pub timer_remaining_ms: Option<u64>,
}

/// One player's fishing session.
#[derive(Debug)]
pub struct Session {
    catalog: Arc<Catalog>,
    ledger: ProgressionLedger,
    config: SessionConfig,
    rngs: RngBundle,
    seed: u64,
    phase: Phase,
    timer: Option<PendingTimer>,
    next_token: u64,
    pinned_species: Option<String>,
    minigame: Option<Minigame>,
    step: FixedStep,
    clock_ms: u64,
    muted: bool,
    flavor_requests: Vec<FlavorRequest>,
}

impl Session {
    /// Start a session for a new player.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(
        catalog: Arc<Catalog>,
        seed: u64,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        let state = PlayerState::new(&catalog);
        Self::from_state(catalog, state, seed, config)
    }

    /// Resume a session from a saved player state.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn from_state(
        catalog: Arc<Catalog>,
        state: PlayerState,
        seed: u64,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let step = FixedStep::new(config.minigame.tick_hz);
        Ok(Self {
            ledger: ProgressionLedger::with_state(Arc::clone(&catalog), state),
            catalog,
            config,
            rngs: RngBundle::from_user_seed(seed),
            seed,
            phase: Phase::Idle,
            timer: None,
            next_token: 0,
            pinned_species: None,
            minigame: None,
            step,
            clock_ms: 0,
            muted: false,
            flavor_requests: Vec::new(),
        })
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    #[must_use]
    pub const fn state(&self) -> &PlayerState {
        self.ledger.state()
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProgressionLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn rng_draws(&self) -> u64 {
        self.rngs.total_draws()
    }

    #[must_use]
    pub fn into_state(self) -> PlayerState {
        self.ledger.into_state()
    }

    /// Token of the pending timer, for hosts that schedule timers themselves.
    #[must_use]
    pub fn pending_timer(&self) -> Option<(TimerToken, u64)> {
        self.timer.map(|timer| (timer.token, timer.remaining_ms))
    }

    #[must_use]
    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            phase: self.phase,
            player: self.ledger.state(),
            minigame: self.minigame.as_ref().map(Minigame::view),
            muted: self.muted,
            timer_remaining_ms: self.timer.map(|timer| timer.remaining_ms),
        }
    }

    fn require(&self, action: &'static str, allowed: bool) -> GameResult<()> {
        if allowed {
            Ok(())
        } else {
            warn!("rejected {action} while {}", self.phase.as_str());
            Err(GameError::InvalidTransition {
                action,
                phase: self.phase.as_str(),
            })
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("phase {} -> {}", self.phase.as_str(), phase.as_str());
        self.phase = phase;
    }

    fn schedule(&mut self, kind: TimerKind, duration_ms: u64) {
        self.next_token += 1;
        self.timer = Some(PendingTimer {
            token: TimerToken(self.next_token),
            kind,
            remaining_ms: duration_ms.max(1),
        });
    }

    /// Throw a line with the selected bait.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Idle`; `InsufficientBait` when the
    /// selected bait is out of stock.
    pub fn cast(&mut self) -> GameResult<SessionEvents> {
        self.require("cast", self.phase == Phase::Idle)?;
        self.ledger.consume_bait()?;
        let bait_id = self.ledger.state().selected_bait_id.clone();
        self.enter(Phase::Casting);
        self.schedule(TimerKind::CastDelay, self.config.cast_delay_ms);
        let mut events = SessionEvents::new();
        events.push(SessionEvent::Cast { bait_id });
        Ok(events)
    }

    /// Advance session time, firing due timers and ticking the minigame.
    pub fn advance(&mut self, elapsed_ms: u64) -> SessionEvents {
        let mut events = SessionEvents::new();
        let mut budget = elapsed_ms;
        while budget > 0 {
            if let Some(timer) = self.timer.as_mut() {
                if timer.remaining_ms > budget {
                    timer.remaining_ms -= budget;
                    self.clock_ms = self.clock_ms.saturating_add(budget);
                    break;
                }
                let due = *timer;
                budget -= due.remaining_ms;
                self.clock_ms = self.clock_ms.saturating_add(due.remaining_ms);
                self.timer = None;
                self.on_timer(due.kind, &mut events);
                continue;
            }
            self.clock_ms = self.clock_ms.saturating_add(budget);
            if self.phase == Phase::InMinigame {
                let ticks = self.step.advance(budget);
                self.tick_minigame(ticks, &mut events);
            }
            break;
        }
        events
    }

    /// Fire the pending timer now. Returns `None` when `token` does not match
    /// the pending timer (it was cancelled or already fired).
    pub fn fire_timer(&mut self, token: TimerToken) -> Option<SessionEvents> {
        match self.timer {
            Some(timer) if timer.token == token => {
                self.timer = None;
                let mut events = SessionEvents::new();
                self.on_timer(timer.kind, &mut events);
                Some(events)
            }
            _ => {
                debug!("ignored stale timer {token:?}");
                None
            }
        }
    }

    /// Run `ticks` fixed minigame steps directly, bypassing the wall clock.
    pub fn tick(&mut self, ticks: u32) -> SessionEvents {
        let mut events = SessionEvents::new();
        if self.phase == Phase::InMinigame {
            self.tick_minigame(ticks, &mut events);
        }
        events
    }

    fn on_timer(&mut self, kind: TimerKind, events: &mut SessionEvents) {
        debug!("timer {kind:?} fired in {}", self.phase.as_str());
        match kind {
            TimerKind::CastDelay => self.begin_wait(events),
            TimerKind::WaitForBite => self.begin_bite(events),
            TimerKind::BiteAlert => self.begin_minigame(events),
        }
    }

    fn begin_wait(&mut self, events: &mut SessionEvents) {
        let speed_bonus = self
            .catalog
            .bait(&self.ledger.state().selected_bait_id)
            .map_or(1.0, |bait| bait.speed_bonus);
        let min = u64_to_f64(self.config.wait_min_ms);
        let span = u64_to_f64(self.config.wait_max_ms - self.config.wait_min_ms);
        let draw: f64 = self.rngs.wait().r#gen();
        let wait_ms = if speed_bonus > 0.0 {
            millis_from_f64((min + draw * span) / speed_bonus)
        } else {
            millis_from_f64(min + draw * span)
        }
        .max(1);

        self.enter(Phase::Waiting);
        self.schedule(TimerKind::WaitForBite, wait_ms);
        events.push(SessionEvent::WaitStarted { wait_ms });
    }

    fn begin_bite(&mut self, events: &mut SessionEvents) {
        let catalog = Arc::clone(&self.catalog);
        let state = self.ledger.state();
        let species = catalog
            .bait(&state.selected_bait_id)
            .ok()
            .and_then(|bait| {
                resolve_bite(&state.current_location_id, bait, &catalog, self.rngs.bite())
            });
        let Some(species) = species else {
            warn!(
                "no species can bite at {}; returning to idle",
                self.ledger.state().current_location_id
            );
            self.reset_to_idle();
            return;
        };

        self.pinned_species = Some(species.id.clone());
        self.enter(Phase::Biting);
        self.schedule(TimerKind::BiteAlert, self.config.bite_alert_ms);
        events.push(SessionEvent::Bite {
            species_id: species.id.clone(),
        });
    }

    fn begin_minigame(&mut self, events: &mut SessionEvents) {
        let catalog = Arc::clone(&self.catalog);
        let pinned = self.pinned_species.as_deref().unwrap_or_default();
        let setup = catalog.species(pinned).and_then(|species| {
            let rod = catalog.rod(&self.ledger.state().equipped_rod_id)?;
            Ok((rod, species))
        });
        let (rod, species) = match setup {
            Ok(pair) => pair,
            Err(err) => {
                warn!("cannot start minigame: {err}");
                self.reset_to_idle();
                return;
            }
        };

        let minigame = Minigame::new(rod, species, self.config.minigame.clone());
        events.push(SessionEvent::MinigameStarted {
            species_id: species.id.clone(),
            band_size: minigame.band_size(),
        });
        self.minigame = Some(minigame);
        self.step.reset();
        self.enter(Phase::InMinigame);
    }

    fn tick_minigame(&mut self, ticks: u32, events: &mut SessionEvents) {
        let Some(minigame) = self.minigame.as_mut() else {
            return;
        };
        let status = minigame.run_ticks(ticks, self.rngs.minigame());
        match status {
            MinigameStatus::Running => {}
            MinigameStatus::Success => self.land_fish(events),
            MinigameStatus::Failure => self.lose_fish(events),
        }
    }

    fn land_fish(&mut self, events: &mut SessionEvents) {
        self.minigame = None;
        let catalog = Arc::clone(&self.catalog);
        let species_id = self.pinned_species.take().unwrap_or_default();
        let report = catalog.species(&species_id).and_then(|species| {
            let catch = roll_yield(species, self.rngs.catch_yield());
            self.ledger.record_catch(&species.id, catch, self.clock_ms)
        });
        let report = match report {
            Ok(report) => report,
            Err(err) => {
                warn!("landed fish could not be recorded: {err}");
                self.reset_to_idle();
                return;
            }
        };

        let fish_id = report.fish.id;
        if report.fish.rarity > Rarity::Common {
            self.queue_flavor(FlavorRequest {
                fish_id,
                species_name: report.fish.species_name.clone(),
                weight: report.fish.weight,
                rarity: report.fish.rarity,
            });
        }
        events.push(SessionEvent::Caught { fish: report.fish });
        push_progress(
            events,
            report.levels_gained,
            self.ledger.state().level,
            report.achievements,
        );
        self.resolve(Resolution::Landed { fish_id });
    }

    /// Queued requests never outnumber the notable fish still owned.
    fn queue_flavor(&mut self, request: FlavorRequest) {
        let state = self.ledger.state();
        self.flavor_requests
            .retain(|queued| state.fish(queued.fish_id).is_some());
        self.flavor_requests.push(request);
    }

    fn lose_fish(&mut self, events: &mut SessionEvents) {
        self.minigame = None;
        let species_id = self.pinned_species.take().unwrap_or_default();
        debug!("{species_id} escaped");
        events.push(SessionEvent::Escaped { species_id });
        self.resolve(Resolution::Escaped);
    }

    fn resolve(&mut self, resolution: Resolution) {
        self.enter(Phase::Resolved(resolution));
        if self.config.auto_acknowledge {
            self.enter(Phase::Idle);
        }
    }

    /// Dismiss the result of the last attempt.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless an attempt has just resolved.
    pub fn acknowledge(&mut self) -> GameResult<()> {
        self.require("acknowledge", matches!(self.phase, Phase::Resolved(_)))?;
        self.pinned_species = None;
        self.enter(Phase::Idle);
        Ok(())
    }

    /// Force the session back to `Idle`, cancelling any pending timer and
    /// discarding the attempt. Spent bait is not refunded.
    pub fn abort(&mut self) -> SessionEvents {
        let mut events = SessionEvents::new();
        if self.phase != Phase::Idle {
            events.push(SessionEvent::Aborted { from: self.phase });
        }
        self.reset_to_idle();
        events
    }

    fn reset_to_idle(&mut self) {
        self.timer = None;
        self.minigame = None;
        self.pinned_species = None;
        self.step.reset();
        self.enter(Phase::Idle);
    }

    /// # Errors
    ///
    /// `InvalidTransition` outside the minigame.
    pub fn press(&mut self) -> GameResult<()> {
        self.set_holding("press", true)
    }

    /// # Errors
    ///
    /// `InvalidTransition` outside the minigame.
    pub fn release(&mut self) -> GameResult<()> {
        self.set_holding("release", false)
    }

    fn set_holding(&mut self, action: &'static str, holding: bool) -> GameResult<()> {
        self.require(action, self.phase == Phase::InMinigame)?;
        if let Some(minigame) = self.minigame.as_mut() {
            minigame.set_holding(holding);
        }
        Ok(())
    }

    /// Sell a fish. Achievements and level-ups earned by the sale come back
    /// as events alongside the report.
    ///
    /// # Errors
    ///
    /// See [`ProgressionLedger::sell`].
    pub fn sell(&mut self, fish_id: u64) -> GameResult<(SaleReport, SessionEvents)> {
        let sale = self.ledger.sell(fish_id)?;
        let mut events = SessionEvents::new();
        push_progress(
            &mut events,
            sale.levels_gained,
            self.ledger.state().level,
            sale.achievements.clone(),
        );
        Ok((sale, events))
    }

    /// # Errors
    ///
    /// See [`ProgressionLedger::buy_rod`].
    pub fn buy_rod(&mut self, rod_id: &str) -> GameResult<()> {
        self.ledger.buy_rod(rod_id)
    }

    /// # Errors
    ///
    /// See [`ProgressionLedger::buy_bait`].
    pub fn buy_bait(&mut self, bait_id: &str, quantity: u32) -> GameResult<()> {
        self.ledger.buy_bait(bait_id, quantity)
    }

    /// # Errors
    ///
    /// See [`ProgressionLedger::equip_rod`].
    pub fn equip_rod(&mut self, rod_id: &str) -> GameResult<()> {
        self.ledger.equip_rod(rod_id)
    }

    /// # Errors
    ///
    /// See [`ProgressionLedger::set_displayed`].
    pub fn set_displayed(&mut self, fish_id: u64, displayed: bool) -> GameResult<()> {
        self.ledger.set_displayed(fish_id, displayed)
    }

    /// # Errors
    ///
    /// `InvalidTransition` outside `Idle`, otherwise see
    /// [`ProgressionLedger::switch_location`].
    pub fn switch_location(&mut self, location_id: &str) -> GameResult<()> {
        self.require("switch location", self.phase == Phase::Idle)?;
        self.ledger.switch_location(location_id)
    }

    /// # Errors
    ///
    /// `InvalidTransition` outside `Idle`, otherwise see
    /// [`ProgressionLedger::select_bait`].
    pub fn select_bait(&mut self, bait_id: &str) -> GameResult<()> {
        self.require("select bait", self.phase == Phase::Idle)?;
        self.ledger.select_bait(bait_id)
    }

    /// Returns the new mute state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Drain queued flavor requests for dispatch to a background collaborator.
    pub fn take_flavor_requests(&mut self) -> Vec<FlavorRequest> {
        std::mem::take(&mut self.flavor_requests)
    }

    /// Apply a resolved description. Patches for fish no longer owned are dropped.
    pub fn apply_flavor(&mut self, patch: &FlavorPatch) -> bool {
        let applied = self.ledger.apply_flavor(patch);
        if !applied {
            debug!("dropped flavor for missing fish {}", patch.fish_id);
        }
        applied
    }

    /// Resolve all queued requests through a blocking source. Returns how many
    /// patches landed on a fish.
    pub fn enrich_flavor<S: FlavorSource + ?Sized>(&mut self, source: &S) -> usize {
        let requests = self.take_flavor_requests();
        let mut applied = 0;
        for request in &requests {
            let patch = resolve_flavor(source, request, self.rngs.flavor());
            if self.apply_flavor(&patch) {
                applied += 1;
            }
        }
        applied
    }
}

fn push_progress(
    events: &mut SessionEvents,
    levels_gained: u32,
    level: u32,
    achievements: Vec<String>,
) {
    if levels_gained > 0 {
        events.push(SessionEvent::LevelUp {
            level,
            gained: levels_gained,
        });
    }
    events.extend(
        achievements
            .into_iter()
            .map(|id| SessionEvent::AchievementUnlocked { id }),
    );
}
