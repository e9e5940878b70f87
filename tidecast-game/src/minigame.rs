//! Timing minigame: a fixed-step simulation of a capture band chasing a target.
//!
//! Positions live on a 0-100 scale. While input is held the band accelerates
//! upward, otherwise it falls; velocity is damped every tick and the band
//! sticks at either wall. Progress fills while the target sits inside the
//! band and drains otherwise. Reaching 100 lands the fish, reaching 0 loses it.
//!
//! The simulation never reads wall-clock time. Hosts convert elapsed time to
//! whole ticks with [`FixedStep`].
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Rod, Species};
use crate::error::{ConfigError, check_range};

const PROGRESS_MAX: f64 = 100.0;
const TRACK_MAX: f64 = 100.0;

/// Tuning for the minigame; defaults reproduce the shipped game feel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinigameConfig {
    #[serde(default = "MinigameConfig::default_tick_hz")]
    pub tick_hz: u32,
    /// Velocity added per tick while held, removed per tick while released
    #[serde(default = "MinigameConfig::default_lift")]
    pub lift: f64,
    #[serde(default = "MinigameConfig::default_damping")]
    pub damping: f64,
    #[serde(default = "MinigameConfig::default_start_position")]
    pub band_start: f64,
    #[serde(default = "MinigameConfig::default_start_position")]
    pub target_start: f64,
    #[serde(default = "MinigameConfig::default_base_band_size")]
    pub base_band_size: f64,
    #[serde(default = "MinigameConfig::default_min_band_size")]
    pub min_band_size: f64,
    #[serde(default = "MinigameConfig::default_retarget_chance")]
    pub retarget_chance: f64,
    /// Destinations are drawn uniformly from [0, destination_range)
    #[serde(default = "MinigameConfig::default_destination_range")]
    pub destination_range: f64,
    /// Highest visible target position
    #[serde(default = "MinigameConfig::default_target_ceiling")]
    pub target_ceiling: f64,
    #[serde(default = "MinigameConfig::default_speed_scale")]
    pub speed_scale: f64,
    #[serde(default = "MinigameConfig::default_jitter")]
    pub jitter: f64,
    #[serde(default = "MinigameConfig::default_catch_rate")]
    pub catch_rate: f64,
    #[serde(default = "MinigameConfig::default_loss_rate")]
    pub loss_rate: f64,
    #[serde(default = "MinigameConfig::default_start_progress")]
    pub start_progress: f64,
}

impl MinigameConfig {
    const fn default_tick_hz() -> u32 {
        60
    }

    const fn default_lift() -> f64 {
        0.5
    }

    const fn default_damping() -> f64 {
        0.9
    }

    const fn default_start_position() -> f64 {
        50.0
    }

    const fn default_base_band_size() -> f64 {
        25.0
    }

    const fn default_min_band_size() -> f64 {
        15.0
    }

    const fn default_retarget_chance() -> f64 {
        0.03
    }

    const fn default_destination_range() -> f64 {
        90.0
    }

    const fn default_target_ceiling() -> f64 {
        92.0
    }

    const fn default_speed_scale() -> f64 {
        0.8
    }

    const fn default_jitter() -> f64 {
        0.3
    }

    const fn default_catch_rate() -> f64 {
        0.5
    }

    const fn default_loss_rate() -> f64 {
        0.2
    }

    const fn default_start_progress() -> f64 {
        30.0
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates its bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("minigame.tick_hz", f64::from(self.tick_hz), 1.0, 1_000.0)?;
        check_range("minigame.lift", self.lift, 0.0, 10.0)?;
        check_range("minigame.damping", self.damping, 0.0, 0.999)?;
        check_range("minigame.min_band_size", self.min_band_size, 1.0, TRACK_MAX)?;
        check_range("minigame.base_band_size", self.base_band_size, 0.0, TRACK_MAX)?;
        check_range("minigame.retarget_chance", self.retarget_chance, 0.0, 1.0)?;
        check_range("minigame.target_ceiling", self.target_ceiling, 0.0, TRACK_MAX)?;
        check_range(
            "minigame.destination_range",
            self.destination_range,
            0.0,
            self.target_ceiling,
        )?;
        check_range("minigame.catch_rate", self.catch_rate, f64::EPSILON, PROGRESS_MAX)?;
        check_range("minigame.loss_rate", self.loss_rate, 0.0, PROGRESS_MAX)?;
        check_range(
            "minigame.start_progress",
            self.start_progress,
            f64::EPSILON,
            PROGRESS_MAX - f64::EPSILON,
        )?;
        Ok(())
    }

    /// Capture-band size for a rod/species pairing, never below the floor.
    #[must_use]
    pub fn band_size(&self, rod_power: f64, difficulty: f64) -> f64 {
        (self.base_band_size + rod_power / 5.0 - difficulty / 5.0)
            .max(self.min_band_size)
            .min(TRACK_MAX)
    }
}

impl Default for MinigameConfig {
    fn default() -> Self {
        Self {
            tick_hz: Self::default_tick_hz(),
            lift: Self::default_lift(),
            damping: Self::default_damping(),
            band_start: Self::default_start_position(),
            target_start: Self::default_start_position(),
            base_band_size: Self::default_base_band_size(),
            min_band_size: Self::default_min_band_size(),
            retarget_chance: Self::default_retarget_chance(),
            destination_range: Self::default_destination_range(),
            target_ceiling: Self::default_target_ceiling(),
            speed_scale: Self::default_speed_scale(),
            jitter: Self::default_jitter(),
            catch_rate: Self::default_catch_rate(),
            loss_rate: Self::default_loss_rate(),
            start_progress: Self::default_start_progress(),
        }
    }
}

/// `Running` until one of the two terminal states; there is no resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinigameStatus {
    Running,
    Success,
    Failure,
}

impl MinigameStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Live values for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinigameView {
    pub band_position: f64,
    pub band_size: f64,
    pub target_position: f64,
    pub progress: f64,
    pub holding: bool,
    pub status: MinigameStatus,
}

/// One catch attempt. A fresh instance is created per bite.
#[derive(Debug, Clone)]
pub struct Minigame {
    cfg: MinigameConfig,
    band_size: f64,
    band_position: f64,
    band_velocity: f64,
    target_position: f64,
    target_destination: f64,
    target_speed: f64,
    progress: f64,
    holding: bool,
    ticks: u64,
    status: MinigameStatus,
}

impl Minigame {
    #[must_use]
    pub fn new(rod: &Rod, species: &Species, cfg: MinigameConfig) -> Self {
        let band_size = cfg.band_size(rod.power, species.difficulty);
        let band_position = bounded(cfg.band_start, TRACK_MAX - band_size);
        let target_position = bounded(cfg.target_start, cfg.target_ceiling);
        Self {
            band_size,
            band_position,
            band_velocity: 0.0,
            target_position,
            target_destination: target_position,
            target_speed: species.difficulty / 100.0 * cfg.speed_scale,
            progress: cfg.start_progress,
            holding: false,
            ticks: 0,
            status: MinigameStatus::Running,
            cfg,
        }
    }

    /// Hold (`true`) or release (`false`) the reel input.
    pub fn set_holding(&mut self, holding: bool) {
        self.holding = holding;
    }

    /// Advance one logical tick. Terminal attempts ignore further ticks.
    pub fn tick(&mut self, rng: &mut impl Rng) -> MinigameStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.ticks += 1;
        self.step_band();
        self.step_target(rng);
        self.step_progress()
    }

    /// Advance up to `ticks` ticks, stopping at the first terminal state.
    pub fn run_ticks(&mut self, ticks: u32, rng: &mut impl Rng) -> MinigameStatus {
        for _ in 0..ticks {
            if self.tick(rng).is_terminal() {
                break;
            }
        }
        self.status
    }

    fn step_band(&mut self) {
        if self.holding {
            self.band_velocity += self.cfg.lift;
        } else {
            self.band_velocity -= self.cfg.lift;
        }
        self.band_velocity *= self.cfg.damping;
        self.band_position += self.band_velocity;

        let ceiling = TRACK_MAX - self.band_size;
        if self.band_position < 0.0 {
            self.band_position = 0.0;
            self.band_velocity = 0.0;
        } else if self.band_position > ceiling {
            self.band_position = ceiling;
            self.band_velocity = 0.0;
        }
    }

    fn step_target(&mut self, rng: &mut impl Rng) {
        if rng.r#gen::<f64>() < self.cfg.retarget_chance {
            self.target_destination = rng.r#gen::<f64>() * self.cfg.destination_range;
        }
        let stride = self.target_speed + rng.r#gen::<f64>() * self.cfg.jitter;
        if self.target_position < self.target_destination {
            self.target_position += stride;
        } else {
            self.target_position -= stride;
        }
        self.target_position = bounded(self.target_position, self.cfg.target_ceiling);
    }

    fn step_progress(&mut self) -> MinigameStatus {
        if self.is_overlapping() {
            self.progress += self.cfg.catch_rate;
        } else {
            self.progress -= self.cfg.loss_rate;
        }

        if self.progress >= PROGRESS_MAX {
            self.progress = PROGRESS_MAX;
            self.status = MinigameStatus::Success;
        } else if self.progress <= 0.0 {
            self.progress = 0.0;
            self.status = MinigameStatus::Failure;
        }
        self.status
    }

    #[must_use]
    pub fn is_overlapping(&self) -> bool {
        (self.band_position..=self.band_position + self.band_size).contains(&self.target_position)
    }

    #[must_use]
    pub const fn status(&self) -> MinigameStatus {
        self.status
    }

    #[must_use]
    pub const fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub const fn band_size(&self) -> f64 {
        self.band_size
    }

    #[must_use]
    pub const fn band_position(&self) -> f64 {
        self.band_position
    }

    #[must_use]
    pub const fn target_position(&self) -> f64 {
        self.target_position
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub const fn view(&self) -> MinigameView {
        MinigameView {
            band_position: self.band_position,
            band_size: self.band_size,
            target_position: self.target_position,
            progress: self.progress,
            holding: self.holding,
            status: self.status,
        }
    }
}

/// Pull `value` into `[0, ceiling]`. Tolerates a negative or NaN ceiling
/// from an unvalidated config; zero wins.
fn bounded(value: f64, ceiling: f64) -> f64 {
    value.min(ceiling).max(0.0)
}

/// Converts elapsed wall time into whole simulation ticks, carrying the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixedStep {
    tick_hz: u32,
    /// Accumulated `ms * tick_hz` not yet converted into a tick
    carry: u64,
}

impl FixedStep {
    #[must_use]
    pub const fn new(tick_hz: u32) -> Self {
        Self { tick_hz, carry: 0 }
    }

    /// Number of whole ticks covered by `elapsed_ms` plus any carried remainder.
    pub fn advance(&mut self, elapsed_ms: u64) -> u32 {
        self.carry = self
            .carry
            .saturating_add(elapsed_ms.saturating_mul(u64::from(self.tick_hz)));
        let ticks = self.carry / 1_000;
        self.carry %= 1_000;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    pub fn reset(&mut self) {
        self.carry = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fixture(rod_id: &str, species_id: &str) -> Minigame {
        let catalog = Catalog::load_from_static().unwrap();
        Minigame::new(
            catalog.rod(rod_id).unwrap(),
            catalog.species(species_id).unwrap(),
            MinigameConfig::default(),
        )
    }

    #[test]
    fn band_size_follows_rod_and_difficulty() {
        let cfg = MinigameConfig::default();
        assert!((cfg.band_size(20.0, 10.0) - 27.0).abs() < 1e-12);
        assert!((cfg.band_size(75.0, 20.0) - 36.0).abs() < 1e-12);
        // whale on bamboo would be 10, clamped to the floor
        assert!((cfg.band_size(20.0, 95.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn unvalidated_ceiling_never_panics() {
        let catalog = Catalog::load_from_static().unwrap();
        let rod = catalog.rod("rod_bamboo").unwrap();
        let species = catalog.species("fish_clownfish").unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        for ceiling in [-1.0, f64::NAN] {
            let cfg = MinigameConfig {
                target_ceiling: ceiling,
                ..MinigameConfig::default()
            };
            assert!(cfg.validate().is_err());
            let mut game = Minigame::new(rod, species, cfg);
            assert!(game.target_position() >= 0.0);
            game.run_ticks(30, &mut rng);
            assert!(game.target_position() >= 0.0);
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(MinigameConfig::default().validate().is_ok());
        let cfg = MinigameConfig {
            damping: 1.2,
            ..MinigameConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation { field: "minigame.damping", .. })
        ));
    }

    #[test]
    fn pinned_overlap_lands_fish_in_exactly_140_ticks() {
        let mut game = fixture("rod_bamboo", "fish_sardine");
        game.band_size = 20.0;
        game.band_position = 40.0;
        game.target_position = 50.0;

        let mut ticks = 0;
        while !game.status.is_terminal() {
            let status = game.step_progress();
            ticks += 1;
            assert!(game.progress <= PROGRESS_MAX);
            if ticks < 140 {
                assert_eq!(status, MinigameStatus::Running);
            }
        }
        assert_eq!(ticks, 140);
        assert_eq!(game.status, MinigameStatus::Success);
        assert!((game.progress - PROGRESS_MAX).abs() < f64::EPSILON);
    }

    #[test]
    fn no_overlap_fails_at_exactly_zero() {
        let mut game = fixture("rod_bamboo", "fish_sardine");
        game.band_position = 0.0;
        game.target_position = 90.0;
        while !game.step_progress().is_terminal() {}
        assert_eq!(game.status, MinigameStatus::Failure);
        assert!(game.progress.abs() < f64::EPSILON);
    }

    #[test]
    fn band_sticks_to_the_floor_when_released() {
        let mut game = fixture("rod_bamboo", "fish_sardine");
        for _ in 0..200 {
            game.step_band();
        }
        assert!(game.band_position.abs() < f64::EPSILON);
        assert!(game.band_velocity.abs() < f64::EPSILON);
    }

    #[test]
    fn band_sticks_to_the_ceiling_when_held() {
        let mut game = fixture("rod_bamboo", "fish_sardine");
        game.set_holding(true);
        for _ in 0..200 {
            game.step_band();
        }
        assert!((game.band_position - (TRACK_MAX - game.band_size)).abs() < 1e-9);
        assert!(game.band_velocity.abs() < f64::EPSILON);
    }

    #[test]
    fn target_stays_on_the_visible_track() {
        let mut game = fixture("rod_bamboo", "fish_whale");
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..5_000 {
            game.step_target(&mut rng);
            assert!((0.0..=92.0).contains(&game.target_position));
        }
    }

    #[test]
    fn terminal_attempts_ignore_ticks() {
        let mut game = fixture("rod_bamboo", "fish_sardine");
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let status = game.run_ticks(100_000, &mut rng);
        assert!(status.is_terminal());
        let ticks = game.ticks();
        assert_eq!(game.tick(&mut rng), status);
        assert_eq!(game.ticks(), ticks);
    }

    #[test]
    fn fixed_step_carries_partial_ticks() {
        let mut step = FixedStep::new(60);
        assert_eq!(step.advance(16), 0);
        assert_eq!(step.advance(1), 1);
        assert_eq!(step.advance(1_000), 60);
        let mut frames = FixedStep::new(60);
        let total: u32 = (0..60).map(|_| frames.advance(16)).sum::<u32>() + frames.advance(40);
        assert_eq!(total, 60);
    }
}
