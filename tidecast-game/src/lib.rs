//! Tidecast Game Engine
//!
//! Platform-agnostic core of the Tidecast fishing game: catch resolution,
//! yield rolls, the reel-in timing minigame, progression and the cast-cycle
//! session. Rendering, audio and persistence live with the host.

pub mod catalog;
pub mod catch_yield;
pub mod error;
pub mod flavor;
pub mod ledger;
pub mod minigame;
pub mod numbers;
pub mod resolver;
pub mod rng;
pub mod session;

use std::sync::Arc;

// Re-export commonly used types
pub use catalog::{
    Achievement, AchievementKind, Bait, Catalog, CatalogError, ExperienceCurve, Location, Rarity,
    Rod, Species,
};
pub use catch_yield::{CatchYield, roll_yield, yield_for_draw};
pub use error::{ConfigError, EntityKind, GameError, GameResult};
pub use flavor::{
    FALLBACK_FLAVOR, FlavorError, FlavorPatch, FlavorRequest, FlavorSource, OfflineFlavor,
    resolve_flavor,
};
#[cfg(feature = "async")]
pub use flavor::{AsyncFlavorSource, spawn_flavor};
pub use ledger::{
    AchievementProgress, CatchReport, CaughtFish, GameStats, PlayerState, ProgressionLedger,
    SaleReport,
};
pub use minigame::{FixedStep, Minigame, MinigameConfig, MinigameStatus, MinigameView};
pub use resolver::{RarityThresholds, resolve_bite, resolve_bite_with_draws};
pub use rng::RngBundle;
pub use session::{
    Phase, Resolution, Session, SessionConfig, SessionEvent, SessionEvents, SessionView,
    TimerToken,
};

/// Trait for abstracting catalog loading.
/// Platform-specific implementations should provide this
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the catalog from the platform-specific source
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or fails validation.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;
}

/// Loader for the catalog bundled with this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledCatalog;

impl CatalogLoader for BundledCatalog {
    type Error = CatalogError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Catalog::load_from_static()
    }
}

/// Trait for abstracting save/load operations.
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the player state cannot be saved.
    fn save_player(&self, save_name: &str, state: &PlayerState) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the player state cannot be loaded.
    fn load_player(&self, save_name: &str) -> Result<Option<PlayerState>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Main game engine for creating and persisting sessions
pub struct GameEngine<L, S>
where
    L: CatalogLoader,
    S: GameStorage,
{
    catalog_loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: CatalogLoader,
    S: GameStorage,
{
    pub const fn new(catalog_loader: L, storage: S) -> Self {
        Self {
            catalog_loader,
            storage,
        }
    }

    /// Start a session for a brand-new player.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or the config is invalid.
    pub fn create_session(&self, seed: u64, config: SessionConfig) -> anyhow::Result<Session>
    where
        L::Error: Into<anyhow::Error>,
    {
        let catalog = self.catalog_loader.load_catalog().map_err(Into::into)?;
        Ok(Session::new(Arc::new(catalog), seed, config)?)
    }

    /// Resume the named save, or start fresh when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the catalog or the save fails.
    pub fn resume_session(
        &self,
        seed: u64,
        save_name: &str,
        config: SessionConfig,
    ) -> anyhow::Result<Session>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let catalog = Arc::new(self.catalog_loader.load_catalog().map_err(Into::into)?);
        let session = match self.storage.load_player(save_name).map_err(Into::into)? {
            Some(state) => {
                log::debug!("resuming save '{save_name}' at level {}", state.level);
                Session::from_state(catalog, state, seed, config)?
            }
            None => Session::new(catalog, seed, config)?,
        };
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns an error if the player state cannot be saved.
    pub fn save_session(&self, save_name: &str, session: &Session) -> Result<(), S::Error> {
        self.storage.save_player(save_name, session.state())
    }

    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_save(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }
}
