//! Flavor text for notable catches.
//!
//! Descriptions come from an external collaborator (typically a text
//! generation service). The core never waits on it: a landed fish is recorded
//! immediately and the description arrives later as a [`FlavorPatch`] keyed by
//! fish id. Any failure degrades to a line from [`FALLBACK_FLAVOR`].
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Rarity;

/// Local lines used whenever the collaborator is unavailable or fails.
pub const FALLBACK_FLAVOR: [&str; 5] = [
    "It looks ordinary, but there is wisdom in its eyes.",
    "It shimmers in the water as if it swallowed a star.",
    "Legend says this fish brings good luck, or at least a good dinner.",
    "An angler never goes home empty-handed!",
    "Look closely. It seems to be laughing at your hook.",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorRequest {
    pub fish_id: u64,
    pub species_name: String,
    pub weight: f64,
    pub rarity: Rarity,
}

impl FlavorRequest {
    /// Prompt text for a generative collaborator.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!(
            "Write a short, witty or mystical description (one or two sentences, \
             at most 30 words) for a fish caught in a game. \
             Name: {}. Weight: {:.1}kg. Rarity: {}.",
            self.species_name, self.weight, self.rarity
        )
    }
}

/// Description to attach to a fish, if that fish is still in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorPatch {
    pub fish_id: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlavorError {
    #[error("flavor service unavailable")]
    Unavailable,
    #[error("flavor service failed: {0}")]
    Failed(String),
}

/// Blocking flavor collaborator.
pub trait FlavorSource {
    /// # Errors
    ///
    /// Returns `FlavorError` when no description can be produced.
    fn describe(&self, request: &FlavorRequest) -> Result<String, FlavorError>;
}

/// Source for hosts with no text service configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFlavor;

impl FlavorSource for OfflineFlavor {
    fn describe(&self, _request: &FlavorRequest) -> Result<String, FlavorError> {
        Err(FlavorError::Unavailable)
    }
}

/// Pick a local fallback line.
pub fn fallback_flavor(rng: &mut impl Rng) -> &'static str {
    FALLBACK_FLAVOR[rng.gen_range(0..FALLBACK_FLAVOR.len())]
}

/// Ask `source` for a description, falling back to the local table on error.
pub fn resolve_flavor<S: FlavorSource + ?Sized>(
    source: &S,
    request: &FlavorRequest,
    rng: &mut impl Rng,
) -> FlavorPatch {
    let text = match source.describe(request) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback_flavor(rng).to_string(),
        Err(err) => {
            warn!("flavor for fish {} fell back: {err}", request.fish_id);
            fallback_flavor(rng).to_string()
        }
    };
    FlavorPatch {
        fish_id: request.fish_id,
        text,
    }
}

#[cfg(feature = "async")]
pub use self::background::{AsyncFlavorSource, spawn_flavor};

#[cfg(feature = "async")]
mod background {
    use std::sync::Arc;

    use log::warn;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tokio::task::JoinHandle;

    use super::{FlavorError, FlavorPatch, FlavorRequest, fallback_flavor};

    #[async_trait::async_trait]
    pub trait AsyncFlavorSource: Send + Sync {
        async fn describe(&self, request: &FlavorRequest) -> Result<String, FlavorError>;
    }

    /// Run a description request in the background. The handle always yields a
    /// patch; failures resolve to a fallback line chosen by `fallback_seed`.
    pub fn spawn_flavor<S>(
        source: Arc<S>,
        request: FlavorRequest,
        fallback_seed: u64,
    ) -> JoinHandle<FlavorPatch>
    where
        S: AsyncFlavorSource + ?Sized + 'static,
    {
        tokio::spawn(async move {
            let text = match source.describe(&request).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => fallback_line(fallback_seed),
                Err(err) => {
                    warn!("background flavor for fish {} fell back: {err}", request.fish_id);
                    fallback_line(fallback_seed)
                }
            };
            FlavorPatch {
                fish_id: request.fish_id,
                text,
            }
        })
    }

    fn fallback_line(seed: u64) -> String {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        fallback_flavor(&mut rng).to_string()
    }
}
