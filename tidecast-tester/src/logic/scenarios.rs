use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use log::debug;
use thiserror::Error;
use tidecast_game::{
    AsyncFlavorSource, BundledCatalog, Catalog, FALLBACK_FLAVOR, FlavorError, FlavorPatch,
    FlavorRequest, GameEngine, GameStorage, PlayerState, SessionConfig, SessionEvent,
    spawn_flavor,
};
use twox_hash::XxHash64;

use crate::logic::policy::AnglerStrategy;
use crate::logic::simulation::{CampaignPlan, CampaignSummary, CastOutcome, run_campaign};

/// Inputs shared by every scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub catalog: Arc<Catalog>,
    pub seed: u64,
    pub casts: usize,
    pub verbose: bool,
}

pub struct TestScenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: fn(&ScenarioCtx) -> Result<()>,
}

#[derive(Debug, Error)]
pub enum ScenarioFailure {
    #[error("{count} invariant violation(s), first: {first}")]
    Violations { count: usize, first: String },
    #[error("replay of seed {seed} diverged: {first:016x} vs {second:016x}")]
    Diverged { seed: u64, first: u64, second: u64 },
    #[error("cast {index}: {detail}")]
    Cast { index: usize, detail: String },
}

const SCENARIOS: &[TestScenario] = &[
    TestScenario {
        name: "smoke",
        description: "Thrifty campaign completes every cast without violations",
        run: smoke,
    },
    TestScenario {
        name: "deterministic-replay",
        description: "Same seed replays to an identical save and event log",
        run: deterministic_replay,
    },
    TestScenario {
        name: "economy-invariants",
        description: "Sales, purchases and rewards keep gold consistent",
        run: economy_invariants,
    },
    TestScenario {
        name: "achievement-monotonic",
        description: "Completed achievements only grow and meet their targets",
        run: achievement_monotonic,
    },
    TestScenario {
        name: "location-pool",
        description: "Every catch belongs to the location it was made at",
        run: location_pool,
    },
    TestScenario {
        name: "flavor-enrichment",
        description: "Background descriptions land on owned fish or fall back",
        run: flavor_enrichment,
    },
    TestScenario {
        name: "abort-safety",
        description: "Aborted casts cancel timers and leave the ledger untouched",
        run: abort_safety,
    },
    TestScenario {
        name: "save-resume",
        description: "Player state survives a save and resume through the engine",
        run: save_resume,
    },
];

#[must_use]
pub fn all_scenarios() -> &'static [TestScenario] {
    SCENARIOS
}

#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static TestScenario> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.name.eq_ignore_ascii_case(name.trim()))
}

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.name, scenario.description))
}

fn ensure_clean(summary: &CampaignSummary) -> Result<()> {
    if let Some(first) = summary.violations.first() {
        return Err(ScenarioFailure::Violations {
            count: summary.violations.len(),
            first: first.clone(),
        }
        .into());
    }
    Ok(())
}

fn smoke(ctx: &ScenarioCtx) -> Result<()> {
    let summary = run_campaign(
        &ctx.catalog,
        ctx.seed,
        CampaignPlan::new(AnglerStrategy::Thrifty, ctx.casts),
    )?;
    ensure_clean(&summary)?;
    ensure!(
        summary.casts.len() == ctx.casts,
        "played {} of {} casts",
        summary.casts.len(),
        ctx.casts
    );
    if ctx.casts >= 5 && summary.landed() == 0 {
        bail!("no fish landed in {} casts", ctx.casts);
    }
    if ctx.verbose {
        println!(
            "     landed {}/{} | gold {} | level {}",
            summary.landed(),
            ctx.casts,
            summary.session.state().gold,
            summary.session.state().level
        );
    }
    Ok(())
}

fn deterministic_replay(ctx: &ScenarioCtx) -> Result<()> {
    let fingerprint = || -> Result<u64> {
        let plan = CampaignPlan::new(AnglerStrategy::Spender, ctx.casts).with_aborts(4);
        let summary = run_campaign(&ctx.catalog, ctx.seed, plan)?;
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&serde_json::to_vec(summary.session.state())?);
        hasher.write(&serde_json::to_vec(&summary.events)?);
        hasher.write_u64(summary.session.rng_draws());
        Ok(hasher.finish())
    };
    let first = fingerprint()?;
    let second = fingerprint()?;
    if first != second {
        return Err(ScenarioFailure::Diverged {
            seed: ctx.seed,
            first,
            second,
        }
        .into());
    }
    debug!("seed {} fingerprint {first:016x}", ctx.seed);
    Ok(())
}

fn economy_invariants(ctx: &ScenarioCtx) -> Result<()> {
    let summary = run_campaign(
        &ctx.catalog,
        ctx.seed,
        CampaignPlan::new(AnglerStrategy::Spender, ctx.casts),
    )?;
    ensure_clean(&summary)?;
    ensure!(
        summary.rejected() == 0,
        "{} casts rejected after shopping",
        summary.rejected()
    );

    let sold: u64 = summary
        .casts
        .iter()
        .filter_map(|cast| match cast.outcome {
            CastOutcome::Landed { price, .. } => Some(price),
            _ => None,
        })
        .sum();
    let stats = &summary.session.state().stats;
    ensure!(
        stats.total_gold_earned == sold,
        "earnings {} differ from sale prices {sold}",
        stats.total_gold_earned
    );
    ensure!(
        summary.session.state().inventory.is_empty(),
        "sold-off campaign still holds fish"
    );
    Ok(())
}

fn achievement_monotonic(ctx: &ScenarioCtx) -> Result<()> {
    let plan = CampaignPlan::new(AnglerStrategy::Thrifty, ctx.casts).keep_catch();
    let summary = run_campaign(&ctx.catalog, ctx.seed, plan)?;
    ensure_clean(&summary)?;

    let mut previous = None;
    for cast in &summary.casts {
        if let Some(before) = previous
            && !cast.completed_after.is_superset(before)
        {
            return Err(ScenarioFailure::Cast {
                index: cast.index,
                detail: "a completed achievement was lost".to_string(),
            }
            .into());
        }
        previous = Some(&cast.completed_after);
    }

    let ledger = summary.session.ledger();
    for achievement in &ctx.catalog.achievements {
        let progress = ledger.achievement_progress(&achievement.id)?;
        ensure!(
            progress.completed == (progress.current >= progress.target),
            "{} completion flag disagrees with progress {}/{}",
            achievement.id,
            progress.current,
            progress.target
        );
    }
    Ok(())
}

fn location_pool(ctx: &ScenarioCtx) -> Result<()> {
    let summary = run_campaign(
        &ctx.catalog,
        ctx.seed,
        CampaignPlan::new(AnglerStrategy::Spender, ctx.casts),
    )?;
    ensure_clean(&summary)?;
    for cast in &summary.casts {
        let CastOutcome::Landed {
            species_id, price, ..
        } = &cast.outcome
        else {
            continue;
        };
        let species = ctx.catalog.species(species_id)?;
        let fail = |detail: String| ScenarioFailure::Cast {
            index: cast.index,
            detail,
        };
        if !species.found_at(&cast.location_id) {
            return Err(fail(format!("{species_id} caught at {}", cast.location_id)).into());
        }
        if *price < species.base_price || *price >= species.base_price * 2 {
            return Err(fail(format!(
                "{species_id} priced {price} outside [{}, {})",
                species.base_price,
                species.base_price * 2
            ))
            .into());
        }
    }
    Ok(())
}

/// Describes every fish except those whose id is a multiple of three.
struct ScriptedFlavor;

impl ScriptedFlavor {
    fn text(request: &FlavorRequest) -> String {
        format!("{} weighing {:.1}", request.species_name, request.weight)
    }
}

#[async_trait::async_trait]
impl AsyncFlavorSource for ScriptedFlavor {
    async fn describe(&self, request: &FlavorRequest) -> Result<String, FlavorError> {
        if request.fish_id % 3 == 0 {
            return Err(FlavorError::Failed("scripted outage".to_string()));
        }
        Ok(Self::text(request))
    }
}

fn flavor_enrichment(ctx: &ScenarioCtx) -> Result<()> {
    let plan = CampaignPlan::new(AnglerStrategy::Spender, ctx.casts.max(20)).keep_catch();
    let mut summary = run_campaign(&ctx.catalog, ctx.seed, plan)?;
    ensure_clean(&summary)?;

    let requests = summary.session.take_flavor_requests();
    if requests.is_empty() {
        debug!("seed {} landed nothing notable; skipping", ctx.seed);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building flavor runtime")?;
    let source = Arc::new(ScriptedFlavor);
    let seed = summary.session.seed();
    let patches: Vec<FlavorPatch> = runtime.block_on(async {
        let handles: Vec<_> = requests
            .iter()
            .map(|request| spawn_flavor(Arc::clone(&source), request.clone(), seed ^ request.fish_id))
            .collect();
        let mut patches = Vec::with_capacity(handles.len());
        for handle in handles {
            patches.push(handle.await?);
        }
        Ok::<_, tokio::task::JoinError>(patches)
    })?;

    // the player sells one fish before its description arrives
    let sold = requests[0].fish_id;
    summary.session.sell(sold)?;

    for (request, patch) in requests.iter().zip(&patches) {
        ensure!(patch.fish_id == request.fish_id, "patch routed to the wrong fish");
        if request.fish_id % 3 == 0 {
            ensure!(
                FALLBACK_FLAVOR.contains(&patch.text.as_str()),
                "failed request for fish {} got '{}'",
                request.fish_id,
                patch.text
            );
        } else {
            ensure!(patch.text == ScriptedFlavor::text(request), "unexpected flavor text");
        }

        let applied = summary.session.apply_flavor(patch);
        if request.fish_id == sold {
            ensure!(!applied, "flavor applied to sold fish {sold}");
            continue;
        }
        ensure!(applied, "flavor for owned fish {} was dropped", request.fish_id);
        let stored = summary
            .session
            .state()
            .fish(request.fish_id)
            .and_then(|fish| fish.flavor.as_deref());
        ensure!(stored == Some(patch.text.as_str()), "stored flavor mismatch");
    }
    Ok(())
}

fn abort_safety(ctx: &ScenarioCtx) -> Result<()> {
    let plan = CampaignPlan::new(AnglerStrategy::Thrifty, ctx.casts).keep_catch().with_aborts(2);
    let summary = run_campaign(&ctx.catalog, ctx.seed, plan)?;
    ensure_clean(&summary)?;

    let aborted = summary
        .casts
        .iter()
        .filter(|cast| matches!(cast.outcome, CastOutcome::Aborted { .. }))
        .count();
    ensure!(aborted == ctx.casts / 2, "expected {} aborts, saw {aborted}", ctx.casts / 2);
    let notices = summary
        .events
        .iter()
        .filter(|event| matches!(event, SessionEvent::Aborted { .. }))
        .count();
    ensure!(notices == aborted, "{notices} abort events for {aborted} aborts");

    let caught = summary.session.state().stats.total_caught;
    ensure!(
        caught == u64::try_from(summary.landed())?,
        "ledger counts {caught} catches, harness saw {}",
        summary.landed()
    );
    Ok(())
}

/// Keeps saves as JSON strings, the way a browser host would.
#[derive(Default)]
struct JsonSlots {
    slots: RefCell<HashMap<String, String>>,
}

impl GameStorage for JsonSlots {
    type Error = serde_json::Error;

    fn save_player(&self, save_name: &str, state: &PlayerState) -> Result<(), Self::Error> {
        let json = serde_json::to_string(state)?;
        self.slots.borrow_mut().insert(save_name.to_string(), json);
        Ok(())
    }

    fn load_player(&self, save_name: &str) -> Result<Option<PlayerState>, Self::Error> {
        self.slots
            .borrow()
            .get(save_name)
            .map(|json| serde_json::from_str(json))
            .transpose()
    }

    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
        self.slots.borrow_mut().remove(save_name);
        Ok(())
    }
}

fn save_resume(ctx: &ScenarioCtx) -> Result<()> {
    let plan = CampaignPlan::new(AnglerStrategy::Thrifty, ctx.casts).keep_catch();
    let summary = run_campaign(&ctx.catalog, ctx.seed, plan)?;
    ensure_clean(&summary)?;

    let engine = GameEngine::new(BundledCatalog, JsonSlots::default());
    engine.save_session("campaign", &summary.session)?;
    let resumed = engine.resume_session(ctx.seed, "campaign", SessionConfig::default())?;

    let (saved, loaded) = (summary.session.state(), resumed.state());
    ensure!(
        (saved.gold, saved.level, saved.xp) == (loaded.gold, loaded.level, loaded.xp),
        "wallet or level changed across save"
    );
    ensure!(saved.next_fish_id == loaded.next_fish_id, "fish id counter reset");
    ensure!(saved.stats == loaded.stats, "stats changed across save");
    let ids = |state: &PlayerState| -> Vec<u64> { state.inventory.iter().map(|fish| fish.id).collect() };
    ensure!(ids(saved) == ids(loaded), "inventory changed across save");

    engine.delete_save("campaign")?;
    let fresh = engine.resume_session(ctx.seed, "campaign", SessionConfig::default())?;
    ensure!(fresh.state().stats.total_caught == 0, "deleted save still resumed");
    Ok(())
}
