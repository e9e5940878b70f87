pub mod policy;
pub mod reports;
pub mod scenarios;
pub mod seeds;
pub mod simulation;
pub mod tester;

pub use policy::{AnglerPolicy, AnglerStrategy, ShopAction};
pub use scenarios::{ScenarioCtx, TestScenario, all_scenarios, find_scenario, list_scenarios};
pub use seeds::{resolve_seed_inputs, split_csv};
pub use simulation::{CampaignPlan, CampaignSummary, run_campaign};
pub use tester::*;
