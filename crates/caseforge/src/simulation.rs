//! # Opening Simulation
//!
//! Drives the real request surface from many threads at once: one thread per
//! simulated user, each opening the same case until it has made its openings
//! or run out of funds. The report compares observed rarity frequencies with
//! the configured table and counts the broadcast events that came out.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use caseforge_economy::{
    BroadcastStats, Broadcaster, CaseCatalog, CaseHouse, CaseId, DrawStatistics, EconomyConfig,
    EconomyError, FixedPoint, HubTransport, Item, MemoryStore, RarityId, RarityTable, RngSource,
    User, UserId,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that stop a simulation before it produces a report.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Loading or pricing failed.
    #[error(transparent)]
    Economy(#[from] EconomyError),

    /// The requested case is not in the catalog.
    #[error("case {0} is not in the catalog")]
    UnknownCase(CaseId),

    /// A simulated user thread panicked.
    #[error("simulated user thread panicked")]
    WorkerPanicked,
}

/// What to simulate.
#[derive(Clone, Debug)]
pub struct SimulationPlan {
    /// Case every user opens.
    pub case_id: CaseId,
    /// Number of concurrent simulated users.
    pub users: usize,
    /// Open requests per user.
    pub opens_per_user: u32,
    /// Cases per request.
    pub quantity: u32,
    /// Starting balance per user. `None` funds every request.
    pub balance: Option<FixedPoint>,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

/// One line of the frequency table.
#[derive(Clone, Debug, PartialEq)]
pub struct RarityRow {
    /// Tier.
    pub rarity: RarityId,
    /// Configured chance, if the tier is in the table.
    pub configured: Option<f64>,
    /// Observed share of draws.
    pub observed: f64,
    /// Draws that landed on this tier.
    pub count: u64,
}

/// Outcome of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    /// Table the draws were made against.
    pub table: RarityTable,
    /// Every item drawn, tallied.
    pub stats: DrawStatistics,
    /// Successful open requests.
    pub openings: u64,
    /// Rejected requests by public message.
    pub rejections: HashMap<String, u64>,
    /// `caseOpened` events seen by a global subscriber.
    pub global_events: usize,
    /// `userDataUpdated` events seen across all user rooms.
    pub private_events: usize,
    /// Broadcaster counters.
    pub broadcast: BroadcastStats,
    /// Wall time spent opening.
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Per-tier rows: table tiers in order, then any other tier observed.
    #[must_use]
    pub fn rows(&self) -> Vec<RarityRow> {
        let mut rows: Vec<RarityRow> = self
            .table
            .rarities()
            .iter()
            .map(|rarity| RarityRow {
                rarity: rarity.id.clone(),
                configured: Some(rarity.chance),
                observed: self.stats.frequency(&rarity.id),
                count: self.stats.rarity_counts.get(&rarity.id).copied().unwrap_or(0),
            })
            .collect();

        let mut extra: Vec<_> = self
            .stats
            .rarity_counts
            .iter()
            .filter(|(rarity, _)| self.table.chance_of(rarity).is_none())
            .collect();
        extra.sort();
        rows.extend(extra.into_iter().map(|(rarity, &count)| RarityRow {
            rarity: rarity.clone(),
            configured: None,
            observed: self.stats.frequency(rarity),
            count,
        }));

        rows
    }
}

#[derive(Default)]
struct UserOutcome {
    stats: DrawStatistics,
    openings: u64,
    rejections: HashMap<String, u64>,
}

/// Runs a simulation against `store`, adding the simulated users to it.
///
/// # Errors
///
/// Returns `SimulationError` if the case is unknown, the per-user cost
/// overflows, or a worker thread panics.
pub fn run(
    config: &EconomyConfig,
    store: &Arc<MemoryStore>,
    plan: &SimulationPlan,
) -> Result<SimulationReport, SimulationError> {
    let case = store
        .find_case_by_id(&plan.case_id)
        .map_err(EconomyError::from)?
        .ok_or_else(|| SimulationError::UnknownCase(plan.case_id.clone()))?;

    let balance = match plan.balance {
        Some(balance) => balance,
        None => case
            .total_price(plan.quantity)?
            .safe_mul_int(u64::from(plan.opens_per_user))?,
    };

    let users: Vec<UserId> = (0..plan.users)
        .map(|n| UserId::new(format!("sim-{n:04}")))
        .collect();
    for user in &users {
        store.insert_user(User::new(user.clone(), user.to_string(), balance));
    }

    let hub = Arc::new(HubTransport::new());
    let feed = hub.subscribe_global();
    let rooms: Vec<_> = users.iter().map(|user| hub.join_room(user)).collect();

    let broadcaster = Arc::new(Broadcaster::new(
        hub.clone(),
        config.broadcast.queue_capacity,
    ));
    let rng = plan.seed.map_or_else(RngSource::entropy, RngSource::seeded);
    let house = CaseHouse::from_config(config, store.clone(), store.clone(), broadcaster, rng);

    info!(
        "Simulating {} users x {} opens of {} x{} (balance {balance} each)",
        plan.users, plan.opens_per_user, plan.case_id, plan.quantity
    );

    let start = Instant::now();
    let outcomes = thread::scope(|s| {
        let handles: Vec<_> = users
            .iter()
            .map(|user| {
                let house = &house;
                s.spawn(move || simulate_user(house, user, plan))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| SimulationError::WorkerPanicked))
            .collect::<Result<Vec<_>, _>>()
    })?;
    let elapsed = start.elapsed();

    house.broadcaster().flush();

    let mut report = SimulationReport {
        table: house.settlement().engine().table().clone(),
        stats: DrawStatistics::new(),
        openings: 0,
        rejections: HashMap::new(),
        global_events: feed.try_iter().count(),
        private_events: rooms.iter().map(|room| room.try_iter().count()).sum(),
        broadcast: house.broadcaster().stats(),
        elapsed,
    };
    for outcome in outcomes {
        report.stats.merge(&outcome.stats);
        report.openings += outcome.openings;
        for (message, count) in outcome.rejections {
            *report.rejections.entry(message).or_insert(0) += count;
        }
    }

    info!(
        "Simulation finished: {} openings, {} draws in {:?}",
        report.openings, report.stats.total_draws, report.elapsed
    );
    Ok(report)
}

fn simulate_user(house: &CaseHouse, user: &UserId, plan: &SimulationPlan) -> UserOutcome {
    let body = json!({ "quantity": plan.quantity });
    let mut outcome = UserOutcome::default();

    for _ in 0..plan.opens_per_user {
        let reply = house.open_case(Some(user), &plan.case_id, &body);
        if reply.is_success() {
            outcome.openings += 1;
            let items: Vec<Item> =
                serde_json::from_value(reply.body["items"].clone()).unwrap_or_default();
            for item in &items {
                outcome.stats.record(item);
            }
            continue;
        }

        let message = reply.body["message"].as_str().unwrap_or("unknown").to_owned();
        let broke = message == "Insufficient balance";
        *outcome.rejections.entry(message).or_insert(0) += 1;
        if broke {
            debug!("{user} ran out of funds after {} openings", outcome.openings);
            break;
        }
    }

    outcome
}
