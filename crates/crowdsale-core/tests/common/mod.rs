//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use crowdsale_core::{
    Address, Amount, Crowdsale, CrowdsaleConfig, InMemoryRail, ManualClock, ProjectId,
    ProjectTerms, VaultId,
};

pub const CAMPAIGN_SECS: i64 = 5;

pub fn addr(name: &str) -> Address {
    Address::new(name)
}

/// An engine wired to a manual clock and an in-memory rail.
pub struct Harness {
    pub engine: Arc<Crowdsale>,
    pub clock: Arc<ManualClock>,
    pub rail: Arc<InMemoryRail>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CrowdsaleConfig::default())
    }

    pub fn with_config(config: CrowdsaleConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let rail = Arc::new(InMemoryRail::new());
        let engine = Arc::new(
            Crowdsale::new(config, clock.clone(), rail.clone()).expect("valid configuration"),
        );
        Self {
            engine,
            clock,
            rail,
        }
    }

    /// Register a five-second campaign owned by `owners`.
    pub fn project(&self, goal: Amount, owners: &[&str], required: usize) -> ProjectId {
        let terms = ProjectTerms::new(
            goal,
            owners.iter().map(|o| addr(o)).collect(),
            required,
            Duration::seconds(CAMPAIGN_SECS),
        )
        .with_metadata("Sanyok");
        self.engine
            .create_project(&addr("creator"), terms)
            .expect("project created")
    }

    pub fn fund(&self, backer: &str, id: ProjectId, amount: Amount) {
        self.engine
            .fund_project(&addr(backer), id, amount)
            .expect("contribution accepted");
    }

    pub fn vault(&self, id: ProjectId) -> VaultId {
        self.engine.vault_of(id).expect("project has a vault")
    }

    /// Funded, finalized project with its vault released.
    pub fn released_project(
        &self,
        amount: Amount,
        owners: &[&str],
        required: usize,
    ) -> (ProjectId, VaultId) {
        let id = self.project(amount, owners, required);
        self.fund("A", id, amount);
        self.engine.finalize(id).expect("finalized");
        (id, self.vault(id))
    }

    /// Funded below goal and finalized as a failure.
    pub fn failed_project(&self, goal: Amount, contributions: &[(&str, Amount)]) -> ProjectId {
        let id = self.project(goal, &["B", "C"], 2);
        for (backer, amount) in contributions {
            self.fund(backer, id, *amount);
        }
        self.engine.finalize(id).expect("finalized");
        id
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(Duration::seconds(secs));
    }
}
