//! # Advisory Module
//!
//! Boundary to the natural-language advisory service.
//!
//! This module handles:
//! - The two-operation [`AdvisoryGateway`] contract (refuel text parsing and
//!   fuel-economy analysis)
//! - A local rule-based implementation ([`rules::RuleBasedAdvisor`])
//! - Service-interval reminders ([`maintenance::maintenance_reminder`]),
//!   which need no remote call and sit outside the gateway contract

pub mod maintenance;
pub mod rules;

pub use maintenance::maintenance_reminder;
pub use rules::RuleBasedAdvisor;

use async_trait::async_trait;

use crate::error::Result;
use crate::ledger::RefuelRecord;

/// Returned by `analyze_fuel_economy` when fewer than two records exist
pub const NOT_ENOUGH_DATA_MESSAGE: &str =
    "Not enough data to analyze. Please add at least two refuel records.";

/// Shown to the user in place of a failed analysis
pub const ANALYSIS_APOLOGY: &str = "Sorry, I was unable to analyze your data at this time.";

/// Result of interpreting a refuel entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedRefuel {
    pub liters_added: f64,
}

/// Natural-language parsing and analysis service
///
/// Implementations may be local rules or a remote call; the ledger and
/// dashboard depend only on these two operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdvisoryGateway: Send + Sync {
    /// Interpret free text such as "filled up" or "added 5.5 liters"
    ///
    /// # Errors
    ///
    /// Returns `Parse` when the text holds no recognizable fuel quantity.
    async fn parse_refuel_entry(&self, text: &str, tank_capacity_l: f64) -> Result<ParsedRefuel>;

    /// Produce a human-readable analysis of the refuel history
    ///
    /// With fewer than two records this returns [`NOT_ENOUGH_DATA_MESSAGE`].
    async fn analyze_fuel_economy(&self, records: &[RefuelRecord]) -> Result<String>;
}
