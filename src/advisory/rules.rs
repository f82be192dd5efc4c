//! # Rule-Based Advisor
//!
//! Local stand-in for the remote advisory service.
//!
//! ## Refuel Parsing
//!
//! - Any case-insensitive "fill" or "full" means a full tank
//! - Otherwise the first number in the text is the amount, capped at 1.5× the
//!   tank capacity
//! - Anything else is a parse error
//!
//! ## Analysis
//!
//! Consecutive records (by odometer) form fill-up segments. The economy of a
//! segment is the distance ridden since the previous refuel divided by the
//! liters added at the later one.
//!
//! ```
//! use bike_dash::advisory::rules::interpret_refuel_text;
//!
//! assert_eq!(interpret_refuel_text("Filled up", 8.0).unwrap(), 8.0);
//! assert_eq!(interpret_refuel_text("5.5L", 8.0).unwrap(), 5.5);
//! assert_eq!(interpret_refuel_text("added 20 liters", 8.0).unwrap(), 12.0);
//! assert!(interpret_refuel_text("zoom zoom", 8.0).is_err());
//! ```

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use super::{AdvisoryGateway, ParsedRefuel, NOT_ENOUGH_DATA_MESSAGE};
use crate::config::AdvisoryConfig;
use crate::error::{BikeDashError, Result};
use crate::ledger::RefuelRecord;

/// Upper bound on a parsed amount, as a multiple of tank capacity
pub const MAX_REFUEL_TANK_RATIO: f64 = 1.5;

const RIDING_TIPS: &str = "**Actionable Tips:**
1.  **Smooth Throttle:** Try to maintain a steady speed. Avoid rapid acceleration and deceleration to conserve fuel.
2.  **Tire Pressure:** Ensure your tires are inflated to the manufacturer's recommended pressure. Under-inflated tires increase rolling resistance.
3.  **Reduce Idle Time:** If you're stopped for more than a minute, it's more fuel-efficient to turn off the engine.";

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+(\.\d+)?)").expect("number pattern is valid"))
}

/// Interpret refuel text against a tank capacity
///
/// # Errors
///
/// Returns `Parse` if the text has neither a fill keyword nor a number.
pub fn interpret_refuel_text(text: &str, tank_capacity_l: f64) -> Result<f64> {
    let lower = text.to_lowercase();
    if lower.contains("fill") || lower.contains("full") {
        return Ok(tank_capacity_l);
    }

    let liters = number_pattern()
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| BikeDashError::Parse(format!("no fuel quantity in \"{}\"", text)))?;

    Ok(liters.min(tank_capacity_l * MAX_REFUEL_TANK_RATIO))
}

/// Fuel economy figures derived from a refuel history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EconomySummary {
    /// Distance covered by all usable segments
    pub distance_km: f64,
    /// Fuel added at the end of those segments
    pub liters: f64,
    /// Distance-weighted average km/L
    pub average_km_per_l: f64,
    pub best_km_per_l: f64,
    pub worst_km_per_l: f64,
    pub segments: usize,
}

/// Compute economy over consecutive fill-up segments
///
/// Returns `None` when no segment covers a positive distance.
pub fn summarize_economy(records: &[RefuelRecord]) -> Option<EconomySummary> {
    let mut ordered: Vec<&RefuelRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.total_odometer_km
            .total_cmp(&b.total_odometer_km)
            .then(a.timestamp.cmp(&b.timestamp))
    });

    let mut distance_km = 0.0;
    let mut liters = 0.0;
    let mut best = f64::MIN;
    let mut worst = f64::MAX;
    let mut segments = 0;

    for pair in ordered.windows(2) {
        let distance = pair[1].total_odometer_km - pair[0].total_odometer_km;
        let added = pair[1].liters_added;
        if distance <= 0.0 || added <= 0.0 {
            continue;
        }
        let economy = distance / added;
        distance_km += distance;
        liters += added;
        best = best.max(economy);
        worst = worst.min(economy);
        segments += 1;
    }

    if segments == 0 {
        return None;
    }

    Some(EconomySummary {
        distance_km,
        liters,
        average_km_per_l: distance_km / liters,
        best_km_per_l: best,
        worst_km_per_l: worst,
        segments,
    })
}

/// Render the analysis text for a refuel history
pub fn render_analysis(records: &[RefuelRecord]) -> String {
    if records.len() < 2 {
        return NOT_ENOUGH_DATA_MESSAGE.to_string();
    }

    let trend = match summarize_economy(records) {
        Some(summary) => format!(
            "**Trend:** Across {} fill-ups covering {:.1} km you averaged {:.1} km/L, \
             ranging from {:.1} km/L on your thirstiest stretch to {:.1} km/L on your best.",
            summary.segments,
            summary.distance_km,
            summary.average_km_per_l,
            summary.worst_km_per_l,
            summary.best_km_per_l,
        ),
        None => "**Trend:** Your refuels so far were logged at the same odometer reading, \
                 so there is no distance to measure yet. Ride between fill-ups to see your economy."
            .to_string(),
    };

    format!(
        "Based on your {} records, here is an analysis of your riding habits:\n\n{}\n\n{}",
        records.len(),
        trend,
        RIDING_TIPS
    )
}

/// Rule-based [`AdvisoryGateway`] with simulated service latency
#[derive(Debug, Clone, Default)]
pub struct RuleBasedAdvisor {
    parse_latency: Duration,
    analysis_latency: Duration,
}

impl RuleBasedAdvisor {
    /// Advisor that answers immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Advisor with the configured round-trip latencies
    pub fn from_config(config: &AdvisoryConfig) -> Self {
        Self {
            parse_latency: Duration::from_millis(config.parse_latency_ms),
            analysis_latency: Duration::from_millis(config.analysis_latency_ms),
        }
    }
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl AdvisoryGateway for RuleBasedAdvisor {
    async fn parse_refuel_entry(&self, text: &str, tank_capacity_l: f64) -> Result<ParsedRefuel> {
        debug!("Parsing refuel entry: {:?}", text);
        simulate_latency(self.parse_latency).await;

        let liters_added = interpret_refuel_text(text, tank_capacity_l)?;
        Ok(ParsedRefuel { liters_added })
    }

    async fn analyze_fuel_economy(&self, records: &[RefuelRecord]) -> Result<String> {
        debug!("Analyzing {} refuel records", records.len());
        simulate_latency(self.analysis_latency).await;

        Ok(render_analysis(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, day: u32, liters: f64, odometer: f64) -> RefuelRecord {
        RefuelRecord {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap(),
            liters_added: liters,
            total_odometer_km: odometer,
        }
    }

    #[test]
    fn test_fill_keywords_mean_full_tank() {
        assert_eq!(interpret_refuel_text("filled up", 8.0).unwrap(), 8.0);
        assert_eq!(interpret_refuel_text("Tank is FULL now", 8.0).unwrap(), 8.0);
        // Keyword wins over any number in the text
        assert_eq!(interpret_refuel_text("fill 3 liters", 8.0).unwrap(), 8.0);
    }

    #[test]
    fn test_first_number_is_used() {
        assert_eq!(interpret_refuel_text("5.5L", 8.0).unwrap(), 5.5);
        assert_eq!(interpret_refuel_text("added 4 then 2 liters", 8.0).unwrap(), 4.0);
    }

    #[test]
    fn test_number_capped_at_one_and_a_half_tanks() {
        assert_eq!(interpret_refuel_text("added 20 liters", 8.0).unwrap(), 12.0);
        assert_eq!(interpret_refuel_text("12", 8.0).unwrap(), 12.0);
    }

    #[test]
    fn test_zero_is_parsed_not_rejected() {
        // Rejecting empty refuels is the ledger's job
        assert_eq!(interpret_refuel_text("0 liters", 8.0).unwrap(), 0.0);
    }

    #[test]
    fn test_unparseable_text() {
        match interpret_refuel_text("zoom zoom", 8.0) {
            Err(BikeDashError::Parse(msg)) => assert!(msg.contains("zoom zoom")),
            other => panic!("Expected Parse error, got: {:?}", other),
        }
        assert!(interpret_refuel_text("", 8.0).is_err());
    }

    #[test]
    fn test_analysis_needs_two_records() {
        assert_eq!(render_analysis(&[]), NOT_ENOUGH_DATA_MESSAGE);
        assert_eq!(render_analysis(&[record("a", 1, 5.0, 12000.0)]), NOT_ENOUGH_DATA_MESSAGE);
    }

    #[test]
    fn test_summarize_economy() {
        // Listed newest first, as the ledger presents them
        let records = vec![
            record("c", 3, 5.0, 12500.0),
            record("b", 2, 4.0, 12250.0),
            record("a", 1, 8.0, 12000.0),
        ];

        let summary = summarize_economy(&records).unwrap();

        assert_eq!(summary.segments, 2);
        assert_eq!(summary.distance_km, 500.0);
        assert_eq!(summary.liters, 9.0);
        assert!((summary.average_km_per_l - 500.0 / 9.0).abs() < 1e-9);
        assert_eq!(summary.best_km_per_l, 62.5);
        assert_eq!(summary.worst_km_per_l, 50.0);
    }

    #[test]
    fn test_summarize_without_distance() {
        let records = vec![record("a", 1, 5.0, 12000.0), record("b", 2, 3.0, 12000.0)];
        assert_eq!(summarize_economy(&records), None);

        let text = render_analysis(&records);
        assert!(text.contains("no distance to measure"));
    }

    #[test]
    fn test_analysis_text_reports_average() {
        let records = vec![record("b", 2, 4.0, 12200.0), record("a", 1, 8.0, 12000.0)];
        let text = render_analysis(&records);

        assert!(text.starts_with("Based on your 2 records"));
        assert!(text.contains("50.0 km/L"), "Analysis should report 200km/4L: {}", text);
        assert!(text.contains("**Actionable Tips:**"));
    }

    #[tokio::test]
    async fn test_gateway_parse() {
        let advisor = RuleBasedAdvisor::new();

        let parsed = advisor.parse_refuel_entry("added 20 liters", 8.0).await.unwrap();
        assert_eq!(parsed, ParsedRefuel { liters_added: 12.0 });

        let result = advisor.parse_refuel_entry("zoom zoom", 8.0).await;
        assert!(matches!(result, Err(BikeDashError::Parse(_))));
    }

    #[test]
    fn test_gateway_analysis_without_runtime_latency() {
        let advisor = RuleBasedAdvisor::new();
        let records = vec![record("b", 2, 4.0, 12200.0), record("a", 1, 8.0, 12000.0)];

        let text = tokio_test::block_on(advisor.analyze_fuel_economy(&records)).unwrap();
        assert_eq!(text, render_analysis(&records));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_latency() {
        let advisor = RuleBasedAdvisor::from_config(&AdvisoryConfig {
            parse_latency_ms: 1000,
            analysis_latency_ms: 2000,
        });

        let start = tokio::time::Instant::now();
        let text = advisor.analyze_fuel_economy(&[]).await.unwrap();

        assert_eq!(text, NOT_ENOUGH_DATA_MESSAGE);
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }
}
