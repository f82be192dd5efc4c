//! Refuel records and their id generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// One refuel event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefuelRecord {
    /// Unique within a ledger
    pub id: String,
    /// When the refuel was logged
    pub timestamp: DateTime<Utc>,
    /// Liters added (> 0 for accepted records)
    pub liters_added: f64,
    /// Odometer reading at the time of the refuel
    pub total_odometer_km: f64,
}

/// Generates record ids from a timestamp plus a monotonic counter
///
/// Two refuels logged within the same millisecond still get distinct ids.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    counter: AtomicU64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for a record stamped at `timestamp`
    pub fn next_id(&self, timestamp: DateTime<Utc>) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:04}", timestamp.format("%Y%m%dT%H%M%S%.3fZ"), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ids_unique_for_same_instant() {
        let generator = RecordIdGenerator::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();

        let first = generator.next_id(now);
        let second = generator.next_id(now);

        assert_ne!(first, second, "Same-instant ids must not collide");
        assert_eq!(first, "20250601T093000.000Z-0000");
        assert_eq!(second, "20250601T093000.000Z-0001");
    }

    #[test]
    fn test_json_field_names() {
        let record = RefuelRecord {
            id: "r1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
            liters_added: 5.5,
            total_odometer_km: 12034.2,
        };

        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("\"litersAdded\":5.5"));
        assert!(json.contains("\"totalOdometerKm\":12034.2"));
        assert!(json.contains("\"timestamp\":\"2025-06-01T09:30:00Z\""));
    }

    #[test]
    fn test_parse_iso_timestamp_with_millis() {
        let json = r#"{"id":"2025-06-01T09:30:00.123Z","timestamp":"2025-06-01T09:30:00.123Z","litersAdded":8,"totalOdometerKm":12000}"#;
        let record: RefuelRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.liters_added, 8.0);
        assert_eq!(record.timestamp.timestamp_subsec_millis(), 123);
    }
}
