//! Service-interval reminders

/// Distance between scheduled services
pub const SERVICE_INTERVAL_KM: f64 = 4000.0;

/// How far ahead of a service the reminder starts showing
pub const SERVICE_NOTICE_KM: f64 = 500.0;

/// Shown while no service is due
pub const ALL_NOMINAL_MESSAGE: &str = "All systems nominal. Enjoy the ride!";

/// Friendly reminder when the next service mark is within notice distance
///
/// ```
/// use bike_dash::advisory::maintenance::{maintenance_reminder, ALL_NOMINAL_MESSAGE};
///
/// assert_eq!(maintenance_reminder("Honda Dream Yuga", 12100.0), ALL_NOMINAL_MESSAGE);
/// assert!(maintenance_reminder("Honda Dream Yuga", 15600.0).contains("16,000 km"));
/// ```
pub fn maintenance_reminder(bike_model: &str, total_odometer_km: f64) -> String {
    let odometer = total_odometer_km.max(0.0);
    let last_service = (odometer / SERVICE_INTERVAL_KM).floor() * SERVICE_INTERVAL_KM;
    let next_service = last_service + SERVICE_INTERVAL_KM;

    if odometer > next_service - SERVICE_NOTICE_KM {
        format!(
            "Hey there! Just a friendly heads-up for your {}. You're approaching {} km. \
             It might be a good time to think about an oil change soon to keep it running smoothly!",
            bike_model,
            group_thousands(next_service as u64)
        )
    } else {
        ALL_NOMINAL_MESSAGE.to_string()
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
