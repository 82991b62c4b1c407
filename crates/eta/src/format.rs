//! Human-readable ETA strings

/// Rendered when no estimate is available
pub const CALCULATING_PLACEHOLDER: &str = "Calculating...";

/// Render an ETA in seconds.
///
/// - under a minute: `"45 sec"`
/// - under an hour once rounded: minutes, `"2 min"`
/// - an hour or more: `"1h"`, or `"1h 1 min"` when whole minutes remain
///
/// `None` renders [`CALCULATING_PLACEHOLDER`].
pub fn format_eta(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds else {
        return CALCULATING_PLACEHOLDER.to_string();
    };

    if seconds < 60 {
        return format!("{seconds} sec");
    }
    let rounded = (seconds as f64 / 60.0).round() as u64;
    if rounded < 60 {
        return format!("{rounded} min");
    }

    // 3570..3600 rounds up to a full hour
    let seconds = seconds.max(3_600);
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if minutes == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {minutes} min")
    }
}
