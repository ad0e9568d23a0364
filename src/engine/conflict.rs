use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_instant(t: Ms) -> Result<(), EngineError> {
    use crate::limits::*;
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&t) {
        return Err(EngineError::Validation("timestamp out of range"));
    }
    Ok(())
}

/// The window an appointment of `duration_min` starting at `start` is checked
/// against: `[start − 1h, start + duration)`.
///
/// The one-hour lookback treats any booking starting up to an hour before the
/// proposed start as an overlap risk (neighboring durations are not consulted).
/// It only looks backward; this matches the observed behavior of the system
/// and is kept as-is rather than widened to strict interval overlap.
pub(crate) fn conflict_window(start: Ms, duration_min: u32) -> Span {
    let end = start + duration_min as Ms * MINUTE_MS;
    Span::new(start - HOUR_MS, end)
}

/// Find an active (scheduled or waiting) appointment of `staff_id` whose start
/// instant falls inside the conflict window. `exclude` lets update paths skip
/// comparing an appointment against itself. Pure read.
pub(crate) fn find_conflict(
    appointments: &DashMap<Ulid, Appointment>,
    staff_id: Ulid,
    start: Ms,
    duration_min: u32,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    let window = conflict_window(start, duration_min);
    appointments
        .iter()
        .filter(|entry| {
            let a = entry.value();
            a.staff_id == Some(staff_id)
                && a.is_active()
                && window.contains_instant(a.at)
                && exclude != Some(a.id)
        })
        .map(|entry| entry.value().id)
        // Deterministic pick when several bookings sit in the window.
        .min()
}
