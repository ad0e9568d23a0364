use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// Count a staff member's appointments starting inside `day` whose status is
/// in `statuses`. Pure read.
///
/// Callers differ on the status set on purpose: creation-time checks count
/// {scheduled, waiting} so already-queued demand reserves room, while
/// promotion counts {scheduled} only — once promotion runs, only confirmed
/// bookings occupy capacity. Do not unify the two.
pub(crate) fn count_for_day(
    appointments: &DashMap<Ulid, Appointment>,
    staff_id: Ulid,
    day: Span,
    statuses: &[AppointmentStatus],
) -> usize {
    appointments
        .iter()
        .filter(|entry| {
            let a = entry.value();
            a.staff_id == Some(staff_id)
                && day.contains_instant(a.at)
                && statuses.contains(&a.status)
        })
        .count()
}

pub(crate) const ACTIVE_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Scheduled, AppointmentStatus::Waiting];

pub(crate) const SCHEDULED_ONLY: [AppointmentStatus; 1] = [AppointmentStatus::Scheduled];

/// Auto-match a staff member for a waiting appointment: scan staff in
/// ascending id order (ULIDs sort by creation time, i.e. store order), keep
/// those whose service-type tag equals the service's required type, and take
/// the first with a scheduled-count below capacity on the appointment's day.
pub(crate) fn find_eligible_staff(
    staff: &DashMap<Ulid, Staff>,
    appointments: &DashMap<Ulid, Appointment>,
    required_staff_type: &str,
    day: Span,
) -> Option<Staff> {
    let mut candidates: Vec<Staff> = staff
        .iter()
        .filter(|entry| entry.value().service_type == required_staff_type)
        .map(|entry| entry.value().clone())
        .collect();
    candidates.sort_by_key(|s| s.id);

    candidates.into_iter().find(|s| {
        count_for_day(appointments, s.id, day, &SCHEDULED_ONLY) < s.daily_capacity as usize
    })
}
