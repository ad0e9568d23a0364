use ulid::Ulid;

use super::Engine;
use crate::limits;
use crate::model::*;

impl Engine {
    pub fn list_staff(&self) -> Vec<Staff> {
        let mut out: Vec<Staff> = self.staff.iter().map(|s| s.value().clone()).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn list_services(&self) -> Vec<Service> {
        let mut out: Vec<Service> = self.services.iter().map(|s| s.value().clone()).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// Appointments, optionally narrowed to one staff member and/or the
    /// calendar day containing `day_of`. Sorted by start time, then id.
    pub fn list_appointments(&self, staff: Option<Ulid>, day_of: Option<Ms>) -> Vec<Appointment> {
        let day = day_of.map(day_bounds);
        let mut out: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|a| staff.is_none_or(|sid| a.staff_id == Some(sid)))
            .filter(|a| day.is_none_or(|d| d.contains_instant(a.at)))
            .map(|a| a.value().clone())
            .collect();
        out.sort_by_key(|a| (a.at, a.id));
        out
    }

    /// The waiting queue: every waiting appointment, longest-waiting first,
    /// with 1-based positions.
    pub fn queue(&self) -> Vec<QueueItem> {
        let mut waiting: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Waiting)
            .map(|a| a.value().clone())
            .collect();
        waiting.sort_by_key(|a| (a.at, a.id));
        waiting
            .into_iter()
            .enumerate()
            .map(|(i, appointment)| QueueItem {
                position: i + 1,
                appointment,
            })
            .collect()
    }

    /// Audit trail, newest first. Customer names are resolved at read time,
    /// so entries for purged appointments render without one.
    pub fn list_activity(
        &self,
        action: Option<ActivityAction>,
        limit: Option<usize>,
    ) -> Vec<ActivityView> {
        let limit = limit
            .unwrap_or(limits::DEFAULT_ACTIVITY_LIMIT)
            .min(limits::MAX_ACTIVITY_LIMIT);
        self.activity
            .read()
            .expect("activity log lock poisoned")
            .iter()
            .rev()
            .filter(|e| action.is_none_or(|a| e.action == a))
            .take(limit)
            .map(|e| ActivityView {
                customer_name: self
                    .appointments
                    .get(&e.appointment_id)
                    .map(|a| a.customer_name.clone()),
                entry: e.clone(),
            })
            .collect()
    }
}
