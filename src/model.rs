use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// The UTC calendar day containing `t`, as a half-open span.
/// Equivalent at millisecond resolution to the inclusive
/// `[00:00:00.000, 23:59:59.999]` bound.
pub fn day_bounds(t: Ms) -> Span {
    let start = t.div_euclid(DAY_MS) * DAY_MS;
    Span::new(start, start + DAY_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Waiting,
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Waiting => "waiting",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(AppointmentStatus::Waiting),
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no_show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }

    /// Active = still occupies demand, not yet resolved either way.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Waiting | AppointmentStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityAction {
    Scheduled,
    Queued,
    StatusChanged,
    Cancelled,
    AssignedFromQueue,
    AutoAssigned,
    Completed,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Scheduled => "scheduled",
            ActivityAction::Queued => "queued",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::Cancelled => "cancelled",
            ActivityAction::AssignedFromQueue => "assigned_from_queue",
            ActivityAction::AutoAssigned => "auto_assigned",
            ActivityAction::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(ActivityAction::Scheduled),
            "queued" => Some(ActivityAction::Queued),
            "status_changed" => Some(ActivityAction::StatusChanged),
            "cancelled" => Some(ActivityAction::Cancelled),
            "assigned_from_queue" => Some(ActivityAction::AssignedFromQueue),
            "auto_assigned" => Some(ActivityAction::AutoAssigned),
            "completed" => Some(ActivityAction::Completed),
            _ => None,
        }
    }
}

/// A staff member. `service_type` is an opaque tag matched against a
/// service's `required_staff_type` by plain case-sensitive equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: Ulid,
    pub name: String,
    pub service_type: String,
    /// Max same-day active bookings (default 5).
    pub daily_capacity: u32,
    /// false = on_leave. Informational; assignment does not gate on it.
    pub available: bool,
}

/// Allowed service durations, in minutes.
pub const SERVICE_DURATIONS_MIN: [u32; 3] = [15, 30, 60];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub duration_min: u32,
    pub required_staff_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub customer_name: String,
    pub service_id: Ulid,
    /// Absent while waiting.
    pub staff_id: Option<Ulid>,
    pub at: Ms,
    pub status: AppointmentStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// One append-only audit record per meaningful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Ulid,
    pub appointment_id: Ulid,
    pub action: ActivityAction,
    pub description: String,
    pub at: Ms,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StaffCreated {
        id: Ulid,
        name: String,
        service_type: String,
        daily_capacity: u32,
        available: bool,
    },
    StaffUpdated {
        id: Ulid,
        name: String,
        service_type: String,
        daily_capacity: u32,
        available: bool,
    },
    StaffDeleted {
        id: Ulid,
    },
    ServiceCreated {
        id: Ulid,
        name: String,
        duration_min: u32,
        required_staff_type: String,
    },
    ServiceDeleted {
        id: Ulid,
    },
    AppointmentCreated {
        id: Ulid,
        customer_name: String,
        service_id: Ulid,
        staff_id: Option<Ulid>,
        at: Ms,
        status: AppointmentStatus,
        created_at: Ms,
        updated_at: Ms,
    },
    AppointmentUpdated {
        id: Ulid,
        staff_id: Option<Ulid>,
        at: Ms,
        status: AppointmentStatus,
        updated_at: Ms,
    },
    AppointmentDeleted {
        id: Ulid,
    },
    ActivityRecorded {
        id: Ulid,
        appointment_id: Ulid,
        action: ActivityAction,
        description: String,
        at: Ms,
    },
}

// ── Query result types ───────────────────────────────────────────

/// One slot in the derived waiting queue. Position is computed at query
/// time, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub position: usize,
    pub appointment: Appointment,
}

/// Activity entry with the appointment reference resolved (best effort:
/// the appointment may since have been deleted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityView {
    pub entry: ActivityEntry,
    pub customer_name: Option<String>,
}

/// Outcome of a single queue-promotion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionOutcome {
    pub assigned: bool,
    pub appointment: Option<Appointment>,
    pub message: String,
}

impl PromotionOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            assigned: false,
            appointment: None,
            message: message.into(),
        }
    }
}
