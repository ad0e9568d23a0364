use ulid::Ulid;

use super::capacity::{self, ACTIVE_STATUSES, SCHEDULED_ONLY};
use super::conflict::{self, now_ms};
use super::error::{EngineError, Entity};
use super::{Engine, WalCommand};
use crate::limits;
use crate::model::*;

impl Engine {
    // ── Staff ────────────────────────────────────────────

    pub async fn create_staff(
        &self,
        id: Ulid,
        name: String,
        service_type: String,
        daily_capacity: Option<u32>,
        available: Option<bool>,
    ) -> Result<Staff, EngineError> {
        if name.is_empty() || name.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("staff name must be 1..=256 bytes"));
        }
        if service_type.is_empty() || service_type.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("service type must be 1..=256 bytes"));
        }
        let daily_capacity = daily_capacity.unwrap_or(5);
        if daily_capacity == 0 {
            return Err(EngineError::Validation("daily capacity must be positive"));
        }
        if self.staff.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.staff.len() >= limits::MAX_STAFF_PER_TENANT {
            return Err(EngineError::LimitExceeded("staff per tenant"));
        }

        let staff = Staff {
            id,
            name,
            service_type,
            daily_capacity,
            available: available.unwrap_or(true),
        };
        let event = Event::StaffCreated {
            id,
            name: staff.name.clone(),
            service_type: staff.service_type.clone(),
            daily_capacity,
            available: staff.available,
        };
        self.persist_and_apply(&event).await?;
        Ok(staff)
    }

    pub async fn update_staff(
        &self,
        id: Ulid,
        name: Option<String>,
        service_type: Option<String>,
        daily_capacity: Option<u32>,
        available: Option<bool>,
    ) -> Result<Staff, EngineError> {
        let current = self
            .staff
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or(EngineError::NotFound(Entity::Staff, id))?;

        let name = name.unwrap_or(current.name);
        let service_type = service_type.unwrap_or(current.service_type);
        let daily_capacity = daily_capacity.unwrap_or(current.daily_capacity);
        let available = available.unwrap_or(current.available);

        if name.is_empty() || name.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("staff name must be 1..=256 bytes"));
        }
        if service_type.is_empty() || service_type.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("service type must be 1..=256 bytes"));
        }
        if daily_capacity == 0 {
            return Err(EngineError::Validation("daily capacity must be positive"));
        }

        let staff = Staff {
            id,
            name,
            service_type,
            daily_capacity,
            available,
        };
        let event = Event::StaffUpdated {
            id,
            name: staff.name.clone(),
            service_type: staff.service_type.clone(),
            daily_capacity,
            available,
        };
        self.persist_and_apply(&event).await?;
        Ok(staff)
    }

    /// Delete a staff member. Their appointments keep the dangling staff id;
    /// views render the assignee as unknown rather than rewriting history.
    pub async fn delete_staff(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.staff.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Staff, id));
        }
        self.persist_and_apply(&Event::StaffDeleted { id }).await
    }

    // ── Services ─────────────────────────────────────────

    pub async fn create_service(
        &self,
        id: Ulid,
        name: String,
        duration_min: u32,
        required_staff_type: String,
    ) -> Result<Service, EngineError> {
        if name.is_empty() || name.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("service name must be 1..=256 bytes"));
        }
        if required_staff_type.is_empty() || required_staff_type.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("staff type must be 1..=256 bytes"));
        }
        if !SERVICE_DURATIONS_MIN.contains(&duration_min) {
            return Err(EngineError::Validation("duration must be 15, 30, or 60 minutes"));
        }
        if self.services.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.services.len() >= limits::MAX_SERVICES_PER_TENANT {
            return Err(EngineError::LimitExceeded("services per tenant"));
        }

        let service = Service {
            id,
            name,
            duration_min,
            required_staff_type,
        };
        let event = Event::ServiceCreated {
            id,
            name: service.name.clone(),
            duration_min,
            required_staff_type: service.required_staff_type.clone(),
        };
        self.persist_and_apply(&event).await?;
        Ok(service)
    }

    pub async fn delete_service(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.services.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Service, id));
        }
        self.persist_and_apply(&Event::ServiceDeleted { id }).await
    }

    // ── Appointments ─────────────────────────────────────

    /// Book an appointment. Three-way decision:
    ///  - requested staff has a clash in the lookback window -> reject;
    ///  - staff at daily capacity (scheduled + waiting) -> accept as waiting,
    ///    staff assignment cleared;
    ///  - otherwise -> scheduled with the requested staff.
    /// With no staff requested the appointment goes straight to the queue.
    pub async fn create_appointment(
        &self,
        id: Ulid,
        customer_name: String,
        service_id: Ulid,
        staff_id: Option<Ulid>,
        at: Ms,
    ) -> Result<Appointment, EngineError> {
        if customer_name.is_empty() || customer_name.len() > limits::MAX_NAME_LEN {
            return Err(EngineError::Validation("customer name must be 1..=256 bytes"));
        }
        conflict::validate_instant(at)?;
        if self.appointments.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.appointments.len() >= limits::MAX_APPOINTMENTS_PER_TENANT {
            return Err(EngineError::LimitExceeded("appointments per tenant"));
        }
        let service = self
            .services
            .get(&service_id)
            .map(|s| s.value().clone())
            .ok_or(EngineError::NotFound(Entity::Service, service_id))?;

        let now = now_ms();
        let (staff_id, status) = match staff_id {
            None => (None, AppointmentStatus::Waiting),
            Some(sid) => {
                let staff = self
                    .staff
                    .get(&sid)
                    .map(|s| s.value().clone())
                    .ok_or(EngineError::NotFound(Entity::Staff, sid))?;

                let day = day_bounds(at);
                let lock = self.slot_lock(sid, day);
                let _guard = lock.lock().await;

                if let Some(other) =
                    conflict::find_conflict(&self.appointments, sid, at, service.duration_min, None)
                {
                    return Err(EngineError::Conflict(other));
                }

                let booked =
                    capacity::count_for_day(&self.appointments, sid, day, &ACTIVE_STATUSES);
                if booked >= staff.daily_capacity as usize {
                    // Full day: silently downgrade to the queue.
                    (None, AppointmentStatus::Waiting)
                } else {
                    let appt = Appointment {
                        id,
                        customer_name: customer_name.clone(),
                        service_id,
                        staff_id: Some(sid),
                        at,
                        status: AppointmentStatus::Scheduled,
                        created_at: now,
                        updated_at: now,
                    };
                    let event = Event::AppointmentCreated {
                        id,
                        customer_name: customer_name.clone(),
                        service_id,
                        staff_id: Some(sid),
                        at,
                        status: AppointmentStatus::Scheduled,
                        created_at: now,
                        updated_at: now,
                    };
                    // Persist while still holding the day lock so a racing
                    // booking sees this one.
                    self.persist_and_apply(&event).await?;
                    self.record_activity(
                        id,
                        ActivityAction::Scheduled,
                        format!("Appointment for \"{customer_name}\" scheduled"),
                    )
                    .await?;
                    return Ok(appt);
                }
            }
        };

        let appt = Appointment {
            id,
            customer_name: customer_name.clone(),
            service_id,
            staff_id,
            at,
            status,
            created_at: now,
            updated_at: now,
        };
        let event = Event::AppointmentCreated {
            id,
            customer_name: customer_name.clone(),
            service_id,
            staff_id,
            at,
            status,
            created_at: now,
            updated_at: now,
        };
        self.persist_and_apply(&event).await?;
        self.record_activity(
            id,
            ActivityAction::Queued,
            format!("Appointment for \"{customer_name}\" added to queue"),
        )
        .await?;
        Ok(appt)
    }

    /// Direct field update. Does not re-run the conflict or capacity checks;
    /// this is the operator's escape hatch and trusts the caller.
    pub async fn update_appointment(
        &self,
        id: Ulid,
        status: Option<AppointmentStatus>,
        staff_id: Option<Option<Ulid>>,
        at: Option<Ms>,
    ) -> Result<Appointment, EngineError> {
        let current = self
            .appointments
            .get(&id)
            .map(|a| a.value().clone())
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;

        if let Some(t) = at {
            conflict::validate_instant(t)?;
        }
        if let Some(Some(sid)) = staff_id
            && !self.staff.contains_key(&sid)
        {
            return Err(EngineError::NotFound(Entity::Staff, sid));
        }

        let updated = Appointment {
            staff_id: staff_id.unwrap_or(current.staff_id),
            at: at.unwrap_or(current.at),
            status: status.unwrap_or(current.status),
            updated_at: now_ms(),
            ..current.clone()
        };
        let event = Event::AppointmentUpdated {
            id,
            staff_id: updated.staff_id,
            at: updated.at,
            status: updated.status,
            updated_at: updated.updated_at,
        };
        self.persist_and_apply(&event).await?;

        if let Some(s) = status
            && s != current.status
        {
            self.record_activity(
                id,
                ActivityAction::StatusChanged,
                format!("Status changed from {} to {}", current.status.as_str(), s.as_str()),
            )
            .await?;
        }
        Ok(updated)
    }

    /// Cancel-and-remove. The appointment row disappears; the audit trail
    /// keeps the cancellation record.
    pub async fn delete_appointment(&self, id: Ulid) -> Result<(), EngineError> {
        let current = self
            .appointments
            .get(&id)
            .map(|a| a.value().clone())
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;

        self.persist_and_apply(&Event::AppointmentDeleted { id }).await?;
        self.record_activity(
            id,
            ActivityAction::Cancelled,
            format!("Appointment for \"{}\" cancelled", current.customer_name),
        )
        .await
    }

    /// Terminal removal with no audit record. Used by the retention sweep
    /// and the archive surface.
    pub async fn purge_appointment(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.appointments.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Appointment, id));
        }
        self.persist_and_apply(&Event::AppointmentDeleted { id }).await
    }

    // ── Queue promotion ──────────────────────────────────

    /// Promote the longest-waiting queue entry to scheduled. With an explicit
    /// staff id the entry goes to that staff member if their day has room;
    /// without one, staff is auto-matched by the service's required type.
    /// Promotion counts only scheduled appointments against capacity, so a
    /// day saturated by waiting demand can still absorb promotions.
    pub async fn promote_from_queue(
        &self,
        staff_id: Option<Ulid>,
    ) -> Result<PromotionOutcome, EngineError> {
        let next = self
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Waiting)
            .map(|a| a.value().clone())
            .min_by_key(|a| (a.at, a.id));
        let Some(appt) = next else {
            return Ok(PromotionOutcome::skipped("No appointments in queue"));
        };

        let service = self
            .services
            .get(&appt.service_id)
            .map(|s| s.value().clone())
            .ok_or(EngineError::NotFound(Entity::Service, appt.service_id))?;

        let day = day_bounds(appt.at);
        let staff = match staff_id {
            Some(sid) => self
                .staff
                .get(&sid)
                .map(|s| s.value().clone())
                .ok_or(EngineError::NotFound(Entity::Staff, sid))?,
            None => {
                match capacity::find_eligible_staff(
                    &self.staff,
                    &self.appointments,
                    &service.required_staff_type,
                    day,
                ) {
                    Some(s) => s,
                    None => {
                        return Ok(PromotionOutcome::skipped(
                            "No available staff for this service",
                        ));
                    }
                }
            }
        };

        let lock = self.slot_lock(staff.id, day);
        let _guard = lock.lock().await;

        // Re-check under the lock: the pick above raced other promotions.
        let scheduled =
            capacity::count_for_day(&self.appointments, staff.id, day, &SCHEDULED_ONLY);
        if scheduled >= staff.daily_capacity as usize {
            return Ok(PromotionOutcome::skipped("Staff has reached daily capacity"));
        }

        let updated = Appointment {
            staff_id: Some(staff.id),
            status: AppointmentStatus::Scheduled,
            updated_at: now_ms(),
            ..appt.clone()
        };
        let event = Event::AppointmentUpdated {
            id: updated.id,
            staff_id: updated.staff_id,
            at: updated.at,
            status: updated.status,
            updated_at: updated.updated_at,
        };
        self.persist_and_apply(&event).await?;
        self.record_activity(
            appt.id,
            ActivityAction::AssignedFromQueue,
            format!(
                "Appointment for \"{}\" assigned from queue to {}",
                appt.customer_name, staff.name
            ),
        )
        .await?;

        let message = format!("Assigned {} to {}", updated.customer_name, staff.name);
        Ok(PromotionOutcome {
            assigned: true,
            appointment: Some(updated),
            message,
        })
    }

    // ── Retention & compaction ───────────────────────────

    /// Completed appointments whose slot ended more than `retention_ms` ago.
    pub fn collect_expired_completed(&self, now: Ms, retention_ms: u64) -> Vec<Ulid> {
        self.appointments
            .iter()
            .filter(|a| {
                a.status == AppointmentStatus::Completed
                    && a.updated_at.saturating_add(retention_ms as Ms) <= now
            })
            .map(|a| a.id)
            .collect()
    }

    /// Snapshot current state as a minimal event list and swap the WAL.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        for s in self.staff.iter() {
            events.push(Event::StaffCreated {
                id: s.id,
                name: s.name.clone(),
                service_type: s.service_type.clone(),
                daily_capacity: s.daily_capacity,
                available: s.available,
            });
        }
        for s in self.services.iter() {
            events.push(Event::ServiceCreated {
                id: s.id,
                name: s.name.clone(),
                duration_min: s.duration_min,
                required_staff_type: s.required_staff_type.clone(),
            });
        }
        for a in self.appointments.iter() {
            events.push(Event::AppointmentCreated {
                id: a.id,
                customer_name: a.customer_name.clone(),
                service_id: a.service_id,
                staff_id: a.staff_id,
                at: a.at,
                status: a.status,
                created_at: a.created_at,
                updated_at: a.updated_at,
            });
        }
        for e in self.activity.read().expect("activity log lock poisoned").iter() {
            events.push(Event::ActivityRecorded {
                id: e.id,
                appointment_id: e.appointment_id,
                action: e.action,
                description: e.description.clone(),
                at: e.at,
            });
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
