mod capacity;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::{EngineError, Entity};

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// One tenant's whole world: staff, services, appointments, and the audit
/// log, rebuilt from the WAL on open. The waiting queue is not state — it is
/// a derived view over `appointments` (status = waiting).
pub struct Engine {
    pub(super) staff: DashMap<Ulid, Staff>,
    pub(super) services: DashMap<Ulid, Service>,
    pub(super) appointments: DashMap<Ulid, Appointment>,
    /// Append-only, in WAL order.
    pub(super) activity: RwLock<Vec<ActivityEntry>>,
    /// Per-(staff, day-start) decision locks. Check-then-act sequences in
    /// creation and promotion hold the lock from check through write, so
    /// concurrent decisions on the same staff/day serialize instead of
    /// double-booking.
    slot_locks: DashMap<(Ulid, Ms), Arc<Mutex<()>>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            staff: DashMap::new(),
            services: DashMap::new(),
            appointments: DashMap::new(),
            activity: RwLock::new(Vec::new()),
            slot_locks: DashMap::new(),
            wal_tx,
        };

        for event in &events {
            engine.apply(event);
        }

        Ok(engine)
    }

    /// Apply an event to in-memory state. Also used during replay.
    pub(super) fn apply(&self, event: &Event) {
        match event {
            Event::StaffCreated { id, name, service_type, daily_capacity, available }
            | Event::StaffUpdated { id, name, service_type, daily_capacity, available } => {
                self.staff.insert(
                    *id,
                    Staff {
                        id: *id,
                        name: name.clone(),
                        service_type: service_type.clone(),
                        daily_capacity: *daily_capacity,
                        available: *available,
                    },
                );
            }
            Event::StaffDeleted { id } => {
                self.staff.remove(id);
            }
            Event::ServiceCreated { id, name, duration_min, required_staff_type } => {
                self.services.insert(
                    *id,
                    Service {
                        id: *id,
                        name: name.clone(),
                        duration_min: *duration_min,
                        required_staff_type: required_staff_type.clone(),
                    },
                );
            }
            Event::ServiceDeleted { id } => {
                self.services.remove(id);
            }
            Event::AppointmentCreated {
                id,
                customer_name,
                service_id,
                staff_id,
                at,
                status,
                created_at,
                updated_at,
            } => {
                self.appointments.insert(
                    *id,
                    Appointment {
                        id: *id,
                        customer_name: customer_name.clone(),
                        service_id: *service_id,
                        staff_id: *staff_id,
                        at: *at,
                        status: *status,
                        created_at: *created_at,
                        updated_at: *updated_at,
                    },
                );
            }
            Event::AppointmentUpdated { id, staff_id, at, status, updated_at } => {
                if let Some(mut a) = self.appointments.get_mut(id) {
                    a.staff_id = *staff_id;
                    a.at = *at;
                    a.status = *status;
                    a.updated_at = *updated_at;
                }
            }
            Event::AppointmentDeleted { id } => {
                self.appointments.remove(id);
            }
            Event::ActivityRecorded { id, appointment_id, action, description, at } => {
                self.activity
                    .write()
                    .expect("activity log lock poisoned")
                    .push(ActivityEntry {
                        id: *id,
                        appointment_id: *appointment_id,
                        action: *action,
                        description: description.clone(),
                        at: *at,
                    });
            }
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    /// WAL-append + apply in one call.
    pub(super) async fn persist_and_apply(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply(event);
        Ok(())
    }

    /// The mutual-exclusion scope for one staff member's calendar day.
    pub(super) fn slot_lock(&self, staff_id: Ulid, day: Span) -> Arc<Mutex<()>> {
        self.slot_locks
            .entry((staff_id, day.start))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append one audit record for a transition.
    pub(super) async fn record_activity(
        &self,
        appointment_id: Ulid,
        action: ActivityAction,
        description: String,
    ) -> Result<(), EngineError> {
        let event = Event::ActivityRecorded {
            id: Ulid::new(),
            appointment_id,
            action,
            description,
            at: conflict::now_ms(),
        };
        self.persist_and_apply(&event).await
    }

    pub fn get_appointment(&self, id: &Ulid) -> Option<Appointment> {
        self.appointments.get(id).map(|a| a.value().clone())
    }

    pub fn get_staff(&self, id: &Ulid) -> Option<Staff> {
        self.staff.get(id).map(|s| s.value().clone())
    }

    pub fn get_service(&self, id: &Ulid) -> Option<Service> {
        self.services.get(id).map(|s| s.value().clone())
    }
}
