mod booking;
mod conflict;
mod directory;
mod error;
mod queries;
pub mod store;

pub use error::EngineError;
pub use store::{CustomerStore, HotelStore, RoomStore, StoreError};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;
use store::{InMemoryCustomerStore, InMemoryHotelStore, InMemoryRoomStore};

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
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
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

/// The booking engine: three stores behind trait seams, a per-record lock
/// manager, and a WAL that makes every accepted mutation durable before
/// the stores see it.
///
/// The per-room mutex is what makes conflict-check-then-insert atomic:
/// two concurrent creates for overlapping stays on one room serialize
/// here, so at most one passes the check. Lock order is fixed — room
/// locks in sorted id order, then the customer lock — so per-room and
/// per-customer locking cannot deadlock.
pub struct Engine {
    pub rooms: Arc<dyn RoomStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub hotels: Arc<dyn HotelStore>,
    wal_tx: mpsc::Sender<WalCommand>,
    room_locks: DashMap<Ulid, Arc<Mutex<()>>>,
    customer_locks: DashMap<Ulid, Arc<Mutex<()>>>,
    hotel_locks: DashMap<Ulid, Arc<Mutex<()>>>,
    /// Serializes customer admission so the unique-email check and the
    /// insert cannot interleave between two concurrent `add_customer`s.
    customer_admission: Mutex<()>,
    /// Read side held across every WAL-append-then-store-write sequence;
    /// write side held by `compact_wal` while it snapshots the stores.
    /// Guarantees the compaction snapshot never falls between a committed
    /// append and its store writes, which would drop the operation from
    /// the rewritten log.
    mutation_gate: RwLock<()>,
}

impl Engine {
    /// Open an engine over the default in-memory stores, replaying the WAL
    /// at `wal_path` into them.
    pub async fn open(wal_path: PathBuf) -> Result<Self, EngineError> {
        Self::with_stores(
            wal_path,
            Arc::new(InMemoryRoomStore::new()),
            Arc::new(InMemoryCustomerStore::new()),
            Arc::new(InMemoryHotelStore::new()),
        )
        .await
    }

    /// Open an engine over caller-supplied store backends. The WAL replay
    /// writes through the same trait seams the live path uses.
    pub async fn with_stores(
        wal_path: PathBuf,
        rooms: Arc<dyn RoomStore>,
        customers: Arc<dyn CustomerStore>,
        hotels: Arc<dyn HotelStore>,
    ) -> Result<Self, EngineError> {
        let events = Wal::replay(&wal_path).map_err(|e| EngineError::WalError(e.to_string()))?;
        let wal = Wal::open(&wal_path).map_err(|e| EngineError::WalError(e.to_string()))?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms,
            customers,
            hotels,
            wal_tx,
            room_locks: DashMap::new(),
            customer_locks: DashMap::new(),
            hotel_locks: DashMap::new(),
            customer_admission: Mutex::new(()),
            mutation_gate: RwLock::new(()),
        };

        for event in &events {
            engine.apply_event(event).await?;
        }

        Ok(engine)
    }

    /// Write an event to the WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply to the stores. The path directory mutations
    /// take; the booking coordinator drives its two mirror writes itself
    /// so it can tell a partial write apart from an ordinary failure.
    pub(super) async fn persist_and_apply(&self, event: &Event) -> Result<(), EngineError> {
        let _gate = self.mutation_gate.read().await;
        self.wal_append(event).await?;
        self.apply_event(event).await
    }

    /// Apply one event through the store seams. Used for live directory
    /// mutations and for WAL replay; a replayed booking event writes both
    /// mirrors, so recovered state is always consistent.
    async fn apply_event(&self, event: &Event) -> Result<(), EngineError> {
        match event {
            Event::HotelAdded { id, name, street, city, zip_code, image_url } => {
                self.hotels
                    .insert(HotelState {
                        id: *id,
                        name: name.clone(),
                        street: street.clone(),
                        city: city.clone(),
                        zip_code: zip_code.clone(),
                        image_url: image_url.clone(),
                    })
                    .await?;
            }
            Event::HotelRemoved { id } => {
                // Cascade: rooms of the hotel go, and each removed room's
                // bookings are pulled from the owning customers' mirrors.
                let rooms = self.rooms.list_by_hotel(*id).await?;
                for room in rooms {
                    for b in &room.bookings {
                        self.customers
                            .remove_reference(b.customer_id, b.booking_id)
                            .await?;
                    }
                    self.rooms.remove(room.id).await?;
                    self.room_locks.remove(&room.id);
                }
                self.hotels.remove(*id).await?;
                self.hotel_locks.remove(id);
            }
            Event::RoomAdded {
                id,
                hotel_id,
                room_type,
                room_number,
                price_per_night,
                is_available,
                image_url,
            } => {
                self.rooms
                    .insert(RoomState {
                        id: *id,
                        hotel_id: *hotel_id,
                        room_type: *room_type,
                        room_number: *room_number,
                        price_per_night: *price_per_night,
                        is_available: *is_available,
                        image_url: image_url.clone(),
                        bookings: Vec::new(),
                    })
                    .await?;
            }
            Event::RoomRemoved { id } => {
                if let Some(room) = self.rooms.get(*id).await? {
                    for b in &room.bookings {
                        self.customers
                            .remove_reference(b.customer_id, b.booking_id)
                            .await?;
                    }
                }
                self.rooms.remove(*id).await?;
                self.room_locks.remove(id);
            }
            Event::RoomPriceSet { id, price_per_night } => {
                self.rooms.set_price(*id, *price_per_night).await?;
            }
            Event::RoomAvailabilitySet { id, is_available } => {
                self.rooms.set_availability(*id, *is_available).await?;
            }
            Event::CustomerAdded { id, name, surname, email, password } => {
                self.customers
                    .insert(CustomerState {
                        id: *id,
                        name: name.clone(),
                        surname: surname.clone(),
                        email: email.clone(),
                        password: password.clone(),
                        bookings: Vec::new(),
                    })
                    .await?;
            }
            Event::CustomerRemoved { id } => {
                self.customers.remove(*id).await?;
                self.customer_locks.remove(id);
            }
            Event::PasswordSet { id, password } => {
                self.customers.set_password(*id, password.clone()).await?;
            }
            Event::BookingCreated { booking_id, room_id, customer_id, span } => {
                self.rooms
                    .insert_interval(
                        *room_id,
                        BookingInterval {
                            booking_id: *booking_id,
                            customer_id: *customer_id,
                            span: *span,
                        },
                    )
                    .await?;
                self.customers
                    .insert_reference(
                        *customer_id,
                        BookingRef {
                            booking_id: *booking_id,
                            room_id: *room_id,
                            span: *span,
                        },
                    )
                    .await?;
            }
            Event::BookingRescheduled {
                booking_id,
                old_room_id,
                new_room_id,
                customer_id,
                span,
            } => {
                let interval = BookingInterval {
                    booking_id: *booking_id,
                    customer_id: *customer_id,
                    span: *span,
                };
                if old_room_id == new_room_id {
                    self.rooms
                        .update_interval(*new_room_id, *booking_id, interval)
                        .await?;
                } else {
                    self.rooms.remove_interval(*old_room_id, *booking_id).await?;
                    self.rooms.insert_interval(*new_room_id, interval).await?;
                }
                self.customers
                    .update_reference(
                        *customer_id,
                        *booking_id,
                        BookingRef {
                            booking_id: *booking_id,
                            room_id: *new_room_id,
                            span: *span,
                        },
                    )
                    .await?;
            }
            Event::BookingCancelled { booking_id, room_id, customer_id } => {
                self.rooms.remove_interval(*room_id, *booking_id).await?;
                self.customers
                    .remove_reference(*customer_id, *booking_id)
                    .await?;
            }
        }
        Ok(())
    }

    // ── Lock manager ─────────────────────────────────────────

    /// Coordinator-scoped mutex for one room. Created on demand, dropped
    /// when the room is removed.
    pub(super) fn room_lock(&self, room_id: Ulid) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(super) fn customer_lock(&self, customer_id: Ulid) -> Arc<Mutex<()>> {
        self.customer_locks
            .entry(customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Serializes room admission per hotel (the unique-room-number check)
    /// and hotel removal against it.
    pub(super) fn hotel_lock(&self, hotel_id: Ulid) -> Arc<Mutex<()>> {
        self.hotel_locks
            .entry(hotel_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate current
    /// state: hotels, customers, rooms, then one BookingCreated per stored
    /// interval (replay rebuilds the customer mirrors from those).
    ///
    /// Holds the mutation gate exclusively for the snapshot and the swap,
    /// so no operation can be mid-flight between its WAL append and its
    /// store writes while the stores are being read.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.mutation_gate.write().await;
        let mut events = Vec::new();

        for hotel in self.hotels.list().await? {
            events.push(Event::HotelAdded {
                id: hotel.id,
                name: hotel.name,
                street: hotel.street,
                city: hotel.city,
                zip_code: hotel.zip_code,
                image_url: hotel.image_url,
            });
        }
        for customer in self.customers.list().await? {
            events.push(Event::CustomerAdded {
                id: customer.id,
                name: customer.name,
                surname: customer.surname,
                email: customer.email,
                password: customer.password,
            });
        }

        let rooms = self.rooms.list_all().await?;
        for room in &rooms {
            events.push(Event::RoomAdded {
                id: room.id,
                hotel_id: room.hotel_id,
                room_type: room.room_type,
                room_number: room.room_number,
                price_per_night: room.price_per_night,
                is_available: room.is_available,
                image_url: room.image_url.clone(),
            });
        }
        for room in &rooms {
            for b in &room.bookings {
                events.push(Event::BookingCreated {
                    booking_id: b.booking_id,
                    room_id: room.id,
                    customer_id: b.customer_id,
                    span: b.span,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
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

/// Background task: compact the WAL whenever the append count since the
/// last compaction passes `threshold`.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        if engine.wal_appends_since_compact().await >= threshold {
            match engine.compact_wal().await {
                Ok(()) => tracing::info!("WAL compacted"),
                Err(e) => tracing::warn!("WAL compaction failed: {e}"),
            }
        }
    }
}
