use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use ulid::Ulid;

use crate::limits::MAX_BOOKINGS_PER_ROOM;
use crate::model::*;

use super::conflict::{find_conflict, validate_range};
use super::{Engine, EngineError};

/// Booking coordinator: the sole lifecycle authority for booking data.
///
/// Write order is fixed across all paths: WAL first (durability), then the
/// room-side interval (the conflict authority), then the customer mirror.
/// A store failure after the WAL append leaves the live mirrors diverged
/// from each other or from the log; that state is surfaced as
/// `PartialWrite`, logged and counted, and never retried automatically —
/// a restart replays the WAL and reconciles.
///
/// The cancellation token is honored before the WAL append and never
/// between the mirror writes: an operation aborts cleanly or runs its
/// write phase to completion.
impl Engine {
    pub async fn create_booking(
        &self,
        customer_id: Ulid,
        room_id: Ulid,
        check_in: Ms,
        check_out: Ms,
        cancel: &CancellationToken,
    ) -> Result<Ulid, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let _room_guard = self.room_lock(room_id).lock_owned().await;
        let _customer_guard = self.customer_lock(customer_id).lock_owned().await;

        let room = self
            .rooms
            .get(room_id)
            .await?
            .ok_or(EngineError::NotFound(room_id))?;
        if self.customers.get(customer_id).await?.is_none() {
            return Err(EngineError::NotFound(customer_id));
        }
        let span = validate_range(check_in, check_out)?;
        if !room.is_available {
            return Err(EngineError::RoomUnavailable(room_id));
        }
        if room.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }
        if let Some(taken_by) = find_conflict(&room, &span, None) {
            metrics::counter!(crate::observability::CONFLICTS_REJECTED_TOTAL).increment(1);
            return Err(EngineError::SlotTaken(taken_by));
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Held until both mirror writes land, so a concurrent compaction
        // snapshot never falls between the append and the store writes.
        let _gate = self.mutation_gate.read().await;

        let booking_id = Ulid::new();
        self.wal_append(&Event::BookingCreated {
            booking_id,
            room_id,
            customer_id,
            span,
        })
        .await?;

        let interval = BookingInterval { booking_id, customer_id, span };
        match self.rooms.insert_interval(room_id, interval).await {
            Ok(true) => {}
            other => return Err(self.partial_write(booking_id, "room-side insert", other)),
        }
        let r = BookingRef { booking_id, room_id, span };
        match self.customers.insert_reference(customer_id, r).await {
            Ok(true) => {}
            other => return Err(self.partial_write(booking_id, "customer mirror insert", other)),
        }

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(%booking_id, %room_id, %customer_id, "booking created");
        Ok(booking_id)
    }

    /// Move a booking to new dates and (optionally) a new room. The
    /// conflict check excludes the booking's own interval, so shifting a
    /// stay within itself on the same room succeeds.
    pub async fn reschedule_booking(
        &self,
        customer_id: Ulid,
        new_room_id: Ulid,
        booking_id: Ulid,
        check_in: Ms,
        check_out: Ms,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // The old room is only known from the customer's mirror, which can
        // move between the unlocked read and the lock acquisition. Snapshot,
        // lock, verify; retry when another reschedule won the race.
        loop {
            let customer = self
                .customers
                .get(customer_id)
                .await?
                .ok_or(EngineError::NotFound(customer_id))?;
            let old_room_id = customer
                .find_booking(booking_id)
                .ok_or(EngineError::NotFound(booking_id))?
                .room_id;

            let _room_guards = self.lock_rooms(old_room_id, new_room_id).await;
            let _customer_guard = self.customer_lock(customer_id).lock_owned().await;

            let customer = self
                .customers
                .get(customer_id)
                .await?
                .ok_or(EngineError::NotFound(customer_id))?;
            let current = customer
                .find_booking(booking_id)
                .ok_or(EngineError::NotFound(booking_id))?;
            if current.room_id != old_room_id {
                continue; // moved under us — re-derive the lock set
            }

            let span = validate_range(check_in, check_out)?;

            let old_room = self
                .rooms
                .get(old_room_id)
                .await?
                .ok_or(EngineError::NotFound(old_room_id))?;
            // Both mirrors must agree before we touch anything; a one-sided
            // booking is a prior consistency violation, reported as NotFound.
            if old_room.find_booking(booking_id).is_none() {
                return Err(EngineError::NotFound(booking_id));
            }

            let new_room = if new_room_id == old_room_id {
                old_room
            } else {
                self.rooms
                    .get(new_room_id)
                    .await?
                    .ok_or(EngineError::NotFound(new_room_id))?
            };
            if !new_room.is_available {
                return Err(EngineError::RoomUnavailable(new_room_id));
            }
            if let Some(taken_by) = find_conflict(&new_room, &span, Some(booking_id)) {
                metrics::counter!(crate::observability::CONFLICTS_REJECTED_TOTAL).increment(1);
                return Err(EngineError::SlotTaken(taken_by));
            }

            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let _gate = self.mutation_gate.read().await;

            self.wal_append(&Event::BookingRescheduled {
                booking_id,
                old_room_id,
                new_room_id,
                customer_id,
                span,
            })
            .await?;

            // Room side first — it is the conflict authority.
            let interval = BookingInterval { booking_id, customer_id, span };
            if new_room_id == old_room_id {
                match self.rooms.update_interval(new_room_id, booking_id, interval).await {
                    Ok(true) => {}
                    other => {
                        return Err(self.partial_write(booking_id, "room-side update", other));
                    }
                }
            } else {
                match self.rooms.remove_interval(old_room_id, booking_id).await {
                    Ok(true) => {}
                    other => {
                        return Err(self.partial_write(booking_id, "old-room removal", other));
                    }
                }
                match self.rooms.insert_interval(new_room_id, interval).await {
                    Ok(true) => {}
                    other => {
                        return Err(self.partial_write(booking_id, "new-room insert", other));
                    }
                }
            }
            let r = BookingRef { booking_id, room_id: new_room_id, span };
            match self.customers.update_reference(customer_id, booking_id, r).await {
                Ok(true) => {}
                other => {
                    return Err(self.partial_write(booking_id, "customer mirror update", other));
                }
            }

            metrics::counter!(crate::observability::BOOKINGS_RESCHEDULED_TOTAL).increment(1);
            info!(%booking_id, %old_room_id, %new_room_id, "booking rescheduled");
            return Ok(());
        }
    }

    pub async fn cancel_booking(
        &self,
        booking_id: Ulid,
        customer_id: Ulid,
        room_id: Ulid,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let _room_guard = self.room_lock(room_id).lock_owned().await;
        let _customer_guard = self.customer_lock(customer_id).lock_owned().await;

        let room = self
            .rooms
            .get(room_id)
            .await?
            .ok_or(EngineError::NotFound(room_id))?;
        let customer = self
            .customers
            .get(customer_id)
            .await?
            .ok_or(EngineError::NotFound(customer_id))?;
        // Either side missing the booking means the mirrors already
        // disagree — reported, never silently ignored.
        if room.find_booking(booking_id).is_none() || customer.find_booking(booking_id).is_none() {
            return Err(EngineError::NotFound(booking_id));
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let _gate = self.mutation_gate.read().await;

        self.wal_append(&Event::BookingCancelled { booking_id, room_id, customer_id })
            .await?;

        match self.rooms.remove_interval(room_id, booking_id).await {
            Ok(true) => {}
            other => return Err(self.partial_write(booking_id, "room-side removal", other)),
        }
        match self.customers.remove_reference(customer_id, booking_id).await {
            Ok(true) => {}
            other => return Err(self.partial_write(booking_id, "customer mirror removal", other)),
        }

        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        info!(%booking_id, %room_id, "booking cancelled");
        Ok(())
    }

    /// Acquire room locks in sorted id order; one lock when the ids match.
    async fn lock_rooms(&self, a: Ulid, b: Ulid) -> Vec<OwnedMutexGuard<()>> {
        if a == b {
            return vec![self.room_lock(a).lock_owned().await];
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let g1 = self.room_lock(first).lock_owned().await;
        let g2 = self.room_lock(second).lock_owned().await;
        vec![g1, g2]
    }

    fn partial_write(
        &self,
        booking_id: Ulid,
        stage: &str,
        result: Result<bool, super::StoreError>,
    ) -> EngineError {
        let detail = match result {
            Ok(_) => format!("{stage} matched zero records"),
            Err(e) => format!("{stage} failed: {e}"),
        };
        metrics::counter!(crate::observability::PARTIAL_WRITES_TOTAL).increment(1);
        error!(%booking_id, detail, "dual write left stores inconsistent");
        EngineError::PartialWrite { booking_id, detail }
    }
}
