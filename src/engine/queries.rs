use tracing::warn;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::now_ms;
use super::{Engine, EngineError};

/// Read-only aggregation. Nothing here mutates; every call returns a fresh
/// snapshot, so a listing is restartable by calling again.
impl Engine {
    pub async fn list_hotels(&self) -> Result<Vec<HotelState>, EngineError> {
        Ok(self.hotels.list().await?)
    }

    pub async fn list_rooms(&self, hotel_id: Ulid) -> Result<Vec<RoomState>, EngineError> {
        Ok(self.rooms.list_by_hotel(hotel_id).await?)
    }

    /// A customer's bookings, each joined with its room and hotel. The
    /// `can_be_edited` flag marks stays that have not started yet — a past
    /// or in-progress stay cannot be rescheduled.
    pub async fn list_customer_bookings(
        &self,
        customer_id: Ulid,
    ) -> Result<Vec<CustomerBooking>, EngineError> {
        if self.customers.get(customer_id).await?.is_none() {
            return Err(EngineError::NotFound(customer_id));
        }
        let refs = self.customers.list_references(customer_id).await?;
        let now = now_ms();

        let mut rows = Vec::with_capacity(refs.len());
        for r in refs {
            let Some(room) = self.rooms.get(r.room_id).await? else {
                // A reference to a vanished room is a mirror-consistency gap;
                // surface it in the logs rather than failing the listing.
                warn!(booking_id = %r.booking_id, room_id = %r.room_id, "dangling room reference");
                continue;
            };
            let Some(hotel) = self.hotels.get(room.hotel_id).await? else {
                warn!(room_id = %room.id, hotel_id = %room.hotel_id, "dangling hotel reference");
                continue;
            };
            rows.push(CustomerBooking {
                booking_id: r.booking_id,
                room_id: r.room_id,
                hotel_id: hotel.id,
                span: r.span,
                room_type: room.room_type,
                room_number: room.room_number,
                price_per_night: room.price_per_night,
                hotel_name: hotel.name,
                hotel_street: hotel.street,
                hotel_city: hotel.city,
                hotel_zip_code: hotel.zip_code,
                can_be_edited: r.span.start > now,
            });
        }
        Ok(rows)
    }

    /// Rooms free in the given window that pass every supplied filter.
    ///
    /// A room qualifies when its administrative flag is on, no stored
    /// interval overlaps the window, and price/type/city/hotel predicates
    /// all match. With no dates supplied there is no occupancy filtering
    /// at all; a one-sided window is open on the missing end.
    pub async fn find_available_rooms(
        &self,
        check_in: Option<Ms>,
        check_out: Option<Ms>,
        filter: &RoomFilter,
    ) -> Result<Vec<AvailableRoom>, EngineError> {
        let window = match (check_in, check_out) {
            (None, None) => None,
            (start, end) => {
                if let (Some(s), Some(e)) = (start, end)
                    && e.saturating_sub(s) > MAX_QUERY_WINDOW_MS {
                        return Err(EngineError::LimitExceeded("query window too wide"));
                    }
                let start = start.unwrap_or(MIN_VALID_TIMESTAMP_MS);
                let end = end.unwrap_or(MAX_VALID_TIMESTAMP_MS);
                if start >= end {
                    return Err(EngineError::InvalidRange);
                }
                Some(Span::new(start, end))
            }
        };

        let mut out = Vec::new();
        for room in self.rooms.list_all().await? {
            if !room.is_available {
                continue;
            }
            if let Some(hid) = filter.hotel_id
                && room.hotel_id != hid {
                    continue;
                }
            if let Some(min) = filter.min_price
                && room.price_per_night < min {
                    continue;
                }
            if let Some(max) = filter.max_price
                && room.price_per_night > max {
                    continue;
                }
            if let Some(rt) = filter.room_type
                && room.room_type != rt {
                    continue;
                }
            if let Some(ref w) = window
                && room.overlapping(w).next().is_some() {
                    continue; // occupied in the window
                }
            let Some(hotel) = self.hotels.get(room.hotel_id).await? else {
                warn!(room_id = %room.id, hotel_id = %room.hotel_id, "dangling hotel reference");
                continue;
            };
            if let Some(ref city) = filter.city
                && !hotel.city.eq_ignore_ascii_case(city) {
                    continue;
                }
            out.push(AvailableRoom {
                room_id: room.id,
                hotel_id: hotel.id,
                room_type: room.room_type,
                room_number: room.room_number,
                price_per_night: room.price_per_night,
                hotel_name: hotel.name,
                hotel_city: hotel.city,
            });
        }
        Ok(out)
    }
}
