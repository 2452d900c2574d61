use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// Opaque persistence failure reported by a store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Room records and their embedded booking intervals. The room side is the
/// authority for conflict detection; only the booking coordinator may touch
/// interval data.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get(&self, room_id: Ulid) -> StoreResult<Option<RoomState>>;
    async fn insert(&self, room: RoomState) -> StoreResult<()>;
    /// Returns false when no such room existed.
    async fn remove(&self, room_id: Ulid) -> StoreResult<bool>;
    async fn set_price(&self, room_id: Ulid, price_per_night: f64) -> StoreResult<bool>;
    async fn set_availability(&self, room_id: Ulid, is_available: bool) -> StoreResult<bool>;
    async fn is_available(&self, room_id: Ulid) -> StoreResult<Option<bool>>;
    async fn list_intervals(&self, room_id: Ulid) -> StoreResult<Vec<BookingInterval>>;
    /// Returns false when the room is gone (zero records matched).
    async fn insert_interval(&self, room_id: Ulid, interval: BookingInterval) -> StoreResult<bool>;
    /// Returns false when no record matched room + booking id.
    async fn remove_interval(&self, room_id: Ulid, booking_id: Ulid) -> StoreResult<bool>;
    async fn update_interval(
        &self,
        room_id: Ulid,
        booking_id: Ulid,
        interval: BookingInterval,
    ) -> StoreResult<bool>;
    async fn list_all(&self) -> StoreResult<Vec<RoomState>>;
    async fn list_by_hotel(&self, hotel_id: Ulid) -> StoreResult<Vec<RoomState>>;
    async fn count(&self) -> StoreResult<usize>;
}

/// Customer records and their mirrored booking references.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get(&self, customer_id: Ulid) -> StoreResult<Option<CustomerState>>;
    async fn insert(&self, customer: CustomerState) -> StoreResult<()>;
    async fn remove(&self, customer_id: Ulid) -> StoreResult<bool>;
    async fn set_password(&self, customer_id: Ulid, password: String) -> StoreResult<bool>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Ulid>>;
    async fn list_references(&self, customer_id: Ulid) -> StoreResult<Vec<BookingRef>>;
    async fn insert_reference(&self, customer_id: Ulid, r: BookingRef) -> StoreResult<bool>;
    async fn remove_reference(&self, customer_id: Ulid, booking_id: Ulid) -> StoreResult<bool>;
    async fn update_reference(
        &self,
        customer_id: Ulid,
        booking_id: Ulid,
        r: BookingRef,
    ) -> StoreResult<bool>;
    async fn list(&self) -> StoreResult<Vec<CustomerState>>;
    async fn count(&self) -> StoreResult<usize>;
}

/// Hotel records. Read-mostly; the query facade joins against it.
#[async_trait]
pub trait HotelStore: Send + Sync {
    async fn get(&self, hotel_id: Ulid) -> StoreResult<Option<HotelState>>;
    async fn insert(&self, hotel: HotelState) -> StoreResult<()>;
    async fn remove(&self, hotel_id: Ulid) -> StoreResult<bool>;
    async fn list(&self) -> StoreResult<Vec<HotelState>>;
    async fn count(&self) -> StoreResult<usize>;
}

// ── In-memory backends ───────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: DashMap<Ulid, RoomState>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn get(&self, room_id: Ulid) -> StoreResult<Option<RoomState>> {
        Ok(self.rooms.get(&room_id).map(|e| e.value().clone()))
    }

    async fn insert(&self, room: RoomState) -> StoreResult<()> {
        self.rooms.insert(room.id, room);
        Ok(())
    }

    async fn remove(&self, room_id: Ulid) -> StoreResult<bool> {
        Ok(self.rooms.remove(&room_id).is_some())
    }

    async fn set_price(&self, room_id: Ulid, price_per_night: f64) -> StoreResult<bool> {
        match self.rooms.get_mut(&room_id) {
            Some(mut room) => {
                room.price_per_night = price_per_night;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_availability(&self, room_id: Ulid, is_available: bool) -> StoreResult<bool> {
        match self.rooms.get_mut(&room_id) {
            Some(mut room) => {
                room.is_available = is_available;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_available(&self, room_id: Ulid) -> StoreResult<Option<bool>> {
        Ok(self.rooms.get(&room_id).map(|e| e.is_available))
    }

    async fn list_intervals(&self, room_id: Ulid) -> StoreResult<Vec<BookingInterval>> {
        Ok(self
            .rooms
            .get(&room_id)
            .map(|e| e.bookings.clone())
            .unwrap_or_default())
    }

    async fn insert_interval(&self, room_id: Ulid, interval: BookingInterval) -> StoreResult<bool> {
        match self.rooms.get_mut(&room_id) {
            Some(mut room) => {
                room.insert_booking(interval);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_interval(&self, room_id: Ulid, booking_id: Ulid) -> StoreResult<bool> {
        match self.rooms.get_mut(&room_id) {
            Some(mut room) => Ok(room.remove_booking(booking_id).is_some()),
            None => Ok(false),
        }
    }

    async fn update_interval(
        &self,
        room_id: Ulid,
        booking_id: Ulid,
        interval: BookingInterval,
    ) -> StoreResult<bool> {
        match self.rooms.get_mut(&room_id) {
            Some(mut room) => {
                if room.remove_booking(booking_id).is_none() {
                    return Ok(false);
                }
                room.insert_booking(interval);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_all(&self) -> StoreResult<Vec<RoomState>> {
        Ok(self.rooms.iter().map(|e| e.value().clone()).collect())
    }

    async fn list_by_hotel(&self, hotel_id: Ulid) -> StoreResult<Vec<RoomState>> {
        Ok(self
            .rooms
            .iter()
            .filter(|e| e.hotel_id == hotel_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.rooms.len())
    }
}

#[derive(Default)]
pub struct InMemoryCustomerStore {
    customers: DashMap<Ulid, CustomerState>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn get(&self, customer_id: Ulid) -> StoreResult<Option<CustomerState>> {
        Ok(self.customers.get(&customer_id).map(|e| e.value().clone()))
    }

    async fn insert(&self, customer: CustomerState) -> StoreResult<()> {
        self.customers.insert(customer.id, customer);
        Ok(())
    }

    async fn remove(&self, customer_id: Ulid) -> StoreResult<bool> {
        Ok(self.customers.remove(&customer_id).is_some())
    }

    async fn set_password(&self, customer_id: Ulid, password: String) -> StoreResult<bool> {
        match self.customers.get_mut(&customer_id) {
            Some(mut c) => {
                c.password = password;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Ulid>> {
        Ok(self
            .customers
            .iter()
            .find(|e| e.email == email)
            .map(|e| e.id))
    }

    async fn list_references(&self, customer_id: Ulid) -> StoreResult<Vec<BookingRef>> {
        Ok(self
            .customers
            .get(&customer_id)
            .map(|e| e.bookings.clone())
            .unwrap_or_default())
    }

    async fn insert_reference(&self, customer_id: Ulid, r: BookingRef) -> StoreResult<bool> {
        match self.customers.get_mut(&customer_id) {
            Some(mut c) => {
                c.bookings.push(r);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_reference(&self, customer_id: Ulid, booking_id: Ulid) -> StoreResult<bool> {
        match self.customers.get_mut(&customer_id) {
            Some(mut c) => Ok(c.remove_booking(booking_id).is_some()),
            None => Ok(false),
        }
    }

    async fn update_reference(
        &self,
        customer_id: Ulid,
        booking_id: Ulid,
        r: BookingRef,
    ) -> StoreResult<bool> {
        match self.customers.get_mut(&customer_id) {
            Some(mut c) => match c.bookings.iter_mut().find(|b| b.booking_id == booking_id) {
                Some(slot) => {
                    *slot = r;
                    Ok(true)
                }
                None => Ok(false),
            },
            None => Ok(false),
        }
    }

    async fn list(&self) -> StoreResult<Vec<CustomerState>> {
        Ok(self.customers.iter().map(|e| e.value().clone()).collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.customers.len())
    }
}

#[derive(Default)]
pub struct InMemoryHotelStore {
    hotels: DashMap<Ulid, HotelState>,
}

impl InMemoryHotelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HotelStore for InMemoryHotelStore {
    async fn get(&self, hotel_id: Ulid) -> StoreResult<Option<HotelState>> {
        Ok(self.hotels.get(&hotel_id).map(|e| e.value().clone()))
    }

    async fn insert(&self, hotel: HotelState) -> StoreResult<()> {
        self.hotels.insert(hotel.id, hotel);
        Ok(())
    }

    async fn remove(&self, hotel_id: Ulid) -> StoreResult<bool> {
        Ok(self.hotels.remove(&hotel_id).is_some())
    }

    async fn list(&self) -> StoreResult<Vec<HotelState>> {
        Ok(self.hotels.iter().map(|e| e.value().clone()).collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.hotels.len())
    }
}
