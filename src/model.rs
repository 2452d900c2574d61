use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds UTC — the only time type. Callers convert calendar
/// dates at the boundary.
pub type Ms = i64;

/// Half-open stay interval `[check_in, check_out)`.
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

    /// The one overlap predicate. Symmetric, half-open: touching endpoints
    /// (checkout at T, check-in at T) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Room category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomType {
    Single,
    Double,
    Twin,
    Suite,
}

/// A stay recorded on the room side. The room's interval list is the
/// authority for conflict detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInterval {
    pub booking_id: Ulid,
    pub customer_id: Ulid,
    pub span: Span,
}

/// The customer-side mirror of a [`BookingInterval`]. Created, moved and
/// removed only together with it, only by the booking coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRef {
    pub booking_id: Ulid,
    pub room_id: Ulid,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelState {
    pub id: Ulid,
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip_code: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub room_type: RoomType,
    /// Unique within the hotel.
    pub room_number: u32,
    pub price_per_night: f64,
    /// Administrative on/off switch, independent of bookings.
    pub is_available: bool,
    pub image_url: Option<String>,
    /// Sorted by `span.start`.
    pub bookings: Vec<BookingInterval>,
}

impl RoomState {
    /// Insert maintaining sort order by span.start.
    pub fn insert_booking(&mut self, interval: BookingInterval) {
        let pos = self
            .bookings
            .binary_search_by_key(&interval.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, interval);
    }

    /// Remove by booking id. Returns the removed interval, `None` if absent.
    pub fn remove_booking(&mut self, booking_id: Ulid) -> Option<BookingInterval> {
        let pos = self.bookings.iter().position(|b| b.booking_id == booking_id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn find_booking(&self, booking_id: Ulid) -> Option<&BookingInterval> {
        self.bookings.iter().find(|b| b.booking_id == booking_id)
    }

    /// Intervals whose span overlaps the query window. Binary search skips
    /// everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &BookingInterval> {
        let right_bound = self.bookings.partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerState {
    pub id: Ulid,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password: String,
    pub bookings: Vec<BookingRef>,
}

impl CustomerState {
    pub fn remove_booking(&mut self, booking_id: Ulid) -> Option<BookingRef> {
        let pos = self.bookings.iter().position(|b| b.booking_id == booking_id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn find_booking(&self, booking_id: Ulid) -> Option<&BookingRef> {
        self.bookings.iter().find(|b| b.booking_id == booking_id)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
/// One booking event carries both mirror writes, so replay always
/// reconstructs a consistent pair of views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    HotelAdded {
        id: Ulid,
        name: String,
        street: String,
        city: String,
        zip_code: String,
        image_url: Option<String>,
    },
    HotelRemoved {
        id: Ulid,
    },
    RoomAdded {
        id: Ulid,
        hotel_id: Ulid,
        room_type: RoomType,
        room_number: u32,
        price_per_night: f64,
        is_available: bool,
        image_url: Option<String>,
    },
    RoomRemoved {
        id: Ulid,
    },
    RoomPriceSet {
        id: Ulid,
        price_per_night: f64,
    },
    RoomAvailabilitySet {
        id: Ulid,
        is_available: bool,
    },
    CustomerAdded {
        id: Ulid,
        name: String,
        surname: String,
        email: String,
        password: String,
    },
    CustomerRemoved {
        id: Ulid,
    },
    PasswordSet {
        id: Ulid,
        password: String,
    },
    BookingCreated {
        booking_id: Ulid,
        room_id: Ulid,
        customer_id: Ulid,
        span: Span,
    },
    BookingRescheduled {
        booking_id: Ulid,
        old_room_id: Ulid,
        new_room_id: Ulid,
        customer_id: Ulid,
        span: Span,
    },
    BookingCancelled {
        booking_id: Ulid,
        room_id: Ulid,
        customer_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

/// One row of a customer's booking listing: the mirror joined with its
/// room and hotel.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerBooking {
    pub booking_id: Ulid,
    pub room_id: Ulid,
    pub hotel_id: Ulid,
    pub span: Span,
    pub room_type: RoomType,
    pub room_number: u32,
    pub price_per_night: f64,
    pub hotel_name: String,
    pub hotel_street: String,
    pub hotel_city: String,
    pub hotel_zip_code: String,
    /// A stay that has started (or ended) can no longer be rescheduled.
    pub can_be_edited: bool,
}

/// One candidate row from an availability search.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableRoom {
    pub room_id: Ulid,
    pub hotel_id: Ulid,
    pub room_type: RoomType,
    pub room_number: u32,
    pub price_per_night: f64,
    pub hotel_name: String,
    pub hotel_city: String,
}

/// Optional predicates for [`AvailableRoom`] searches. All default to
/// "don't filter".
#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub room_type: Option<RoomType>,
    pub city: Option<String>,
    pub hotel_id: Option<Ulid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.overlaps(&s));
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // touching endpoints, not overlapping
        assert!(!c.overlaps(&a));
    }

    fn booking(start: Ms, end: Ms) -> BookingInterval {
        BookingInterval {
            booking_id: Ulid::new(),
            customer_id: Ulid::new(),
            span: Span::new(start, end),
        }
    }

    fn empty_room() -> RoomState {
        RoomState {
            id: Ulid::new(),
            hotel_id: Ulid::new(),
            room_type: RoomType::Double,
            room_number: 101,
            price_per_night: 90.0,
            is_available: true,
            image_url: None,
            bookings: Vec::new(),
        }
    }

    #[test]
    fn booking_ordering() {
        let mut room = empty_room();
        room.insert_booking(booking(300, 400));
        room.insert_booking(booking(100, 200));
        room.insert_booking(booking(200, 300));
        assert_eq!(room.bookings[0].span.start, 100);
        assert_eq!(room.bookings[1].span.start, 200);
        assert_eq!(room.bookings[2].span.start, 300);
    }

    #[test]
    fn booking_remove() {
        let mut room = empty_room();
        let b = booking(100, 200);
        room.insert_booking(b);
        assert_eq!(room.remove_booking(b.booking_id), Some(b));
        assert!(room.bookings.is_empty());
        assert!(room.remove_booking(b.booking_id).is_none());
    }

    #[test]
    fn overlapping_skips_disjoint() {
        let mut room = empty_room();
        room.insert_booking(booking(100, 200)); // past
        room.insert_booking(booking(450, 600)); // overlaps
        room.insert_booking(booking(1000, 1100)); // future

        let hits: Vec<_> = room.overlapping(&Span::new(500, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        // Interval ending exactly at query.start is NOT overlapping (half-open)
        let mut room = empty_room();
        room.insert_booking(booking(100, 200));
        let hits: Vec<_> = room.overlapping(&Span::new(200, 300)).collect();
        assert!(hits.is_empty());
    }

    #[test]
    fn overlapping_large_interval_spanning_query() {
        let mut room = empty_room();
        room.insert_booking(booking(0, 10000));
        let hits: Vec<_> = room.overlapping(&Span::new(500, 600)).collect();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn overlapping_empty_room() {
        let room = empty_room();
        let hits: Vec<_> = room.overlapping(&Span::new(0, 1000)).collect();
        assert!(hits.is_empty());
    }

    #[test]
    fn customer_ref_remove() {
        let mut customer = CustomerState {
            id: Ulid::new(),
            name: "Ada".into(),
            surname: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "x".into(),
            bookings: Vec::new(),
        };
        let r = BookingRef {
            booking_id: Ulid::new(),
            room_id: Ulid::new(),
            span: Span::new(100, 200),
        };
        customer.bookings.push(r);
        assert_eq!(customer.remove_booking(r.booking_id), Some(r));
        assert!(customer.remove_booking(r.booking_id).is_none());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            booking_id: Ulid::new(),
            room_id: Ulid::new(),
            customer_id: Ulid::new(),
            span: Span::new(1000, 2000),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
