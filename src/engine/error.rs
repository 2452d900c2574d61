use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// check_in >= check_out. Rejected before any lookup.
    InvalidRange,
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The room's administrative availability flag is off.
    RoomUnavailable(Ulid),
    /// The requested interval overlaps an existing booking (its id is carried).
    SlotTaken(Ulid),
    /// One half of a mirrored write succeeded and the other did not. The
    /// stores are inconsistent until an operator reconciles (or the engine
    /// is restarted and replays the WAL). Never retried automatically.
    PartialWrite {
        booking_id: Ulid,
        detail: String,
    },
    /// Customer removal blocked while bookings exist.
    HasBookings(Ulid),
    Validation(&'static str),
    Cancelled,
    LimitExceeded(&'static str),
    WalError(String),
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange => {
                write!(f, "check-in must be strictly before check-out")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::RoomUnavailable(id) => write!(f, "room unavailable: {id}"),
            EngineError::SlotTaken(id) => write!(f, "slot taken by booking: {id}"),
            EngineError::PartialWrite { booking_id, detail } => {
                write!(f, "partial write for booking {booking_id}: {detail}")
            }
            EngineError::HasBookings(id) => {
                write!(f, "cannot remove customer {id}: bookings exist")
            }
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::Cancelled => write!(f, "operation cancelled before any write"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<super::store::StoreError> for EngineError {
    fn from(e: super::store::StoreError) -> Self {
        EngineError::Store(e.0)
    }
}
