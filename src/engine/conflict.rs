use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Validate a candidate stay before any store lookup. `start >= end` is
/// `InvalidRange`; timestamps outside the sanity bounds are rejected.
pub(crate) fn validate_range(check_in: Ms, check_out: Ms) -> Result<Span, EngineError> {
    use crate::limits::*;
    if check_in >= check_out {
        return Err(EngineError::InvalidRange);
    }
    if check_in < MIN_VALID_TIMESTAMP_MS || check_out > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::Validation("timestamp out of range"));
    }
    let span = Span::new(check_in, check_out);
    if span.duration_ms() > MAX_STAY_DURATION_MS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(span)
}

/// Scan a room for a booking overlapping `span`. Returns the conflicting
/// booking id, or `None` when the slot is free.
///
/// One symmetric half-open predicate covers every placement: touching
/// endpoints never conflict.
///
/// `exclude` skips a booking's own interval so a reschedule does not
/// collide with its prior self.
pub(crate) fn find_conflict(
    room: &RoomState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    room.overlapping(span)
        .find(|b| Some(b.booking_id) != exclude)
        .map(|b| b.booking_id)
}
