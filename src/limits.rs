//! Operational limits. All hard caps live here so the rejection thresholds
//! are visible in one place.

use crate::model::Ms;

/// Earliest accepted check-in/check-out timestamp (1970-01-01).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// Latest accepted timestamp (2100-01-01). Catches second/microsecond
/// confusion at the boundary.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Longest accepted stay: 2 years.
pub const MAX_STAY_DURATION_MS: Ms = 2 * 365 * 24 * 3_600_000;

/// Widest availability-search window: 5 years.
pub const MAX_QUERY_WINDOW_MS: Ms = 5 * 365 * 24 * 3_600_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_URL_LEN: usize = 2048;

pub const MAX_HOTELS: usize = 10_000;
pub const MAX_ROOMS: usize = 1_000_000;
pub const MAX_CUSTOMERS: usize = 1_000_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 10_000;
