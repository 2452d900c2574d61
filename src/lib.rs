//! Hotel reservation engine: WAL-backed durability, interval conflict
//! detection over half-open stays, and mirrored room/customer views kept
//! consistent by a single booking coordinator.

pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
