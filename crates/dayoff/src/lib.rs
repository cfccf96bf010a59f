//! Day-off scheduling core.
//!
//! Employees submit monthly day-off selections that must satisfy a set of
//! cross-employee quotas. Submissions are serialized through a single
//! system-wide lease so that the aggregate reads performed during validation
//! are never stale by the time the schedule is written.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
