//! Shared domain types for BuilderHub.
//!
//! Everything in this crate is pure: no I/O, no async. The main crate's
//! gateway, real-time adapter and dashboard controller all exchange these
//! types.

pub mod models;
pub mod stats;
pub mod time;

pub use models::{BoardView, ColumnView, Entity, Project, Task, TaskStatus, User};
pub use stats::{ActivityEntry, ActivityKind, DashboardStatistics, project_task_counts};
