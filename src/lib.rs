//! Event, student and attendance records for a community center, backed by a
//! single SQLite file and fed partly from a public activity API.

pub mod attendance;
pub mod error;
pub mod events;
pub mod export;
pub mod feed;
pub mod ingest;
pub mod models;
pub mod reports;
pub mod roster;
pub mod schema;
pub mod settings;
pub mod store;
pub mod students;

#[cfg(test)]
mod fixtures;

pub use crate::error::{Error, Result};
pub use crate::models::{
    Attendance, Event, EventChanges, EventDraft, HistoryEntry, RosterEntry, Student,
    StudentChanges, StudentDraft,
};
