use diesel::prelude::*;
use serde_derive::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::HistoryEntry;
use crate::schema::{attendance, events};
use crate::store;
use crate::students;

/// Marks a registered student as attended (or not) for an event.
///
/// Attendance can only be recorded for students on the event's roster; no
/// row is ever created here.
pub fn set_attended(
    conn: &mut SqliteConnection,
    event_id: i32,
    student_id: i32,
    attended: bool,
) -> Result<()> {
    let updated = diesel::update(attendance::table.find((event_id, student_id)))
        .set((
            attendance::attended.eq(attended),
            attendance::updated_at.eq(store::now()),
        ))
        .execute(conn)?;
    if updated == 0 {
        return Err(Error::NotRegistered {
            event_id,
            student_id,
        });
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceReport {
    pub applied: usize,
    pub skipped: Vec<i32>,
}

/// Applies a batch of attendance marks. Students who are not on the roster
/// are skipped and reported rather than failing the batch.
pub fn apply_attendance(
    conn: &mut SqliteConnection,
    event_id: i32,
    marks: &[(i32, bool)],
) -> Result<AttendanceReport> {
    conn.transaction::<_, Error, _>(|conn| {
        let mut report = AttendanceReport::default();
        for &(student_id, attended) in marks {
            match set_attended(conn, event_id, student_id, attended) {
                Ok(()) => report.applied += 1,
                Err(Error::NotRegistered { .. }) => {
                    warn!(event_id, student_id, "skipping attendance for unregistered student");
                    report.skipped.push(student_id);
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            event_id,
            applied = report.applied,
            skipped = report.skipped.len(),
            "recorded attendance"
        );
        Ok(report)
    })
}

#[derive(Debug, PartialEq, Serialize)]
pub struct StudentHistory {
    pub registered: usize,
    pub attended: usize,
    pub events: Vec<HistoryEntry>,
}

/// Every event a student is registered for, with the attended flag.
pub fn history(conn: &mut SqliteConnection, student_id: i32) -> Result<StudentHistory> {
    students::get(conn, student_id)?;
    let events: Vec<HistoryEntry> = attendance::table
        .inner_join(events::table)
        .filter(attendance::student_id.eq(student_id))
        .order((events::start_date, events::id))
        .select((
            events::id,
            events::name_tc,
            events::start_date,
            attendance::attended,
        ))
        .load(conn)?;
    Ok(StudentHistory {
        registered: events.len(),
        attended: events.iter().filter(|e| e.attended).count(),
        events,
    })
}
