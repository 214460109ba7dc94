//! Registration reconciliation.
//!
//! The operator edits an event's roster as a whole selection. Saving that
//! selection converges the stored attendance rows to exactly the selected
//! students: rows for students no longer selected are removed, rows for newly
//! selected students are added unattended, and rows for students who stay on
//! the roster are left alone so their attendance marks survive.

use std::collections::BTreeSet;

use diesel::prelude::*;
use serde_derive::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events;
use crate::models::{Attendance, RosterEntry};
use crate::schema::{attendance, students};
use crate::store;
use crate::students as student_store;

/// The changes needed to turn one roster into another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RosterPlan {
    pub to_remove: BTreeSet<i32>,
    pub to_add: BTreeSet<i32>,
    pub retained: BTreeSet<i32>,
}

impl RosterPlan {
    pub fn between(current: &BTreeSet<i32>, target: &BTreeSet<i32>) -> RosterPlan {
        RosterPlan {
            to_remove: current.difference(target).copied().collect(),
            to_add: target.difference(current).copied().collect(),
            retained: current.intersection(target).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

pub fn roster_ids(conn: &mut SqliteConnection, event_id: i32) -> Result<BTreeSet<i32>> {
    let ids: Vec<i32> = attendance::table
        .filter(attendance::event_id.eq(event_id))
        .select(attendance::student_id)
        .load(conn)?;
    Ok(ids.into_iter().collect())
}

/// Makes the roster of `event_id` exactly `target`, in one transaction.
pub fn reconcile(
    conn: &mut SqliteConnection,
    event_id: i32,
    target: &BTreeSet<i32>,
) -> Result<RosterPlan> {
    conn.transaction::<_, Error, _>(|conn| {
        events::exists(conn, event_id)?;
        if let Some(&unknown) = student_store::missing(conn, target)?.first() {
            return Err(Error::StudentNotFound(unknown));
        }

        let current = roster_ids(conn, event_id)?;
        let plan = RosterPlan::between(&current, target);
        if plan.is_empty() {
            debug!(event_id, "roster already matches selection");
            return Ok(plan);
        }

        if !plan.to_remove.is_empty() {
            diesel::delete(
                attendance::table
                    .filter(attendance::event_id.eq(event_id))
                    .filter(attendance::student_id.eq_any(&plan.to_remove)),
            )
            .execute(conn)?;
        }

        let now = store::now();
        for &student_id in &plan.to_add {
            diesel::insert_into(attendance::table)
                .values(Attendance {
                    event_id,
                    student_id,
                    attended: false,
                    updated_at: now,
                })
                .execute(conn)?;
        }

        info!(
            event_id,
            added = plan.to_add.len(),
            removed = plan.to_remove.len(),
            retained = plan.retained.len(),
            "reconciled roster"
        );
        Ok(plan)
    })
}

/// The roster of an event with student names, ordered by student id.
pub fn roster(conn: &mut SqliteConnection, event_id: i32) -> Result<Vec<RosterEntry>> {
    events::exists(conn, event_id)?;
    Ok(attendance::table
        .inner_join(students::table)
        .filter(attendance::event_id.eq(event_id))
        .order(students::id)
        .select((
            students::id,
            students::name,
            attendance::attended,
            attendance::updated_at,
        ))
        .load(conn)?)
}
