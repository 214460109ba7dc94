use chrono::NaiveDate;
use diesel::prelude::*;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{Event, EventChanges, EventDraft};
use crate::schema::{attendance, events};
use crate::store;

pub fn create(conn: &mut SqliteConnection, draft: &EventDraft) -> Result<i32> {
    let id = diesel::insert_into(events::table)
        .values(draft.as_insert(store::now()))
        .returning(events::id)
        .get_result(conn)?;
    info!(event_id = id, name = %draft.name_tc, "created event");
    Ok(id)
}

pub fn get(conn: &mut SqliteConnection, id: i32) -> Result<Event> {
    events::table
        .find(id)
        .select(Event::as_select())
        .first(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => Error::EventNotFound(id),
            err => Error::Database(err),
        })
}

pub fn find_by_external_id(conn: &mut SqliteConnection, external_id: &str) -> Result<Option<Event>> {
    Ok(events::table
        .filter(events::external_id.eq(external_id))
        .select(Event::as_select())
        .first(conn)
        .optional()?)
}

pub fn list(conn: &mut SqliteConnection) -> Result<Vec<Event>> {
    Ok(events::table
        .order(events::id)
        .select(Event::as_select())
        .load(conn)?)
}

/// Applies only the fields present in `changes`.
pub fn update(conn: &mut SqliteConnection, id: i32, changes: &EventChanges) -> Result<()> {
    if changes.is_empty() {
        return exists(conn, id);
    }
    let updated = diesel::update(events::table.find(id))
        .set(changes)
        .execute(conn)?;
    if updated == 0 {
        return Err(Error::EventNotFound(id));
    }
    info!(event_id = id, "updated event");
    Ok(())
}

/// Removes the event together with its roster.
pub fn delete(conn: &mut SqliteConnection, id: i32) -> Result<()> {
    conn.transaction::<_, Error, _>(|conn| {
        let roster = diesel::delete(attendance::table.filter(attendance::event_id.eq(id)))
            .execute(conn)?;
        let deleted = diesel::delete(events::table.find(id)).execute(conn)?;
        if deleted == 0 {
            return Err(Error::EventNotFound(id));
        }
        info!(event_id = id, roster_rows = roster, "deleted event");
        Ok(())
    })
}

/// Events starting on or after `today`, soonest first.
pub fn upcoming(conn: &mut SqliteConnection, today: NaiveDate, limit: i64) -> Result<Vec<Event>> {
    Ok(events::table
        .filter(events::start_date.ge(today))
        .order((events::start_date, events::id))
        .limit(limit)
        .select(Event::as_select())
        .load(conn)?)
}

pub(crate) fn exists(conn: &mut SqliteConnection, id: i32) -> Result<()> {
    let found: i64 = events::table
        .filter(events::id.eq(id))
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(Error::EventNotFound(id));
    }
    Ok(())
}
