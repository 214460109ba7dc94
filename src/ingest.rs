//! Upserting activity-feed records into the event store.
//!
//! Records are handled one at a time: a record that cannot be mapped is
//! skipped with a warning and the rest of the batch still goes in.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::EventDraft;
use crate::schema::events;
use crate::store;

/// What to do when a feed record's external id is already stored.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IngestPolicy {
    /// Leave the stored row exactly as it is.
    #[default]
    KeepFirst,
    /// Overwrite the columns the record supplies. Columns it leaves out,
    /// `id`, `created_at` and the roster are never touched.
    Refresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyExists,
    Refreshed,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub already_present: usize,
    pub refreshed: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedRecord {
    #[serde(rename = "subActivityCode")]
    pub sub_activity_code: Option<String>,
    #[serde(rename = "activityCode")]
    pub activity_code: Option<String>,
    pub name_tc: Option<String>,
    pub name_en: Option<String>,
    pub description_tc: Option<String>,
    pub sessions: Option<Vec<Value>>,
    #[serde(rename = "locationAddress_tc")]
    pub location_address_tc: Option<String>,
    #[serde(rename = "locationLatLng")]
    pub location_lat_lng: Option<LatLng>,
    pub quota: Option<i32>,
    #[serde(rename = "supportingOrganiserName_tc")]
    pub organiser_name_tc: Option<String>,
    #[serde(rename = "activityNature")]
    pub activity_nature: Option<ActivityNature>,
    #[serde(rename = "thumbnailUrl_tc")]
    pub thumbnail_url_tc: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct ActivityNature {
    pub name_tc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedSession {
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    #[serde(rename = "startTime")]
    start_time: Option<String>,
    #[serde(rename = "endTime")]
    end_time: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(external_id: &str, raw: &str) -> Result<NaiveDate> {
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| Error::MalformedRecord(format!("{external_id}: bad session date {raw:?}")))
}

fn parse_time(external_id: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| Error::MalformedRecord(format!("{external_id}: bad session time {raw:?}")))
}

/// Date of a session endpoint plus, when the feed gives one, its exact time.
fn session_point(
    external_id: &str,
    date: &Option<String>,
    time: &Option<String>,
) -> Result<(Option<NaiveDate>, Option<NaiveDateTime>)> {
    let Some(date) = non_empty(date) else {
        return Ok((None, None));
    };
    let date = parse_date(external_id, date)?;
    let at = match non_empty(time) {
        Some(time) => Some(date.and_time(parse_time(external_id, time)?)),
        None => None,
    };
    Ok((Some(date), at))
}

impl FeedRecord {
    /// `subActivityCode`, or `activityCode` when the former is blank.
    pub fn external_id(&self) -> Option<&str> {
        non_empty(&self.sub_activity_code).or_else(|| non_empty(&self.activity_code))
    }

    pub fn to_draft(&self) -> Result<EventDraft> {
        let external_id = self
            .external_id()
            .ok_or_else(|| Error::MalformedRecord("record has no activity code".to_owned()))?;
        let name_tc = non_empty(&self.name_tc)
            .ok_or_else(|| Error::MalformedRecord(format!("{external_id}: missing name_tc")))?;

        let sessions = self.sessions.as_deref().unwrap_or_default();
        let first = match sessions.first() {
            Some(session) => serde_json::from_value::<FeedSession>(session.clone()).map_err(
                |err| Error::MalformedRecord(format!("{external_id}: bad session: {err}")),
            )?,
            None => FeedSession::default(),
        };
        let (start_date, start_at) =
            session_point(external_id, &first.start_date, &first.start_time)?;
        let (end_date, end_at) = session_point(external_id, &first.end_date, &first.end_time)?;

        Ok(EventDraft {
            external_id: Some(external_id.to_owned()),
            name_tc: name_tc.to_owned(),
            name_en: self.name_en.clone(),
            description_tc: self.description_tc.clone(),
            start_date,
            end_date,
            start_at,
            end_at,
            location_address_tc: self.location_address_tc.clone(),
            location_lat: self.location_lat_lng.as_ref().map(|l| l.lat),
            location_lng: self.location_lat_lng.as_ref().map(|l| l.lng),
            quota: self.quota,
            organizer_tc: self.organiser_name_tc.clone(),
            activity_nature_tc: self
                .activity_nature
                .as_ref()
                .and_then(|nature| nature.name_tc.clone()),
            sessions: self.sessions.as_ref().map(serde_json::to_string).transpose()?,
            thumbnail_url: self.thumbnail_url_tc.clone(),
        })
    }
}

/// Inserts the event unless its external id is already stored.
pub fn upsert(
    conn: &mut SqliteConnection,
    draft: &EventDraft,
    policy: IngestPolicy,
) -> Result<UpsertOutcome> {
    let inserted = diesel::insert_or_ignore_into(events::table)
        .values(draft.as_insert(store::now()))
        .execute(conn)?;
    if inserted > 0 {
        return Ok(UpsertOutcome::Inserted);
    }

    match (policy, draft.external_id.as_deref()) {
        (IngestPolicy::Refresh, Some(external_id)) => {
            diesel::update(events::table.filter(events::external_id.eq(external_id)))
                .set(draft.as_feed_changes())
                .execute(conn)?;
            Ok(UpsertOutcome::Refreshed)
        }
        _ => Ok(UpsertOutcome::AlreadyExists),
    }
}

/// Upserts each feed record; returns how many were new, already stored,
/// refreshed or skipped.
pub fn ingest(
    conn: &mut SqliteConnection,
    records: &[Value],
    policy: IngestPolicy,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for record in records {
        let draft = match serde_json::from_value::<FeedRecord>(record.clone())
            .map_err(|err| Error::MalformedRecord(err.to_string()))
            .and_then(|record| record.to_draft())
        {
            Ok(draft) => draft,
            Err(Error::MalformedRecord(reason)) => {
                warn!(%reason, "skipping feed record");
                report.skipped.push(reason);
                continue;
            }
            Err(err) => return Err(err),
        };
        match upsert(conn, &draft, policy)? {
            UpsertOutcome::Inserted => report.inserted += 1,
            UpsertOutcome::AlreadyExists => report.already_present += 1,
            UpsertOutcome::Refreshed => report.refreshed += 1,
        }
    }
    info!(
        inserted = report.inserted,
        already_present = report.already_present,
        refreshed = report.refreshed,
        skipped = report.skipped.len(),
        "ingested activity feed"
    );
    Ok(report)
}
