use crate::schema::*;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde_derive::Serialize;

#[derive(Clone, Debug, Identifiable, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Event {
    pub id: i32,
    pub external_id: Option<String>,
    pub name_tc: String,
    pub name_en: Option<String>,
    pub description_tc: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub location_address_tc: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub quota: Option<i32>,
    pub organizer_tc: Option<String>,
    pub activity_nature_tc: Option<String>,
    pub sessions: String,
    pub thumbnail_url: Option<String>,
    pub created_at: NaiveDateTime,
}

/// An event as submitted by an operator or derived from a feed record.
///
/// `created_at` is stamped by the store, not by the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventDraft {
    pub external_id: Option<String>,
    pub name_tc: String,
    pub name_en: Option<String>,
    pub description_tc: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub location_address_tc: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub quota: Option<i32>,
    pub organizer_tc: Option<String>,
    pub activity_nature_tc: Option<String>,
    pub sessions: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
pub(crate) struct NewEvent<'a> {
    pub external_id: Option<&'a str>,
    pub name_tc: &'a str,
    pub name_en: Option<&'a str>,
    pub description_tc: Option<&'a str>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub location_address_tc: Option<&'a str>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub quota: Option<i32>,
    pub organizer_tc: Option<&'a str>,
    pub activity_nature_tc: Option<&'a str>,
    pub sessions: &'a str,
    pub thumbnail_url: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

impl EventDraft {
    pub(crate) fn as_insert(&self, created_at: NaiveDateTime) -> NewEvent<'_> {
        NewEvent {
            external_id: self.external_id.as_deref(),
            name_tc: &self.name_tc,
            name_en: self.name_en.as_deref(),
            description_tc: self.description_tc.as_deref(),
            start_date: self.start_date,
            end_date: self.end_date,
            start_at: self.start_at,
            end_at: self.end_at,
            location_address_tc: self.location_address_tc.as_deref(),
            location_lat: self.location_lat,
            location_lng: self.location_lng,
            quota: self.quota,
            organizer_tc: self.organizer_tc.as_deref(),
            activity_nature_tc: self.activity_nature_tc.as_deref(),
            sessions: self.sessions.as_deref().unwrap_or("[]"),
            thumbnail_url: self.thumbnail_url.as_deref(),
            created_at,
        }
    }

    /// The columns this feed record carries. Anything the record left out
    /// stays `None` so the stored value is kept.
    pub(crate) fn as_feed_changes(&self) -> EventChanges {
        EventChanges {
            name_tc: Some(self.name_tc.clone()),
            name_en: self.name_en.clone().map(Some),
            description_tc: self.description_tc.clone().map(Some),
            start_date: self.start_date.map(Some),
            end_date: self.end_date.map(Some),
            start_at: self.start_at.map(Some),
            end_at: self.end_at.map(Some),
            location_address_tc: self.location_address_tc.clone().map(Some),
            location_lat: self.location_lat.map(Some),
            location_lng: self.location_lng.map(Some),
            quota: self.quota.map(Some),
            organizer_tc: self.organizer_tc.clone().map(Some),
            activity_nature_tc: self.activity_nature_tc.clone().map(Some),
            sessions: self.sessions.clone(),
            thumbnail_url: self.thumbnail_url.clone().map(Some),
        }
    }
}

/// Partial update of an event.
///
/// `None` leaves a column untouched. For nullable columns `Some(None)`
/// clears the value.
#[derive(AsChangeset, Clone, Debug, Default, PartialEq)]
#[diesel(table_name = events)]
pub struct EventChanges {
    pub name_tc: Option<String>,
    pub name_en: Option<Option<String>>,
    pub description_tc: Option<Option<String>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub start_at: Option<Option<NaiveDateTime>>,
    pub end_at: Option<Option<NaiveDateTime>>,
    pub location_address_tc: Option<Option<String>>,
    pub location_lat: Option<Option<f64>>,
    pub location_lng: Option<Option<f64>>,
    pub quota: Option<Option<i32>>,
    pub organizer_tc: Option<Option<String>>,
    pub activity_nature_tc: Option<Option<String>>,
    pub sessions: Option<String>,
    pub thumbnail_url: Option<Option<String>>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, Identifiable, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Student {
    pub id: i32,
    pub name: String,
    pub contact: String,
    pub address: Option<String>,
    pub english_name: Option<String>,
    pub region: Option<String>,
    pub school: Option<String>,
    pub remarks: Option<String>,
    pub registered_at: NaiveDateTime,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudentDraft {
    pub name: String,
    pub contact: String,
    pub address: Option<String>,
    pub english_name: Option<String>,
    pub region: Option<String>,
    pub school: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = students)]
pub(crate) struct NewStudent<'a> {
    pub name: &'a str,
    pub contact: &'a str,
    pub address: Option<&'a str>,
    pub english_name: Option<&'a str>,
    pub region: Option<&'a str>,
    pub school: Option<&'a str>,
    pub remarks: Option<&'a str>,
    pub registered_at: NaiveDateTime,
}

impl StudentDraft {
    pub(crate) fn as_insert(&self, registered_at: NaiveDateTime) -> NewStudent<'_> {
        NewStudent {
            name: &self.name,
            contact: &self.contact,
            address: self.address.as_deref(),
            english_name: self.english_name.as_deref(),
            region: self.region.as_deref(),
            school: self.school.as_deref(),
            remarks: self.remarks.as_deref(),
            registered_at,
        }
    }
}

#[derive(AsChangeset, Clone, Debug, Default, PartialEq)]
#[diesel(table_name = students)]
pub struct StudentChanges {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub address: Option<Option<String>>,
    pub english_name: Option<Option<String>>,
    pub region: Option<Option<String>>,
    pub school: Option<Option<String>>,
    pub remarks: Option<Option<String>>,
}

impl StudentChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(
    Associations, Clone, Debug, Identifiable, Insertable, PartialEq, Queryable, Selectable, Serialize,
)]
#[diesel(table_name = attendance)]
#[diesel(primary_key(event_id, student_id))]
#[diesel(belongs_to(Event))]
#[diesel(belongs_to(Student))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Attendance {
    pub event_id: i32,
    pub student_id: i32,
    pub attended: bool,
    pub updated_at: NaiveDateTime,
}

/// A roster row joined with the registered student's name.
#[derive(Clone, Debug, PartialEq, Queryable, Serialize)]
pub struct RosterEntry {
    pub student_id: i32,
    pub name: String,
    pub attended: bool,
    pub updated_at: NaiveDateTime,
}

/// One event in a student's attendance history.
#[derive(Clone, Debug, PartialEq, Queryable, Serialize)]
pub struct HistoryEntry {
    pub event_id: i32,
    pub event_name: String,
    pub start_date: Option<NaiveDate>,
    pub attended: bool,
}
