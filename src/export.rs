//! Spreadsheet export: one worksheet per relation, a header row of column
//! names, then one row per record.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::info;

use crate::error::Result;
use crate::models::{Attendance, Event, Student};
use crate::schema::attendance;
use crate::{events, students};

/// A read-only copy of every relation in the store.
#[derive(Debug)]
pub struct Snapshot {
    pub events: Vec<Event>,
    pub students: Vec<Student>,
    pub attendance: Vec<Attendance>,
}

pub fn snapshot(conn: &mut SqliteConnection) -> Result<Snapshot> {
    Ok(Snapshot {
        events: events::list(conn)?,
        students: students::list(conn)?,
        attendance: attendance::table
            .order((attendance::event_id, attendance::student_id))
            .select(Attendance::as_select())
            .load(conn)?,
    })
}

enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Blank,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Cell {
        Cell::Text(value.to_owned())
    }
}

impl From<Option<&str>> for Cell {
    fn from(value: Option<&str>) -> Cell {
        value.map_or(Cell::Blank, Cell::from)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Cell {
        Cell::Number(value.into())
    }
}

impl From<Option<i32>> for Cell {
    fn from(value: Option<i32>) -> Cell {
        value.map_or(Cell::Blank, Cell::from)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Cell {
        value.map_or(Cell::Blank, Cell::Number)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Cell {
        Cell::Bool(value)
    }
}

impl From<Option<NaiveDate>> for Cell {
    fn from(value: Option<NaiveDate>) -> Cell {
        value.map_or(Cell::Blank, |day| Cell::Text(day.to_string()))
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Cell {
        Cell::Text(value.to_string())
    }
}

impl From<Option<NaiveDateTime>> for Cell {
    fn from(value: Option<NaiveDateTime>) -> Cell {
        value.map_or(Cell::Blank, Cell::from)
    }
}

/// A record that fills one worksheet row.
trait SheetRow {
    const SHEET: &'static str;
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<Cell>;
}

impl SheetRow for Event {
    const SHEET: &'static str = "Events";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "external_id",
        "name_tc",
        "name_en",
        "description_tc",
        "start_date",
        "end_date",
        "start_at",
        "end_at",
        "location_address_tc",
        "location_lat",
        "location_lng",
        "quota",
        "organizer_tc",
        "activity_nature_tc",
        "sessions",
        "thumbnail_url",
        "created_at",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.id.into(),
            self.external_id.as_deref().into(),
            self.name_tc.as_str().into(),
            self.name_en.as_deref().into(),
            self.description_tc.as_deref().into(),
            self.start_date.into(),
            self.end_date.into(),
            self.start_at.into(),
            self.end_at.into(),
            self.location_address_tc.as_deref().into(),
            self.location_lat.into(),
            self.location_lng.into(),
            self.quota.into(),
            self.organizer_tc.as_deref().into(),
            self.activity_nature_tc.as_deref().into(),
            self.sessions.as_str().into(),
            self.thumbnail_url.as_deref().into(),
            self.created_at.into(),
        ]
    }
}

impl SheetRow for Student {
    const SHEET: &'static str = "Students";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "contact",
        "address",
        "english_name",
        "region",
        "school",
        "remarks",
        "registered_at",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.id.into(),
            self.name.as_str().into(),
            self.contact.as_str().into(),
            self.address.as_deref().into(),
            self.english_name.as_deref().into(),
            self.region.as_deref().into(),
            self.school.as_deref().into(),
            self.remarks.as_deref().into(),
            self.registered_at.into(),
        ]
    }
}

impl SheetRow for Attendance {
    const SHEET: &'static str = "Attendance";
    const COLUMNS: &'static [&'static str] = &["event_id", "student_id", "attended", "updated_at"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.event_id.into(),
            self.student_id.into(),
            self.attended.into(),
            self.updated_at.into(),
        ]
    }
}

fn write_sheet<T: SheetRow>(worksheet: &mut Worksheet, rows: &[T]) -> Result<()> {
    worksheet.set_name(T::SHEET)?;
    for (col, name) in (0u16..).zip(T::COLUMNS) {
        worksheet.write_string(0, col, *name)?;
    }
    for (row, record) in (1u32..).zip(rows) {
        for (col, cell) in (0u16..).zip(record.cells()) {
            match cell {
                Cell::Text(text) => worksheet.write_string(row, col, text)?,
                Cell::Number(number) => worksheet.write_number(row, col, number)?,
                Cell::Bool(flag) => worksheet.write_boolean(row, col, flag)?,
                Cell::Blank => continue,
            };
        }
    }
    Ok(())
}

/// Writes the snapshot as an `.xlsx` workbook at `path`.
pub fn write_snapshot(conn: &mut SqliteConnection, path: &Path) -> Result<Snapshot> {
    let snapshot = snapshot(conn)?;
    let mut workbook = Workbook::new();
    write_sheet(workbook.add_worksheet(), &snapshot.events)?;
    write_sheet(workbook.add_worksheet(), &snapshot.students)?;
    write_sheet(workbook.add_worksheet(), &snapshot.attendance)?;
    workbook.save(path)?;
    info!(
        path = %path.display(),
        events = snapshot.events.len(),
        students = snapshot.students.len(),
        attendance = snapshot.attendance.len(),
        "exported snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use calamine::{open_workbook, Data, Reader, Xlsx};

    use super::*;
    use crate::fixtures::{make_test_event, make_test_student};
    use crate::roster::reconcile;
    use crate::store::connect_in_memory;

    fn text(value: &str) -> Data {
        Data::String(value.to_owned())
    }

    #[test]
    fn test_write_snapshot_has_one_sheet_per_relation() {
        let mut conn = connect_in_memory().unwrap();
        let event_id = events::create(&mut conn, &make_test_event("海濱漫步")).unwrap();
        let student_id = students::create(&mut conn, &make_test_student("陳大文")).unwrap();
        reconcile(&mut conn, event_id, &BTreeSet::from([student_id])).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("community_data.xlsx");
        write_snapshot(&mut conn, &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["Events".to_owned(), "Students".to_owned(), "Attendance".to_owned()]
        );

        let events = workbook.worksheet_range("Events").unwrap();
        assert_eq!(events.height(), 2);
        assert_eq!(events.get((0, 2)), Some(&text("name_tc")));
        assert_eq!(events.get((1, 2)), Some(&text("海濱漫步")));
        assert_eq!(events.get((1, 5)), Some(&text("2025-03-20")));
        assert_eq!(events.get((1, 12)), Some(&Data::Float(20.0)));

        let students = workbook.worksheet_range("Students").unwrap();
        assert_eq!(students.height(), 2);
        assert_eq!(students.get((1, 1)), Some(&text("陳大文")));

        let attendance = workbook.worksheet_range("Attendance").unwrap();
        assert_eq!(attendance.height(), 2);
        assert_eq!(attendance.get((0, 2)), Some(&text("attended")));
        assert_eq!(attendance.get((1, 0)), Some(&Data::Float(event_id.into())));
        assert_eq!(attendance.get((1, 1)), Some(&Data::Float(student_id.into())));
        assert_eq!(attendance.get((1, 2)), Some(&Data::Bool(false)));
    }

    #[test]
    fn test_empty_store_still_writes_headers() {
        let mut conn = connect_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let snapshot = write_snapshot(&mut conn, &path).unwrap();
        assert!(snapshot.events.is_empty());
        assert!(snapshot.students.is_empty());
        assert!(snapshot.attendance.is_empty());

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let students = workbook.worksheet_range("Students").unwrap();
        assert_eq!(students.height(), 1);
        assert_eq!(students.get((0, 0)), Some(&text("id")));
    }
}
