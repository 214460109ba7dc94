use chrono::NaiveDate;

use crate::models::{EventDraft, StudentDraft};

pub(crate) fn make_test_event(name: &str) -> EventDraft {
    EventDraft {
        name_tc: name.to_owned(),
        name_en: Some("Harbour walk".to_owned()),
        description_tc: Some("Guided walk".to_owned()),
        start_date: NaiveDate::from_ymd_opt(2025, 3, 20),
        end_date: NaiveDate::from_ymd_opt(2025, 3, 20),
        location_address_tc: Some("Tung Chung".to_owned()),
        quota: Some(20),
        organizer_tc: Some("Community Center".to_owned()),
        ..EventDraft::default()
    }
}

pub(crate) fn make_test_student(name: &str) -> StudentDraft {
    StudentDraft {
        name: name.to_owned(),
        contact: "9123 4567".to_owned(),
        region: Some("Tung Chung".to_owned()),
        school: Some("Tung Chung Primary".to_owned()),
        ..StudentDraft::default()
    }
}
