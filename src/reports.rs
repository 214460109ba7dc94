use diesel::prelude::*;
use serde_derive::Serialize;

use crate::error::Result;
use crate::schema::{events, students};

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_students: i64,
    pub total_events: i64,
}

pub fn summary(conn: &mut SqliteConnection) -> Result<Summary> {
    Ok(Summary {
        total_students: students::table.count().get_result(conn)?,
        total_events: events::table.count().get_result(conn)?,
    })
}
