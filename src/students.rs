use diesel::prelude::*;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{Student, StudentChanges, StudentDraft};
use crate::schema::{attendance, students};
use crate::store;

pub fn create(conn: &mut SqliteConnection, draft: &StudentDraft) -> Result<i32> {
    let id = diesel::insert_into(students::table)
        .values(draft.as_insert(store::now()))
        .returning(students::id)
        .get_result(conn)?;
    info!(student_id = id, "registered student");
    Ok(id)
}

pub fn get(conn: &mut SqliteConnection, id: i32) -> Result<Student> {
    students::table
        .find(id)
        .select(Student::as_select())
        .first(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => Error::StudentNotFound(id),
            err => Error::Database(err),
        })
}

pub fn list(conn: &mut SqliteConnection) -> Result<Vec<Student>> {
    Ok(students::table
        .order(students::id)
        .select(Student::as_select())
        .load(conn)?)
}

pub fn update(conn: &mut SqliteConnection, id: i32, changes: &StudentChanges) -> Result<()> {
    if changes.is_empty() {
        get(conn, id)?;
        return Ok(());
    }
    let updated = diesel::update(students::table.find(id))
        .set(changes)
        .execute(conn)?;
    if updated == 0 {
        return Err(Error::StudentNotFound(id));
    }
    info!(student_id = id, "updated student");
    Ok(())
}

/// Removes the student and every roster row that names them.
pub fn delete(conn: &mut SqliteConnection, id: i32) -> Result<()> {
    conn.transaction::<_, Error, _>(|conn| {
        let roster = diesel::delete(attendance::table.filter(attendance::student_id.eq(id)))
            .execute(conn)?;
        let deleted = diesel::delete(students::table.find(id)).execute(conn)?;
        if deleted == 0 {
            return Err(Error::StudentNotFound(id));
        }
        info!(student_id = id, roster_rows = roster, "deleted student");
        Ok(())
    })
}

/// Returns the subset of `ids` with no student row.
pub(crate) fn missing<'a>(
    conn: &mut SqliteConnection,
    ids: impl IntoIterator<Item = &'a i32>,
) -> Result<Vec<i32>> {
    let ids: Vec<i32> = ids.into_iter().copied().collect();
    let known: Vec<i32> = students::table
        .filter(students::id.eq_any(&ids))
        .select(students::id)
        .load(conn)?;
    Ok(ids.into_iter().filter(|id| !known.contains(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::fixtures::{make_test_event, make_test_student};
    use crate::roster::{reconcile, roster_ids};
    use crate::store::connect_in_memory;
    use std::collections::BTreeSet;

    #[test]
    fn test_create_and_get() {
        let mut conn = connect_in_memory().unwrap();
        let id = create(&mut conn, &make_test_student("陳大文")).unwrap();

        let student = get(&mut conn, id).unwrap();
        assert_eq!(student.name, "陳大文");
        assert_eq!(student.contact, "9123 4567");
        assert_eq!(student.address, None);
        assert_eq!(student.region.as_deref(), Some("Tung Chung"));
    }

    #[test]
    fn test_duplicate_names_are_allowed() {
        let mut conn = connect_in_memory().unwrap();
        let first = create(&mut conn, &make_test_student("陳大文")).unwrap();
        let second = create(&mut conn, &make_test_student("陳大文")).unwrap();

        assert_ne!(first, second);
        assert_eq!(list(&mut conn).unwrap().len(), 2);
    }

    #[test]
    fn test_partial_update() {
        let mut conn = connect_in_memory().unwrap();
        let id = create(&mut conn, &make_test_student("陳大文")).unwrap();
        let before = get(&mut conn, id).unwrap();

        let changes = StudentChanges {
            english_name: Some(Some("Tai Man".to_owned())),
            remarks: Some(Some("Allergic to peanuts".to_owned())),
            ..StudentChanges::default()
        };
        update(&mut conn, id, &changes).unwrap();

        let after = get(&mut conn, id).unwrap();
        assert_eq!(
            Student {
                english_name: Some("Tai Man".to_owned()),
                remarks: Some("Allergic to peanuts".to_owned()),
                ..before
            },
            after
        );
    }

    #[test]
    fn test_update_missing_student() {
        let mut conn = connect_in_memory().unwrap();
        let changes = StudentChanges {
            name: Some("Nobody".to_owned()),
            ..StudentChanges::default()
        };
        assert!(matches!(
            update(&mut conn, 3, &changes),
            Err(Error::StudentNotFound(3))
        ));
        assert!(matches!(
            update(&mut conn, 3, &StudentChanges::default()),
            Err(Error::StudentNotFound(3))
        ));
    }

    #[test]
    fn test_delete_cascades_to_roster() {
        let mut conn = connect_in_memory().unwrap();
        let event_id = events::create(&mut conn, &make_test_event("海濱漫步")).unwrap();
        let leaving = create(&mut conn, &make_test_student("陳大文")).unwrap();
        let staying = create(&mut conn, &make_test_student("李小明")).unwrap();
        reconcile(&mut conn, event_id, &BTreeSet::from([leaving, staying])).unwrap();

        delete(&mut conn, leaving).unwrap();

        assert!(matches!(get(&mut conn, leaving), Err(Error::StudentNotFound(_))));
        assert_eq!(
            roster_ids(&mut conn, event_id).unwrap(),
            BTreeSet::from([staying])
        );
    }

    #[test]
    fn test_delete_missing_student() {
        let mut conn = connect_in_memory().unwrap();
        assert!(matches!(delete(&mut conn, 9), Err(Error::StudentNotFound(9))));
    }

    #[test]
    fn test_missing_ids() {
        let mut conn = connect_in_memory().unwrap();
        let id = create(&mut conn, &make_test_student("陳大文")).unwrap();

        assert_eq!(missing(&mut conn, &[id, id + 1]).unwrap(), vec![id + 1]);
        assert!(missing(&mut conn, &[]).unwrap().is_empty());
    }
}
