diesel::table! {
    events (id) {
        id -> Integer,
        external_id -> Nullable<Text>,
        name_tc -> Text,
        name_en -> Nullable<Text>,
        description_tc -> Nullable<Text>,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
        start_at -> Nullable<Timestamp>,
        end_at -> Nullable<Timestamp>,
        location_address_tc -> Nullable<Text>,
        location_lat -> Nullable<Double>,
        location_lng -> Nullable<Double>,
        quota -> Nullable<Integer>,
        organizer_tc -> Nullable<Text>,
        activity_nature_tc -> Nullable<Text>,
        sessions -> Text,
        thumbnail_url -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    students (id) {
        id -> Integer,
        name -> Text,
        contact -> Text,
        address -> Nullable<Text>,
        english_name -> Nullable<Text>,
        region -> Nullable<Text>,
        school -> Nullable<Text>,
        remarks -> Nullable<Text>,
        registered_at -> Timestamp,
    }
}

diesel::table! {
    attendance (event_id, student_id) {
        event_id -> Integer,
        student_id -> Integer,
        attended -> Bool,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(attendance -> events (event_id));
diesel::joinable!(attendance -> students (student_id));

diesel::allow_tables_to_appear_in_same_query!(events, students, attendance,);
