use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use diesel::SqliteConnection;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use community_center::feed::{self, FeedClient};
use community_center::ingest::{self, IngestPolicy};
use community_center::settings::Settings;
use community_center::{
    attendance, events, export, reports, roster, store, students, EventChanges, EventDraft,
    StudentChanges, StudentDraft,
};

#[derive(Parser)]
#[command(name = "community-center")]
#[command(about = "Manage community center events, students and attendance")]
struct Cli {
    /// Settings file (json, toml, yaml...); missing is fine
    #[arg(long, default_value = "settings")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the activity feed and store new events
    Ingest {
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Store events from a saved feed response
    IngestFile {
        path: PathBuf,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    #[command(subcommand)]
    Event(EventCommand),
    #[command(subcommand)]
    Student(StudentCommand),
    #[command(subcommand)]
    Roster(RosterCommand),
    /// Mark one registered student as attended (or absent with --absent)
    Attend {
        event_id: i32,
        student_id: i32,
        #[arg(long)]
        absent: bool,
    },
    /// Record attendance for several students: STUDENT_ID=true|false
    AttendMany {
        event_id: i32,
        #[arg(value_parser = parse_mark, required = true)]
        marks: Vec<(i32, bool)>,
    },
    /// Write every event, student and attendance row to an .xlsx workbook
    Export {
        #[arg(default_value = "community_data.xlsx")]
        path: PathBuf,
    },
    /// Totals and the next few events
    Stats {
        #[arg(long, default_value_t = 5)]
        upcoming: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    KeepFirst,
    Refresh,
}

impl From<PolicyArg> for IngestPolicy {
    fn from(policy: PolicyArg) -> IngestPolicy {
        match policy {
            PolicyArg::KeepFirst => IngestPolicy::KeepFirst,
            PolicyArg::Refresh => IngestPolicy::Refresh,
        }
    }
}

#[derive(Subcommand)]
enum EventCommand {
    List,
    Show { id: i32 },
    Create(EventFields),
    Update {
        id: i32,
        #[command(flatten)]
        fields: EventFields,
        /// Clear an optional field
        #[arg(long, value_enum)]
        clear: Vec<EventField>,
    },
    Delete { id: i32 },
    Upcoming {
        /// Defaults to today
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
}

#[derive(Args)]
struct EventFields {
    #[arg(long)]
    name_tc: Option<String>,
    #[arg(long)]
    name_en: Option<String>,
    #[arg(long)]
    description_tc: Option<String>,
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,
    #[arg(long)]
    start_at: Option<NaiveDateTime>,
    #[arg(long)]
    end_at: Option<NaiveDateTime>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    lat: Option<f64>,
    #[arg(long)]
    lng: Option<f64>,
    #[arg(long)]
    quota: Option<i32>,
    #[arg(long)]
    organizer: Option<String>,
    #[arg(long)]
    nature: Option<String>,
    /// JSON array of sessions
    #[arg(long)]
    sessions: Option<String>,
    #[arg(long)]
    thumbnail_url: Option<String>,
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum EventField {
    NameEn,
    Description,
    StartDate,
    EndDate,
    StartAt,
    EndAt,
    Location,
    Coordinates,
    Quota,
    Organizer,
    Nature,
    Thumbnail,
}

#[derive(Subcommand)]
enum StudentCommand {
    List,
    /// Profile plus attendance history
    Show { id: i32 },
    Create(StudentFields),
    Update {
        id: i32,
        #[command(flatten)]
        fields: StudentFields,
        /// Clear an optional field
        #[arg(long, value_enum)]
        clear: Vec<StudentField>,
    },
    Delete { id: i32 },
}

#[derive(Args)]
struct StudentFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    contact: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    english_name: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    school: Option<String>,
    #[arg(long)]
    remarks: Option<String>,
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum StudentField {
    Address,
    EnglishName,
    Region,
    School,
    Remarks,
}

#[derive(Subcommand)]
enum RosterCommand {
    Show {
        event_id: i32,
    },
    /// Make the roster exactly these students; attendance of students who
    /// stay is kept
    Set {
        event_id: i32,
        student_ids: Vec<i32>,
    },
}

fn parse_mark(raw: &str) -> Result<(i32, bool), String> {
    let (student, attended) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected STUDENT_ID=true|false, got {raw:?}"))?;
    let student = student
        .trim()
        .parse()
        .map_err(|_| format!("bad student id in {raw:?}"))?;
    let attended = attended
        .trim()
        .parse()
        .map_err(|_| format!("bad attended flag in {raw:?}"))?;
    Ok((student, attended))
}

/// `--clear` wins over a value given for the same field.
fn change<T>(cleared: bool, value: Option<T>) -> Option<Option<T>> {
    if cleared {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn student_changes(fields: StudentFields, clear: &[StudentField]) -> StudentChanges {
    let cleared = |field: StudentField| clear.contains(&field);
    StudentChanges {
        name: fields.name,
        contact: fields.contact,
        address: change(cleared(StudentField::Address), fields.address),
        english_name: change(cleared(StudentField::EnglishName), fields.english_name),
        region: change(cleared(StudentField::Region), fields.region),
        school: change(cleared(StudentField::School), fields.school),
        remarks: change(cleared(StudentField::Remarks), fields.remarks),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let missing = err
                .downcast_ref::<community_center::Error>()
                .is_some_and(community_center::Error::is_not_found);
            if missing {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.settings).context("loading settings")?;

    match cli.command {
        Command::Ingest { policy } => {
            let policy = policy.map(IngestPolicy::from).unwrap_or(settings.ingest_policy);
            // Fetch before opening the store so nothing is held while the feed is slow.
            let records = FeedClient::from_settings(&settings)?.fetch()?;
            let mut conn = store::connect(&settings.db_path)?;
            print_json(&ingest::ingest(&mut conn, &records, policy)?)
        }
        Command::IngestFile { path, policy } => {
            let policy = policy.map(IngestPolicy::from).unwrap_or(settings.ingest_policy);
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let records = feed::parse_document(&text)?;
            let mut conn = store::connect(&settings.db_path)?;
            print_json(&ingest::ingest(&mut conn, &records, policy)?)
        }
        Command::Event(command) => {
            let mut conn = store::connect(&settings.db_path)?;
            run_event(&mut conn, command)
        }
        Command::Student(command) => {
            let mut conn = store::connect(&settings.db_path)?;
            run_student(&mut conn, command)
        }
        Command::Roster(RosterCommand::Show { event_id }) => {
            let mut conn = store::connect(&settings.db_path)?;
            print_json(&roster::roster(&mut conn, event_id)?)
        }
        Command::Roster(RosterCommand::Set {
            event_id,
            student_ids,
        }) => {
            let mut conn = store::connect(&settings.db_path)?;
            let target: BTreeSet<i32> = student_ids.into_iter().collect();
            print_json(&roster::reconcile(&mut conn, event_id, &target)?)
        }
        Command::Attend {
            event_id,
            student_id,
            absent,
        } => {
            let mut conn = store::connect(&settings.db_path)?;
            attendance::set_attended(&mut conn, event_id, student_id, !absent)?;
            Ok(())
        }
        Command::AttendMany { event_id, marks } => {
            let mut conn = store::connect(&settings.db_path)?;
            print_json(&attendance::apply_attendance(&mut conn, event_id, &marks)?)
        }
        Command::Export { path } => {
            let mut conn = store::connect(&settings.db_path)?;
            export::write_snapshot(&mut conn, &path)?;
            Ok(())
        }
        Command::Stats { upcoming } => {
            let mut conn = store::connect(&settings.db_path)?;
            let today = Local::now().date_naive();
            print_json(&serde_json::json!({
                "summary": reports::summary(&mut conn)?,
                "upcoming": events::upcoming(&mut conn, today, upcoming)?,
            }))
        }
    }
}

fn run_event(conn: &mut SqliteConnection, command: EventCommand) -> anyhow::Result<()> {
    match command {
        EventCommand::List => print_json(&events::list(conn)?),
        EventCommand::Show { id } => print_json(&events::get(conn, id)?),
        EventCommand::Create(fields) => {
            let Some(name_tc) = fields.name_tc else {
                bail!("--name-tc is required to create an event");
            };
            let draft = EventDraft {
                external_id: None,
                name_tc,
                name_en: fields.name_en,
                description_tc: fields.description_tc,
                start_date: fields.start_date,
                end_date: fields.end_date,
                start_at: fields.start_at,
                end_at: fields.end_at,
                location_address_tc: fields.location,
                location_lat: fields.lat,
                location_lng: fields.lng,
                quota: fields.quota,
                organizer_tc: fields.organizer,
                activity_nature_tc: fields.nature,
                sessions: fields.sessions,
                thumbnail_url: fields.thumbnail_url,
            };
            println!("{}", events::create(conn, &draft)?);
            Ok(())
        }
        EventCommand::Update { id, fields, clear } => {
            let cleared = |field: EventField| clear.contains(&field);
            let changes = EventChanges {
                name_tc: fields.name_tc,
                name_en: change(cleared(EventField::NameEn), fields.name_en),
                description_tc: change(cleared(EventField::Description), fields.description_tc),
                start_date: change(cleared(EventField::StartDate), fields.start_date),
                end_date: change(cleared(EventField::EndDate), fields.end_date),
                start_at: change(cleared(EventField::StartAt), fields.start_at),
                end_at: change(cleared(EventField::EndAt), fields.end_at),
                location_address_tc: change(cleared(EventField::Location), fields.location),
                location_lat: change(cleared(EventField::Coordinates), fields.lat),
                location_lng: change(cleared(EventField::Coordinates), fields.lng),
                quota: change(cleared(EventField::Quota), fields.quota),
                organizer_tc: change(cleared(EventField::Organizer), fields.organizer),
                activity_nature_tc: change(cleared(EventField::Nature), fields.nature),
                sessions: fields.sessions,
                thumbnail_url: change(cleared(EventField::Thumbnail), fields.thumbnail_url),
            };
            events::update(conn, id, &changes)?;
            Ok(())
        }
        EventCommand::Delete { id } => {
            events::delete(conn, id)?;
            Ok(())
        }
        EventCommand::Upcoming { from, limit } => {
            let today = from.unwrap_or_else(|| Local::now().date_naive());
            print_json(&events::upcoming(conn, today, limit)?)
        }
    }
}

fn run_student(conn: &mut SqliteConnection, command: StudentCommand) -> anyhow::Result<()> {
    match command {
        StudentCommand::List => print_json(&students::list(conn)?),
        StudentCommand::Show { id } => print_json(&serde_json::json!({
            "student": students::get(conn, id)?,
            "history": attendance::history(conn, id)?,
        })),
        StudentCommand::Create(fields) => {
            let (Some(name), Some(contact)) = (fields.name, fields.contact) else {
                bail!("--name and --contact are required to register a student");
            };
            let draft = StudentDraft {
                name,
                contact,
                address: fields.address,
                english_name: fields.english_name,
                region: fields.region,
                school: fields.school,
                remarks: fields.remarks,
            };
            println!("{}", students::create(conn, &draft)?);
            Ok(())
        }
        StudentCommand::Update { id, fields, clear } => {
            let changes = student_changes(fields, &clear);
            students::update(conn, id, &changes)?;
            Ok(())
        }
        StudentCommand::Delete { id } => {
            students::delete(conn, id)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mark() {
        assert_eq!(parse_mark("12=true"), Ok((12, true)));
        assert_eq!(parse_mark(" 3 = false "), Ok((3, false)));
        assert!(parse_mark("12").is_err());
        assert!(parse_mark("x=true").is_err());
        assert!(parse_mark("4=yes").is_err());
    }

    #[test]
    fn test_change() {
        assert_eq!(change(true, Some(5)), Some(None));
        assert_eq!(change(false, Some(5)), Some(Some(5)));
        assert_eq!(change::<i32>(false, None), None);
    }

    #[test]
    fn test_cli_parses_roster_set() {
        let cli = Cli::try_parse_from(["community-center", "roster", "set", "7", "1", "2"]).unwrap();
        match cli.command {
            Command::Roster(RosterCommand::Set {
                event_id,
                student_ids,
            }) => {
                assert_eq!(event_id, 7);
                assert_eq!(student_ids, vec![1, 2]);
            }
            _ => panic!("expected roster set"),
        }
    }

    #[test]
    fn test_cli_parses_event_update_with_clear() {
        let cli = Cli::try_parse_from([
            "community-center",
            "event",
            "update",
            "3",
            "--quota",
            "50",
            "--clear",
            "name-en",
        ])
        .unwrap();
        match cli.command {
            Command::Event(EventCommand::Update { id, fields, clear }) => {
                assert_eq!(id, 3);
                assert_eq!(fields.quota, Some(50));
                assert!(clear.contains(&EventField::NameEn));
            }
            _ => panic!("expected event update"),
        }
    }

    #[test]
    fn test_student_update_can_clear_fields() {
        let cli = Cli::try_parse_from([
            "community-center",
            "student",
            "update",
            "4",
            "--school",
            "Tung Chung Secondary",
            "--clear",
            "remarks",
            "--clear",
            "english-name",
        ])
        .unwrap();
        let Command::Student(StudentCommand::Update { id, fields, clear }) = cli.command else {
            panic!("expected student update");
        };
        assert_eq!(id, 4);
        assert_eq!(
            student_changes(fields, &clear),
            StudentChanges {
                school: Some(Some("Tung Chung Secondary".to_owned())),
                remarks: Some(None),
                english_name: Some(None),
                ..StudentChanges::default()
            }
        );
    }
}
