//! CLI probe for the attendance core.
//!
//! # Responsibility
//! - Wire the core together from environment configuration.
//! - Print setup status and one week's timetable for quick local checks.
//!
//! Usage: `attendance_cli [week YYYY-MM-DD]`

use attendance_core::{
    init_logging, CoreConfig, Repository, SetupStateManager, SqliteGateway, Subject,
    TimetableEngine, TimetableState, WeekKey,
};
use chrono::NaiveDate;
use log::error;
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    println!("attendance_core ping={}", attendance_core::ping());
    println!("attendance_core version={}", attendance_core::core_version());

    match run(std::env::args().skip(1).collect()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={}", message);
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Vec<String>) -> Result<(), String> {
    let week = parse_week_arg(&args)?;
    let config = CoreConfig::from_env();
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir, true).map_err(|err| err.to_string())?;
    }

    let gateway = SqliteGateway::open(&config.db_path).map_err(|err| {
        format!(
            "failed to open store `{}`: {err}",
            config.db_path.display()
        )
    })?;
    let repo = Repository::new(Arc::new(gateway));

    let setup = SetupStateManager::new(repo.clone());
    let phase = setup.determine().await.map_err(|err| err.to_string())?;
    let subjects = setup.subjects();
    println!(
        "setup phase={phase:?} subjects={} db={}",
        subjects.len(),
        config.db_path.display()
    );

    let engine = TimetableEngine::new(repo, week);
    engine.settle().await;
    println!("week {}", week.range_label());

    let names: HashMap<_, &Subject> = subjects.iter().map(|subject| (subject.id, subject)).collect();
    match engine.timetable_state() {
        TimetableState::Loading => println!("timetable loading"),
        TimetableState::Error(message) => return Err(message),
        TimetableState::Success(snapshot) => {
            for (day, slots) in snapshot.schedule_by_day.iter() {
                for slot in slots {
                    let name = names
                        .get(&slot.subject_id)
                        .map_or("?", |subject| subject.name.as_str());
                    let status = snapshot.status_of(slot.id).unwrap_or_default();
                    println!(
                        "  {day} #{} {name}: {}",
                        slot.time_slot,
                        status.as_str()
                    );
                }
            }
        }
    }

    for subject in &subjects {
        println!(
            "subject {} present={} absent={} percent={}",
            subject.name,
            subject.present,
            subject.absent,
            subject.attendance_percent()
        );
    }
    Ok(())
}

fn parse_week_arg(args: &[String]) -> Result<WeekKey, String> {
    match args {
        [] => Ok(WeekKey::current()),
        [flag, date] if flag == "week" => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(WeekKey::for_picked_date)
            .map_err(|err| format!("invalid date `{date}`: {err}")),
        _ => Err("usage: attendance_cli [week YYYY-MM-DD]".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_week_arg;
    use attendance_core::WeekKey;
    use chrono::NaiveDate;

    #[test]
    fn week_argument_resolves_picked_date() {
        let args = vec!["week".to_string(), "2024-01-07".to_string()];
        let week = parse_week_arg(&args).expect("date should parse");
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).expect("valid date");
        assert_eq!(week, WeekKey::containing(monday));
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        let args = vec!["month".to_string()];
        assert!(parse_week_arg(&args).is_err());
    }
}
