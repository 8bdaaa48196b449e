use std::{fmt::Display, path::PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local};
use chrono_english::parse_date_string;
use clap::{Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    aggregate::{summarize, Summary},
    daemon::{
        storage::session_store::{sessions_between, JsonSessionStore},
        SESSION_DIR,
    },
    utils::{dir::create_application_default_path, time::next_day_start},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct SummaryCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\". Defaults to the beginning of today"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Same formats as --start. Defaults to now"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. If start and end are both 15/03/2025 this summarizes the whole day"
    )]
    treat_as_days: bool,
    #[arg(long, help = "Application directory the daemon writes sessions to")]
    dir: Option<PathBuf>,
}

pub async fn process_summary_command(command: SummaryCommand) -> Result<()> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = command.date_style.into();

    let mut start = match &command.start_date {
        Some(text) => parse_date_string(text, now, dialect)
            .map_err(|e| anyhow!("Failed to parse start date: {e}"))?,
        None => now.beginning_of_day(),
    };
    let mut end = match &command.end_date {
        Some(text) => parse_date_string(text, now, dialect)
            .map_err(|e| anyhow!("Failed to parse end date: {e}"))?,
        None => now,
    };
    if command.treat_as_days {
        start = start.beginning_of_day();
        end = next_day_start(end);
    }
    if end <= start {
        return Err(anyhow!("End of the range must come after its start"));
    }

    let dir = command
        .dir
        .map_or_else(create_application_default_path, Ok)?;
    let store = JsonSessionStore::new(dir.join(SESSION_DIR))?;
    let sessions = sessions_between(&store, start.to_utc(), end.to_utc()).await?;
    let summary = summarize(&sessions, start.to_utc(), end.to_utc());

    print_summary(&summary, start.to_utc(), end.to_utc());
    Ok(())
}

fn print_summary(summary: &Summary, from: DateTime<chrono::Utc>, to: DateTime<chrono::Utc>) {
    let local_from = from.with_timezone(&Local);
    let local_to = to.with_timezone(&Local);
    println!(
        "{} - {}",
        local_from.format("%x %H:%M:%S"),
        local_to.format("%x %H:%M:%S")
    );
    println!(
        "Tracked {}\tProductivity score {}",
        format_duration(summary.total),
        summary.productivity_score
    );

    if summary.total.is_zero() {
        return;
    }

    println!("\nBy category:");
    for usage in &summary.by_category {
        println!(
            "{}%\t{}\t{}",
            percentage_of(usage.duration, summary.total),
            format_duration(usage.duration),
            usage.category
        );
    }

    println!("\nBy application:");
    for usage in &summary.by_application {
        println!(
            "{}%\t{}\t{}",
            percentage_of(usage.duration, summary.total),
            format_duration(usage.duration),
            usage.application
        );
    }
}

fn percentage_of(value: Duration, whole: Duration) -> i64 {
    if whole.is_zero() {
        return 0;
    }
    value.num_seconds() * 100 / whole.num_seconds().max(1)
}

fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_scales() {
        assert_eq!(format_duration(Duration::seconds(5)), "5s");
        assert_eq!(format_duration(Duration::seconds(65)), "1m5s");
        assert_eq!(format_duration(Duration::seconds(3605)), "1h0m5s");
    }

    #[test]
    fn percentage_is_relative_to_total() {
        assert_eq!(
            percentage_of(Duration::minutes(15), Duration::minutes(60)),
            25
        );
        assert_eq!(percentage_of(Duration::zero(), Duration::zero()), 0);
    }
}
