use anyhow::Result;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use studio_core::recurrence::{sort_chronologically, Window};

use crate::cli::{ListCommand, View};
use crate::config::Config;
use crate::item::CliItem;
use crate::parser::parse_date;
use crate::util::Session;
use crate::views::table::display_instances;

pub async fn list_items<T: CliItem>(
    session: &Session<T>,
    command: ListCommand,
    config: &Config,
) -> Result<()> {
    let window = resolve_window(&command, config.default_view, session.now)?;
    let mut instances = session.coordinator.expand_window(&window).await?;
    sort_chronologically(&mut instances);

    display_instances(&instances, session.local_now());
    Ok(())
}

/// An explicit `--from`/`--to` range wins; otherwise the view around today.
/// A missing end shows one week from the start.
fn resolve_window(command: &ListCommand, default_view: View, now: DateTime<Tz>) -> Result<Window> {
    let today = now.date_naive();
    if command.from.is_none() && command.to.is_none() {
        let window = match command.view.unwrap_or(default_view) {
            View::Day => Window::day(today),
            View::Week => Window::week_of(today),
            View::Month => Window::month_of(today),
        };
        return Ok(window?);
    }

    let first = match &command.from {
        Some(from) => parse_date(from, now)?,
        None => today,
    };
    let last = match &command.to {
        Some(to) => parse_date(to, now)?,
        None => first + Duration::days(6),
    };
    Ok(Window::days(first, last)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn wednesday() -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2024, 1, 17, 15, 0, 0).unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn command(from: Option<&str>, to: Option<&str>, view: Option<View>) -> ListCommand {
        ListCommand {
            from: from.map(String::from),
            to: to.map(String::from),
            view,
        }
    }

    #[test]
    fn test_default_view_is_used_without_range() {
        let window = resolve_window(&command(None, None, None), View::Week, wednesday()).unwrap();
        assert_eq!(window.start, midnight(2024, 1, 15));
        assert_eq!(window.end, midnight(2024, 1, 22));

        let window =
            resolve_window(&command(None, None, Some(View::Day)), View::Week, wednesday()).unwrap();
        assert_eq!(window.start, midnight(2024, 1, 17));
        assert_eq!(window.end, midnight(2024, 1, 18));
    }

    #[test]
    fn test_explicit_range_is_inclusive() {
        let window = resolve_window(
            &command(Some("2024-01-08"), Some("2024-01-21"), None),
            View::Month,
            wednesday(),
        )
        .unwrap();
        assert_eq!(window.start, midnight(2024, 1, 8));
        assert_eq!(window.end, midnight(2024, 1, 22));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let result = resolve_window(
            &command(Some("2024-02-01"), Some("2024-01-01"), None),
            View::Week,
            wednesday(),
        );
        assert!(result.is_err());
    }
}
