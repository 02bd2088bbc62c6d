use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use studio_core::models::Recurrence;
use studio_core::recurrence::Schedulable;
use studio_core::series::SeriesAction;

use crate::cli::EditCommand;
use crate::item::CliItem;
use crate::parser::{parse_date, parse_datetime};
use crate::util::{describe_scope, run_action, Outcome, Session};

pub async fn edit_item<T: CliItem>(session: &Session<T>, command: EditCommand) -> Result<()> {
    let target = session.coordinator.resolve_instance(&command.id).await?;
    let series = session
        .coordinator
        .find_template_for(&target)
        .await?
        .and_then(|template| template.recurrence().cloned());

    let mut edited = target.item.clone();
    if let Some(at) = &command.at {
        edited.reschedule(parse_datetime(at, session.now)?);
    }
    edited.apply_edit(&command)?;

    if command.every.is_some() || command.until.is_some() {
        let mut recurrence = match (command.every, &series) {
            (Some(frequency), Some(current)) => Recurrence {
                exception_dates: current.exception_dates.clone(),
                ..Recurrence::new(frequency, current.series_end_date)
            },
            (Some(frequency), None) => Recurrence::new(frequency, edited.anchor().date()),
            (None, Some(current)) => current.clone(),
            (None, None) => bail!("--until needs --every on a one-off {}", T::NOUN),
        };
        if let Some(until) = &command.until {
            recurrence.series_end_date = parse_date(until, session.now)?;
        }
        edited.set_recurrence(Some(recurrence));
    }

    if edited == target.item {
        println!("Nothing to change.");
        return Ok(());
    }

    match run_action(session, target, SeriesAction::Save(edited), command.scope).await? {
        Outcome::Applied(scope) => println!(
            "{} Updated {} {}",
            "✓".green().bold(),
            T::NOUN,
            describe_scope(scope)
        ),
        Outcome::Dismissed => println!("Edit cancelled."),
    }
    Ok(())
}
