use anyhow::Result;
use owo_colors::OwoColorize;
use studio_core::recurrence::{preview, Schedulable};

use crate::cli::ShowCommand;
use crate::item::CliItem;
use crate::util::Session;

pub async fn show_item<T: CliItem>(session: &Session<T>, command: ShowCommand) -> Result<()> {
    let target = session.coordinator.resolve_instance(&command.id).await?;
    let template = session
        .coordinator
        .find_template_for(&target)
        .await?
        .filter(|template| template.recurrence().is_some());

    println!("{}", target.item.title().bright_white().bold());
    println!("  {:<12} {}", "ID:", target.id.yellow());
    if let Some(series_id) = &target.series_id {
        println!("  {:<12} {}", "Series:", series_id);
    }
    for (label, value) in target.item.details() {
        println!("  {:<12} {}", format!("{}:", label), value);
    }

    let Some(template) = template else {
        return Ok(());
    };
    let Some(recurrence) = template.recurrence() else {
        return Ok(());
    };

    println!(
        "  {:<12} {} until {}",
        "Repeats:",
        recurrence.rule,
        recurrence.series_end_date
    );
    if !recurrence.exception_dates.is_empty() {
        let skipped: Vec<String> = recurrence
            .exception_dates
            .iter()
            .map(|date| date.to_string())
            .collect();
        println!("  {:<12} {}", "Skipped:", skipped.join(", "));
    }

    // Occurrences preview from the selected one; the template itself previews
    // from now.
    let from = if target.is_series_occurrence() {
        target.scheduled_at
    } else {
        session.local_now()
    };
    let upcoming = preview(&template, from, command.count)?;
    if upcoming.is_empty() {
        println!("\n{}", "No upcoming occurrences.".bright_black());
        return Ok(());
    }

    println!("\n{}", "Upcoming:".bold());
    for instance in upcoming {
        println!(
            "  {} {}  {}",
            "•".bright_black(),
            instance.item.anchor().format("%a %Y-%m-%d %H:%M"),
            instance.id.yellow()
        );
    }
    Ok(())
}
