use anyhow::Result;
use owo_colors::{OwoColorize, Style};
use studio_core::models::{Mutation, MutationPlan, Recurrence};
use studio_core::recurrence::Schedulable;

use crate::cli::AddCommand;
use crate::item::CliItem;
use crate::parser::{parse_date, parse_datetime};
use crate::util::Session;

pub async fn add_item<T: CliItem>(session: &Session<T>, command: AddCommand) -> Result<()> {
    let at = parse_datetime(&command.at, session.now)?;
    let mut item = T::from_add(&command, at)?;

    let recurrence = match (command.every, &command.until) {
        (Some(frequency), Some(until)) => {
            Some(Recurrence::new(frequency, parse_date(until, session.now)?))
        }
        _ => None,
    };
    item.set_recurrence(recurrence.clone());

    let mutation = if recurrence.is_some() {
        Mutation::CreateTemplate(item.clone())
    } else {
        Mutation::CreateStandalone(item.clone())
    };
    session
        .coordinator
        .apply(MutationPlan::single(item.id(), mutation))
        .await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let subtle_style = Style::new().bright_black();

    match &recurrence {
        Some(recurrence) => {
            println!(
                "{} Created recurring {}: {}",
                "✓".style(success_style),
                T::NOUN,
                item.title().bright_white().bold()
            );
            println!("  {} ID: {}", "→".style(info_style), item.id().yellow());
            println!(
                "  {} Repeats {} from {} until {}",
                "→".style(info_style),
                recurrence.rule,
                at.format("%Y-%m-%d %H:%M").to_string().cyan(),
                recurrence.series_end_date.to_string().cyan()
            );
            if recurrence.is_exhausted_before(at) {
                println!(
                    "  {} The series ends before it starts and will never show up",
                    "!".yellow().bold()
                );
            }
            println!(
                "   {} Preview upcoming: studio --kind {} show {}",
                "•".style(subtle_style),
                T::NOUN,
                item.id().yellow()
            );
        }
        None => {
            println!(
                "{} Created {}: {}",
                "✓".style(success_style),
                T::NOUN,
                item.title().bright_white().bold()
            );
            println!("  {} ID: {}", "→".style(info_style), item.id().yellow());
            println!(
                "  {} At: {}",
                "→".style(info_style),
                at.format("%Y-%m-%d %H:%M").to_string().cyan()
            );
        }
    }

    Ok(())
}
