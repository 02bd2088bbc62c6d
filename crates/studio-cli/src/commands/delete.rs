use anyhow::Result;
use dialoguer::Confirm;
use owo_colors::OwoColorize;
use studio_core::recurrence::Schedulable;
use studio_core::series::SeriesAction;

use crate::cli::DeleteCommand;
use crate::item::CliItem;
use crate::util::{describe_scope, run_action, Outcome, Session};

pub async fn delete_item<T: CliItem>(session: &Session<T>, command: DeleteCommand) -> Result<()> {
    let target = session.coordinator.resolve_instance(&command.id).await?;

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Are you sure you want to delete {} '{}' on {}?",
                T::NOUN,
                target.item.title(),
                target.item.anchor().format("%Y-%m-%d %H:%M")
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    match run_action(session, target, SeriesAction::Delete, command.scope).await? {
        Outcome::Applied(scope) => println!(
            "{} Deleted {} {}",
            "✓".green().bold(),
            T::NOUN,
            describe_scope(scope)
        ),
        Outcome::Dismissed => println!("Deletion cancelled."),
    }
    Ok(())
}
