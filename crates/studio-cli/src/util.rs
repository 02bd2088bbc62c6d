use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use dialoguer::Select;
use owo_colors::OwoColorize;
use studio_core::coordinator::SeriesCoordinator;
use studio_core::db::DbPool;
use studio_core::models::EditScope;
use studio_core::recurrence::{Instance, Schedulable};
use studio_core::repository::SqliteStore;
use studio_core::series::{Decision, Interaction, SeriesAction};

use crate::item::CliItem;

/// Everything a command needs: the coordinator for one item kind and the
/// moment the command runs, in the studio's timezone.
pub struct Session<T: CliItem> {
    pub coordinator: SeriesCoordinator<T, SqliteStore<T>>,
    pub now: DateTime<Tz>,
}

impl<T: CliItem> Session<T> {
    pub fn new(pool: DbPool, tz: Tz, check_conflicts: bool) -> Self {
        Self {
            coordinator: SeriesCoordinator::new(SqliteStore::new(pool))
                .with_conflict_checks(check_conflicts),
            now: Utc::now().with_timezone(&tz),
        }
    }

    /// Current wall-clock time in the studio.
    pub fn local_now(&self) -> NaiveDateTime {
        self.now.naive_local()
    }
}

/// How an edit or delete ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Written; `None` when no scope was needed.
    Applied(Option<EditScope>),
    /// The user closed the scope prompt.
    Dismissed,
}

/// Runs `action` on `target` through the scope prompt and applies the plan.
///
/// `scope` answers the prompt up front; without it the user is asked.
pub async fn run_action<T: CliItem>(
    session: &Session<T>,
    target: Instance<T>,
    action: SeriesAction<T>,
    scope: Option<EditScope>,
) -> Result<Outcome> {
    let mut interaction = Interaction::default();
    let plan = match session
        .coordinator
        .begin(&mut interaction, action, target)
        .await?
    {
        Decision::Apply(plan) => plan,
        Decision::AskScope => {
            let scope = match scope {
                Some(scope) => scope,
                None => match prompt_scope(&interaction)? {
                    Some(scope) => scope,
                    None => {
                        interaction.dismiss();
                        return Ok(Outcome::Dismissed);
                    }
                },
            };
            interaction.confirm(scope)?
        }
    };

    let scope = plan.scope;
    session.coordinator.apply(plan).await?;
    Ok(Outcome::Applied(scope))
}

fn prompt_scope<T: CliItem>(interaction: &Interaction<T>) -> Result<Option<EditScope>> {
    let date = interaction
        .pending_target()
        .map(|target| target.item.anchor().format("%a %Y-%m-%d").to_string())
        .unwrap_or_default();
    let options = [
        format!("This occurrence only ({})", date),
        "This and future occurrences".to_string(),
        "Entire series".to_string(),
    ];

    println!("{}", format!("This {} is part of a recurring series.", T::NOUN).yellow());
    let selection = Select::new()
        .with_prompt("How far should the change reach?")
        .items(&options)
        .default(0)
        .interact_opt()?;

    Ok(selection.map(|index| match index {
        0 => EditScope::ThisOccurrence,
        1 => EditScope::ThisAndFuture,
        _ => EditScope::EntireSeries,
    }))
}

/// Human label for a finished scope, used in success messages.
pub fn describe_scope(scope: Option<EditScope>) -> &'static str {
    match scope {
        None => "item",
        Some(EditScope::ThisOccurrence) => "occurrence",
        Some(EditScope::ThisAndFuture) => "occurrence and all later ones",
        Some(EditScope::EntireSeries) => "entire series",
    }
}
