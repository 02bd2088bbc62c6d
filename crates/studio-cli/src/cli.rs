use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use studio_core::models::{EditScope, Frequency, ItemKind, TaskPriority, TaskStatus};

/// Studio schedule manager for recurring bookings and staff tasks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Kind of item to work with (booking or task)
    #[arg(long, short, global = true, default_value = "booking")]
    pub kind: ItemKind,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a one-off item or a recurring series
    Add(AddCommand),
    /// List occurrences inside a date range
    List(ListCommand),
    /// Show a stored item and its upcoming occurrences
    Show(ShowCommand),
    /// Edit an item or one occurrence of a series
    Edit(EditCommand),
    /// Delete an item or one occurrence of a series
    Delete(DeleteCommand),
}

/// Calendar span shown by `list` when no explicit range is given.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Day,
    #[default]
    Week,
    Month,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// Title of the booking or task
    pub title: String,

    /// Start (bookings) or due time (tasks), e.g. '2024-01-15 09:00' or 'next monday 9am'
    #[arg(long)]
    pub at: String,

    /// Length of a booking in minutes
    #[arg(long, default_value_t = 60)]
    pub duration: u32,

    /// Trainer or room the booking occupies
    #[arg(long)]
    pub resource: Option<String>,

    /// Attendee of the booking (repeatable)
    #[arg(long = "attendee")]
    pub attendees: Vec<String>,

    /// Free-form booking notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Task description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Staff member the task is assigned to
    #[arg(long)]
    pub assignee: Option<String>,

    /// Task priority (low, medium, high)
    #[arg(long)]
    pub priority: Option<TaskPriority>,

    /// Repeat daily, weekly or monthly
    #[arg(long, requires = "until")]
    pub every: Option<Frequency>,

    /// Last day of the series (inclusive)
    #[arg(long, requires = "every")]
    pub until: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// First day to show
    #[arg(long)]
    pub from: Option<String>,

    /// Last day to show (inclusive)
    #[arg(long)]
    pub to: Option<String>,

    /// Span around today when no range is given
    #[arg(long, value_enum)]
    pub view: Option<View>,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// Item or occurrence id
    pub id: String,

    /// Number of upcoming occurrences to preview
    #[arg(long, default_value_t = 5)]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// Item or occurrence id
    pub id: String,

    /// How far a change to a series occurrence reaches (one, future, all)
    #[arg(long)]
    pub scope: Option<EditScope>,

    #[arg(long)]
    pub title: Option<String>,

    /// New start or due time
    #[arg(long)]
    pub at: Option<String>,

    /// New booking length in minutes
    #[arg(long)]
    pub duration: Option<u32>,

    #[arg(long)]
    pub resource: Option<String>,
    #[arg(long, conflicts_with = "resource")]
    pub resource_clear: bool,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub priority: Option<TaskPriority>,

    /// Replace the series rule
    #[arg(long, requires = "until")]
    pub every: Option<Frequency>,

    /// Replace the series end date
    #[arg(long)]
    pub until: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// Item or occurrence id
    pub id: String,

    /// How far the delete reaches for a series occurrence (one, future, all)
    #[arg(long)]
    pub scope: Option<EditScope>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}
