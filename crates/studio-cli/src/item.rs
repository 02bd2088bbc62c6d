use anyhow::{bail, Result};
use chrono::{Duration, NaiveDateTime};
use studio_core::models::{Booking, Task, TaskPriority, TaskStatus};
use studio_core::repository::StoredItem;

use crate::cli::{AddCommand, EditCommand};

/// Command-line behaviour for one item kind.
pub trait CliItem: StoredItem {
    const NOUN: &'static str;

    /// Builds a new one-off item from `studio add` arguments.
    fn from_add(command: &AddCommand, at: NaiveDateTime) -> Result<Self>;

    /// Applies the field edits of `studio edit`. Start time and the series
    /// rule are handled by the caller.
    fn apply_edit(&mut self, command: &EditCommand) -> Result<()>;

    /// Who or what the item is tied to, for the list view.
    fn owner(&self) -> Option<&str>;

    /// Short state column for the list view.
    fn state(&self) -> String;

    /// Extra `label: value` lines for `studio show`.
    fn details(&self) -> Vec<(&'static str, String)>;
}

fn minutes(value: u32) -> Result<Duration> {
    if value == 0 {
        bail!("Duration must be at least one minute");
    }
    Ok(Duration::minutes(i64::from(value)))
}

impl CliItem for Booking {
    const NOUN: &'static str = "booking";

    fn from_add(command: &AddCommand, at: NaiveDateTime) -> Result<Self> {
        Ok(Booking {
            title: command.title.clone(),
            resource: command.resource.clone(),
            attendees: command.attendees.clone(),
            notes: command.notes.clone(),
            start_time: at,
            end_time: at + minutes(command.duration)?,
            ..Default::default()
        })
    }

    fn apply_edit(&mut self, command: &EditCommand) -> Result<()> {
        if let Some(title) = &command.title {
            self.title = title.clone();
        }
        if let Some(duration) = command.duration {
            self.end_time = self.start_time + minutes(duration)?;
        }
        if command.resource_clear {
            self.resource = None;
        } else if let Some(resource) = &command.resource {
            self.resource = Some(resource.clone());
        }
        if let Some(notes) = &command.notes {
            self.notes = Some(notes.clone());
        }
        if command.status.is_some() || command.priority.is_some() || command.assignee.is_some() {
            bail!("--status, --priority and --assignee apply to tasks only");
        }
        Ok(())
    }

    fn owner(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    fn state(&self) -> String {
        match self.attendees.len() {
            0 => "open".to_string(),
            1 => "1 attendee".to_string(),
            n => format!("{} attendees", n),
        }
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![(
            "Time",
            format!(
                "{} - {}",
                self.start_time.format("%Y-%m-%d %H:%M"),
                self.end_time.format("%H:%M")
            ),
        )];
        if let Some(resource) = &self.resource {
            lines.push(("Resource", resource.clone()));
        }
        if !self.attendees.is_empty() {
            lines.push(("Attendees", self.attendees.join(", ")));
        }
        if let Some(notes) = &self.notes {
            lines.push(("Notes", notes.clone()));
        }
        lines
    }
}

impl CliItem for Task {
    const NOUN: &'static str = "task";

    fn from_add(command: &AddCommand, at: NaiveDateTime) -> Result<Self> {
        Ok(Task {
            title: command.title.clone(),
            description: command.description.clone(),
            assignee: command.assignee.clone(),
            priority: command.priority.unwrap_or(TaskPriority::Medium),
            status: TaskStatus::Todo,
            due_at: at,
            ..Default::default()
        })
    }

    fn apply_edit(&mut self, command: &EditCommand) -> Result<()> {
        if let Some(title) = &command.title {
            self.title = title.clone();
        }
        if let Some(description) = &command.description {
            self.description = Some(description.clone());
        }
        if let Some(assignee) = &command.assignee {
            self.assignee = Some(assignee.clone());
        }
        if let Some(status) = command.status {
            self.status = status;
        }
        if let Some(priority) = command.priority {
            self.priority = priority;
        }
        if command.duration.is_some() || command.resource.is_some() || command.resource_clear {
            bail!("--duration and --resource apply to bookings only");
        }
        Ok(())
    }

    fn owner(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    fn state(&self) -> String {
        format!("{} / {}", self.status, self.priority)
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![
            ("Due", self.due_at.format("%Y-%m-%d %H:%M").to_string()),
            ("Status", self.status.to_string()),
            ("Priority", self.priority.to_string()),
        ];
        if let Some(assignee) = &self.assignee {
            lines.push(("Assignee", assignee.clone()));
        }
        if let Some(description) = &self.description {
            lines.push(("Description", description.clone()));
        }
        lines
    }
}
