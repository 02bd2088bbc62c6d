use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use thiserror::Error;

use crate::error::CoreError;
use crate::recurrence::Schedulable;

/// Which collection an item lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Booking,
    Task,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Booking => "booking",
            ItemKind::Task => "task",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid item kind: {0}")]
pub struct ParseItemKindError(String);

impl FromStr for ItemKind {
    type Err = ParseItemKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "booking" | "bookings" => Ok(ItemKind::Booking),
            "task" | "tasks" => Ok(ItemKind::Task),
            _ => Err(ParseItemKindError(s.to_string())),
        }
    }
}

// ============================================================================
// Recurrence
// ============================================================================

/// Step between two consecutive occurrences of a series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid repeat rule: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// Repetition settings carried by a template.
///
/// The rule is kept as the stored text and only interpreted when the series
/// is expanded, so a record written by another client with an unknown rule
/// still loads and is rejected at expansion time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    /// `daily`, `weekly` or `monthly`
    pub rule: String,
    /// Inclusive: no occurrence starts on a later calendar date.
    pub series_end_date: NaiveDate,
    /// Occurrence dates that were deleted or replaced by a standalone record.
    #[serde(default)]
    pub exception_dates: BTreeSet<NaiveDate>,
}

impl Recurrence {
    pub fn new(frequency: Frequency, series_end_date: NaiveDate) -> Self {
        Self {
            rule: frequency.as_str().to_string(),
            series_end_date,
            exception_dates: BTreeSet::new(),
        }
    }

    /// Parses the stored rule for the series identified by `item_id`.
    pub fn frequency(&self, item_id: &str) -> Result<Frequency, CoreError> {
        self.rule.parse().map_err(|_| CoreError::InvalidRule {
            item_id: item_id.to_string(),
            rule: self.rule.clone(),
        })
    }

    /// Suppresses the occurrence on `date`. Returns false if it already was.
    pub fn add_exception(&mut self, date: NaiveDate) -> bool {
        self.exception_dates.insert(date)
    }

    pub fn is_exception(&self, date: NaiveDate) -> bool {
        self.exception_dates.contains(&date)
    }

    /// A series whose anchor lies after its end date never produces anything.
    pub fn is_exhausted_before(&self, anchor: NaiveDateTime) -> bool {
        anchor.date() > self.series_end_date
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// A class or session slot. With a recurrence it is a template; without one
/// it is a standalone booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: String,
    pub title: String,
    /// Trainer or room occupied by the booking.
    pub resource: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub notes: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Default for Booking {
    fn default() -> Self {
        let start = NaiveDateTime::default();
        Self {
            id: crate::new_id(),
            title: String::new(),
            resource: None,
            attendees: Vec::new(),
            notes: None,
            start_time: start,
            end_time: start,
            recurrence: None,
        }
    }
}

impl Booking {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

impl Schedulable for Booking {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn anchor(&self) -> NaiveDateTime {
        self.start_time
    }

    fn end(&self) -> NaiveDateTime {
        self.end_time
    }

    fn reschedule(&mut self, at: NaiveDateTime) {
        let duration = self.duration();
        self.start_time = at;
        self.end_time = at + duration;
    }

    fn recurrence(&self) -> Option<&Recurrence> {
        self.recurrence.as_ref()
    }

    fn recurrence_mut(&mut self) -> Option<&mut Recurrence> {
        self.recurrence.as_mut()
    }

    fn set_recurrence(&mut self, recurrence: Option<Recurrence>) {
        self.recurrence = recurrence;
    }

    fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    fn title(&self) -> &str {
        &self.title
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in progress"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// A staff to-do on the board. Point-in-time: it occupies no slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: crate::new_id(),
            title: String::new(),
            description: None,
            assignee: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_at: NaiveDateTime::default(),
            recurrence: None,
        }
    }
}

impl Schedulable for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn anchor(&self) -> NaiveDateTime {
        self.due_at
    }

    fn reschedule(&mut self, at: NaiveDateTime) {
        self.due_at = at;
    }

    fn recurrence(&self) -> Option<&Recurrence> {
        self.recurrence.as_ref()
    }

    fn recurrence_mut(&mut self) -> Option<&mut Recurrence> {
        self.recurrence.as_mut()
    }

    fn set_recurrence(&mut self, recurrence: Option<Recurrence>) {
        self.recurrence = recurrence;
    }

    fn title(&self) -> &str {
        &self.title
    }
}

// ============================================================================
// Series mutations
// ============================================================================

/// Scope for edits and deletes made through one displayed occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditScope {
    /// Affect only the selected occurrence
    ThisOccurrence,
    /// Split the series at this occurrence
    ThisAndFuture,
    /// Modify entire series including past occurrences
    EntireSeries,
}

impl std::fmt::Display for EditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditScope::ThisOccurrence => write!(f, "one"),
            EditScope::ThisAndFuture => write!(f, "future"),
            EditScope::EntireSeries => write!(f, "all"),
        }
    }
}

impl FromStr for EditScope {
    type Err = ParseEditScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "one" | "this" | "occurrence" => Ok(EditScope::ThisOccurrence),
            "future" | "this_and_future" => Ok(EditScope::ThisAndFuture),
            "all" | "series" | "entire" => Ok(EditScope::EntireSeries),
            _ => Err(ParseEditScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid edit scope: {0}")]
pub struct ParseEditScopeError(String);

/// Change applied to a stored record by `update_template`.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePatch<T> {
    /// Suppress the occurrence generated on this date.
    AddExceptionDate(NaiveDate),
    /// Move the inclusive series end date.
    EndSeriesOn(NaiveDate),
    /// Overwrite the whole record, keeping its id.
    Replace(T),
}

/// One persistence operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    CreateStandalone(T),
    CreateTemplate(T),
    UpdateTemplate { id: String, patch: TemplatePatch<T> },
    DeleteTemplate { id: String },
}

impl<T: Schedulable + PartialEq> Mutation<T> {
    /// Id of the record this mutation touches.
    pub fn item_id(&self) -> &str {
        match self {
            Mutation::CreateStandalone(item) | Mutation::CreateTemplate(item) => item.id(),
            Mutation::UpdateTemplate { id, .. } | Mutation::DeleteTemplate { id } => id,
        }
    }

    /// The record this mutation writes in full, if any.
    pub fn written_item(&self) -> Option<&T> {
        match self {
            Mutation::CreateStandalone(item)
            | Mutation::CreateTemplate(item)
            | Mutation::UpdateTemplate {
                patch: TemplatePatch::Replace(item),
                ..
            } => Some(item),
            _ => None,
        }
    }

    /// Applies this mutation to an id-keyed collection.
    ///
    /// Creating a record that already exists with identical content is a
    /// no-op, so replaying a plan does not double-create. Deleting a missing
    /// record is also a no-op.
    pub fn apply_to(&self, items: &mut BTreeMap<String, T>) -> Result<(), CoreError> {
        match self {
            Mutation::CreateStandalone(item) | Mutation::CreateTemplate(item) => {
                let wants_series = matches!(self, Mutation::CreateTemplate(_));
                if item.recurrence().is_some() != wants_series {
                    return Err(CoreError::InvalidInput(format!(
                        "Item {} {} a recurrence",
                        item.id(),
                        if wants_series { "is missing" } else { "must not carry" }
                    )));
                }
                match items.get(item.id()) {
                    Some(existing) if existing == item => Ok(()),
                    Some(_) => Err(CoreError::Conflict(format!(
                        "Item {} already exists with different content",
                        item.id()
                    ))),
                    None => {
                        items.insert(item.id().to_string(), item.clone());
                        Ok(())
                    }
                }
            }
            Mutation::UpdateTemplate { id, patch } => {
                let stored = items
                    .get_mut(id)
                    .ok_or_else(|| CoreError::NotFound(id.clone()))?;
                match patch {
                    TemplatePatch::AddExceptionDate(date) => {
                        series_settings(stored)?.add_exception(*date);
                    }
                    TemplatePatch::EndSeriesOn(date) => {
                        series_settings(stored)?.series_end_date = *date;
                    }
                    TemplatePatch::Replace(item) => {
                        if item.id() != id {
                            return Err(CoreError::InvalidInput(format!(
                                "Replacement for {} carries id {}",
                                id,
                                item.id()
                            )));
                        }
                        *stored = item.clone();
                    }
                }
                Ok(())
            }
            Mutation::DeleteTemplate { id } => {
                items.remove(id);
                Ok(())
            }
        }
    }
}

fn series_settings<T: Schedulable>(item: &mut T) -> Result<&mut Recurrence, CoreError> {
    let id = item.id().to_string();
    item.recurrence_mut()
        .ok_or_else(|| CoreError::InvalidInput(format!("Item {} is not a recurring series", id)))
}

/// Everything one user action writes, applied all together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationPlan<T> {
    /// Series (or standalone item) the action was taken on. Plans sharing
    /// this id are applied in the order they were submitted.
    pub series_id: String,
    /// `None` for direct edits that never asked for a scope.
    pub scope: Option<EditScope>,
    pub mutations: Vec<Mutation<T>>,
}

impl<T> MutationPlan<T> {
    pub fn single(series_id: impl Into<String>, mutation: Mutation<T>) -> Self {
        Self {
            series_id: series_id.into(),
            scope: None,
            mutations: vec![mutation],
        }
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly_booking() -> Booking {
        Booking {
            id: "yoga".to_string(),
            title: "Morning yoga".to_string(),
            resource: Some("studio-a".to_string()),
            start_time: date(2024, 1, 1).and_hms_opt(9, 0, 0).unwrap(),
            end_time: date(2024, 1, 1).and_hms_opt(10, 0, 0).unwrap(),
            recurrence: Some(Recurrence::new(Frequency::Weekly, date(2024, 1, 29))),
            ..Default::default()
        }
    }

    #[test]
    fn test_frequency_parsing() {
        assert_eq!("daily".parse::<Frequency>(), Ok(Frequency::Daily));
        assert_eq!("WEEKLY".parse::<Frequency>(), Ok(Frequency::Weekly));
        assert_eq!("monthly".parse::<Frequency>(), Ok(Frequency::Monthly));
        assert!("yearly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_edit_scope_round_trips_through_display() {
        for scope in [
            EditScope::ThisOccurrence,
            EditScope::ThisAndFuture,
            EditScope::EntireSeries,
        ] {
            assert_eq!(scope.to_string().parse::<EditScope>(), Ok(scope));
        }
        assert!("sometimes".parse::<EditScope>().is_err());
    }

    #[test]
    fn test_unknown_rule_is_rejected_with_item_id() {
        let mut recurrence = Recurrence::new(Frequency::Daily, date(2024, 2, 1));
        recurrence.rule = "fortnightly".to_string();
        match recurrence.frequency("abc") {
            Err(CoreError::InvalidRule { item_id, rule }) => {
                assert_eq!(item_id, "abc");
                assert_eq!(rule, "fortnightly");
            }
            other => panic!("expected InvalidRule, got {:?}", other),
        }
    }

    #[test]
    fn test_add_exception_is_idempotent() {
        let mut recurrence = Recurrence::new(Frequency::Weekly, date(2024, 1, 29));
        assert!(recurrence.add_exception(date(2024, 1, 15)));
        assert!(!recurrence.add_exception(date(2024, 1, 15)));
        assert_eq!(recurrence.exception_dates.len(), 1);
    }

    #[test]
    fn test_reschedule_keeps_booking_duration() {
        let mut booking = weekly_booking();
        booking.reschedule(date(2024, 3, 5).and_hms_opt(17, 30, 0).unwrap());
        assert_eq!(booking.duration(), chrono::Duration::hours(1));
        assert_eq!(booking.end_time, date(2024, 3, 5).and_hms_opt(18, 30, 0).unwrap());
    }

    #[test]
    fn test_recurrence_serializes_dates_as_plain_days() {
        let mut recurrence = Recurrence::new(Frequency::Weekly, date(2024, 1, 29));
        recurrence.add_exception(date(2024, 1, 15));
        let json = serde_json::to_value(&recurrence).unwrap();
        assert_eq!(json["series_end_date"], "2024-01-29");
        assert_eq!(json["exception_dates"][0], "2024-01-15");
    }

    mod mutation_tests {
        use super::*;

        fn collection() -> BTreeMap<String, Booking> {
            let booking = weekly_booking();
            BTreeMap::from([(booking.id.clone(), booking)])
        }

        #[test]
        fn test_replayed_create_is_a_no_op() {
            let mut items = collection();
            let standalone = Booking {
                id: "extra".to_string(),
                recurrence: None,
                ..weekly_booking()
            };
            let mutation = Mutation::CreateStandalone(standalone);
            mutation.apply_to(&mut items).unwrap();
            mutation.apply_to(&mut items).unwrap();
            assert_eq!(items.len(), 2);
        }

        #[test]
        fn test_create_with_different_content_conflicts() {
            let mut items = collection();
            let mut clash = weekly_booking();
            clash.title = "Something else".to_string();
            let err = Mutation::CreateTemplate(clash).apply_to(&mut items).unwrap_err();
            assert!(err.is_conflict());
        }

        #[test]
        fn test_create_standalone_rejects_recurrence() {
            let mut items = BTreeMap::new();
            let err = Mutation::CreateStandalone(weekly_booking())
                .apply_to(&mut items)
                .unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)));
        }

        #[test]
        fn test_patches_touch_only_series_settings() {
            let mut items = collection();
            Mutation::UpdateTemplate {
                id: "yoga".to_string(),
                patch: TemplatePatch::AddExceptionDate(date(2024, 1, 15)),
            }
            .apply_to(&mut items)
            .unwrap();
            Mutation::UpdateTemplate {
                id: "yoga".to_string(),
                patch: TemplatePatch::EndSeriesOn(date(2024, 1, 21)),
            }
            .apply_to(&mut items)
            .unwrap();

            let stored = &items["yoga"];
            let recurrence = stored.recurrence.as_ref().unwrap();
            assert!(recurrence.is_exception(date(2024, 1, 15)));
            assert_eq!(recurrence.series_end_date, date(2024, 1, 21));
            assert_eq!(stored.title, "Morning yoga");
        }

        #[test]
        fn test_update_of_missing_item_is_not_found() {
            let mut items: BTreeMap<String, Booking> = BTreeMap::new();
            let err = Mutation::UpdateTemplate {
                id: "ghost".to_string(),
                patch: TemplatePatch::EndSeriesOn(date(2024, 1, 1)),
            }
            .apply_to(&mut items)
            .unwrap_err();
            assert!(matches!(err, CoreError::NotFound(_)));
        }

        #[test]
        fn test_delete_missing_is_a_no_op() {
            let mut items = collection();
            let mutation: Mutation<Booking> = Mutation::DeleteTemplate { id: "yoga".to_string() };
            mutation.apply_to(&mut items).unwrap();
            mutation.apply_to(&mut items).unwrap();
            assert!(items.is_empty());
        }
    }
}
