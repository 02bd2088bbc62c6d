use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::error::CoreError;
use crate::models::{Frequency, Recurrence};

/// Timestamp format used inside instance ids.
const INSTANCE_ID_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Adapter over the scheduling fields shared by bookings and tasks, so one
/// expander serves both.
pub trait Schedulable: Clone {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Start of the slot, or the due time for point-in-time items.
    fn anchor(&self) -> NaiveDateTime;

    /// End of the occupied slot. Point-in-time items end where they start.
    fn end(&self) -> NaiveDateTime {
        self.anchor()
    }

    /// Moves the item to start at `at`, keeping its duration.
    fn reschedule(&mut self, at: NaiveDateTime);

    fn recurrence(&self) -> Option<&Recurrence>;

    fn recurrence_mut(&mut self) -> Option<&mut Recurrence>;

    fn set_recurrence(&mut self, recurrence: Option<Recurrence>);

    /// Trainer, room or other resource the item holds while it runs.
    fn resource(&self) -> Option<&str> {
        None
    }

    fn title(&self) -> &str;
}

impl Frequency {
    /// Next occurrence after `from`, or `None` past chrono's range.
    ///
    /// Monthly steps clamp to the last day of shorter months and continue
    /// from the clamped day, so a series anchored on the 31st drifts.
    pub fn step(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Frequency::Daily => from.checked_add_signed(Duration::days(1)),
            Frequency::Weekly => from.checked_add_signed(Duration::days(7)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::InvalidInput(format!(
                "Window ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Whole calendar days `[first, last]`.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Result<Self, CoreError> {
        let end = last
            .succ_opt()
            .ok_or_else(|| CoreError::InvalidInput(format!("No day after {}", last)))?;
        Self::new(first.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
    }

    pub fn day(date: NaiveDate) -> Result<Self, CoreError> {
        Self::days(date, date)
    }

    /// Monday-to-Sunday week containing `date`.
    pub fn week_of(date: NaiveDate) -> Result<Self, CoreError> {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        Self::days(monday, monday + Duration::days(6))
    }

    /// Calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Result<Self, CoreError> {
        let first = date
            .with_day(1)
            .ok_or_else(|| CoreError::InvalidInput(format!("No first day for {}", date)))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| CoreError::InvalidInput(format!("No month after {}", date)))?;
        Self::new(first.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN))
    }

    #[inline]
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

/// A concrete, non-recurring occurrence ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance<T> {
    /// `{template id}_{occurrence start}` for series occurrences, the
    /// item's own id for standalone items.
    pub id: String,
    /// Template this occurrence was generated from.
    pub series_id: Option<String>,
    /// Slot the series generated, before any edit moved it.
    pub scheduled_at: NaiveDateTime,
    /// Copy of the source item with id and timing replaced and no recurrence.
    pub item: T,
}

impl<T: Schedulable> Instance<T> {
    /// Wraps a non-recurring item as-is.
    pub fn standalone(item: T) -> Self {
        Self {
            id: item.id().to_string(),
            series_id: None,
            scheduled_at: item.anchor(),
            item,
        }
    }

    /// Materializes the occurrence of `template` starting at `at`.
    pub fn occurrence(template: &T, at: NaiveDateTime) -> Self {
        let id = instance_id(template.id(), at);
        let mut item = template.clone();
        item.set_id(id.clone());
        item.reschedule(at);
        item.set_recurrence(None);
        Self {
            id,
            series_id: Some(template.id().to_string()),
            scheduled_at: at,
            item,
        }
    }

    pub fn occurrence_date(&self) -> NaiveDate {
        self.scheduled_at.date()
    }

    pub fn is_series_occurrence(&self) -> bool {
        self.series_id.is_some()
    }
}

/// Id of the occurrence of series `template_id` starting at `at`.
pub fn instance_id(template_id: &str, at: NaiveDateTime) -> String {
    format!("{}_{}", template_id, at.format(INSTANCE_ID_FORMAT))
}

/// Splits an occurrence id back into its series id and start time.
pub fn parse_instance_id(id: &str) -> Option<(&str, NaiveDateTime)> {
    let (series_id, stamp) = id.rsplit_once('_')?;
    if series_id.is_empty() {
        return None;
    }
    let at = NaiveDateTime::parse_from_str(stamp, INSTANCE_ID_FORMAT).ok()?;
    Some((series_id, at))
}

/// Raw occurrence times of one series, before window and exception
/// filtering. Stops after the series end date or at `horizon` (exclusive).
#[derive(Debug, Clone)]
pub struct OccurrenceWalk {
    item_id: String,
    frequency: Frequency,
    cursor: Option<NaiveDateTime>,
    until: NaiveDate,
    horizon: Option<NaiveDateTime>,
    stalled: bool,
}

impl OccurrenceWalk {
    pub fn new(
        item_id: &str,
        anchor: NaiveDateTime,
        recurrence: &Recurrence,
        horizon: Option<NaiveDateTime>,
    ) -> Result<Self, CoreError> {
        let frequency = recurrence.frequency(item_id)?;
        Ok(Self {
            item_id: item_id.to_string(),
            frequency,
            cursor: Some(anchor),
            until: recurrence.series_end_date,
            horizon,
            stalled: false,
        })
    }
}

impl Iterator for OccurrenceWalk {
    type Item = Result<NaiveDateTime, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stalled {
            self.stalled = false;
            return Some(Err(CoreError::StalledRecurrence(self.item_id.clone())));
        }

        let current = self.cursor?;
        let past_horizon = self.horizon.is_some_and(|horizon| current >= horizon);
        if current.date() > self.until || past_horizon {
            self.cursor = None;
            return None;
        }

        self.cursor = match self.frequency.step(current) {
            Some(next) if next > current => Some(next),
            _ => {
                // The current occurrence is still valid; report the stall on
                // the following call.
                self.stalled = true;
                None
            }
        };
        Some(Ok(current))
    }
}

/// Lazily materialized occurrences of one template inside a window.
pub struct SeriesInstances<'a, T> {
    template: &'a T,
    recurrence: &'a Recurrence,
    walk: OccurrenceWalk,
    from: NaiveDateTime,
}

impl<'a, T: Schedulable> SeriesInstances<'a, T> {
    pub fn new(
        template: &'a T,
        recurrence: &'a Recurrence,
        from: NaiveDateTime,
        horizon: Option<NaiveDateTime>,
    ) -> Result<Self, CoreError> {
        let walk = OccurrenceWalk::new(template.id(), template.anchor(), recurrence, horizon)?;
        Ok(Self {
            template,
            recurrence,
            walk,
            from,
        })
    }
}

impl<T: Schedulable> Iterator for SeriesInstances<'_, T> {
    type Item = Result<Instance<T>, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walk.next()? {
                Err(e) => return Some(Err(e)),
                Ok(at) if at < self.from || self.recurrence.is_exception(at.date()) => continue,
                Ok(at) => return Some(Ok(Instance::occurrence(self.template, at))),
            }
        }
    }
}

/// Instances of a single item inside `window`.
pub fn expand_item<T: Schedulable>(item: &T, window: &Window) -> Result<Vec<Instance<T>>, CoreError> {
    match item.recurrence() {
        None if window.contains(item.anchor()) => Ok(vec![Instance::standalone(item.clone())]),
        None => Ok(Vec::new()),
        Some(recurrence) => {
            SeriesInstances::new(item, recurrence, window.start, Some(window.end))?.collect()
        }
    }
}

/// Expands templates and filters standalone items to `window`.
///
/// Output follows the order of `items`, series occurrences in time order
/// within their template. Use [`sort_chronologically`] for a merged timeline.
/// Standalone records are never deduplicated against generated occurrences.
pub fn expand<T: Schedulable>(items: &[T], window: &Window) -> Result<Vec<Instance<T>>, CoreError> {
    let mut instances = Vec::new();
    for item in items {
        instances.extend(expand_item(item, window)?);
    }
    debug!(
        items = items.len(),
        instances = instances.len(),
        start = %window.start,
        end = %window.end,
        "expanded window"
    );
    Ok(instances)
}

/// Next `count` visible occurrences of `item` starting at or after `from`.
pub fn preview<T: Schedulable>(
    item: &T,
    from: NaiveDateTime,
    count: usize,
) -> Result<Vec<Instance<T>>, CoreError> {
    match item.recurrence() {
        None if item.anchor() >= from && count > 0 => Ok(vec![Instance::standalone(item.clone())]),
        None => Ok(Vec::new()),
        Some(recurrence) => SeriesInstances::new(item, recurrence, from, None)?
            .take(count)
            .collect(),
    }
}

/// Sorts by start time; ties keep their expansion order.
pub fn sort_chronologically<T: Schedulable>(instances: &mut [Instance<T>]) {
    instances.sort_by_key(|instance| instance.item.anchor());
}
