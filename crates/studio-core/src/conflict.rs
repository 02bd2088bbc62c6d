//! Double-booking detection for resources.
//!
//! Two items conflict when they hold the same resource and their slots
//! overlap. Point-in-time items (tasks) and items without a resource never
//! conflict.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::error::CoreError;
use crate::models::MutationPlan;
use crate::recurrence::{expand, expand_item, Instance, Schedulable, Window};

/// Two overlapping occurrences on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clash {
    pub resource: String,
    /// Occurrence written by the plan.
    pub incoming: String,
    /// Occurrence already on the schedule.
    pub existing: String,
    pub start: NaiveDateTime,
}

impl std::fmt::Display for Clash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is already booked at {} by {}",
            self.resource,
            self.start.format("%Y-%m-%d %H:%M"),
            self.existing
        )
    }
}

fn overlaps<T: Schedulable>(a: &T, b: &T) -> bool {
    a.anchor() < b.end() && b.anchor() < a.end()
}

/// Span covering every occurrence `item` can produce.
fn footprint<T: Schedulable>(item: &T) -> Result<Window, CoreError> {
    let duration = item.end() - item.anchor();
    let last_start = match item.recurrence() {
        Some(recurrence) => recurrence
            .series_end_date
            .succ_opt()
            .map(|day| day.and_time(NaiveTime::MIN))
            .unwrap_or(NaiveDateTime::MAX),
        None => item.anchor() + Duration::nanoseconds(1),
    };
    let end = last_start
        .checked_add_signed(duration)
        .unwrap_or(NaiveDateTime::MAX);
    Window::new(item.anchor(), end.max(item.anchor()))
}

/// Finds clashes between what `plan` writes and the rest of the schedule as
/// it will look once the plan is applied.
pub fn find_clashes<T: Schedulable + PartialEq>(
    existing: &[T],
    plan: &MutationPlan<T>,
) -> Result<Vec<Clash>, CoreError> {
    let mut after: BTreeMap<String, T> = existing
        .iter()
        .map(|item| (item.id().to_string(), item.clone()))
        .collect();
    for mutation in &plan.mutations {
        mutation.apply_to(&mut after)?;
    }

    let mut clashes = Vec::new();
    for incoming in plan.mutations.iter().filter_map(|m| m.written_item()) {
        // Read the record back: later mutations in the plan may have changed it.
        let Some(incoming) = after.get(incoming.id()) else {
            continue;
        };
        let Some(resource) = incoming.resource() else {
            continue;
        };
        if incoming.end() <= incoming.anchor() {
            continue;
        }

        let window = footprint(incoming)?;
        let others: Vec<T> = after
            .values()
            .filter(|other| other.id() != incoming.id() && other.resource() == Some(resource))
            .cloned()
            .collect();
        // Reach back far enough to see slots that started before ours.
        let longest = others
            .iter()
            .map(|other| other.end() - other.anchor())
            .max()
            .unwrap_or_else(Duration::zero);
        let lookback = Window::new(
            window.start.checked_sub_signed(longest).unwrap_or(window.start),
            window.end,
        )?;
        let mut occupied: Vec<Instance<T>> = expand(&others, &lookback)?;
        occupied.sort_by_key(|o| o.item.anchor());

        for candidate in expand_item(incoming, &window)? {
            // Nothing starting before `reach` lasts long enough to overlap.
            let reach = candidate
                .item
                .anchor()
                .checked_sub_signed(longest.max(Duration::zero()))
                .unwrap_or(NaiveDateTime::MIN);
            let first = occupied.partition_point(|o| o.item.anchor() < reach);
            let hit = occupied[first..]
                .iter()
                .take_while(|o| o.item.anchor() < candidate.item.end())
                .find(|o| overlaps(&candidate.item, &o.item));
            if let Some(hit) = hit {
                clashes.push(Clash {
                    resource: resource.to_string(),
                    incoming: candidate.id.clone(),
                    existing: hit.id.clone(),
                    start: candidate.item.anchor(),
                });
            }
        }
    }
    Ok(clashes)
}

/// Rejects `plan` with [`CoreError::Conflict`] if it double-books a resource.
pub fn check_plan<T: Schedulable + PartialEq>(
    existing: &[T],
    plan: &MutationPlan<T>,
) -> Result<(), CoreError> {
    match find_clashes(existing, plan)?.first() {
        Some(clash) => Err(CoreError::Conflict(clash.to_string())),
        None => Ok(()),
    }
}
