//! Planning of edits and deletes made through one displayed occurrence.
//!
//! Planning is pure: it turns a user action plus the chosen [`EditScope`]
//! into a [`MutationPlan`] without touching storage. The
//! [`SeriesCoordinator`](crate::coordinator::SeriesCoordinator) applies plans.

use chrono::NaiveDate;

use crate::error::CoreError;
use crate::models::{EditScope, Mutation, MutationPlan, Recurrence, TemplatePatch};
use crate::recurrence::{Instance, Schedulable};

/// What the user did to the selected occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesAction<T> {
    /// Save the edited copy of the occurrence. Its timing may differ from
    /// the slot; a recurrence on it replaces the series settings.
    Save(T),
    Delete,
}

impl<T> SeriesAction<T> {
    pub fn is_delete(&self) -> bool {
        matches!(self, SeriesAction::Delete)
    }
}

/// Whether an action on `target` has to ask for an [`EditScope`] first.
///
/// Only occurrences of a recurring template ask. Editing the template record
/// itself, or any item without a series, applies directly.
pub fn requires_scope<T: Schedulable>(target: &Instance<T>, template: Option<&T>) -> bool {
    match template {
        Some(template) if template.recurrence().is_some() => {
            target.id != template.id() || target.series_id.as_deref() == Some(template.id())
        }
        _ => false,
    }
}

/// Plans an action that does not need a scope.
///
/// A direct edit of a recurring template behaves like
/// [`EditScope::EntireSeries`]; everything else is a plain single-record
/// write.
pub fn plan_direct<T: Schedulable>(
    action: &SeriesAction<T>,
    target: &Instance<T>,
    template: Option<&T>,
) -> Result<MutationPlan<T>, CoreError> {
    if let Some(template) = template.filter(|t| t.recurrence().is_some()) {
        if requires_scope(target, Some(template)) {
            return Err(CoreError::InvalidInput(format!(
                "Occurrence {} of series {} needs an edit scope",
                target.id,
                template.id()
            )));
        }
        return plan_scoped(action, EditScope::EntireSeries, template, target);
    }

    let mutation = match action {
        SeriesAction::Save(edited) => {
            let mut item = edited.clone();
            item.set_id(target.id.clone());
            Mutation::UpdateTemplate {
                id: target.id.clone(),
                patch: TemplatePatch::Replace(item),
            }
        }
        SeriesAction::Delete => Mutation::DeleteTemplate {
            id: target.id.clone(),
        },
    };
    Ok(MutationPlan::single(target.id.clone(), mutation))
}

/// Plans `action` on `target`, an occurrence of `template`, under `scope`.
pub fn plan_scoped<T: Schedulable>(
    action: &SeriesAction<T>,
    scope: EditScope,
    template: &T,
    target: &Instance<T>,
) -> Result<MutationPlan<T>, CoreError> {
    let recurrence = template.recurrence().ok_or_else(|| {
        CoreError::InvalidInput(format!("Item {} is not a recurring series", template.id()))
    })?;
    let is_template_itself = target.id == template.id();
    if !is_template_itself && target.series_id.as_deref() != Some(template.id()) {
        return Err(CoreError::InvalidInput(format!(
            "{} is not an occurrence of series {}",
            target.id,
            template.id()
        )));
    }

    let series_id = template.id().to_string();
    let occurrence_date = target.occurrence_date();
    let mutations = match (scope, action) {
        (EditScope::ThisOccurrence, SeriesAction::Delete) => {
            vec![add_exception(&series_id, occurrence_date)]
        }
        (EditScope::ThisOccurrence, SeriesAction::Save(edited)) => {
            let mut standalone = edited.clone();
            standalone.set_id(crate::new_id());
            standalone.set_recurrence(None);
            vec![
                add_exception(&series_id, occurrence_date),
                Mutation::CreateStandalone(standalone),
            ]
        }
        (EditScope::ThisAndFuture, SeriesAction::Delete) => {
            vec![end_before(&series_id, occurrence_date)?]
        }
        (EditScope::ThisAndFuture, SeriesAction::Save(edited)) => {
            let mut continuation = edited.clone();
            continuation.set_id(crate::new_id());
            continuation.set_recurrence(Some(continuation_recurrence(
                recurrence,
                edited,
                occurrence_date,
            )?));
            vec![
                end_before(&series_id, occurrence_date)?,
                Mutation::CreateTemplate(continuation),
            ]
        }
        (EditScope::EntireSeries, SeriesAction::Delete) => {
            vec![Mutation::DeleteTemplate { id: series_id.clone() }]
        }
        (EditScope::EntireSeries, SeriesAction::Save(edited)) => {
            let merged = merge_into_series(template, recurrence, edited, is_template_itself);
            vec![Mutation::UpdateTemplate {
                id: series_id.clone(),
                patch: TemplatePatch::Replace(merged),
            }]
        }
    };

    Ok(MutationPlan {
        series_id,
        scope: Some(scope),
        mutations,
    })
}

fn add_exception<T>(series_id: &str, date: NaiveDate) -> Mutation<T> {
    Mutation::UpdateTemplate {
        id: series_id.to_string(),
        patch: TemplatePatch::AddExceptionDate(date),
    }
}

fn end_before<T>(series_id: &str, date: NaiveDate) -> Result<Mutation<T>, CoreError> {
    let last_day = date
        .pred_opt()
        .ok_or_else(|| CoreError::InvalidInput(format!("No day before {}", date)))?;
    Ok(Mutation::UpdateTemplate {
        id: series_id.to_string(),
        patch: TemplatePatch::EndSeriesOn(last_day),
    })
}

/// Series settings for the template that continues a split series.
///
/// An explicit recurrence on the edit wins. Otherwise the original rule
/// carries over and the end date moves by as many days as the edit moved
/// the occurrence. Exceptions never carry over.
fn continuation_recurrence<T: Schedulable>(
    original: &Recurrence,
    edited: &T,
    occurrence_date: NaiveDate,
) -> Result<Recurrence, CoreError> {
    if let Some(explicit) = edited.recurrence() {
        let mut recurrence = explicit.clone();
        recurrence.exception_dates.clear();
        return Ok(recurrence);
    }

    let shift = edited.anchor().date() - occurrence_date;
    let series_end_date = original
        .series_end_date
        .checked_add_signed(shift)
        .ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "Series end {} cannot move by {} days",
                original.series_end_date,
                shift.num_days()
            ))
        })?;
    Ok(Recurrence {
        rule: original.rule.clone(),
        series_end_date,
        exception_dates: Default::default(),
    })
}

/// Overwrites the template's editable fields with the edit, keeping the
/// template id, its first date and its exception dates.
fn merge_into_series<T: Schedulable>(
    template: &T,
    recurrence: &Recurrence,
    edited: &T,
    is_template_itself: bool,
) -> T {
    let mut merged = edited.clone();
    merged.set_id(template.id().to_string());

    // Edits through an occurrence carry that occurrence's date; only the
    // time of day applies to the whole series.
    let anchor = if is_template_itself {
        edited.anchor()
    } else {
        template.anchor().date().and_time(edited.anchor().time())
    };
    merged.reschedule(anchor);

    let mut settings = match edited.recurrence() {
        Some(explicit) => explicit.clone(),
        None => recurrence.clone(),
    };
    settings.exception_dates = recurrence.exception_dates.clone();
    merged.set_recurrence(Some(settings));
    merged
}

/// Selection state of the edit-scope prompt.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interaction<T> {
    #[default]
    Idle,
    ConfirmingScope {
        action: SeriesAction<T>,
        target: Instance<T>,
        template: T,
    },
}

/// Outcome of starting an interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    /// Ask for a scope, then call [`Interaction::confirm`].
    AskScope,
    /// Nothing to ask; apply this plan.
    Apply(MutationPlan<T>),
}

impl<T: Schedulable> Interaction<T> {
    /// Starts an action on `target`. `template` is the stored record the
    /// target was expanded from, or the target's own record.
    pub fn begin(
        &mut self,
        action: SeriesAction<T>,
        target: Instance<T>,
        template: Option<T>,
    ) -> Result<Decision<T>, CoreError> {
        match template {
            Some(template) if requires_scope(&target, Some(&template)) => {
                *self = Interaction::ConfirmingScope {
                    action,
                    target,
                    template,
                };
                Ok(Decision::AskScope)
            }
            template => {
                *self = Interaction::Idle;
                plan_direct(&action, &target, template.as_ref()).map(Decision::Apply)
            }
        }
    }

    /// Resolves the pending prompt with `scope`.
    ///
    /// On a planning error the prompt stays open so another scope can be
    /// picked.
    pub fn confirm(&mut self, scope: EditScope) -> Result<MutationPlan<T>, CoreError> {
        let plan = match self {
            Interaction::Idle => {
                return Err(CoreError::InvalidInput(
                    "No edit is waiting for a scope".to_string(),
                ))
            }
            Interaction::ConfirmingScope {
                action,
                target,
                template,
            } => plan_scoped(action, scope, template, target)?,
        };
        *self = Interaction::Idle;
        Ok(plan)
    }

    /// Closes the prompt without planning anything.
    pub fn dismiss(&mut self) {
        *self = Interaction::Idle;
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self, Interaction::ConfirmingScope { .. })
    }

    /// Target of the pending prompt, for rendering it.
    pub fn pending_target(&self) -> Option<&Instance<T>> {
        match self {
            Interaction::ConfirmingScope { target, .. } => Some(target),
            Interaction::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Booking, Frequency, Task};
    use crate::recurrence::{expand, Window};
    use chrono::NaiveDateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn weekly_class() -> Booking {
        Booking {
            id: "spin".to_string(),
            title: "Spin class".to_string(),
            resource: Some("coach-maria".to_string()),
            start_time: at(2024, 1, 1, 9, 0),
            end_time: at(2024, 1, 1, 10, 0),
            recurrence: Some(Recurrence::new(Frequency::Weekly, date(2024, 1, 29))),
            ..Default::default()
        }
    }

    fn occurrence_on(template: &Booking, day: NaiveDate) -> Instance<Booking> {
        expand(&[template.clone()], &Window::day(day).unwrap())
            .unwrap()
            .pop()
            .unwrap()
    }

    fn moved_to(instance: &Instance<Booking>, start: NaiveDateTime) -> Booking {
        let mut edited = instance.item.clone();
        edited.reschedule(start);
        edited
    }

    mod trigger_tests {
        use super::*;

        #[test]
        fn test_occurrence_of_series_asks_for_scope() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            assert!(requires_scope(&target, Some(&template)));
        }

        #[test]
        fn test_first_occurrence_also_asks() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 1));
            assert!(requires_scope(&target, Some(&template)));
        }

        #[test]
        fn test_template_itself_does_not_ask() {
            let template = weekly_class();
            let target = Instance::standalone(template.clone());
            assert!(!requires_scope(&target, Some(&template)));
        }

        #[test]
        fn test_plain_item_does_not_ask() {
            let plain = Booking {
                id: "pt".to_string(),
                ..Default::default()
            };
            let target = Instance::standalone(plain.clone());
            assert!(!requires_scope(&target, Some(&plain)));
            assert!(!requires_scope(&target, None));
        }
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_save_one_excepts_date_and_creates_standalone() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let edited = moved_to(&target, at(2024, 1, 15, 11, 0));

            let plan = plan_scoped(
                &SeriesAction::Save(edited),
                EditScope::ThisOccurrence,
                &template,
                &target,
            )
            .unwrap();

            assert_eq!(plan.series_id, "spin");
            assert_eq!(plan.len(), 2);
            assert_eq!(
                plan.mutations[0],
                Mutation::UpdateTemplate {
                    id: "spin".to_string(),
                    patch: TemplatePatch::AddExceptionDate(date(2024, 1, 15)),
                }
            );
            match &plan.mutations[1] {
                Mutation::CreateStandalone(standalone) => {
                    assert_eq!(standalone.start_time, at(2024, 1, 15, 11, 0));
                    assert_eq!(standalone.end_time, at(2024, 1, 15, 12, 0));
                    assert_ne!(standalone.id, target.id);
                    assert!(standalone.recurrence.is_none());
                }
                other => panic!("expected standalone create, got {:?}", other),
            }
        }

        #[test]
        fn test_delete_one_only_excepts_date() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let plan = plan_scoped(
                &SeriesAction::Delete,
                EditScope::ThisOccurrence,
                &template,
                &target,
            )
            .unwrap();
            assert_eq!(plan.mutations, vec![add_exception::<Booking>("spin", date(2024, 1, 15))]);
        }

        #[test]
        fn test_delete_future_ends_series_the_day_before() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let plan = plan_scoped(
                &SeriesAction::Delete,
                EditScope::ThisAndFuture,
                &template,
                &target,
            )
            .unwrap();
            assert_eq!(
                plan.mutations,
                vec![Mutation::<Booking>::UpdateTemplate {
                    id: "spin".to_string(),
                    patch: TemplatePatch::EndSeriesOn(date(2024, 1, 14)),
                }]
            );
        }

        #[test]
        fn test_save_future_splits_and_shifts_end_date() {
            let mut template = weekly_class();
            template
                .recurrence
                .as_mut()
                .unwrap()
                .add_exception(date(2024, 1, 22));
            let target = occurrence_on(&template, date(2024, 1, 15));
            let mut edited = moved_to(&target, at(2024, 1, 16, 18, 0));
            edited.title = "Evening spin".to_string();

            let plan = plan_scoped(
                &SeriesAction::Save(edited),
                EditScope::ThisAndFuture,
                &template,
                &target,
            )
            .unwrap();

            assert_eq!(
                plan.mutations[0],
                Mutation::UpdateTemplate {
                    id: "spin".to_string(),
                    patch: TemplatePatch::EndSeriesOn(date(2024, 1, 14)),
                }
            );
            match &plan.mutations[1] {
                Mutation::CreateTemplate(continuation) => {
                    let recurrence = continuation.recurrence.as_ref().unwrap();
                    assert_eq!(continuation.title, "Evening spin");
                    assert_eq!(continuation.start_time, at(2024, 1, 16, 18, 0));
                    assert_eq!(recurrence.rule, "weekly");
                    assert_eq!(recurrence.series_end_date, date(2024, 1, 30));
                    assert!(recurrence.exception_dates.is_empty());
                    assert_ne!(continuation.id, "spin");
                }
                other => panic!("expected template create, got {:?}", other),
            }
        }

        #[test]
        fn test_save_future_prefers_explicit_recurrence() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let mut edited = target.item.clone();
            edited.recurrence = Some(Recurrence::new(Frequency::Daily, date(2024, 2, 10)));

            let plan = plan_scoped(
                &SeriesAction::Save(edited),
                EditScope::ThisAndFuture,
                &template,
                &target,
            )
            .unwrap();
            let continuation = plan.mutations[1].written_item().unwrap();
            let recurrence = continuation.recurrence.as_ref().unwrap();
            assert_eq!(recurrence.rule, "daily");
            assert_eq!(recurrence.series_end_date, date(2024, 2, 10));
        }

        #[test]
        fn test_save_all_keeps_id_first_date_and_exceptions() {
            let mut template = weekly_class();
            template
                .recurrence
                .as_mut()
                .unwrap()
                .add_exception(date(2024, 1, 8));
            let target = occurrence_on(&template, date(2024, 1, 15));
            let mut edited = target.item.clone();
            edited.title = "Power spin".to_string();
            edited.resource = Some("coach-li".to_string());
            edited.start_time = at(2024, 1, 15, 7, 0);
            edited.end_time = at(2024, 1, 15, 8, 30);

            let plan = plan_scoped(
                &SeriesAction::Save(edited),
                EditScope::EntireSeries,
                &template,
                &target,
            )
            .unwrap();
            let merged = plan.mutations[0].written_item().unwrap();
            assert_eq!(merged.id, "spin");
            assert_eq!(merged.title, "Power spin");
            assert_eq!(merged.resource.as_deref(), Some("coach-li"));
            assert_eq!(merged.start_time, at(2024, 1, 1, 7, 0));
            assert_eq!(merged.end_time, at(2024, 1, 1, 8, 30));
            let recurrence = merged.recurrence.as_ref().unwrap();
            assert!(recurrence.is_exception(date(2024, 1, 8)));
            assert_eq!(recurrence.series_end_date, date(2024, 1, 29));
        }

        #[test]
        fn test_delete_all_removes_template() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let plan = plan_scoped(
                &SeriesAction::Delete,
                EditScope::EntireSeries,
                &template,
                &target,
            )
            .unwrap();
            assert_eq!(
                plan.mutations,
                vec![Mutation::<Booking>::DeleteTemplate { id: "spin".to_string() }]
            );
        }

        #[test]
        fn test_foreign_occurrence_is_rejected() {
            let template = weekly_class();
            let other = Booking {
                id: "boxing".to_string(),
                ..weekly_class()
            };
            let target = occurrence_on(&other, date(2024, 1, 15));
            let result = plan_scoped(
                &SeriesAction::Delete,
                EditScope::ThisOccurrence,
                &template,
                &target,
            );
            assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        }

        #[test]
        fn test_direct_edit_of_plain_item_replaces_it() {
            let task = Task {
                id: "mop".to_string(),
                title: "Mop floor".to_string(),
                due_at: at(2024, 1, 2, 20, 0),
                ..Default::default()
            };
            let target = Instance::standalone(task.clone());
            let mut edited = task.clone();
            edited.title = "Mop and dry floor".to_string();

            let plan = plan_direct(&SeriesAction::Save(edited.clone()), &target, Some(&task)).unwrap();
            assert_eq!(plan.scope, None);
            assert_eq!(
                plan.mutations,
                vec![Mutation::UpdateTemplate {
                    id: "mop".to_string(),
                    patch: TemplatePatch::Replace(edited),
                }]
            );
        }

        #[test]
        fn test_direct_edit_of_template_applies_to_series() {
            let template = weekly_class();
            let target = Instance::standalone(template.clone());
            let mut edited = template.clone();
            edited.start_time = at(2024, 1, 2, 9, 0);
            edited.end_time = at(2024, 1, 2, 10, 0);

            let plan = plan_direct(&SeriesAction::Save(edited), &target, Some(&template)).unwrap();
            assert_eq!(plan.scope, Some(EditScope::EntireSeries));
            let merged = plan.mutations[0].written_item().unwrap();
            assert_eq!(merged.start_time, at(2024, 1, 2, 9, 0));
        }
    }

    mod interaction_tests {
        use super::*;

        #[test]
        fn test_occurrence_edit_waits_for_scope() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let mut interaction = Interaction::default();

            let decision = interaction
                .begin(SeriesAction::Delete, target.clone(), Some(template))
                .unwrap();
            assert_eq!(decision, Decision::AskScope);
            assert!(interaction.is_confirming());
            assert_eq!(interaction.pending_target(), Some(&target));

            let plan = interaction.confirm(EditScope::ThisOccurrence).unwrap();
            assert_eq!(plan.scope, Some(EditScope::ThisOccurrence));
            assert_eq!(interaction, Interaction::Idle);
        }

        #[test]
        fn test_plain_item_applies_immediately() {
            let plain = Booking {
                id: "pt".to_string(),
                ..Default::default()
            };
            let mut interaction = Interaction::default();
            let decision = interaction
                .begin(SeriesAction::Delete, Instance::standalone(plain), None)
                .unwrap();
            assert!(matches!(decision, Decision::Apply(_)));
            assert!(!interaction.is_confirming());
        }

        #[test]
        fn test_confirm_without_prompt_fails() {
            let mut interaction: Interaction<Booking> = Interaction::Idle;
            assert!(interaction.confirm(EditScope::EntireSeries).is_err());
        }

        #[test]
        fn test_dismiss_drops_pending_prompt() {
            let template = weekly_class();
            let target = occurrence_on(&template, date(2024, 1, 15));
            let mut interaction = Interaction::default();
            interaction
                .begin(SeriesAction::Delete, target, Some(template))
                .unwrap();
            interaction.dismiss();
            assert!(interaction.pending_target().is_none());
            assert!(interaction.confirm(EditScope::ThisOccurrence).is_err());
        }
    }
}
