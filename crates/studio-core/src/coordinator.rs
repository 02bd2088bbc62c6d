//! Applies series edits against a store.
//!
//! Plans for the same series run one at a time, in the order they were
//! submitted. Each series gets a queue drained by its own worker task, so an
//! apply that has started keeps going even if the caller stops waiting. A
//! worker exits and drops its queue once nothing is left to run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::conflict::check_plan;
use crate::error::CoreError;
use crate::models::MutationPlan;
use crate::recurrence::{expand, expand_item, parse_instance_id, Instance, Schedulable, Window};
use crate::repository::{ItemStore, StoredItem};
use crate::series::{Decision, Interaction, SeriesAction};

struct Job<T> {
    plan: MutationPlan<T>,
    reply: oneshot::Sender<Result<(), CoreError>>,
}

type Queues<T> = Mutex<HashMap<String, mpsc::UnboundedSender<Job<T>>>>;

/// Front door for reading a schedule and writing series edits.
pub struct SeriesCoordinator<T, S> {
    store: Arc<S>,
    queues: Arc<Queues<T>>,
    check_conflicts: bool,
}

impl<T, S> SeriesCoordinator<T, S>
where
    T: StoredItem,
    S: ItemStore<T> + 'static,
{
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            queues: Arc::new(Mutex::new(HashMap::new())),
            check_conflicts: true,
        }
    }

    /// Turns resource double-booking checks on or off.
    pub fn with_conflict_checks(mut self, enabled: bool) -> Self {
        self.check_conflicts = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every visible instance inside `window`, in expansion order.
    pub async fn expand_window(&self, window: &Window) -> Result<Vec<Instance<T>>, CoreError> {
        let items = self.store.list_items().await?;
        expand(&items, window)
    }

    /// The stored record `target` was expanded from.
    pub async fn find_template_for(&self, target: &Instance<T>) -> Result<Option<T>, CoreError> {
        let id = target.series_id.as_deref().unwrap_or(&target.id);
        self.store.find_item(id).await
    }

    /// Looks up a displayed instance by id.
    ///
    /// Stored records resolve to themselves. Occurrence ids resolve only if
    /// their series still generates that slot.
    pub async fn resolve_instance(&self, id: &str) -> Result<Instance<T>, CoreError> {
        if let Some(item) = self.store.find_item(id).await? {
            return Ok(Instance::standalone(item));
        }

        let (series_id, at) =
            parse_instance_id(id).ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let template = self
            .store
            .find_item(series_id)
            .await?
            .filter(|template| template.recurrence().is_some())
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let slot = Window::new(at, at + Duration::seconds(1))?;
        expand_item(&template, &slot)?
            .into_iter()
            .find(|instance| instance.scheduled_at == at)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    /// Starts `action` on `target`, loading its template from the store.
    pub async fn begin(
        &self,
        interaction: &mut Interaction<T>,
        action: SeriesAction<T>,
        target: Instance<T>,
    ) -> Result<Decision<T>, CoreError> {
        let template = self.find_template_for(&target).await?;
        interaction.begin(action, target, template)
    }

    /// Applies `plan` after every earlier plan for the same series.
    ///
    /// Returns [`CoreError::Interrupted`] if the series worker went away
    /// before reporting back.
    pub async fn apply(&self, plan: MutationPlan<T>) -> Result<(), CoreError> {
        if plan.is_empty() {
            return Ok(());
        }
        let (reply, outcome) = oneshot::channel();
        self.enqueue(Job { plan, reply })?;
        outcome.await.map_err(|_| CoreError::Interrupted)?
    }

    fn enqueue(&self, job: Job<T>) -> Result<(), CoreError> {
        let mut queues = self.queues.lock().map_err(|_| CoreError::Interrupted)?;
        let series_id = job.plan.series_id.clone();

        if queues.get(&series_id).map_or(true, |sender| sender.is_closed()) {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(drain_queue(
                Arc::clone(&self.store),
                Arc::clone(&self.queues),
                series_id.clone(),
                receiver,
                self.check_conflicts,
            ));
            debug!(series = %series_id, "started series worker");
            queues.insert(series_id.clone(), sender);
        }
        let sender = queues.get(&series_id).ok_or(CoreError::Interrupted)?;
        sender.send(job).map_err(|_| CoreError::Interrupted)
    }
}

async fn drain_queue<T, S>(
    store: Arc<S>,
    queues: Arc<Queues<T>>,
    series_id: String,
    mut receiver: mpsc::UnboundedReceiver<Job<T>>,
    check_conflicts: bool,
) where
    T: StoredItem,
    S: ItemStore<T>,
{
    let Some(mut job) = receiver.recv().await else {
        return;
    };
    loop {
        let Job { plan, reply } = job;
        let result = run_plan(store.as_ref(), &plan, check_conflicts).await;
        match &result {
            Ok(()) => info!(
                series = %plan.series_id,
                scope = ?plan.scope,
                mutations = plan.len(),
                "series edit applied"
            ),
            Err(e) => warn!(series = %plan.series_id, error = %e, "series edit rejected"),
        }

        // Retire before replying, so a caller that sees the result also sees
        // the queue gone.
        let next = next_job(&queues, &series_id, &mut receiver);
        // The caller may have stopped waiting; the edit stands either way.
        let _ = reply.send(result);
        match next {
            Some(queued) => job = queued,
            None => break,
        }
    }
    debug!(series = %series_id, "series worker finished");
}

/// Takes the next queued job, or unregisters the queue when there is none.
fn next_job<T>(
    queues: &Queues<T>,
    series_id: &str,
    receiver: &mut mpsc::UnboundedReceiver<Job<T>>,
) -> Option<Job<T>> {
    if let Ok(job) = receiver.try_recv() {
        return Some(job);
    }
    // Jobs are only sent with the map locked, so an empty queue seen under
    // the lock stays empty once the sender is removed.
    let mut queues = queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match receiver.try_recv() {
        Ok(job) => Some(job),
        Err(_) => {
            queues.remove(series_id);
            None
        }
    }
}

async fn run_plan<T, S>(store: &S, plan: &MutationPlan<T>, check_conflicts: bool) -> Result<(), CoreError>
where
    T: StoredItem,
    S: ItemStore<T> + ?Sized,
{
    if check_conflicts {
        let existing = store.list_items().await?;
        check_plan(&existing, plan)?;
    }
    store.apply(plan).await?;

    for item in plan.mutations.iter().filter_map(|m| m.written_item()) {
        warn_if_exhausted(item);
    }
    Ok(())
}

fn warn_if_exhausted<T: Schedulable>(item: &T) {
    if let Some(recurrence) = item.recurrence() {
        if recurrence.is_exhausted_before(item.anchor()) {
            warn!(
                item = %item.id(),
                series_end = %recurrence.series_end_date,
                "series ends before its first occurrence and will show nothing"
            );
        }
    }
}
