use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::domain::DashError;

pub const MAX_TASKS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    RefreshActiveTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Task {
    id: TaskId,
    kind: TaskKind,
    period: Duration,
    // None once the next run lies beyond what `Instant` can represent.
    next_due: Option<Instant>,
    paused: bool,
}

/// Periodic tasks driven by the ui loop.
///
/// Nothing runs on its own: the loop calls `due` and acts on what comes
/// back. Tasks live until cancelled or until `shutdown`.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn every(&mut self, kind: TaskKind, period: Duration, now: Instant) -> Result<TaskId, DashError> {
        if period.is_zero() {
            return Err(DashError::Scheduler("period must be positive".into()));
        }
        if self.tasks.len() >= MAX_TASKS {
            return Err(DashError::Scheduler(format!("task limit of {MAX_TASKS} reached")));
        }
        let next_due = now
            .checked_add(period)
            .ok_or_else(|| DashError::Scheduler(format!("period of {}s is too long", period.as_secs())))?;
        self.next_id += 1;
        let id = TaskId(self.next_id);
        debug!("Scheduling {kind:?} every {}ms as {id:?}", period.as_millis());
        self.tasks.push(Task {
            id,
            kind,
            period,
            next_due: Some(next_due),
            paused: false,
        });
        Ok(id)
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        before != self.tasks.len()
    }

    pub fn pause(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.paused = true;
        }
    }

    /// Resumes a paused task. The next run is a full period away.
    pub fn resume(&mut self, id: TaskId, now: Instant) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id)
            && task.paused
        {
            task.paused = false;
            task.next_due = now.checked_add(task.period);
        }
    }

    /// Tasks that are due at `now`. Missed periods collapse into one run.
    pub fn due(&mut self, now: Instant) -> Vec<TaskKind> {
        let mut fired = Vec::new();
        for task in self
            .tasks
            .iter_mut()
            .filter(|t| !t.paused && t.next_due.is_some_and(|due| due <= now))
        {
            trace!("Task {:?} due", task.id);
            fired.push(task.kind);
            task.next_due = now.checked_add(task.period);
        }
        fired
    }

    pub fn shutdown(&mut self) {
        debug!("Cancelling {} scheduled tasks", self.tasks.len());
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
