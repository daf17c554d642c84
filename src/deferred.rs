//! Single-shot tasks that run once the event loop goes idle.

use std::cell::Cell;
use std::rc::Rc;

use calloop::{Idle, LoopHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Ran,
    Cancelled,
}

/// Handle to a task that runs at most once and can be cancelled until it does.
///
/// Clones refer to the same task.
#[derive(Debug, Clone)]
pub struct DeferredTask {
    state: Rc<Cell<TaskState>>,
}

impl DeferredTask {
    pub fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(TaskState::Pending)),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    pub fn is_pending(&self) -> bool {
        self.state.get() == TaskState::Pending
    }

    /// Cancels the task if it has not run yet.
    pub fn cancel(&self) {
        if self.is_pending() {
            self.state.set(TaskState::Cancelled);
        }
    }

    /// Marks the task as run. Returns `false` if it already ran or was cancelled.
    pub fn claim(&self) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.state.set(TaskState::Ran);
        true
    }

    pub fn same_task(&self, other: &DeferredTask) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for DeferredTask {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `run` when the event loop becomes idle, unless `task` was cancelled by then.
pub fn schedule_idle<D: 'static>(
    handle: &LoopHandle<'static, D>,
    task: &DeferredTask,
    run: impl FnOnce(&mut D, &DeferredTask) + 'static,
) -> Idle<'static> {
    let task = task.clone();
    handle.insert_idle(move |data| {
        if task.is_pending() {
            run(data, &task);
        } else {
            trace!("skipping deferred task in state {:?}", task.state());
        }
    })
}
