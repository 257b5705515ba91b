//! Scripted event loop for unit tests
//!
//! Each `run_once` pops and runs one queued step. An active keepalive
//! counts as outstanding work, like a real timer would.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::traits::{EventLoop, KeepaliveHandle};

type Step = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct ScriptedLoop {
    steps: RefCell<VecDeque<Step>>,
    keepalives: RefCell<HashSet<u64>>,
    next_handle: Cell<u64>,
    scheduled: Cell<usize>,
    passes: Cell<usize>,
}

impl ScriptedLoop {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, step: impl FnOnce() + 'static) {
        self.steps.borrow_mut().push_back(Box::new(step));
    }

    pub(crate) fn queued(&self) -> usize {
        self.steps.borrow().len()
    }

    pub(crate) fn passes(&self) -> usize {
        self.passes.get()
    }

    pub(crate) fn keepalives_scheduled(&self) -> usize {
        self.scheduled.get()
    }

    pub(crate) fn active_keepalives(&self) -> usize {
        self.keepalives.borrow().len()
    }
}

impl EventLoop for ScriptedLoop {
    fn run_once(&self) -> bool {
        self.passes.set(self.passes.get() + 1);
        let step = self.steps.borrow_mut().pop_front();
        if let Some(step) = step {
            step();
        }
        self.queued() > 0 || self.active_keepalives() > 0
    }

    fn schedule_keepalive(&self, _period: Duration) -> KeepaliveHandle {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        self.scheduled.set(self.scheduled.get() + 1);
        self.keepalives.borrow_mut().insert(raw);
        KeepaliveHandle(raw)
    }

    fn cancel_keepalive(&self, handle: KeepaliveHandle) {
        self.keepalives.borrow_mut().remove(&handle.0);
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
