//! Scheduled entries and their completion signal.
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::mask::{Mask, MaskId};
use crate::pipeline::fanout::{FanOut, Take};

/// A declared operation: mutates the target in place given owned dependency values.
pub(crate) type Operation<M> = Box<dyn FnOnce(&mut M, Vec<M>) -> Result<()> + Send + 'static>;

/// Where an entry gets one of its values from when it runs.
pub(crate) enum Source<M> {
    /// Value captured at declaration time (an unmutated seed).
    Ready(M),
    /// Result of an earlier entry.
    Entry(Arc<Entry<M>>),
}

pub(crate) struct Work<M> {
    pub(crate) target: Source<M>,
    pub(crate) inputs: Vec<Source<M>>,
    pub(crate) operation: Operation<M>,
}

/// Why an entry did not produce a value.
#[derive(Clone, Debug)]
pub(crate) enum Failure {
    Operation(String),
    Dependency(usize),
    Exhausted { source: usize, requester: String },
}

/// One-shot completion flag other threads can block on.
pub(crate) struct Completion {
    outcome: Mutex<Option<std::result::Result<(), Failure>>>,
    cvar: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            cvar: Condvar::new(),
        }
    }

    fn complete(&self, outcome: std::result::Result<(), Failure>) {
        let mut guard = self.outcome.lock();
        *guard = Some(outcome);
        self.cvar.notify_all();
    }

    fn wait(&self) -> std::result::Result<(), Failure> {
        let mut guard = self.outcome.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            self.cvar.wait(&mut guard);
        }
    }

    fn peek(&self) -> Option<std::result::Result<(), Failure>> {
        self.outcome.lock().clone()
    }
}

pub(crate) struct Entry<M> {
    pub(crate) index: usize,
    pub(crate) target: MaskId,
    pub(crate) target_name: String,
    pub(crate) label: String,
    pub(crate) call_site: &'static Location<'static>,
    /// Dependencies not yet completed, plus one registration guard while declaring.
    pub(crate) remaining: AtomicUsize,
    scheduled: AtomicBool,
    work: Mutex<Option<Work<M>>>,
    pub(crate) fanout: Mutex<FanOut<M>>,
    completion: Completion,
}

impl<M: Mask> Entry<M> {
    pub(crate) fn new(
        index: usize,
        target: MaskId,
        target_name: String,
        label: String,
        call_site: &'static Location<'static>,
        work: Work<M>,
        dependency_count: usize,
    ) -> Self {
        Self {
            index,
            target,
            target_name,
            label,
            call_site,
            remaining: AtomicUsize::new(dependency_count + 1),
            scheduled: AtomicBool::new(false),
            work: Mutex::new(Some(work)),
            fanout: Mutex::new(FanOut::new()),
            completion: Completion::new(),
        }
    }

    /// Claim the right to run this entry. Only the first caller gets `true`.
    pub(crate) fn claim(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    /// Decrement the remaining-dependency counter; `true` when it reached zero.
    pub(crate) fn release_one(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completion.peek().is_some()
    }

    /// Run the operation on resolved inputs. Panics inside the operation are caught and
    /// reported as failures.
    pub(crate) fn execute(&self) -> std::result::Result<M, Failure> {
        let Some(work) = self.work.lock().take() else {
            return Err(Failure::Operation("entry executed twice".into()));
        };
        let Work {
            target,
            inputs,
            operation,
        } = work;

        for source in std::iter::once(&target).chain(inputs.iter()) {
            if let Source::Entry(dep) = source {
                if let Some(Err(_)) = dep.completion.peek() {
                    return Err(Failure::Dependency(dep.index));
                }
            }
        }

        let mut value = self.resolve(target)?;
        let inputs = inputs
            .into_iter()
            .map(|s| self.resolve(s))
            .collect::<std::result::Result<Vec<M>, Failure>>()?;

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            operation(&mut value, inputs).map(|()| value)
        }));
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(Failure::Operation(err.to_string())),
            Err(payload) => Err(Failure::Operation(panic_message(payload.as_ref()))),
        }
    }

    fn resolve(&self, source: Source<M>) -> std::result::Result<M, Failure> {
        match source {
            Source::Ready(value) => Ok(value),
            Source::Entry(dep) => {
                let owner = dep.target == self.target;
                match dep.fanout.lock().take(owner) {
                    Take::Value(value) => Ok(value),
                    Take::Exhausted => Err(Failure::Exhausted {
                        source: dep.index,
                        requester: self.target_name.clone(),
                    }),
                    Take::Failed => Err(Failure::Dependency(dep.index)),
                }
            }
        }
    }

    /// Publish a produced value and signal completion. Returns dependents to notify.
    pub(crate) fn finish(&self, value: M) -> Vec<usize> {
        let dependents = self.fanout.lock().publish(value);
        self.completion.complete(Ok(()));
        dependents
    }

    /// Record a failure and signal completion. Returns dependents to notify.
    pub(crate) fn fail(&self, failure: Failure) -> Vec<usize> {
        let dependents = self.fanout.lock().fail();
        self.completion.complete(Err(failure));
        dependents
    }

    /// Block until the entry completed.
    pub(crate) fn wait(&self) -> Result<()> {
        self.completion
            .wait()
            .map_err(|failure| self.to_error(failure))
    }

    /// Take this entry's result on behalf of `requester`.
    pub(crate) fn take_result(&self, requester: MaskId, requester_name: &str) -> Result<M> {
        self.wait()?;
        match self.fanout.lock().take(requester == self.target) {
            Take::Value(value) => Ok(value),
            Take::Exhausted => Err(Error::FanOutExhausted {
                index: self.index,
                requester: requester_name.to_string(),
            }),
            Take::Failed => Err(Error::DependencyFailed {
                index: self.index,
                dependency: self.index,
            }),
        }
    }

    /// Clone the held original without consuming anything.
    pub(crate) fn peek_result(&self) -> Result<Option<M>> {
        self.wait()?;
        Ok(self.fanout.lock().original().cloned())
    }

    fn to_error(&self, failure: Failure) -> Error {
        match failure {
            Failure::Operation(message) => Error::OperationFailed {
                index: self.index,
                label: self.label.clone(),
                message,
            },
            Failure::Dependency(dependency) => Error::DependencyFailed {
                index: self.index,
                dependency,
            },
            Failure::Exhausted { source, requester } => Error::FanOutExhausted {
                index: source,
                requester,
            },
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
