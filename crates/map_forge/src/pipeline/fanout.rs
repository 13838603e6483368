//! Broadcast-with-copy slot holding one entry's result.
//!
//! One producer publishes a value; the single own-chain consumer gets the original and every
//! other registered consumer gets its own snapshot clone. Clones are prepared at publish time,
//! before any consumer is released, so no consumer can observe another's in-place mutation.

/// Outcome of a [`FanOut::take`] request.
#[derive(Debug)]
pub(crate) enum Take<M> {
    Value(M),
    Exhausted,
    Failed,
}

#[derive(Debug)]
pub(crate) struct FanOut<M> {
    original: Option<M>,
    clones: Vec<M>,
    /// Non-owner consumers subscribed before publication.
    pending: usize,
    published: bool,
    failed: bool,
    /// Dependent entry indices, drained on publication.
    dependents: Vec<usize>,
}

impl<M: Clone> FanOut<M> {
    pub(crate) fn new() -> Self {
        Self {
            original: None,
            clones: Vec::new(),
            pending: 0,
            published: false,
            failed: false,
            dependents: Vec::new(),
        }
    }

    /// Register a consumer. Returns `true` when the value is already available (or failed),
    /// in which case the caller must not wait for a publication notice.
    pub(crate) fn subscribe(&mut self, dependent: usize, owner: bool) -> bool {
        if !self.published {
            if !owner {
                self.pending += 1;
            }
            self.dependents.push(dependent);
            return false;
        }
        if !owner {
            if let Some(original) = &self.original {
                self.clones.push(original.clone());
            }
        }
        true
    }

    /// Store the produced value, prepare one clone per pending non-owner consumer and return
    /// the dependents to notify.
    pub(crate) fn publish(&mut self, value: M) -> Vec<usize> {
        self.clones = (0..self.pending).map(|_| value.clone()).collect();
        self.original = Some(value);
        self.published = true;
        std::mem::take(&mut self.dependents)
    }

    /// Mark the producer as failed and return the dependents to notify.
    pub(crate) fn fail(&mut self) -> Vec<usize> {
        self.failed = true;
        self.published = true;
        std::mem::take(&mut self.dependents)
    }

    /// Hand out the original to the owner, or one clone to anyone else.
    pub(crate) fn take(&mut self, owner: bool) -> Take<M> {
        if self.failed {
            return Take::Failed;
        }
        let value = if owner {
            self.original.take()
        } else {
            self.clones.pop()
        };
        match value {
            Some(v) => Take::Value(v),
            None => Take::Exhausted,
        }
    }

    /// The original value, if it has not moved down its chain.
    pub(crate) fn original(&self) -> Option<&M> {
        self.original.as_ref()
    }

    #[cfg(test)]
    fn remaining_clones(&self) -> usize {
        self.clones.len()
    }
}
