//! Scripted in-memory [`Consumer`].
//!
//! Plays back a queue of messages and assignment changes. Queued rebalances are
//! served from inside [`Consumer::poll`], the way a real client runs its
//! rebalance callbacks while polling.

use crate::consumer::{AssignmentCallback, Consumer, Message, TopicPartitionList};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// One queued item of a [`MemoryConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Message(Message),
    Rebalance(TopicPartitionList),
}

/// In-memory consumer driven by a queue of [`Step`]s.
#[derive(Default)]
pub struct MemoryConsumer {
    steps: VecDeque<Step>,
    assignment: TopicPartitionList,
    callback: Option<AssignmentCallback>,
    rebalances: usize,
}

impl MemoryConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&mut self, message: Message) -> &mut Self {
        self.steps.push_back(Step::Message(message));
        self
    }

    /// Queues an assignment change, served by the next `poll()` that reaches it.
    pub fn push_rebalance(&mut self, assignment: TopicPartitionList) -> &mut Self {
        self.steps.push_back(Step::Rebalance(assignment));
        self
    }

    /// Applies an assignment change right away.
    ///
    /// The installed callback may rewrite the list; the rewritten list becomes
    /// the current assignment and is returned.
    pub fn rebalance(&mut self, mut assignment: TopicPartitionList) -> &TopicPartitionList {
        if let Some(callback) = self.callback.as_mut() {
            callback(&mut assignment);
        }
        self.rebalances += 1;
        debug!(
            "Applied assignment #{} with {} partitions",
            self.rebalances,
            assignment.count()
        );
        self.assignment = assignment;
        &self.assignment
    }

    /// The last applied assignment, as left by the assignment callback.
    pub fn assignment(&self) -> &TopicPartitionList {
        &self.assignment
    }

    pub fn rebalance_count(&self) -> usize {
        self.rebalances
    }

    pub fn pending(&self) -> usize {
        self.steps.len()
    }

    pub fn is_drained(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_assignment_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl Consumer for MemoryConsumer {
    fn poll(&mut self) -> Option<Message> {
        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::Message(message) => return Some(message),
                Step::Rebalance(assignment) => {
                    self.rebalance(assignment);
                }
            }
        }
        None
    }

    fn take_assignment_callback(&mut self) -> Option<AssignmentCallback> {
        self.callback.take()
    }

    fn set_assignment_callback(&mut self, callback: Option<AssignmentCallback>) {
        self.callback = callback;
    }
}

impl Extend<Step> for MemoryConsumer {
    fn extend<I: IntoIterator<Item = Step>>(&mut self, iter: I) {
        self.steps.extend(iter);
    }
}

impl FromIterator<Step> for MemoryConsumer {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        let mut consumer = Self::new();
        consumer.extend(iter);
        consumer
    }
}

impl fmt::Debug for MemoryConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConsumer")
            .field("pending", &self.steps.len())
            .field("assignment", &self.assignment)
            .field("has_callback", &self.callback.is_some())
            .field("rebalances", &self.rebalances)
            .finish()
    }
}
