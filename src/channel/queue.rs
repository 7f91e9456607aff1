//! Hand-off between the BLE event context and the main loop.
//!
//! The BLE write callback must return quickly, so completed commands are
//! parked here and the main loop takes them on its next poll. Two policies
//! are available:
//!
//! - [`QueuePolicy::LatestWins`]: the legacy single slot. A command submitted
//!   before the previous one was taken **replaces it**, and the previous command
//!   is dropped without being executed. [`SubmitOutcome::Replaced`] hands it
//!   back so the caller can log the drop.
//! - [`QueuePolicy::Fifo`]: a bounded FIFO of [`QUEUE_CAPACITY`] commands.
//!   When it is full, the new command is rejected and the queued ones are kept.
//!
//! Both `submit` and `take` run in constant time and never block.

use core::fmt;

use heapless::{Deque, String, Vec};
use serde::Deserialize;

use super::frame::CommandText;
use super::registry::ConnectionId;

/// Capacity of the FIFO policy.
pub const QUEUE_CAPACITY: usize = 8;

/// Maximum length of an entry in the priority-bypass allow-list.
pub const MAX_URGENT_LEN: usize = 32;

/// Maximum number of entries in the priority-bypass allow-list.
pub const MAX_URGENT_COMMANDS: usize = 4;

/// Command that stops a running game. It is the default bypass entry.
pub const STOP_GAME_COMMAND: &str = "snake_stop()";

/// Allow-list of commands that bypass the queue.
pub type UrgentList = Vec<String<MAX_URGENT_LEN>, MAX_URGENT_COMMANDS>;

/// A completed command waiting for the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// The trimmed command.
    pub text: CommandText,
    /// Connection it arrived on.
    pub origin: ConnectionId,
    /// Logical enqueue time; larger is newer (wrapping).
    pub seq: u32,
}

/// How [`CommandQueue::submit`] treats an unconsumed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// One slot; the newest command overwrites an unconsumed one.
    #[default]
    LatestWins,
    /// Bounded in-order delivery; submissions fail when full.
    Fifo,
}

/// What happened to a submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued; nothing was displaced.
    Accepted,
    /// Queued; the returned, never-executed command was dropped.
    Replaced(PendingCommand),
    /// Not queued (FIFO full); the returned command was dropped.
    Rejected(PendingCommand),
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Accepted => write!(f, "accepted"),
            SubmitOutcome::Replaced(old) => write!(f, "replaced '{}'", old.text),
            SubmitOutcome::Rejected(new) => write!(f, "rejected '{}'", new.text),
        }
    }
}

/// Mailbox between the BLE producer and the main-loop consumer.
#[derive(Debug)]
pub struct CommandQueue {
    slots: Deque<PendingCommand, QUEUE_CAPACITY>,
    policy: QueuePolicy,
}

impl CommandQueue {
    /// An empty queue with `policy`.
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            slots: Deque::new(),
            policy,
        }
    }

    /// The policy chosen at construction.
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Park a command for the main loop. Never blocks.
    pub fn submit(&mut self, command: PendingCommand) -> SubmitOutcome {
        match self.policy {
            QueuePolicy::LatestWins => {
                let displaced = self.slots.pop_front();
                self.slots.clear();
                match self.slots.push_back(command) {
                    Ok(()) => match displaced {
                        Some(old) => SubmitOutcome::Replaced(old),
                        None => SubmitOutcome::Accepted,
                    },
                    Err(command) => SubmitOutcome::Rejected(command),
                }
            }
            QueuePolicy::Fifo => match self.slots.push_back(command) {
                Ok(()) => SubmitOutcome::Accepted,
                Err(command) => SubmitOutcome::Rejected(command),
            },
        }
    }

    /// Take the oldest waiting command, if any.
    pub fn take(&mut self) -> Option<PendingCommand> {
        self.slots.pop_front()
    }

    /// Drop every waiting command that came from `origin`.
    ///
    /// Called when a connection closes: its queued commands are discarded and
    /// never executed. Returns how many were dropped.
    pub fn discard_from(&mut self, origin: ConnectionId) -> usize {
        let waiting = self.slots.len();
        let mut dropped = 0;
        for _ in 0..waiting {
            if let Some(command) = self.slots.pop_front() {
                if command.origin == origin {
                    dropped += 1;
                } else if self.slots.push_back(command).is_err() {
                    dropped += 1;
                }
            }
        }
        dropped
    }

    /// Commands waiting.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Whether `text` is on the priority-bypass allow-list.
///
/// This is an exact match on the trimmed text and does no parsing, so it is
/// safe to call from the BLE event context.
pub fn is_urgent(text: &str, allow_list: &[String<MAX_URGENT_LEN>]) -> bool {
    let text = text.trim();
    allow_list.iter().any(|urgent| urgent.as_str() == text)
}

/// The default allow-list: just [`STOP_GAME_COMMAND`].
pub fn default_urgent_commands() -> UrgentList {
    let mut list = UrgentList::new();
    if let Ok(stop) = String::try_from(STOP_GAME_COMMAND) {
        let _ = list.push(stop);
    }
    list
}
