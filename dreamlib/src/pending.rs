//! Outstanding command tracking
//!
//! Each command sent gets a one-shot channel. The reader thread resolves it
//! when the matching acknowledgement arrives.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use dreamproto::Acknowledgement;

struct PendingEntry {
    command: &'static str,
    sent_at: Instant,
    reply: Sender<Acknowledgement>,
}

/// Result of matching an acknowledgement against the outstanding commands
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Handed to the waiting caller
    Delivered {
        command: &'static str,
        elapsed: Duration,
    },
    /// No outstanding command has this id: a duplicate, a late
    /// acknowledgement after timeout, or an id never sent
    Unmatched,
}

/// Commands waiting for an acknowledgement, keyed by cmd_id
#[derive(Default)]
pub struct PendingCommands {
    entries: Mutex<HashMap<u32, PendingEntry>>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start waiting for the acknowledgement of `cmd_id`
    pub fn register(&self, cmd_id: u32, command: &'static str) -> Receiver<Acknowledgement> {
        let (reply, receiver) = mpsc::channel();
        self.lock().insert(
            cmd_id,
            PendingEntry {
                command,
                sent_at: Instant::now(),
                reply,
            },
        );
        receiver
    }

    /// Deliver an acknowledgement to the caller waiting for it
    pub fn resolve(&self, ack: Acknowledgement) -> Resolution {
        let entry = match self.lock().remove(&ack.cmd_id) {
            Some(entry) => entry,
            None => return Resolution::Unmatched,
        };
        let elapsed = entry.sent_at.elapsed();
        // The caller may have given up between the timeout and now
        if entry.reply.send(ack).is_err() {
            return Resolution::Unmatched;
        }
        Resolution::Delivered {
            command: entry.command,
            elapsed,
        }
    }

    /// Stop waiting for `cmd_id`. Returns whether it was still outstanding.
    pub fn cancel(&self, cmd_id: u32) -> bool {
        self.lock().remove(&cmd_id).is_some()
    }

    /// Drop every outstanding command. Waiting callers see their channel
    /// disconnect. Returns how many were outstanding.
    pub fn fail_all(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
