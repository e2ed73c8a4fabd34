//! Mutations that a refresh must not overwrite
//!
//! A refresh replaces whole collections with a remote snapshot. A mutation
//! whose remote write lands after that snapshot was taken would otherwise be
//! undone, so every mutation is recorded here until it settles, and settled
//! entries are kept until the sync that might have missed them ends.

use crate::models::{RecordId, RecordKind, SyncOp};

#[derive(Debug)]
struct Entry {
    ticket: u64,
    op: SyncOp,
    settled: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    syncing: bool,
    next_ticket: u64,
    entries: Vec<Entry>,
}

impl Journal {
    /// Record a mutation that is about to touch local state.
    pub(crate) fn open(&mut self, op: SyncOp) -> u64 {
        self.next_ticket += 1;
        self.entries.push(Entry {
            ticket: self.next_ticket,
            op,
            settled: false,
        });
        self.next_ticket
    }

    /// Mark a mutation as finished with the remote store.
    pub(crate) fn settle(&mut self, ticket: u64, op: SyncOp) {
        if !self.syncing {
            self.entries.retain(|entry| entry.ticket != ticket);
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.ticket == ticket) {
            entry.op = op;
            entry.settled = true;
        }
    }

    pub(crate) fn begin_sync(&mut self) {
        self.syncing = true;
    }

    /// Forget mutations that settled while the sync was running.
    pub(crate) fn end_sync(&mut self) {
        self.syncing = false;
        self.entries.retain(|entry| !entry.settled);
    }

    pub(crate) fn remap(&mut self, from: &RecordId, to: &RecordId) {
        for entry in &mut self.entries {
            entry.op.remap_id(from, to);
        }
    }

    /// Recorded mutations of one kind, oldest first.
    pub(crate) fn ops(&self, kind: RecordKind) -> impl Iterator<Item = &SyncOp> {
        self.entries
            .iter()
            .map(|entry| &entry.op)
            .filter(move |op| op.kind() == kind)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
