// Row lock table
// Tracks which session holds which row locks until the session releases them.
// Shared locks are compatible with each other; an exclusive lock is
// compatible with nothing held by another session.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Identifies the caller a lock belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone)]
enum Held {
    Shared(BTreeSet<SessionId>),
    Exclusive(SessionId),
}

#[derive(Debug, Default)]
pub struct LockTable {
    /// (table name, row ID) -> current holders
    rows: HashMap<(String, usize), Held>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `session` would have to wait for `kind` on this row
    pub fn conflicts(&self, session: SessionId, table: &str, row_id: usize, kind: LockKind) -> bool {
        match (self.rows.get(&(table.to_string(), row_id)), kind) {
            (None, _) => false,
            (Some(Held::Exclusive(owner)), _) => *owner != session,
            (Some(Held::Shared(_)), LockKind::Shared) => false,
            (Some(Held::Shared(owners)), LockKind::Exclusive) => {
                owners.iter().any(|owner| *owner != session)
            }
        }
    }

    /// Take `kind` on every row; callers check `conflicts` first.
    /// A shared request never downgrades an exclusive lock the session holds,
    /// and a sole shared holder is upgraded in place.
    pub fn acquire(&mut self, session: SessionId, table: &str, row_ids: &[usize], kind: LockKind) {
        for &row_id in row_ids {
            let entry = self
                .rows
                .entry((table.to_string(), row_id))
                .or_insert_with(|| Held::Shared(BTreeSet::new()));

            match (entry, kind) {
                (Held::Exclusive(_), LockKind::Shared) => {}
                (Held::Shared(owners), LockKind::Shared) => {
                    owners.insert(session);
                }
                (held, LockKind::Exclusive) => *held = Held::Exclusive(session),
            }
        }
    }

    /// Drop every lock `session` holds; returns how many row locks went away
    pub fn release(&mut self, session: SessionId) -> usize {
        let mut released = 0;
        self.rows.retain(|_, held| match held {
            Held::Exclusive(owner) if *owner == session => {
                released += 1;
                false
            }
            Held::Exclusive(_) => true,
            Held::Shared(owners) => {
                if owners.remove(&session) {
                    released += 1;
                }
                !owners.is_empty()
            }
        });
        released
    }

    /// Number of locked rows across all sessions
    pub fn locked_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether `session` holds any kind of lock on the row
    pub fn holds(&self, session: SessionId, table: &str, row_id: usize) -> bool {
        match self.rows.get(&(table.to_string(), row_id)) {
            Some(Held::Exclusive(owner)) => *owner == session,
            Some(Held::Shared(owners)) => owners.contains(&session),
            None => false,
        }
    }
}
