//! Live queries.
//!
//! A subscription pairs a watched table with a query and a delivery
//! callback. The query runs once when subscribing and again after every
//! committed transaction that wrote the watched table, so observers always
//! hold a fresh result set without polling.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::error::Result;
use crate::scope::{Scope, Table};

/// Handle returned by [`Database::subscribe`](crate::Database::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type Runner = Box<dyn FnMut(&Scope<'_>) -> Result<()> + Send>;

struct Subscription {
    id: SubscriptionId,
    table: Table,
    run: Runner,
}

#[derive(Default)]
pub(crate) struct LiveQueries {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl LiveQueries {
    pub(crate) fn add(&mut self, table: Table, run: Runner) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription { id, table, run });
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Re-run every subscription watching one of the `touched` tables.
    pub(crate) fn notify(&mut self, conn: &Connection, touched: &BTreeSet<Table>) {
        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| touched.contains(&s.table))
        {
            let scope = Scope::read_only(conn);
            if let Err(e) = (sub.run)(&scope) {
                tracing::warn!(
                    subscription = sub.id.0,
                    table = sub.table.name(),
                    error = %e,
                    "live query failed"
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }
}
