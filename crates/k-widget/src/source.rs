// SPDX-License-Identifier: MIT
//
// Where the table's rows come from.
//
// A source runs its fetch however it likes (a child process, a thread, a
// file read up front) but must never block the loop: `poll` is called once
// per iteration, just before drawing, and answers immediately.

use crate::table::Row;

/// The outcome of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    /// Fresh contents, replacing the old.
    Rows(Vec<Row>),
    /// The fetch gave up. Shown as an error notification.
    Failed(String),
}

/// A non-blocking row provider.
pub trait RowSource {
    /// A finished fetch, if one completed since the last call.
    fn poll(&mut self) -> Option<Fetch>;

    /// Start fetching again. Sources with nothing to refetch ignore it.
    fn refresh(&mut self) {}

    /// Short name for the status line.
    fn title(&self) -> String {
        String::new()
    }
}

/// Rows known up front, delivered on the first poll and again after each
/// refresh.
#[derive(Debug, Clone, Default)]
pub struct StaticRows {
    title: String,
    rows: Vec<Row>,
    delivered: bool,
}

impl StaticRows {
    #[must_use]
    pub fn new(title: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            title: title.into(),
            rows,
            delivered: false,
        }
    }
}

impl RowSource for StaticRows {
    fn poll(&mut self) -> Option<Fetch> {
        if self.delivered {
            return None;
        }
        self.delivered = true;
        Some(Fetch::Rows(self.rows.clone()))
    }

    fn refresh(&mut self) {
        self.delivered = false;
    }

    fn title(&self) -> String {
        self.title.clone()
    }
}
