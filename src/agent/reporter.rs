//! Where the agent core sends its results.

use tokio::sync::mpsc;

use super::table::{Table, TableCell};
use crate::oid::Oid;

/// Receiver of agent results, typically a UI.
///
/// Calls are one-way notifications made from the agent's task, never
/// concurrently.
pub trait Reporter: Send + 'static {
    /// A Get, GetNext or Set finished with `formatted` for `oid`.
    fn value(&mut self, oid: &Oid, formatted: &str);

    /// A walk or table view finished; `message` holds every retrieved
    /// binding plus a summary.
    fn walk_complete(&mut self, message: &str, objects: u32);

    fn error(&mut self, message: &str);

    /// One cell of a table view arrived.
    fn table_cell(&mut self, _cell: &TableCell) {}

    /// A table view finished; called just before
    /// [`walk_complete`](Self::walk_complete).
    fn table_complete(&mut self, _table: &Table) {}
}

/// Agent results as values.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Value { oid: Oid, formatted: String },
    WalkComplete { message: String, objects: u32 },
    Error(String),
    TableCell(TableCell),
    TableComplete(Table),
}

/// Collects reports in order.
impl Reporter for Vec<Report> {
    fn value(&mut self, oid: &Oid, formatted: &str) {
        self.push(Report::Value {
            oid: oid.clone(),
            formatted: formatted.to_owned(),
        });
    }

    fn walk_complete(&mut self, message: &str, objects: u32) {
        self.push(Report::WalkComplete {
            message: message.to_owned(),
            objects,
        });
    }

    fn error(&mut self, message: &str) {
        self.push(Report::Error(message.to_owned()));
    }

    fn table_cell(&mut self, cell: &TableCell) {
        self.push(Report::TableCell(cell.clone()));
    }

    fn table_complete(&mut self, table: &Table) {
        self.push(Report::TableComplete(table.clone()));
    }
}

/// Forwards every report over an unbounded channel.
///
/// ```
/// use snmp_poller::agent::{ChannelReporter, Report, Reporter};
///
/// let (mut reporter, mut reports) = ChannelReporter::new();
/// reporter.error("timeout");
/// assert_eq!(reports.try_recv().unwrap(), Report::Error("timeout".into()));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<Report>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, report: Report) {
        if self.tx.send(report).is_err() {
            tracing::trace!(target: "snmp_poller::agent", "report receiver dropped");
        }
    }
}

impl Reporter for ChannelReporter {
    fn value(&mut self, oid: &Oid, formatted: &str) {
        self.send(Report::Value {
            oid: oid.clone(),
            formatted: formatted.to_owned(),
        });
    }

    fn walk_complete(&mut self, message: &str, objects: u32) {
        self.send(Report::WalkComplete {
            message: message.to_owned(),
            objects,
        });
    }

    fn error(&mut self, message: &str) {
        self.send(Report::Error(message.to_owned()));
    }

    fn table_cell(&mut self, cell: &TableCell) {
        self.send(Report::TableCell(cell.clone()));
    }

    fn table_complete(&mut self, table: &Table) {
        self.send(Report::TableComplete(table.clone()));
    }
}
