//! Agent communication core.
//!
//! - [`AgentCore`]: the request correlator. One interactive operation (Get,
//!   GetNext, Set, Walk, TableView) at a time, driven by
//!   [`AgentCore::on_transport_reply`].
//! - [`AgentRunner`] / [`AgentHandle`]: a tokio task that owns the core,
//!   sends its requests and feeds completions back.
//! - [`Reporter`]: where results go.
//! - [`SyncFetcher`]: independent scalar fetches for the sampling feed.

mod correlator;
mod reporter;
mod runner;
mod sync;
mod table;

pub use correlator::{AgentCore, Outgoing, Phase, RequestKind};
pub use reporter::{ChannelReporter, Report, Reporter};
pub use runner::{AgentHandle, AgentRunner};
pub use sync::{SyncFetcher, ValueSource};
pub use table::{Table, TableCell};
