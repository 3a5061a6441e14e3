//! Per-user address history for recipient autocomplete.
//!
//! History lives only in memory: it is built up while the process runs and
//! lost at shutdown.

mod model;
mod ranker;

pub use model::{AddressUsage, HistoryStats};
pub use ranker::AddressHistory;
