//! Address history types.

use serde::{Deserialize, Serialize};

/// How often one address has been used by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUsage {
    /// Normalized email address.
    pub address: String,
    /// Number of recorded uses.
    pub count: u32,
}

/// Summary of one user's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Number of distinct addresses.
    pub distinct: usize,
    /// Sum of all use counts.
    pub total_uses: u64,
    /// Up to five most used addresses, most used first.
    pub top: Vec<AddressUsage>,
}
