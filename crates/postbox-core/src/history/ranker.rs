//! Frequency-ranked address history.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::model::{AddressUsage, HistoryStats};
use crate::Result;
use crate::identity::{IdentityDirectory, UserId, normalize_email};

const STATS_TOP: usize = 5;

/// One user's addresses in first-use order, with an index by address.
#[derive(Debug, Default)]
struct UsageLog {
    entries: Vec<AddressUsage>,
    positions: HashMap<String, usize>,
}

impl UsageLog {
    fn record(&mut self, address: String) {
        if let Some(&pos) = self.positions.get(&address) {
            self.entries[pos].count = self.entries[pos].count.saturating_add(1);
        } else {
            self.positions.insert(address.clone(), self.entries.len());
            self.entries.push(AddressUsage { address, count: 1 });
        }
    }

    fn count(&self, address: &str) -> u32 {
        self.positions
            .get(address)
            .map_or(0, |&pos| self.entries[pos].count)
    }

    /// Entries by descending count. The sort is stable, so ties keep
    /// first-use order.
    fn ranked(&self) -> Vec<AddressUsage> {
        let mut ranked = self.entries.clone();
        ranked.sort_by_key(|usage| Reverse(usage.count));
        ranked
    }
}

/// Per-user address history used to rank autocomplete suggestions.
///
/// Create one per process at startup and share it by reference; it is
/// dropped with the process and never written to disk. Every operation
/// locks an internal mutex, so concurrent `record_usage` calls for the same
/// user are serialized and no increment is lost. The lock is never held
/// across an `.await`.
#[derive(Debug)]
pub struct AddressHistory<D> {
    directory: D,
    logs: Mutex<HashMap<UserId, UsageLog>>,
}

impl<D: IdentityDirectory> AddressHistory<D> {
    /// Empty history. `directory` supplies the candidates for [`search`].
    ///
    /// [`search`]: Self::search
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            logs: Mutex::new(HashMap::new()),
        }
    }

    fn logs(&self) -> MutexGuard<'_, HashMap<UserId, UsageLog>> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one use of each address for `user`.
    ///
    /// Addresses are trimmed and lowercased; blank ones are ignored.
    pub fn record_usage<I, A>(&self, user: UserId, addresses: I)
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let mut logs = self.logs();
        let log = logs.entry(user).or_default();
        let mut recorded = 0_usize;
        for address in addresses {
            let address = normalize_email(address.as_ref());
            if !address.is_empty() {
                log.record(address);
                recorded += 1;
            }
        }
        debug!("Recorded {recorded} address use(s) for user {user}");
    }

    /// Up to `limit` of `user`'s addresses, most used first.
    #[must_use]
    pub fn top_frequent(&self, user: UserId, limit: usize) -> Vec<String> {
        self.logs()
            .get(&user)
            .map(|log| {
                log.ranked()
                    .into_iter()
                    .take(limit)
                    .map(|usage| usage.address)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered addresses matching `prefix`, up to `limit`.
    ///
    /// Addresses that start with the prefix come first; substring matches
    /// fill any remaining slots. Within each group, addresses `user` has
    /// used more often rank higher and the rest keep directory order.
    /// A blank prefix matches nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn search(&self, user: UserId, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let needle = normalize_email(prefix);
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let users = self.directory.find_all().await?;
        let (mut starts, mut contains): (Vec<String>, Vec<String>) = users
            .iter()
            .map(|user| normalize_email(&user.email))
            .filter(|email| email.contains(&needle))
            .partition(|email| email.starts_with(&needle));

        {
            let logs = self.logs();
            if let Some(log) = logs.get(&user) {
                starts.sort_by_key(|email| Reverse(log.count(email)));
                contains.sort_by_key(|email| Reverse(log.count(email)));
            }
        }

        let mut results = starts;
        results.truncate(limit);
        for email in contains {
            if results.len() >= limit {
                break;
            }
            if !results.contains(&email) {
                results.push(email);
            }
        }
        Ok(results)
    }

    /// Every address in `user`'s history, in first-use order.
    #[must_use]
    pub fn known_addresses(&self, user: UserId) -> Vec<String> {
        self.logs()
            .get(&user)
            .map(|log| log.entries.iter().map(|u| u.address.clone()).collect())
            .unwrap_or_default()
    }

    /// Forget `user`'s history.
    pub fn clear(&self, user: UserId) {
        if self.logs().remove(&user).is_some() {
            debug!("Cleared address history for user {user}");
        }
    }

    /// Summary of `user`'s history.
    #[must_use]
    pub fn stats(&self, user: UserId) -> HistoryStats {
        let logs = self.logs();
        let Some(log) = logs.get(&user) else {
            return HistoryStats::default();
        };

        let mut top = log.ranked();
        top.truncate(STATS_TOP);
        HistoryStats {
            distinct: log.entries.len(),
            total_uses: log.entries.iter().map(|u| u64::from(u.count)).sum(),
            top,
        }
    }
}
