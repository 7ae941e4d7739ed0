//! Full-collection user cache keyed by e-mail.
//!
//! The Airflow API cannot look a user up by e-mail, so every read walks all
//! pages of `GET /users`. A single mutex covers the walk and the lookup that
//! follows it: concurrent readers queue up and each performs its own walk
//! once the lock is free.
//!
//! Offset paging is not a snapshot. A user deleted while a walk is in
//! progress shifts later pages down, so a walk whose reported total moved
//! may have skipped users that still exist. Such a walk evicts nothing, and
//! a lookup that misses after one walks again before reporting absence.

use crate::error::{Error, Result};
use airflow::{Directory, MAX_PAGE_LIMIT, UserRecord};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Extra page fetches tolerated beyond what the reported total implies.
const PAGE_SLACK: u64 = 1;

/// Cache of every user in the directory.
#[derive(Debug, Default)]
pub struct UserCache {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk every page and merge the results. Returns the number of users.
    ///
    /// On failure, records merged from earlier pages stay in the cache.
    pub fn refresh<D: Directory + ?Sized>(&self, directory: &D) -> Result<usize> {
        let mut users = self.lock();
        walk(&mut users, directory)?;
        Ok(users.len())
    }

    /// Cached record for `email`, as of the last refresh.
    #[must_use]
    pub fn lookup(&self, email: &str) -> Option<UserRecord> {
        self.lock().get(email).cloned()
    }

    /// Refresh, then look up `email` without releasing the lock in between.
    pub fn refresh_and_lookup<D: Directory + ?Sized>(
        &self,
        directory: &D,
        email: &str,
    ) -> Result<Option<UserRecord>> {
        let mut users = self.lock();
        let stable = walk(&mut users, directory)?;
        if !stable && !users.contains_key(email) {
            log::debug!("User listing moved while looking for {email}, walking again");
            walk(&mut users, directory)?;
        }
        Ok(users.get(email).cloned())
    }

    /// Refresh, then return every user sorted by e-mail.
    pub fn snapshot<D: Directory + ?Sized>(&self, directory: &D) -> Result<Vec<UserRecord>> {
        let mut users = self.lock();
        walk(&mut users, directory)?;
        let mut all: Vec<_> = users.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic mid-walk leaves a partially merged map, which is the same
    // state a failed walk leaves behind.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserRecord>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetch pages until the distinct e-mails seen cover the reported total.
///
/// Returns whether the reported total held steady for the whole walk; only
/// a steady walk evicts users it did not see. Fails closed when a page comes
/// back empty before convergence, or when more pages are fetched than the
/// reported total allows for.
fn walk<D: Directory + ?Sized>(
    users: &mut HashMap<String, UserRecord>,
    directory: &D,
) -> Result<bool> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0u32;
    let mut pages = 0u64;
    let mut first_total = None;
    let mut stable = true;

    loop {
        let page = directory
            .list_users(MAX_PAGE_LIMIT, offset)
            .map_err(Error::Refresh)?;
        pages += 1;

        let received = page.users.len();
        let total = page.total_entries;
        if *first_total.get_or_insert(total) != total {
            stable = false;
        }
        for user in page.users {
            seen.insert(user.email.clone());
            users.insert(user.email.clone(), user);
        }
        log::trace!(
            "Fetched users page {pages} at offset {offset}: {received} users, {} of {total} seen",
            seen.len()
        );

        if seen.len() as u64 >= total {
            break;
        }

        let max_pages = total.div_ceil(u64::from(MAX_PAGE_LIMIT)) + PAGE_SLACK;
        if received == 0 || pages >= max_pages {
            return Err(Error::Pagination {
                seen: seen.len(),
                total,
                pages,
                offset,
            });
        }

        offset += MAX_PAGE_LIMIT;
    }

    if stable {
        let before = users.len();
        users.retain(|email, _| seen.contains(email));
        if users.len() < before {
            log::debug!(
                "Evicted {} users no longer in Airflow",
                before - users.len()
            );
        }
    } else {
        log::debug!("User total changed during the walk, keeping unseen users");
    }

    log::debug!("Cached {} Airflow users in {pages} pages", users.len());
    Ok(stable)
}
