//! Pending rank grants
//!
//! A passed report records which role it is about to add; the role-change
//! event that follows is matched back to that record. Entries expire after
//! the grant window.

use chrono::{DateTime, Duration, Utc};
use gk_common::events::Snowflake;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::rank::{RankId, RankSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingGrant {
    /// Rank whose quiz was passed
    pub passed: RankId,
    /// Role the bot asked the platform to add
    pub expected_role: RankId,
    pub recorded_at: DateTime<Utc>,
}

/// At most one outstanding grant per member
pub struct PendingGrants {
    window: Duration,
    grants: Mutex<HashMap<Snowflake, PendingGrant>>,
}

impl PendingGrants {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            grants: Mutex::new(HashMap::new()),
        }
    }

    /// Record a grant, replacing any earlier one for the member
    pub async fn record(&self, member_id: Snowflake, grant: PendingGrant) {
        self.grants.lock().await.insert(member_id, grant);
    }

    /// Remove and return the member's grant if `gained` contains its role
    ///
    /// Expired grants are dropped and never returned.
    pub async fn take_matching(
        &self,
        member_id: Snowflake,
        gained: &RankSet,
        now: DateTime<Utc>,
    ) -> Option<PendingGrant> {
        let mut grants = self.grants.lock().await;
        let grant = *grants.get(&member_id)?;

        if now - grant.recorded_at > self.window {
            grants.remove(&member_id);
            return None;
        }

        if gained.contains(&grant.expected_role) {
            grants.remove(&member_id);
            Some(grant)
        } else {
            None
        }
    }

    /// Drop expired grants, returning how many were removed
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|_, grant| now - grant.recorded_at <= self.window);
        before - grants.len()
    }

    pub async fn len(&self) -> usize {
        self.grants.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
