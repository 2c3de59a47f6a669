//! Two-step disband: an owner requests, then confirms within a window.
//!
//! Expiry is evaluated lazily whenever the tracker is consulted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::{
    error::{TeamError, TeamResult},
    models::ParticipantId,
};

/// Default confirmation window in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 30;

/// A disband waiting for confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDisband {
    /// Display name of the team at request time.
    pub team: String,
    /// Owner who asked.
    pub owner: ParticipantId,
    /// When the window opened.
    pub requested_at: DateTime<Utc>,
}

/// What a disband request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisbandRequest {
    /// A fresh window was opened.
    Started,
    /// A request is already open; seconds left before it lapses.
    AlreadyPending {
        /// Whole seconds remaining.
        remaining_secs: i64,
    },
}

/// Pending disband requests keyed by lower-cased team name.
#[derive(Debug)]
pub struct DisbandTracker {
    window: Duration,
    pending: HashMap<String, PendingDisband>,
}

impl Default for DisbandTracker {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}

impl DisbandTracker {
    /// Tracker with a custom confirmation window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Length of the confirmation window.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn expired(&self, entry: &PendingDisband, now: DateTime<Utc>) -> bool {
        now - entry.requested_at > self.window
    }

    /// Open a window for `team`, or report the one already open.
    pub fn request(&mut self, team: &str, owner: ParticipantId, now: DateTime<Utc>) -> DisbandRequest {
        let key = team.to_lowercase();
        if let Some(entry) = self.pending.get(&key) {
            if !self.expired(entry, now) && entry.owner == owner {
                let remaining = self.window - (now - entry.requested_at);
                return DisbandRequest::AlreadyPending {
                    remaining_secs: remaining.num_seconds(),
                };
            }
        }
        debug!(team, "Disband requested");
        self.pending.insert(
            key,
            PendingDisband {
                team: team.to_string(),
                owner,
                requested_at: now,
            },
        );
        DisbandRequest::Started
    }

    /// Consume the request opened by `owner`.
    ///
    /// The entry is removed whether or not it is still valid. The caller must
    /// still check that `owner` owns the team.
    pub fn take(&mut self, owner: ParticipantId, now: DateTime<Utc>) -> TeamResult<PendingDisband> {
        let key = self
            .pending
            .iter()
            .find(|(_, entry)| entry.owner == owner)
            .map(|(key, _)| key.clone())
            .ok_or(TeamError::NoPendingConfirmation)?;
        let entry = self
            .pending
            .remove(&key)
            .ok_or(TeamError::NoPendingConfirmation)?;
        if self.expired(&entry, now) {
            return Err(TeamError::ConfirmationExpired);
        }
        Ok(entry)
    }

    /// Drop the request opened by `owner`. Returns the team it was for.
    pub fn cancel(&mut self, owner: ParticipantId) -> Option<String> {
        let key = self
            .pending
            .iter()
            .find(|(_, entry)| entry.owner == owner)
            .map(|(key, _)| key.clone())?;
        self.pending.remove(&key).map(|entry| entry.team)
    }

    /// Forget any request for `team`.
    pub fn remove_team(&mut self, team: &str) {
        self.pending.remove(&team.to_lowercase());
    }

    /// True when `team` has a live request.
    pub fn is_pending(&self, team: &str, now: DateTime<Utc>) -> bool {
        self.pending
            .get(&team.to_lowercase())
            .map(|entry| !self.expired(entry, now))
            .unwrap_or(false)
    }
}
