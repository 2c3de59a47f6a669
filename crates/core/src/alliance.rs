//! Alliances between teams and the one-sided requests that precede them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{TeamError, TeamResult};

/// Result of an `ally` action from one team towards another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllianceOutcome {
    /// Request recorded; the other team has not asked yet.
    Requested,
    /// The other team had already asked, the alliance now exists.
    Formed,
    /// The teams were allied; the alliance is gone.
    Broken,
}

/// Confirmed alliances and outstanding requests, keyed by lower-cased team name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllianceTable {
    #[serde(default)]
    alliances: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    requests: BTreeMap<String, BTreeSet<String>>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl AllianceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `from`'s ally action towards `to`.
    pub fn request(&mut self, from: &str, to: &str) -> TeamResult<AllianceOutcome> {
        let (from, to) = (key(from), key(to));
        if from == to {
            return Err(TeamError::Validation(
                "a team can't ally with itself".to_string(),
            ));
        }

        if self.are_allied(&from, &to) {
            remove_pair(&mut self.alliances, &from, &to);
            return Ok(AllianceOutcome::Broken);
        }

        if self.has_request(&to, &from) {
            remove_pair(&mut self.requests, &from, &to);
            self.alliances.entry(from.clone()).or_default().insert(to.clone());
            self.alliances.entry(to).or_default().insert(from);
            return Ok(AllianceOutcome::Formed);
        }

        self.requests.entry(from).or_default().insert(to);
        Ok(AllianceOutcome::Requested)
    }

    /// True when the two teams are allied.
    pub fn are_allied(&self, a: &str, b: &str) -> bool {
        self.alliances
            .get(&key(a))
            .map(|allies| allies.contains(&key(b)))
            .unwrap_or(false)
    }

    /// True when `from` has an outstanding request towards `to`.
    pub fn has_request(&self, from: &str, to: &str) -> bool {
        self.requests
            .get(&key(from))
            .map(|targets| targets.contains(&key(to)))
            .unwrap_or(false)
    }

    /// Lower-cased names of every ally of `team`.
    pub fn allies_of(&self, team: &str) -> Vec<String> {
        self.alliances
            .get(&key(team))
            .map(|allies| allies.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget a team entirely, including requests towards it.
    pub fn remove_team(&mut self, team: &str) {
        let team = key(team);
        for map in [&mut self.alliances, &mut self.requests] {
            map.remove(&team);
            for targets in map.values_mut() {
                targets.remove(&team);
            }
            map.retain(|_, targets| !targets.is_empty());
        }
    }
}

fn remove_pair(map: &mut BTreeMap<String, BTreeSet<String>>, a: &str, b: &str) {
    for (owner, other) in [(a, b), (b, a)] {
        if let Some(set) = map.get_mut(owner) {
            set.remove(other);
            if set.is_empty() {
                map.remove(owner);
            }
        }
    }
}
