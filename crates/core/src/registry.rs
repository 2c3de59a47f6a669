//! In-memory collection of every team, keyed by lower-cased name.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    error::{TeamError, TeamResult},
    models::ParticipantId,
    storage::TeamStore,
    team::Team,
};

static TEAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,16}$").expect("failed to compile team name regex"));

/// Check a name proposed for a new team.
pub fn validate_team_name(name: &str) -> TeamResult<()> {
    if TEAM_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(TeamError::Validation(
            "team names are 3-16 characters of letters, digits or '_'".to_string(),
        ))
    }
}

/// Owns every team. Not thread-safe; lives on the main loop.
#[derive(Debug, Default)]
pub struct TeamRegistry {
    teams: HashMap<String, Team>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl TeamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new team owned by `owner`.
    pub fn create_team(&mut self, name: &str, owner: ParticipantId) -> TeamResult<&mut Team> {
        let key = key(name);
        if self.teams.contains_key(&key) {
            return Err(TeamError::DuplicateName(name.to_string()));
        }
        Ok(self
            .teams
            .entry(key)
            .or_insert_with(|| Team::new(name, owner)))
    }

    /// Insert an already-built team, failing on a name collision.
    pub fn insert(&mut self, team: Team) -> TeamResult<()> {
        let key = key(team.name());
        if self.teams.contains_key(&key) {
            return Err(TeamError::DuplicateName(team.name().to_string()));
        }
        self.teams.insert(key, team);
        Ok(())
    }

    /// Case-insensitive lookup.
    pub fn get_team(&self, name: &str) -> Option<&Team> {
        self.teams.get(&key(name))
    }

    /// Case-insensitive mutable lookup.
    pub fn get_team_mut(&mut self, name: &str) -> Option<&mut Team> {
        self.teams.get_mut(&key(name))
    }

    /// Team containing `id` at any rank. Linear scan.
    pub fn player_team(&self, id: ParticipantId) -> Option<&Team> {
        self.teams.values().find(|team| team.is_in_team(id))
    }

    /// Mutable variant of [`TeamRegistry::player_team`].
    pub fn player_team_mut(&mut self, id: ParticipantId) -> Option<&mut Team> {
        self.teams.values_mut().find(|team| team.is_in_team(id))
    }

    /// Remove a team unconditionally, returning it if it existed.
    pub fn remove_team(&mut self, name: &str) -> Option<Team> {
        self.teams.remove(&key(name))
    }

    /// Every team, sorted by name.
    pub fn all_teams(&self) -> Vec<&Team> {
        let mut teams: Vec<&Team> = self.teams.values().collect();
        teams.sort_by_key(|team| key(team.name()));
        teams
    }

    /// Teams holding an invite for `id`, sorted by name.
    pub fn player_invites(&self, id: ParticipantId) -> Vec<&Team> {
        self.all_teams()
            .into_iter()
            .filter(|team| team.has_invite(id))
            .collect()
    }

    /// Display names of the teams inviting `id`.
    pub fn player_invite_names(&self, id: ParticipantId) -> Vec<String> {
        self.player_invites(id)
            .into_iter()
            .map(|team| team.name().to_string())
            .collect()
    }

    /// Number of registered teams.
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// True when no team is registered.
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Replace the contents with everything the store can read.
    pub fn load_all(&mut self, store: &TeamStore) -> TeamResult<usize> {
        let teams = store.load_teams()?;
        self.teams.clear();
        for team in teams {
            if let Err(err) = self.insert(team) {
                warn!("Skipping team while loading: {err}");
            }
        }
        info!(count = self.teams.len(), path = %store.teams_path().display(), "Loaded teams");
        Ok(self.teams.len())
    }

    /// Rewrite the whole team set to the store.
    pub fn save_all(&self, store: &TeamStore) -> TeamResult<()> {
        store.save_teams(self.all_teams())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ParticipantId {
        ParticipantId::from_name(name)
    }

    #[test]
    fn lookup_ignores_case() {
        let mut registry = TeamRegistry::new();
        registry.create_team("Alpha", id("o")).unwrap();

        for variant in ["alpha", "ALPHA", "aLpHa", "Alpha"] {
            let team = registry.get_team(variant).expect("team by case variant");
            assert_eq!(team.name(), "Alpha");
        }
        assert!(registry.get_team("beta").is_none());
    }

    #[test]
    fn create_rejects_case_insensitive_duplicates() {
        let mut registry = TeamRegistry::new();
        registry.create_team("Alpha", id("o")).unwrap();
        let err = registry.create_team("ALPHA", id("other")).unwrap_err();
        assert!(matches!(err, TeamError::DuplicateName(name) if name == "ALPHA"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get_team("alpha").unwrap().is_owner(id("o")));
    }

    #[test]
    fn invite_and_join_scenario() {
        let mut registry = TeamRegistry::new();
        registry.create_team("Alpha", id("O")).unwrap();

        registry
            .get_team_mut("Alpha")
            .unwrap()
            .invite_player(id("P"));
        assert_eq!(registry.player_invite_names(id("P")), vec!["Alpha"]);

        registry
            .get_team_mut("alpha")
            .unwrap()
            .add_member(id("P"))
            .unwrap();

        let team = registry.player_team(id("P")).expect("P has a team");
        assert_eq!(team.name(), "Alpha");
        assert!(!team.has_invite(id("P")));
        assert!(registry.player_invites(id("P")).is_empty());
    }

    #[test]
    fn remove_team_drops_membership_lookup() {
        let mut registry = TeamRegistry::new();
        registry.create_team("Alpha", id("o")).unwrap();
        registry.create_team("Beta", id("b")).unwrap();

        let removed = registry.remove_team("ALPHA").expect("removed");
        assert_eq!(removed.name(), "Alpha");
        assert!(registry.player_team(id("o")).is_none());
        let names: Vec<_> = registry.all_teams().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Beta"]);
        assert!(registry.remove_team("alpha").is_none());
    }

    #[test]
    fn team_names_are_validated() {
        assert!(validate_team_name("Alpha_01").is_ok());
        assert!(validate_team_name("ab").is_err());
        assert!(validate_team_name("has space").is_err());
        assert!(validate_team_name("waytoolongteamname").is_err());
    }
}
