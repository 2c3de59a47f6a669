#![allow(missing_docs)]

//! Team entity and its local rank rules.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{
    error::{TeamError, TeamResult},
    models::{HomeLocation, ParticipantId, Rank, TeamColor},
};

/// Lowest team level.
pub const MIN_LEVEL: u32 = 1;
/// Highest team level.
pub const MAX_LEVEL: u32 = 10;
/// Longest accepted description, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 100;
/// Description shown until the owner sets one.
pub const DEFAULT_DESCRIPTION: &str = "No description set.";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// In-memory state of one team.
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    name: String,
    owner: ParticipantId,
    members: BTreeSet<ParticipantId>,
    recruits: BTreeSet<ParticipantId>,
    invites: BTreeSet<ParticipantId>,
    pvp_enabled: bool,
    color: TeamColor,
    home: Option<HomeLocation>,
    level: u32,
    description: String,
    creation_time: DateTime<Utc>,
    total_kills: u64,
    total_deaths: u64,
}

impl Team {
    /// Create a team owned by `owner`, stamped with the current time.
    pub fn new(name: impl Into<String>, owner: ParticipantId) -> Self {
        Self::with_creation_time(name, owner, Utc::now())
    }

    /// Create a team with an explicit creation timestamp (millisecond precision).
    pub fn with_creation_time(
        name: impl Into<String>,
        owner: ParticipantId,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            members: BTreeSet::new(),
            recruits: BTreeSet::new(),
            invites: BTreeSet::new(),
            pvp_enabled: false,
            color: TeamColor::default(),
            home: None,
            level: MIN_LEVEL,
            description: DEFAULT_DESCRIPTION.to_string(),
            creation_time: truncate_to_millis(creation_time),
            total_kills: 0,
            total_deaths: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> ParticipantId {
        self.owner
    }

    /// Participants holding the base rank.
    pub fn members(&self) -> &BTreeSet<ParticipantId> {
        &self.members
    }

    /// Participants holding the recruiter rank.
    pub fn recruits(&self) -> &BTreeSet<ParticipantId> {
        &self.recruits
    }

    /// Outstanding invitations.
    pub fn invites(&self) -> &BTreeSet<ParticipantId> {
        &self.invites
    }

    /// Owner, recruiters and members, owner first.
    pub fn all_members(&self) -> Vec<ParticipantId> {
        std::iter::once(self.owner)
            .chain(self.recruits.iter().copied())
            .chain(self.members.iter().copied())
            .collect()
    }

    /// Total head count including the owner.
    pub fn member_count(&self) -> usize {
        1 + self.members.len() + self.recruits.len()
    }

    pub fn is_owner(&self, id: ParticipantId) -> bool {
        self.owner == id
    }

    pub fn is_recruit(&self, id: ParticipantId) -> bool {
        self.recruits.contains(&id)
    }

    /// True only for the base rank.
    pub fn is_member(&self, id: ParticipantId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_in_team(&self, id: ParticipantId) -> bool {
        self.is_owner(id) || self.members.contains(&id) || self.recruits.contains(&id)
    }

    /// Rank held by `id`, if they belong to the team.
    pub fn rank_of(&self, id: ParticipantId) -> Option<Rank> {
        if self.is_owner(id) {
            Some(Rank::Owner)
        } else if self.is_recruit(id) {
            Some(Rank::Recruiter)
        } else if self.is_member(id) {
            Some(Rank::Member)
        } else {
            None
        }
    }

    /// Owner and recruiters may invite and kick.
    pub fn can_recruit(&self, id: ParticipantId) -> bool {
        self.is_owner(id) || self.is_recruit(id)
    }

    /// Add a participant at the base rank, consuming any invite they held.
    ///
    /// Rejects participants already in the team and joins beyond
    /// [`Team::max_members`].
    pub fn add_member(&mut self, id: ParticipantId) -> TeamResult<()> {
        if self.is_in_team(id) {
            return Err(TeamError::AlreadyInTeam(id.to_string()));
        }
        if self.member_count() >= self.max_members() {
            return Err(TeamError::TeamFull {
                team: self.name.clone(),
                max: self.max_members(),
            });
        }
        self.insert_member(id);
        Ok(())
    }

    /// Restore a persisted member without consulting the cap.
    pub(crate) fn restore_member(&mut self, id: ParticipantId) {
        if !self.is_in_team(id) {
            self.insert_member(id);
        }
    }

    fn insert_member(&mut self, id: ParticipantId) {
        self.members.insert(id);
        self.invites.remove(&id);
    }

    /// Drop a participant from either rank set. Idempotent.
    pub fn remove_member(&mut self, id: ParticipantId) {
        self.members.remove(&id);
        self.recruits.remove(&id);
    }

    /// Move a base member to the recruiter rank.
    pub fn promote_to_recruit(&mut self, id: ParticipantId) -> bool {
        if self.members.remove(&id) {
            self.recruits.insert(id);
            true
        } else {
            false
        }
    }

    /// Move a recruiter back to the base rank.
    pub fn demote_to_member(&mut self, id: ParticipantId) -> bool {
        if self.recruits.remove(&id) {
            self.members.insert(id);
            true
        } else {
            false
        }
    }

    pub fn invite_player(&mut self, id: ParticipantId) {
        self.invites.insert(id);
    }

    pub fn has_invite(&self, id: ParticipantId) -> bool {
        self.invites.contains(&id)
    }

    pub fn remove_invite(&mut self, id: ParticipantId) {
        self.invites.remove(&id);
    }

    pub fn pvp_enabled(&self) -> bool {
        self.pvp_enabled
    }

    pub fn set_pvp_enabled(&mut self, enabled: bool) {
        self.pvp_enabled = enabled;
    }

    pub fn color(&self) -> TeamColor {
        self.color
    }

    pub fn set_color(&mut self, color: TeamColor) {
        self.color = color;
    }

    pub fn home(&self) -> Option<&HomeLocation> {
        self.home.as_ref()
    }

    pub fn set_home(&mut self, home: Option<HomeLocation>) {
        self.home = home;
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Set the level, clamped to `1..=10`.
    pub fn set_level(&mut self, level: i64) {
        self.level = level.clamp(MIN_LEVEL as i64, MAX_LEVEL as i64) as u32;
    }

    /// Member cap for the current level: 5 at level 1, two more per level.
    pub fn max_members(&self) -> usize {
        5 + (self.level as usize - 1) * 2
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Callers validate the length against [`DESCRIPTION_MAX_LEN`] first.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Whole days elapsed since creation.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = now.timestamp_millis() - self.creation_time.timestamp_millis();
        elapsed.div_euclid(MILLIS_PER_DAY)
    }

    pub fn total_kills(&self) -> u64 {
        self.total_kills
    }

    pub fn total_deaths(&self) -> u64 {
        self.total_deaths
    }

    pub fn add_kill(&mut self) {
        self.total_kills += 1;
    }

    pub fn add_death(&mut self) {
        self.total_deaths += 1;
    }

    pub(crate) fn set_stats(&mut self, kills: u64, deaths: u64) {
        self.total_kills = kills;
        self.total_deaths = deaths;
    }

    /// Kills per death; with no deaths the raw kill count is reported.
    pub fn kd_ratio(&self) -> f64 {
        if self.total_deaths > 0 {
            self.total_kills as f64 / self.total_deaths as f64
        } else {
            self.total_kills as f64
        }
    }

    /// Ranking score shown by `stats`.
    pub fn power(&self) -> i64 {
        (self.level as f64 * 10.0 + self.member_count() as f64 * 5.0 + self.kd_ratio() * 20.0)
            as i64
    }
}

fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn id(name: &str) -> ParticipantId {
        ParticipantId::from_name(name)
    }

    fn alpha() -> Team {
        Team::new("Alpha", id("owner"))
    }

    #[test]
    fn add_member_consumes_invite() {
        let mut team = alpha();
        team.invite_player(id("p"));
        assert!(team.has_invite(id("p")));

        team.add_member(id("p")).unwrap();
        assert!(team.is_in_team(id("p")));
        assert!(!team.has_invite(id("p")));
        assert_eq!(team.rank_of(id("p")), Some(Rank::Member));
    }

    #[test]
    fn add_member_rejects_existing_ranks() {
        let mut team = alpha();
        assert!(matches!(
            team.add_member(id("owner")),
            Err(TeamError::AlreadyInTeam(_))
        ));

        team.add_member(id("r")).unwrap();
        assert!(team.promote_to_recruit(id("r")));
        assert!(matches!(
            team.add_member(id("r")),
            Err(TeamError::AlreadyInTeam(_))
        ));
        assert!(!team.is_member(id("r")));
        assert!(team.is_recruit(id("r")));
    }

    #[test]
    fn add_member_enforces_level_cap() {
        let mut team = alpha();
        for n in 0..4 {
            team.add_member(id(&format!("m{n}"))).unwrap();
        }
        assert_eq!(team.member_count(), 5);
        let err = team.add_member(id("extra")).unwrap_err();
        assert!(matches!(err, TeamError::TeamFull { max: 5, .. }));

        team.set_level(2);
        team.add_member(id("extra")).unwrap();
        assert_eq!(team.member_count(), 6);
    }

    #[test]
    fn promote_requires_base_rank() {
        let mut team = alpha();
        let before = team.clone();
        assert!(!team.promote_to_recruit(id("stranger")));
        assert!(!team.promote_to_recruit(id("owner")));
        assert_eq!(team, before);
    }

    #[test]
    fn promote_then_demote_restores_sets() {
        let mut team = alpha();
        team.add_member(id("a")).unwrap();
        team.add_member(id("b")).unwrap();
        let members = team.members().clone();
        let recruits = team.recruits().clone();

        assert!(team.promote_to_recruit(id("a")));
        assert!(team.is_recruit(id("a")));
        assert!(!team.demote_to_member(id("b")));
        assert!(team.demote_to_member(id("a")));

        assert_eq!(team.members(), &members);
        assert_eq!(team.recruits(), &recruits);
    }

    #[test]
    fn remove_member_is_idempotent() {
        let mut team = alpha();
        team.add_member(id("a")).unwrap();
        team.promote_to_recruit(id("a"));
        team.remove_member(id("a"));
        team.remove_member(id("a"));
        assert!(!team.is_in_team(id("a")));
        assert_eq!(team.member_count(), 1);
    }

    #[test]
    fn kd_ratio_edge_rules() {
        let mut team = alpha();
        assert_eq!(team.kd_ratio(), 0.0);

        team.set_stats(5, 0);
        assert_eq!(team.kd_ratio(), 5.0);

        team.set_stats(4, 2);
        assert_eq!(team.kd_ratio(), 2.0);
    }

    #[test]
    fn level_is_clamped_and_drives_cap() {
        let mut team = alpha();
        assert_eq!(team.max_members(), 5);
        team.set_level(10);
        assert_eq!(team.max_members(), 23);
        team.set_level(42);
        assert_eq!(team.level(), 10);
        team.set_level(-3);
        assert_eq!(team.level(), 1);
    }

    #[test]
    fn age_uses_floor_division() {
        let created = Utc::now();
        let team = Team::with_creation_time("Alpha", id("owner"), created);
        assert_eq!(team.age_in_days(created + Duration::hours(23)), 0);
        assert_eq!(team.age_in_days(created + Duration::hours(49)), 2);
    }

    #[test]
    fn power_combines_level_members_and_ratio() {
        let mut team = alpha();
        team.add_member(id("a")).unwrap();
        team.set_stats(3, 2);
        // 1*10 + 2*5 + 1.5*20
        assert_eq!(team.power(), 50);
    }
}
