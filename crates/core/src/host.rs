#![allow(missing_docs)]

//! Capabilities borrowed from the runtime that embeds the team system.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    error::{TeamError, TeamResult},
    models::{HomeLocation, ParticipantId, ServerVersion},
};

/// Player and world services the team logic calls into.
pub trait Host {
    /// Last known name of a participant, online or not.
    fn player_name(&self, id: ParticipantId) -> Option<String>;
    /// Resolve a name, ignoring case.
    fn find_player(&self, name: &str) -> Option<ParticipantId>;
    /// True while the participant is connected.
    fn is_online(&self, id: ParticipantId) -> bool;
    /// Current position of an online participant.
    fn location(&self, id: ParticipantId) -> Option<HomeLocation>;
    /// Move a participant. Fails with `NotFound` for unknown worlds or players.
    fn teleport(&mut self, id: ParticipantId, to: &HomeLocation) -> TeamResult<()>;
    /// Deliver a color-coded line to one participant.
    fn send_message(&mut self, id: ParticipantId, message: &str);
    /// Permission check for a node such as `teams.invite`.
    fn has_permission(&self, id: ParticipantId, node: &str) -> bool;
    /// Version of the running server.
    fn server_version(&self) -> ServerVersion;

    /// Name for display, falling back to `Unknown`.
    fn display_name(&self, id: ParticipantId) -> String {
        self.player_name(id)
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Node prefix only operators hold by default.
pub const ADMIN_NODE_PREFIX: &str = "teams.admin.";

/// Simulated participant held by [`MemoryHost`].
#[derive(Debug, Clone)]
pub struct SimPlayer {
    pub id: ParticipantId,
    pub name: String,
    pub online: bool,
    /// Holds every permission node.
    pub operator: bool,
    /// Last position, kept while offline.
    pub location: HomeLocation,
}

/// Message captured by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ParticipantId,
    pub message: String,
}

/// Self-contained host: players, worlds and an outbox, all in memory.
#[derive(Debug)]
pub struct MemoryHost {
    players: BTreeMap<ParticipantId, SimPlayer>,
    worlds: BTreeSet<String>,
    version: ServerVersion,
    outbox: Vec<Delivery>,
}

/// World every simulated player starts in.
pub const DEFAULT_WORLD: &str = "world";

impl MemoryHost {
    /// Host with the default world and the given version.
    pub fn new(version: ServerVersion) -> Self {
        let mut worlds = BTreeSet::new();
        worlds.insert(DEFAULT_WORLD.to_string());
        Self {
            players: BTreeMap::new(),
            worlds,
            version,
            outbox: Vec::new(),
        }
    }

    /// Register a world that teleports may target.
    pub fn add_world(&mut self, world: impl Into<String>) {
        self.worlds.insert(world.into());
    }

    /// Known worlds, sorted.
    pub fn worlds(&self) -> impl Iterator<Item = &str> {
        self.worlds.iter().map(String::as_str)
    }

    /// Connect `name`, creating the player on first sight.
    pub fn connect(&mut self, name: &str) -> ParticipantId {
        let id = ParticipantId::from_name(name);
        let player = self.players.entry(id).or_insert_with(|| SimPlayer {
            id,
            name: name.to_string(),
            online: false,
            operator: false,
            location: HomeLocation::new(DEFAULT_WORLD, 0.0, 64.0, 0.0),
        });
        player.online = true;
        debug!(player = %player.name, "Player connected");
        id
    }

    /// Mark a player offline. Returns false for unknown players.
    pub fn disconnect(&mut self, id: ParticipantId) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.online = false;
                true
            }
            None => false,
        }
    }

    /// Grant or revoke every permission.
    pub fn set_operator(&mut self, id: ParticipantId, operator: bool) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.operator = operator;
                true
            }
            None => false,
        }
    }

    /// Move without world validation, as walking would.
    pub fn move_to(&mut self, id: ParticipantId, location: HomeLocation) {
        if let Some(player) = self.players.get_mut(&id) {
            player.location = location;
        }
    }

    pub fn player(&self, id: ParticipantId) -> Option<&SimPlayer> {
        self.players.get(&id)
    }

    /// Every known player, sorted by id.
    pub fn players(&self) -> impl Iterator<Item = &SimPlayer> {
        self.players.values()
    }

    /// Drain captured messages.
    pub fn take_messages(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.outbox)
    }

    /// Captured messages for one participant, codes stripped.
    pub fn messages_for(&self, id: ParticipantId) -> Vec<String> {
        self.outbox
            .iter()
            .filter(|delivery| delivery.to == id)
            .map(|delivery| crate::text::strip(&delivery.message))
            .collect()
    }
}

impl Host for MemoryHost {
    fn player_name(&self, id: ParticipantId) -> Option<String> {
        self.players.get(&id).map(|player| player.name.clone())
    }

    fn find_player(&self, name: &str) -> Option<ParticipantId> {
        self.players
            .values()
            .find(|player| player.name.eq_ignore_ascii_case(name))
            .map(|player| player.id)
    }

    fn is_online(&self, id: ParticipantId) -> bool {
        self.players.get(&id).map(|player| player.online).unwrap_or(false)
    }

    fn location(&self, id: ParticipantId) -> Option<HomeLocation> {
        self.players
            .get(&id)
            .filter(|player| player.online)
            .map(|player| player.location.clone())
    }

    fn teleport(&mut self, id: ParticipantId, to: &HomeLocation) -> TeamResult<()> {
        if !self.worlds.contains(&to.world) {
            return Err(TeamError::NotFound(format!("world '{}'", to.world)));
        }
        let player = self
            .players
            .get_mut(&id)
            .filter(|player| player.online)
            .ok_or_else(|| TeamError::NotFound("player".to_string()))?;
        player.location = to.clone();
        Ok(())
    }

    fn send_message(&mut self, id: ParticipantId, message: &str) {
        if self.is_online(id) {
            self.outbox.push(Delivery {
                to: id,
                message: message.to_string(),
            });
        }
    }

    fn has_permission(&self, id: ParticipantId, node: &str) -> bool {
        match self.players.get(&id) {
            Some(player) if player.operator => true,
            Some(_) => !node.starts_with(ADMIN_NODE_PREFIX),
            None => false,
        }
    }

    fn server_version(&self) -> ServerVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        let mut host = MemoryHost::new(ServerVersion::default());
        let steve = host.connect("Steve");
        assert_eq!(host.find_player("steve"), Some(steve));
        assert_eq!(host.display_name(steve), "Steve");
        assert_eq!(
            host.display_name(ParticipantId::from_name("ghost")),
            "Unknown"
        );
    }

    #[test]
    fn offline_players_get_no_messages() {
        let mut host = MemoryHost::new(ServerVersion::default());
        let steve = host.connect("Steve");
        host.send_message(steve, "one");
        host.disconnect(steve);
        host.send_message(steve, "two");
        assert_eq!(host.messages_for(steve), vec!["one"]);
        assert!(host.location(steve).is_none());
    }

    #[test]
    fn admin_nodes_need_operator() {
        let mut host = MemoryHost::new(ServerVersion::default());
        let steve = host.connect("Steve");
        assert!(host.has_permission(steve, "teams.invite"));
        assert!(!host.has_permission(steve, "teams.admin.setlevel"));
        host.set_operator(steve, true);
        assert!(host.has_permission(steve, "teams.admin.setlevel"));
    }

    #[test]
    fn teleport_checks_world() {
        let mut host = MemoryHost::new(ServerVersion::default());
        let steve = host.connect("Steve");
        let nether = HomeLocation::new("nether", 1.0, 2.0, 3.0);
        assert!(matches!(
            host.teleport(steve, &nether),
            Err(TeamError::NotFound(_))
        ));

        host.add_world("nether");
        host.teleport(steve, &nether).unwrap();
        assert_eq!(host.location(steve), Some(nether));
    }
}
