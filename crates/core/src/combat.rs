//! Friendly-fire rule and kill/death bookkeeping.

use tracing::debug;

use crate::{models::ParticipantId, registry::TeamRegistry};

/// False only when both players share a team that has PvP turned off.
pub fn allows_damage(registry: &TeamRegistry, attacker: ParticipantId, victim: ParticipantId) -> bool {
    match (registry.player_team(attacker), registry.player_team(victim)) {
        (Some(attacker_team), Some(victim_team)) if attacker_team.name() == victim_team.name() => {
            victim_team.pvp_enabled()
        }
        _ => true,
    }
}

/// Credit a kill and a death. Returns true when any counter changed.
///
/// Killing a teammate still counts as a death but earns no kill.
pub fn record_kill(registry: &mut TeamRegistry, killer: ParticipantId, victim: ParticipantId) -> bool {
    let killer_team = registry.player_team(killer).map(|team| team.name().to_string());
    let victim_team = registry.player_team(victim).map(|team| team.name().to_string());
    let mut changed = false;

    if let Some(team) = victim_team
        .as_deref()
        .and_then(|name| registry.get_team_mut(name))
    {
        team.add_death();
        changed = true;
    }

    if let Some(name) = killer_team.as_deref() {
        if killer_team != victim_team {
            if let Some(team) = registry.get_team_mut(name) {
                team.add_kill();
                changed = true;
            }
        }
    }

    debug!(?killer_team, ?victim_team, "Recorded kill");
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ParticipantId {
        ParticipantId::from_name(name)
    }

    fn registry() -> TeamRegistry {
        let mut registry = TeamRegistry::new();
        registry
            .create_team("Alpha", id("a1"))
            .unwrap()
            .add_member(id("a2"))
            .unwrap();
        registry.create_team("Beta", id("b1")).unwrap();
        registry
    }

    #[test]
    fn friendly_fire_follows_pvp_flag() {
        let mut registry = registry();
        assert!(!allows_damage(&registry, id("a1"), id("a2")));
        assert!(allows_damage(&registry, id("a1"), id("b1")));
        assert!(allows_damage(&registry, id("a1"), id("loner")));

        registry.get_team_mut("alpha").unwrap().set_pvp_enabled(true);
        assert!(allows_damage(&registry, id("a2"), id("a1")));
    }

    #[test]
    fn kills_credit_teams() {
        let mut registry = registry();
        assert!(record_kill(&mut registry, id("a1"), id("b1")));
        assert_eq!(registry.get_team("Alpha").unwrap().total_kills(), 1);
        assert_eq!(registry.get_team("Beta").unwrap().total_deaths(), 1);

        // teamkill: death only
        assert!(record_kill(&mut registry, id("a1"), id("a2")));
        let alpha = registry.get_team("Alpha").unwrap();
        assert_eq!(alpha.total_kills(), 1);
        assert_eq!(alpha.total_deaths(), 1);

        assert!(!record_kill(&mut registry, id("x"), id("y")));
    }
}
