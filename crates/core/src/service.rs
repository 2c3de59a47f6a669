//! Command handlers: validate the caller, mutate the registry, notify
//! players and flush to storage.

use chrono::Duration;
use tracing::{debug, error, info};

use crate::{
    alliance::{AllianceOutcome, AllianceTable},
    chat::{format_team_chat, ChatEvent, ChatModes},
    clock::{Clock, SystemClock},
    combat,
    command::{help_entries, PvpSetting, TeamCommand},
    config::AppConfig,
    disband::{DisbandRequest, DisbandTracker},
    error::{TeamError, TeamResult},
    host::Host,
    models::{ParticipantId, TeamColor},
    registry::{validate_team_name, TeamRegistry},
    storage::TeamStore,
    team::{Team, DESCRIPTION_MAX_LEN},
    text,
};

/// Where a chat line ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRoute {
    /// Not ours; the host shows it to everyone.
    Public,
    /// Delivered to the sender's team only.
    Team,
    /// Used as a command or prompt answer.
    Consumed,
}

/// Owns every piece of team state. Lives on the main loop.
#[derive(Debug)]
pub struct TeamService<C = SystemClock> {
    registry: TeamRegistry,
    alliances: AllianceTable,
    disbands: DisbandTracker,
    chat: ChatModes,
    store: TeamStore,
    autosave: bool,
    clock: C,
}

impl TeamService<SystemClock> {
    /// Service over the configured files, using the wall clock.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let window = config.disband_window()?;
        Ok(Self::new(TeamStore::from_config(config), SystemClock)
            .with_disband_window(window)
            .with_autosave(config.autosave))
    }
}

fn broadcast<H: Host + ?Sized>(
    host: &mut H,
    members: &[ParticipantId],
    skip: Option<ParticipantId>,
    message: &str,
) {
    for &id in members {
        if Some(id) != skip && host.is_online(id) {
            host.send_message(id, message);
        }
    }
}

/// Find a team member by online name, then by the id derived from `name`.
fn resolve_member<H: Host + ?Sized>(
    host: &H,
    team: &Team,
    name: &str,
) -> TeamResult<(ParticipantId, String)> {
    team.all_members()
        .into_iter()
        .find_map(|id| {
            host.player_name(id)
                .filter(|known| known.eq_ignore_ascii_case(name))
                .map(|known| (id, known))
        })
        .or_else(|| {
            let derived = ParticipantId::from_name(name);
            team.is_in_team(derived).then(|| (derived, name.to_string()))
        })
        .ok_or_else(|| TeamError::NotFound(format!("player '{name}' in your team")))
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl<C: Clock> TeamService<C> {
    /// Empty service writing to `store`.
    pub fn new(store: TeamStore, clock: C) -> Self {
        Self {
            registry: TeamRegistry::new(),
            alliances: AllianceTable::new(),
            disbands: DisbandTracker::default(),
            chat: ChatModes::default(),
            store,
            autosave: true,
            clock,
        }
    }

    /// Override the disband confirmation window.
    pub fn with_disband_window(mut self, window: Duration) -> Self {
        self.disbands = DisbandTracker::new(window);
        self
    }

    /// Turn saving after each change on or off.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// Every team.
    pub fn registry(&self) -> &TeamRegistry {
        &self.registry
    }

    /// Alliances and outstanding requests.
    pub fn alliances(&self) -> &AllianceTable {
        &self.alliances
    }

    /// Team-chat and creation-prompt modes.
    pub fn chat_modes(&self) -> &ChatModes {
        &self.chat
    }

    /// True while the team owned or joined by `id` awaits a disband confirm.
    pub fn disband_pending(&self, id: ParticipantId) -> bool {
        self.registry
            .player_team(id)
            .map(|team| self.disbands.is_pending(team.name(), self.clock.now()))
            .unwrap_or(false)
    }

    /// Replace in-memory state with the stored documents.
    pub fn load(&mut self) -> TeamResult<usize> {
        let count = self.registry.load_all(&self.store)?;
        self.alliances = self.store.load_alliances()?;
        Ok(count)
    }

    /// Write teams and alliances.
    pub fn save(&self) -> TeamResult<()> {
        self.registry.save_all(&self.store)?;
        self.store.save_alliances(&self.alliances)?;
        Ok(())
    }

    fn persist(&self) {
        if !self.autosave {
            return;
        }
        if let Err(err) = self.save() {
            error!("Failed to save teams: {err}");
        }
    }

    /// Run a command and report any failure to the sender. Returns success.
    pub fn dispatch<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        sender: ParticipantId,
        command: TeamCommand,
    ) -> bool {
        let name = command.name();
        match self.execute(host, sender, command) {
            Ok(()) => true,
            Err(err) => {
                debug!(command = name, "Command failed: {err}");
                host.send_message(sender, &text::failure(capitalize(&err.to_string())));
                false
            }
        }
    }

    /// Run a command on behalf of `sender`.
    pub fn execute<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        sender: ParticipantId,
        command: TeamCommand,
    ) -> TeamResult<()> {
        if !host.has_permission(sender, &command.permission()) {
            return Err(TeamError::NotAuthorized(format!(
                "you don't have permission to use /team {}",
                command.name()
            )));
        }
        let mutates = command.mutates();

        match command {
            TeamCommand::Create { name: None } => self.prompt_create(host, sender)?,
            TeamCommand::Create { name: Some(name) } => self.create(host, sender, &name)?,
            TeamCommand::Disband => self.disband(host, sender)?,
            TeamCommand::Confirm => self.confirm(host, sender)?,
            TeamCommand::Cancel => self.cancel(host, sender)?,
            TeamCommand::Invite { target } => self.invite(host, sender, &target)?,
            TeamCommand::Join { team } => self.join(host, sender, &team)?,
            TeamCommand::Leave => self.leave(host, sender)?,
            TeamCommand::Kick { target } => self.kick(host, sender, &target)?,
            TeamCommand::Promote { target } => self.promote(host, sender, &target)?,
            TeamCommand::Demote { target } => self.demote(host, sender, &target)?,
            TeamCommand::Pvp(setting) => self.pvp(host, sender, setting)?,
            TeamCommand::Info { team } => self.info(host, sender, team.as_deref())?,
            TeamCommand::List => self.list(host, sender),
            TeamCommand::SetHome => self.set_home(host, sender)?,
            TeamCommand::Home => self.home(host, sender)?,
            TeamCommand::Color(color) => self.color(host, sender, color)?,
            TeamCommand::Ally { team } => self.ally(host, sender, &team)?,
            TeamCommand::SetLevel(level) => self.set_level(host, sender, level)?,
            TeamCommand::Desc { text } => self.describe(host, sender, &text)?,
            TeamCommand::Stats { team } => self.stats(host, sender, team.as_deref())?,
            TeamCommand::TcToggle => self.toggle_team_chat(host, sender)?,
            TeamCommand::Chat { message } => self.team_chat(host, sender, &message)?,
            TeamCommand::Help => self.help(host, sender),
        }

        if mutates {
            self.persist();
        }
        Ok(())
    }

    /// Route one chat line drained from the inbox.
    pub fn handle_chat<H: Host + ?Sized>(&mut self, host: &mut H, event: ChatEvent) -> ChatRoute {
        let ChatEvent { sender, message } = event;
        let message = message.trim();

        if self.chat.end_creation(sender) {
            if message.eq_ignore_ascii_case("cancel") {
                host.send_message(sender, &text::failure("Team creation cancelled."));
            } else {
                let command = TeamCommand::Create {
                    name: Some(message.to_string()),
                };
                self.dispatch(host, sender, command);
            }
            return ChatRoute::Consumed;
        }

        if let Some(parsed) = TeamCommand::parse_line(message) {
            match parsed {
                Ok(command) => {
                    self.dispatch(host, sender, command);
                }
                Err(err) => {
                    host.send_message(sender, &text::failure(capitalize(&err.to_string())));
                }
            }
            return ChatRoute::Consumed;
        }

        if self.chat.in_team_chat(sender) {
            if self.send_team_chat(host, sender, message).is_ok() {
                return ChatRoute::Team;
            }
            // team is gone; fall back to public chat
            self.chat.clear(sender);
        }
        ChatRoute::Public
    }

    /// Friendly-fire check for the host's damage hook.
    pub fn allows_damage(&self, attacker: ParticipantId, victim: ParticipantId) -> bool {
        combat::allows_damage(&self.registry, attacker, victim)
    }

    /// Death hook: update team stats and save.
    pub fn record_kill(&mut self, killer: ParticipantId, victim: ParticipantId) {
        if combat::record_kill(&mut self.registry, killer, victim) {
            self.persist();
        }
    }

    /// Drop per-session state of a player that logged out.
    pub fn player_quit(&mut self, id: ParticipantId) {
        self.chat.end_creation(id);
    }

    fn team_of(&self, sender: ParticipantId) -> TeamResult<&Team> {
        self.registry.player_team(sender).ok_or(TeamError::NotInTeam)
    }

    fn owned_team(&self, sender: ParticipantId, action: &str) -> TeamResult<&Team> {
        let team = self.team_of(sender)?;
        if team.is_owner(sender) {
            Ok(team)
        } else {
            Err(TeamError::NotAuthorized(format!(
                "only the team owner can {action}"
            )))
        }
    }

    fn team_mut(&mut self, name: &str) -> TeamResult<&mut Team> {
        self.registry
            .get_team_mut(name)
            .ok_or_else(|| TeamError::NotFound(format!("team '{name}'")))
    }

    fn lookup(&self, sender: ParticipantId, name: Option<&str>, verb: &str) -> TeamResult<&Team> {
        match name {
            Some(name) => self
                .registry
                .get_team(name)
                .ok_or_else(|| TeamError::NotFound(format!("team '{name}'"))),
            None => self.registry.player_team(sender).ok_or_else(|| {
                TeamError::Validation(format!(
                    "you're not in a team, use '/team {verb} <name>' to look at other teams"
                ))
            }),
        }
    }

    fn ensure_teamless<H: Host + ?Sized>(&self, host: &H, sender: ParticipantId) -> TeamResult<()> {
        if self.registry.player_team(sender).is_some() {
            return Err(TeamError::AlreadyInTeam(host.display_name(sender)));
        }
        Ok(())
    }

    fn prompt_create<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        self.ensure_teamless(host, sender)?;
        self.chat.begin_creation(sender);
        host.send_message(sender, &text::notice("Type the name of your new team in chat:"));
        host.send_message(
            sender,
            &text::paint(TeamColor::Gray, "To cancel, type 'cancel'"),
        );
        Ok(())
    }

    fn create<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, name: &str) -> TeamResult<()> {
        self.ensure_teamless(host, sender)?;
        validate_team_name(name)?;
        self.registry.create_team(name, sender)?;
        info!(team = name, owner = %host.display_name(sender), "Team created");
        host.send_message(
            sender,
            &text::success(format!(
                "Team '{name}' created successfully! You are the owner."
            )),
        );
        Ok(())
    }

    fn disband<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        let name = self
            .owned_team(sender, "disband the team")?
            .name()
            .to_string();
        let window = self.disbands.window().num_seconds();
        match self.disbands.request(&name, sender, self.clock.now()) {
            DisbandRequest::Started => {
                host.send_message(sender, &text::notice("===== DISBAND CONFIRMATION ====="));
                host.send_message(
                    sender,
                    &text::failure(format!(
                        "WARNING: You are about to disband team '{name}'."
                    )),
                );
                host.send_message(
                    sender,
                    &text::notice(format!(
                        "Type /team confirm within {window} seconds to disband your team, or /team cancel."
                    )),
                );
            }
            DisbandRequest::AlreadyPending { remaining_secs } => {
                host.send_message(
                    sender,
                    &text::notice(format!(
                        "Please type /team confirm to disband your team or wait for the request to expire ({remaining_secs}s left)."
                    )),
                );
            }
        }
        Ok(())
    }

    fn confirm<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        let pending = self.disbands.take(sender, self.clock.now())?;
        let team = self
            .registry
            .get_team(&pending.team)
            .ok_or_else(|| TeamError::NotFound(format!("team '{}'", pending.team)))?;
        if !team.is_owner(sender) {
            return Err(TeamError::NotAuthorized(
                "you are no longer the team owner".to_string(),
            ));
        }

        let members = team.all_members();
        let Some(team) = self.registry.remove_team(&pending.team) else {
            return Err(TeamError::NotFound(format!("team '{}'", pending.team)));
        };
        self.alliances.remove_team(team.name());
        self.disbands.remove_team(team.name());
        for &member in &members {
            self.chat.clear(member);
        }

        info!(team = team.name(), "Team disbanded");
        broadcast(
            host,
            &members,
            Some(sender),
            &text::notice(format!(
                "Your team '{}' has been disbanded by the owner.",
                team.name()
            )),
        );
        host.send_message(
            sender,
            &text::success(format!("Team '{}' has been disbanded.", team.name())),
        );
        Ok(())
    }

    fn cancel<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        let team = self
            .disbands
            .cancel(sender)
            .ok_or(TeamError::NoPendingConfirmation)?;
        host.send_message(
            sender,
            &text::success(format!("Disband of team '{team}' cancelled.")),
        );
        Ok(())
    }

    fn invite<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, target: &str) -> TeamResult<()> {
        let team = self.team_of(sender)?;
        if !team.can_recruit(sender) {
            return Err(TeamError::NotAuthorized(
                "only the team owner and recruiters can invite players".to_string(),
            ));
        }
        let target_id = host
            .find_player(target)
            .filter(|id| host.is_online(*id))
            .ok_or_else(|| TeamError::NotFound(format!("online player '{target}'")))?;
        let target_name = host.display_name(target_id);
        if self.registry.player_team(target_id).is_some() {
            return Err(TeamError::AlreadyInTeam(target_name));
        }
        if team.has_invite(target_id) {
            return Err(TeamError::AlreadyInvited(target_name));
        }

        let name = team.name().to_string();
        self.team_mut(&name)?.invite_player(target_id);
        host.send_message(
            sender,
            &text::success(format!("Invited {target_name} to your team.")),
        );
        host.send_message(
            target_id,
            &text::notice(format!("You've been invited to join team '{name}'.")),
        );
        host.send_message(
            target_id,
            &text::notice(format!("Type /team join {name} to accept.")),
        );
        Ok(())
    }

    fn join<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, name: &str) -> TeamResult<()> {
        self.ensure_teamless(host, sender)?;
        let team = self.team_mut(name)?;
        if !team.has_invite(sender) {
            return Err(TeamError::NoInvite(team.name().to_string()));
        }
        team.add_member(sender)?;

        let team_name = team.name().to_string();
        let members = team.all_members();
        let player = host.display_name(sender);
        broadcast(
            host,
            &members,
            Some(sender),
            &text::success(format!("{player} has joined your team!")),
        );
        host.send_message(
            sender,
            &text::success(format!("You've joined team '{team_name}'!")),
        );
        Ok(())
    }

    fn leave<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        let team = self.team_of(sender)?;
        if team.is_owner(sender) {
            return Err(TeamError::NotAuthorized(
                "as the owner you can't leave the team, use '/team disband'".to_string(),
            ));
        }
        let name = team.name().to_string();
        let team = self.team_mut(&name)?;
        team.remove_member(sender);
        let members = team.all_members();
        self.chat.clear(sender);

        let player = host.display_name(sender);
        broadcast(
            host,
            &members,
            None,
            &text::notice(format!("{player} has left the team.")),
        );
        host.send_message(
            sender,
            &text::success(format!("You've left team '{name}'.")),
        );
        Ok(())
    }

    fn kick<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, target: &str) -> TeamResult<()> {
        let team = self.team_of(sender)?;
        if !team.can_recruit(sender) {
            return Err(TeamError::NotAuthorized(
                "only the team owner and recruiters can kick players".to_string(),
            ));
        }
        let (target_id, target_name) = resolve_member(host, team, target)?;
        if team.is_owner(target_id) {
            return Err(TeamError::NotAuthorized(
                "you can't kick the team owner".to_string(),
            ));
        }
        if team.is_recruit(target_id) && !team.is_owner(sender) {
            return Err(TeamError::NotAuthorized(
                "only the team owner can kick recruiters".to_string(),
            ));
        }

        let name = team.name().to_string();
        let team = self.team_mut(&name)?;
        team.remove_member(target_id);
        let members = team.all_members();
        self.chat.clear(target_id);

        let kicker = host.display_name(sender);
        info!(team = %name, target = %target_name, by = %kicker, "Member kicked");
        broadcast(
            host,
            &members,
            Some(sender),
            &text::notice(format!(
                "{target_name} has been kicked from the team by {kicker}."
            )),
        );
        host.send_message(
            target_id,
            &text::failure(format!(
                "You've been kicked from team '{name}' by {kicker}."
            )),
        );
        host.send_message(
            sender,
            &text::success(format!("Kicked {target_name} from your team.")),
        );
        Ok(())
    }

    fn promote<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, target: &str) -> TeamResult<()> {
        let team = self.owned_team(sender, "promote members")?;
        let (target_id, target_name) = resolve_member(host, team, target)?;
        let name = team.name().to_string();
        if !self.team_mut(&name)?.promote_to_recruit(target_id) {
            return Err(TeamError::InvalidRank(format!(
                "{target_name} is not a member of your team or is already a recruiter"
            )));
        }
        host.send_message(
            sender,
            &text::success(format!(
                "You've promoted {target_name} to a team recruiter."
            )),
        );
        host.send_message(
            target_id,
            &text::success(format!(
                "You've been promoted to a recruiter in team '{name}'."
            )),
        );
        Ok(())
    }

    fn demote<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, target: &str) -> TeamResult<()> {
        let team = self.owned_team(sender, "demote recruiters")?;
        let (target_id, target_name) = resolve_member(host, team, target)?;
        let name = team.name().to_string();
        if !self.team_mut(&name)?.demote_to_member(target_id) {
            return Err(TeamError::InvalidRank(format!(
                "{target_name} is not a recruiter in your team"
            )));
        }
        host.send_message(
            sender,
            &text::success(format!(
                "You've demoted {target_name} to a regular team member."
            )),
        );
        host.send_message(
            target_id,
            &text::notice(format!(
                "You've been demoted to a regular member in team '{name}'."
            )),
        );
        Ok(())
    }

    fn pvp<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, setting: PvpSetting) -> TeamResult<()> {
        let name = self
            .owned_team(sender, "toggle team PvP")?
            .name()
            .to_string();
        let team = self.team_mut(&name)?;
        let enabled = setting.apply(team.pvp_enabled());
        team.set_pvp_enabled(enabled);
        let members = team.all_members();

        let status = if enabled { "enabled" } else { "disabled" };
        let player = host.display_name(sender);
        broadcast(
            host,
            &members,
            Some(sender),
            &text::notice(format!("Team PvP has been {status} by {player}.")),
        );
        host.send_message(sender, &text::success(format!("Team PvP {status}.")));
        Ok(())
    }

    fn info<H: Host + ?Sized>(&self, host: &mut H, sender: ParticipantId, name: Option<&str>) -> TeamResult<()> {
        let team = self.lookup(sender, name, "info")?;
        let now = self.clock.now();
        let mut lines = vec![
            text::banner(format!("Team: {}", team.name())),
            text::field("Owner", host.display_name(team.owner())),
            text::field("Description", team.description()),
            text::field("Age", format!("{} days", team.age_in_days(now))),
            text::field("PvP", if team.pvp_enabled() { "Enabled" } else { "Disabled" }),
            text::field(
                "Color",
                format!("{}{}", text::team_code(team.color(), host.server_version()), team.color()),
            ),
            text::field("Level", team.level()),
        ];
        if let Some(home) = team.home() {
            lines.push(text::field("Home", home.describe()));
        }
        let allies = self.alliances.allies_of(team.name());
        if !allies.is_empty() {
            let names: Vec<String> = allies
                .iter()
                .map(|key| {
                    self.registry
                        .get_team(key)
                        .map(|ally| ally.name().to_string())
                        .unwrap_or_else(|| key.clone())
                })
                .collect();
            lines.push(text::field("Allies", names.join(", ")));
        }
        for (label, ids) in [("Recruiters", team.recruits()), ("Members", team.members())] {
            if ids.is_empty() {
                continue;
            }
            lines.push(text::notice(format!("{label}:")));
            for &id in ids {
                lines.push(text::paint(
                    TeamColor::White,
                    format!("- {}", host.display_name(id)),
                ));
            }
        }
        lines.push(text::field("Total Members", team.member_count()));

        for line in lines {
            host.send_message(sender, &line);
        }
        Ok(())
    }

    fn list<H: Host + ?Sized>(&self, host: &mut H, sender: ParticipantId) {
        let teams = self.registry.all_teams();
        if teams.is_empty() {
            host.send_message(sender, &text::notice("There are no teams yet."));
            return;
        }
        host.send_message(sender, &text::banner("Teams"));
        let version = host.server_version();
        for team in teams {
            let line = format!(
                "{}{}{} - {} members (Owner: {})",
                text::team_code(team.color(), version),
                team.name(),
                text::legacy(TeamColor::White),
                team.member_count(),
                host.display_name(team.owner()),
            );
            host.send_message(sender, &line);
        }
    }

    fn set_home<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        let name = self
            .owned_team(sender, "set the team home")?
            .name()
            .to_string();
        let location = host
            .location(sender)
            .ok_or_else(|| TeamError::NotFound("your location".to_string()))?;
        let described = location.describe();
        self.team_mut(&name)?.set_home(Some(location));
        host.send_message(
            sender,
            &text::success(format!("Team home set at your current location: {described}.")),
        );
        Ok(())
    }

    fn home<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        let home = self
            .team_of(sender)?
            .home()
            .cloned()
            .ok_or_else(|| TeamError::NotFound("team home".to_string()))?;
        host.teleport(sender, &home)?;
        host.send_message(sender, &text::success("Teleported to team home."));
        Ok(())
    }

    fn color<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, color: TeamColor) -> TeamResult<()> {
        let name = self
            .owned_team(sender, "set the team color")?
            .name()
            .to_string();
        self.team_mut(&name)?.set_color(color);
        host.send_message(
            sender,
            &format!(
                "{}{}{color}",
                text::success("Team color set to "),
                text::team_code(color, host.server_version())
            ),
        );
        Ok(())
    }

    fn ally<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, target: &str) -> TeamResult<()> {
        let own = self
            .owned_team(sender, "manage team alliances")?
            .name()
            .to_string();
        let other = self
            .registry
            .get_team(target)
            .ok_or_else(|| TeamError::NotFound(format!("team '{target}'")))?;
        let (other_name, other_owner) = (other.name().to_string(), other.owner());

        match self.alliances.request(&own, &other_name)? {
            AllianceOutcome::Requested => {
                host.send_message(
                    sender,
                    &text::notice(format!("Alliance request sent to team '{other_name}'.")),
                );
                host.send_message(
                    other_owner,
                    &text::notice(format!(
                        "Team '{own}' wants to form an alliance with your team."
                    )),
                );
                host.send_message(
                    other_owner,
                    &text::notice(format!("Type /team ally {own} to accept.")),
                );
            }
            AllianceOutcome::Formed => {
                info!(a = %own, b = %other_name, "Alliance formed");
                host.send_message(
                    sender,
                    &text::success(format!("Alliance formed with team '{other_name}'!")),
                );
                host.send_message(
                    other_owner,
                    &text::success(format!("Alliance formed with team '{own}'!")),
                );
            }
            AllianceOutcome::Broken => {
                info!(a = %own, b = %other_name, "Alliance broken");
                host.send_message(
                    sender,
                    &text::notice(format!(
                        "Alliance with team '{other_name}' has been broken."
                    )),
                );
                host.send_message(
                    other_owner,
                    &text::notice(format!(
                        "Team '{own}' has broken their alliance with your team."
                    )),
                );
            }
        }
        Ok(())
    }

    fn set_level<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, level: i64) -> TeamResult<()> {
        let name = self.team_of(sender)?.name().to_string();
        let team = self.team_mut(&name)?;
        team.set_level(level);
        let (applied, max) = (team.level(), team.max_members());
        let members = team.all_members();

        host.send_message(sender, &text::success(format!("Team level set to {applied}.")));
        host.send_message(
            sender,
            &text::notice(format!("Your team can now have up to {max} members.")),
        );
        broadcast(
            host,
            &members,
            Some(sender),
            &text::notice(format!(
                "Your team has reached level {applied}! It can now have up to {max} members."
            )),
        );
        Ok(())
    }

    fn describe<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, description: &str) -> TeamResult<()> {
        let name = self
            .owned_team(sender, "set the team description")?
            .name()
            .to_string();
        if description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(TeamError::Validation(format!(
                "description is too long, maximum length is {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        let team = self.team_mut(&name)?;
        team.set_description(description);
        let members = team.all_members();

        host.send_message(sender, &text::success("Team description has been updated!"));
        broadcast(
            host,
            &members,
            Some(sender),
            &text::notice(format!(
                "Your team's description has been updated to: {description}"
            )),
        );
        Ok(())
    }

    fn stats<H: Host + ?Sized>(&self, host: &mut H, sender: ParticipantId, name: Option<&str>) -> TeamResult<()> {
        let team = self.lookup(sender, name, "stats")?;
        let lines = [
            text::banner(format!(
                "{}{}{} Statistics",
                text::team_code(team.color(), host.server_version()),
                team.name(),
                text::legacy(TeamColor::Green)
            )),
            text::field("Age", format!("{} days", team.age_in_days(self.clock.now()))),
            text::field("Level", team.level()),
            text::field(
                "Members",
                format!("{}/{}", team.member_count(), team.max_members()),
            ),
            text::field("Kills", team.total_kills()),
            text::field("Deaths", team.total_deaths()),
            text::field("K/D Ratio", format!("{:.2}", team.kd_ratio())),
            format!(
                "{}Team Power: {}{}",
                text::legacy(TeamColor::Yellow),
                text::legacy(TeamColor::Gold),
                team.power()
            ),
        ];
        for line in lines {
            host.send_message(sender, &line);
        }
        Ok(())
    }

    fn toggle_team_chat<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId) -> TeamResult<()> {
        self.team_of(sender)?;
        let on = self.chat.toggle_team_chat(sender);
        let state = if on {
            text::success("ON")
        } else {
            text::failure("OFF")
        };
        host.send_message(sender, &format!("{}{state}", text::success("Team chat mode: ")));
        Ok(())
    }

    fn team_chat<H: Host + ?Sized>(&mut self, host: &mut H, sender: ParticipantId, message: &str) -> TeamResult<()> {
        self.send_team_chat(host, sender, message)
    }

    fn send_team_chat<H: Host + ?Sized>(&self, host: &mut H, sender: ParticipantId, message: &str) -> TeamResult<()> {
        let team = self.team_of(sender)?;
        let player = host.display_name(sender);
        let line = format_team_chat(team, &player, message, host.server_version());
        broadcast(host, &team.all_members(), None, &line);
        info!("[TeamChat:{}] {player}: {message}", team.name());
        Ok(())
    }

    fn help<H: Host + ?Sized>(&self, host: &mut H, sender: ParticipantId) {
        host.send_message(sender, &text::banner("Team Commands"));
        for (syntax, about) in help_entries() {
            host.send_message(
                sender,
                &format!(
                    "{}{syntax}{} - {about}",
                    text::legacy(TeamColor::Yellow),
                    text::legacy(TeamColor::White)
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{path::Path, sync::Arc};

    use crate::{
        clock::ManualClock,
        host::MemoryHost,
        models::{HomeLocation, ServerVersion},
    };
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        clock: Arc<ManualClock>,
        host: MemoryHost,
        service: TeamService<Arc<ManualClock>>,
    }

    fn store_in(dir: &Path) -> TeamStore {
        TeamStore::new(dir.join("teams.yml"), dir.join("alliances.yml"))
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let service = TeamService::new(store_in(dir.path()), clock.clone());
        Fixture {
            dir,
            clock,
            host: MemoryHost::new(ServerVersion::default()),
            service,
        }
    }

    impl Fixture {
        fn run(&mut self, sender: ParticipantId, line: &str) -> TeamResult<()> {
            let command = TeamCommand::parse(line)?;
            self.service.execute(&mut self.host, sender, command)
        }

        fn team(&self, name: &str) -> &Team {
            self.service.registry().get_team(name).unwrap()
        }

        fn reloaded(&self) -> TeamService<SystemClock> {
            let mut fresh = TeamService::new(store_in(self.dir.path()), SystemClock);
            fresh.load().unwrap();
            fresh
        }

        /// Alpha owned by `owner` with `members` joined through invites.
        fn alpha(&mut self, owner: ParticipantId, members: &[ParticipantId]) {
            self.run(owner, "create Alpha").unwrap();
            for &member in members {
                let name = self.host.display_name(member);
                self.run(owner, &format!("invite {name}")).unwrap();
                self.run(member, "join alpha").unwrap();
            }
        }
    }

    #[test]
    fn invite_join_flow_is_saved() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let player = fx.host.connect("Player");

        fx.run(owner, "create Alpha").unwrap();
        fx.run(owner, "invite player").unwrap();
        assert!(fx
            .host
            .messages_for(player)
            .contains(&"Type /team join Alpha to accept.".to_string()));
        assert!(matches!(
            fx.run(owner, "invite Player"),
            Err(TeamError::AlreadyInvited(_))
        ));

        fx.run(player, "join ALPHA").unwrap();
        let team = fx.team("alpha");
        assert!(team.is_member(player));
        assert!(!team.has_invite(player));
        assert!(fx
            .host
            .messages_for(owner)
            .contains(&"Player has joined your team!".to_string()));

        let reloaded = fx.reloaded();
        assert_eq!(reloaded.registry().get_team("Alpha"), Some(fx.team("Alpha")));
    }

    #[test]
    fn create_rules() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let other = fx.host.connect("Other");

        assert!(matches!(
            fx.run(owner, "create no"),
            Err(TeamError::Validation(_))
        ));
        fx.run(owner, "create Alpha").unwrap();
        assert!(matches!(
            fx.run(owner, "create Beta"),
            Err(TeamError::AlreadyInTeam(_))
        ));
        assert!(matches!(
            fx.run(other, "create ALPHA"),
            Err(TeamError::DuplicateName(_))
        ));
    }

    #[test]
    fn join_requires_invite_and_room() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let members: Vec<_> = (0..4).map(|n| fx.host.connect(&format!("m{n}"))).collect();
        fx.alpha(owner, &members);
        let late = fx.host.connect("Late");

        assert!(matches!(fx.run(late, "join Alpha"), Err(TeamError::NoInvite(_))));
        assert!(matches!(fx.run(late, "join Nope"), Err(TeamError::NotFound(_))));

        fx.run(owner, "invite Late").unwrap();
        assert!(matches!(
            fx.run(late, "join Alpha"),
            Err(TeamError::TeamFull { max: 5, .. })
        ));
        assert!(fx.team("Alpha").has_invite(late));
    }

    #[test]
    fn disband_confirmed_inside_window() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);

        fx.run(owner, "disband").unwrap();
        fx.clock.advance(Duration::seconds(29));
        fx.run(owner, "confirm").unwrap();

        assert!(fx.service.registry().get_team("Alpha").is_none());
        assert!(fx.service.registry().player_team(member).is_none());
        assert!(fx
            .host
            .messages_for(member)
            .contains(&"Your team 'Alpha' has been disbanded by the owner.".to_string()));
        assert!(fx.reloaded().registry().is_empty());
    }

    #[test]
    fn disband_expires_after_window() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        fx.alpha(owner, &[]);

        fx.run(owner, "disband").unwrap();
        fx.clock.advance(Duration::seconds(31));
        assert!(matches!(
            fx.run(owner, "confirm"),
            Err(TeamError::ConfirmationExpired)
        ));
        assert!(fx.service.registry().get_team("Alpha").is_some());
        assert!(matches!(
            fx.run(owner, "confirm"),
            Err(TeamError::NoPendingConfirmation)
        ));
    }

    #[test]
    fn disband_cancel_and_owner_only() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);

        assert!(matches!(
            fx.run(member, "disband"),
            Err(TeamError::NotAuthorized(_))
        ));
        assert!(matches!(
            fx.run(member, "confirm"),
            Err(TeamError::NoPendingConfirmation)
        ));

        fx.run(owner, "disband").unwrap();
        fx.run(owner, "cancel").unwrap();
        assert!(matches!(
            fx.run(owner, "confirm"),
            Err(TeamError::NoPendingConfirmation)
        ));
        assert!(fx.service.registry().get_team("Alpha").is_some());
    }

    #[test]
    fn kick_respects_ranks() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let rec = fx.host.connect("Rec");
        let rec2 = fx.host.connect("Rec2");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[rec, rec2, member]);
        fx.run(owner, "promote rec").unwrap();
        fx.run(owner, "promote Rec2").unwrap();

        assert!(matches!(
            fx.run(member, "kick Rec"),
            Err(TeamError::NotAuthorized(_))
        ));
        assert!(matches!(
            fx.run(rec, "kick Owner"),
            Err(TeamError::NotAuthorized(_))
        ));
        assert!(matches!(
            fx.run(rec, "kick Rec2"),
            Err(TeamError::NotAuthorized(_))
        ));
        assert!(matches!(
            fx.run(rec, "kick Stranger"),
            Err(TeamError::NotFound(_))
        ));

        fx.run(rec, "kick member").unwrap();
        fx.run(owner, "kick Rec2").unwrap();
        let team = fx.team("Alpha");
        assert!(!team.is_in_team(member));
        assert!(!team.is_in_team(rec2));
        assert!(fx
            .host
            .messages_for(member)
            .contains(&"You've been kicked from team 'Alpha' by Rec.".to_string()));
    }

    #[test]
    fn kick_resolves_offline_members() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);
        fx.host.disconnect(member);

        fx.run(owner, "kick member").unwrap();
        assert!(!fx.team("Alpha").is_in_team(member));
    }

    #[test]
    fn promote_and_demote_need_right_rank() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);

        assert!(matches!(
            fx.run(owner, "demote Member"),
            Err(TeamError::InvalidRank(_))
        ));
        fx.run(owner, "promote Member").unwrap();
        assert!(matches!(
            fx.run(owner, "promote Member"),
            Err(TeamError::InvalidRank(_))
        ));
        assert!(matches!(
            fx.run(member, "promote Member"),
            Err(TeamError::NotAuthorized(_))
        ));
        fx.run(owner, "demote Member").unwrap();
        assert!(fx.team("Alpha").is_member(member));
    }

    #[test]
    fn leave_and_owner_restriction() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);

        assert!(matches!(
            fx.run(owner, "leave"),
            Err(TeamError::NotAuthorized(_))
        ));
        fx.run(member, "leave").unwrap();
        assert!(matches!(fx.run(member, "leave"), Err(TeamError::NotInTeam)));
        assert_eq!(fx.team("Alpha").member_count(), 1);
    }

    #[test]
    fn setlevel_needs_admin_and_clamps() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        fx.alpha(owner, &[]);

        assert!(matches!(
            fx.run(owner, "setlevel 3"),
            Err(TeamError::NotAuthorized(_))
        ));
        fx.host.set_operator(owner, true);
        fx.run(owner, "setlevel 42").unwrap();
        assert_eq!(fx.team("Alpha").level(), 10);
        assert_eq!(fx.team("Alpha").max_members(), 23);
        assert!(fx
            .host
            .messages_for(owner)
            .contains(&"Team level set to 10.".to_string()));
    }

    #[test]
    fn description_length_is_checked() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        fx.alpha(owner, &[]);

        let long = "x".repeat(DESCRIPTION_MAX_LEN + 1);
        assert!(matches!(
            fx.run(owner, &format!("desc {long}")),
            Err(TeamError::Validation(_))
        ));
        let exact = "y".repeat(DESCRIPTION_MAX_LEN);
        fx.run(owner, &format!("desc {exact}")).unwrap();
        assert_eq!(fx.team("Alpha").description(), exact);
    }

    #[test]
    fn home_round_trip_and_unknown_world() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);

        assert!(matches!(fx.run(member, "home"), Err(TeamError::NotFound(_))));

        let spot = HomeLocation::new("world", 12.0, 70.0, -4.0);
        fx.host.move_to(owner, spot.clone());
        assert!(matches!(
            fx.run(member, "sethome"),
            Err(TeamError::NotAuthorized(_))
        ));
        fx.run(owner, "sethome").unwrap();
        fx.run(member, "home").unwrap();
        assert_eq!(fx.host.location(member), Some(spot));

        fx.host.move_to(owner, HomeLocation::new("mars", 0.0, 0.0, 0.0));
        fx.run(owner, "sethome").unwrap();
        assert!(matches!(fx.run(member, "home"), Err(TeamError::NotFound(_))));
    }

    #[test]
    fn alliance_flow_and_disband_purge() {
        let mut fx = fixture();
        let a = fx.host.connect("A");
        let b = fx.host.connect("B");
        fx.run(a, "create Alpha").unwrap();
        fx.run(b, "create Beta").unwrap();

        fx.run(a, "ally beta").unwrap();
        assert!(fx.service.alliances().has_request("Alpha", "Beta"));
        assert!(fx
            .host
            .messages_for(b)
            .contains(&"Type /team ally Alpha to accept.".to_string()));

        fx.run(b, "ally Alpha").unwrap();
        assert!(fx.service.alliances().are_allied("alpha", "beta"));
        assert!(fx.reloaded().alliances().are_allied("Alpha", "Beta"));

        fx.run(a, "disband").unwrap();
        fx.run(a, "confirm").unwrap();
        assert!(fx.service.alliances().allies_of("Beta").is_empty());
    }

    #[test]
    fn permission_denied_reports_to_sender() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        fx.run(owner, "create Alpha").unwrap();

        let ok = fx
            .service
            .dispatch(&mut fx.host, owner, TeamCommand::SetLevel(2));
        assert!(!ok);
        assert!(fx
            .host
            .messages_for(owner)
            .contains(&"Not allowed: you don't have permission to use /team setlevel".to_string()));
    }

    #[test]
    fn team_chat_reaches_members_only() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        let outsider = fx.host.connect("Outsider");
        fx.alpha(owner, &[member]);
        fx.host.take_messages();

        let route = fx.service.handle_chat(
            &mut fx.host,
            ChatEvent {
                sender: member,
                message: "/tc hello team".to_string(),
            },
        );
        assert_eq!(route, ChatRoute::Consumed);
        assert_eq!(fx.host.messages_for(owner), vec!["[Team] Member: hello team"]);
        assert!(fx.host.messages_for(outsider).is_empty());

        fx.run(member, "tctoggle").unwrap();
        let route = fx.service.handle_chat(
            &mut fx.host,
            ChatEvent {
                sender: member,
                message: "toggled".to_string(),
            },
        );
        assert_eq!(route, ChatRoute::Team);

        fx.run(member, "leave").unwrap();
        let route = fx.service.handle_chat(
            &mut fx.host,
            ChatEvent {
                sender: member,
                message: "public again".to_string(),
            },
        );
        assert_eq!(route, ChatRoute::Public);
    }

    #[test]
    fn chat_prompt_creates_team() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");

        fx.run(owner, "create").unwrap();
        assert!(fx.service.chat_modes().is_creating(owner));
        let route = fx.service.handle_chat(
            &mut fx.host,
            ChatEvent {
                sender: owner,
                message: "cancel".to_string(),
            },
        );
        assert_eq!(route, ChatRoute::Consumed);
        assert!(fx.service.registry().is_empty());

        fx.run(owner, "create").unwrap();
        fx.service.handle_chat(
            &mut fx.host,
            ChatEvent {
                sender: owner,
                message: "Gamma".to_string(),
            },
        );
        assert!(fx.team("gamma").is_owner(owner));
        assert!(!fx.service.chat_modes().is_creating(owner));
    }

    #[test]
    fn pvp_and_combat_hooks() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        let enemy = fx.host.connect("Enemy");
        fx.alpha(owner, &[member]);
        fx.run(enemy, "create Beta").unwrap();

        assert!(!fx.service.allows_damage(owner, member));
        fx.run(owner, "pvp").unwrap();
        assert!(fx.service.allows_damage(owner, member));
        fx.run(owner, "pvp off").unwrap();
        assert!(!fx.service.allows_damage(member, owner));

        fx.service.record_kill(owner, enemy);
        let reloaded = fx.reloaded();
        assert_eq!(reloaded.registry().get_team("Alpha").unwrap().total_kills(), 1);
        assert_eq!(reloaded.registry().get_team("Beta").unwrap().total_deaths(), 1);
    }

    #[test]
    fn stats_and_info_render() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);
        fx.host.take_messages();

        fx.run(owner, "stats").unwrap();
        let lines = fx.host.messages_for(owner);
        assert!(lines.contains(&"Members: 2/5".to_string()));
        assert!(lines.contains(&"Team Power: 20".to_string()));

        fx.run(member, "info alpha").unwrap();
        let lines = fx.host.messages_for(member);
        assert!(lines.contains(&"Owner: Owner".to_string()));
        assert!(lines.contains(&"- Member".to_string()));

        let loner = fx.host.connect("Loner");
        assert!(matches!(fx.run(loner, "stats"), Err(TeamError::Validation(_))));
    }

    #[test]
    fn save_failure_keeps_memory_state() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = TeamStore::new(blocker.join("teams.yml"), blocker.join("alliances.yml"));
        let mut service = TeamService::new(store, SystemClock);
        let mut host = MemoryHost::new(ServerVersion::default());
        let owner = host.connect("Owner");

        service
            .execute(
                &mut host,
                owner,
                TeamCommand::Create {
                    name: Some("Alpha".to_string()),
                },
            )
            .unwrap();
        assert!(service.registry().get_team("Alpha").is_some());
        assert!(matches!(service.save(), Err(TeamError::Persistence(_))));
    }

    #[test]
    fn disband_pending_follows_the_window() {
        let mut fx = fixture();
        let owner = fx.host.connect("Owner");
        let member = fx.host.connect("Member");
        fx.alpha(owner, &[member]);
        assert!(!fx.service.disband_pending(member));

        fx.run(owner, "disband").unwrap();
        assert!(fx.service.disband_pending(owner));
        assert!(fx.service.disband_pending(member));

        fx.clock.advance(Duration::seconds(31));
        assert!(!fx.service.disband_pending(owner));
    }

    #[test]
    fn from_config_uses_validated_window() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            disband_confirm_secs: 45,
            ..AppConfig::default()
        };
        let service = TeamService::from_config(&config).unwrap();
        assert_eq!(service.disbands.window(), Duration::seconds(45));

        let broken = AppConfig {
            disband_confirm_secs: u64::MAX,
            ..config
        };
        assert!(TeamService::from_config(&broken).is_err());
    }
}
