//! Parsing of `/team` and `/tc` command lines.

use crate::{
    error::{TeamError, TeamResult},
    models::TeamColor,
};

/// Requested PvP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PvpSetting {
    On,
    Off,
    Toggle,
}

impl PvpSetting {
    /// State after applying the setting to `current`.
    pub fn apply(self, current: bool) -> bool {
        match self {
            PvpSetting::On => true,
            PvpSetting::Off => false,
            PvpSetting::Toggle => !current,
        }
    }
}

/// A parsed team command.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum TeamCommand {
    /// Without a name the next chat line is taken as the name.
    Create { name: Option<String> },
    Disband,
    Confirm,
    Cancel,
    Invite { target: String },
    Join { team: String },
    Leave,
    Kick { target: String },
    Promote { target: String },
    Demote { target: String },
    Pvp(PvpSetting),
    Info { team: Option<String> },
    List,
    SetHome,
    Home,
    Color(TeamColor),
    Ally { team: String },
    SetLevel(i64),
    Desc { text: String },
    Stats { team: Option<String> },
    TcToggle,
    Chat { message: String },
    Help,
}

const USAGE: &[(&str, &str)] = &[
    ("create [name]", "Create a new team"),
    ("disband", "Disband your team (Owner only)"),
    ("confirm", "Confirm a pending disband"),
    ("cancel", "Cancel a pending disband"),
    ("invite <player>", "Invite a player to your team"),
    ("join <name>", "Join a team you've been invited to"),
    ("leave", "Leave your current team"),
    ("kick <player>", "Kick a player from your team"),
    ("promote <player>", "Promote a member to recruiter"),
    ("demote <player>", "Demote a recruiter to member"),
    ("pvp [on|off]", "Toggle team PvP (Owner only)"),
    ("info [name]", "Show team information"),
    ("list", "List all teams"),
    ("sethome", "Set team home location"),
    ("home", "Teleport to team home"),
    ("tctoggle", "Toggle team chat mode"),
    ("color <color>", "Set team color"),
    ("ally <team>", "Request alliance with another team"),
    ("desc <text>", "Set team description"),
    ("stats [name]", "View team statistics"),
    ("setlevel <1-10>", "Set team level (Admin only)"),
    ("help", "Show this help message"),
];

/// `(syntax, description)` pairs for the help listing.
pub fn help_entries() -> impl Iterator<Item = (String, &'static str)> {
    USAGE
        .iter()
        .map(|(syntax, about)| (format!("/team {syntax}"), *about))
        .chain(std::iter::once((
            "/tc <message>".to_string(),
            "Send a message to your team",
        )))
}

fn usage(syntax: &str) -> TeamError {
    TeamError::Usage(format!("/team {syntax}"))
}

fn required(arg: Option<&str>, syntax: &str) -> TeamResult<String> {
    arg.map(str::to_string).ok_or_else(|| usage(syntax))
}

impl TeamCommand {
    /// Parse the arguments that follow `/team`. No arguments means `help`.
    pub fn parse(args: &str) -> TeamResult<Self> {
        let mut words = args.split_whitespace();
        let Some(sub) = words.next() else {
            return Ok(TeamCommand::Help);
        };
        let arg = words.next();

        let command = match sub.to_lowercase().as_str() {
            "create" => TeamCommand::Create {
                name: arg.map(str::to_string),
            },
            "disband" => TeamCommand::Disband,
            "confirm" => TeamCommand::Confirm,
            "cancel" => TeamCommand::Cancel,
            "invite" => TeamCommand::Invite {
                target: required(arg, "invite <player>")?,
            },
            "join" => TeamCommand::Join {
                team: required(arg, "join <name>")?,
            },
            "leave" => TeamCommand::Leave,
            "kick" => TeamCommand::Kick {
                target: required(arg, "kick <player>")?,
            },
            "promote" => TeamCommand::Promote {
                target: required(arg, "promote <player>")?,
            },
            "demote" => TeamCommand::Demote {
                target: required(arg, "demote <player>")?,
            },
            "pvp" => TeamCommand::Pvp(match arg.map(str::to_lowercase).as_deref() {
                None | Some("toggle") => PvpSetting::Toggle,
                Some("on") => PvpSetting::On,
                Some("off") => PvpSetting::Off,
                Some(_) => return Err(usage("pvp [on|off]")),
            }),
            "info" => TeamCommand::Info {
                team: arg.map(str::to_string),
            },
            "list" => TeamCommand::List,
            "sethome" => TeamCommand::SetHome,
            "home" => TeamCommand::Home,
            "color" => {
                let name = arg.ok_or_else(|| {
                    TeamError::Usage(format!(
                        "/team color <color> (available: {})",
                        TeamColor::options()
                    ))
                })?;
                let color = TeamColor::from_name(name).ok_or_else(|| {
                    TeamError::Validation(format!(
                        "invalid color, available colors: {}",
                        TeamColor::options()
                    ))
                })?;
                TeamCommand::Color(color)
            }
            "ally" => TeamCommand::Ally {
                team: required(arg, "ally <team>")?,
            },
            "setlevel" => {
                let raw = required(arg, "setlevel <1-10>")?;
                let level = raw.parse::<i64>().map_err(|_| {
                    TeamError::Validation("level must be a number between 1 and 10".to_string())
                })?;
                TeamCommand::SetLevel(level)
            }
            "desc" => {
                let text = rest_after(args, 1);
                if text.is_empty() {
                    return Err(usage("desc <description>"));
                }
                TeamCommand::Desc { text }
            }
            "stats" => TeamCommand::Stats {
                team: arg.map(str::to_string),
            },
            "tctoggle" => TeamCommand::TcToggle,
            "help" => TeamCommand::Help,
            other => {
                return Err(TeamError::Validation(format!(
                    "unknown subcommand '{other}', see /team help"
                )))
            }
        };
        Ok(command)
    }

    /// Parse a full chat line starting with `/team` or `/tc`.
    ///
    /// Returns `None` for plain chat.
    pub fn parse_line(line: &str) -> Option<TeamResult<Self>> {
        let line = line.trim();
        let (head, tail) = match line.split_once(char::is_whitespace) {
            Some((head, tail)) => (head, tail.trim()),
            None => (line, ""),
        };
        match head.to_lowercase().as_str() {
            "/team" | "/teams" => Some(Self::parse(tail)),
            "/tc" => Some(if tail.is_empty() {
                Err(TeamError::Usage("/tc <message>".to_string()))
            } else {
                Ok(TeamCommand::Chat {
                    message: tail.to_string(),
                })
            }),
            _ => None,
        }
    }

    /// Lower-case subcommand name.
    pub fn name(&self) -> &'static str {
        match self {
            TeamCommand::Create { .. } => "create",
            TeamCommand::Disband => "disband",
            TeamCommand::Confirm => "confirm",
            TeamCommand::Cancel => "cancel",
            TeamCommand::Invite { .. } => "invite",
            TeamCommand::Join { .. } => "join",
            TeamCommand::Leave => "leave",
            TeamCommand::Kick { .. } => "kick",
            TeamCommand::Promote { .. } => "promote",
            TeamCommand::Demote { .. } => "demote",
            TeamCommand::Pvp(_) => "pvp",
            TeamCommand::Info { .. } => "info",
            TeamCommand::List => "list",
            TeamCommand::SetHome => "sethome",
            TeamCommand::Home => "home",
            TeamCommand::Color(_) => "color",
            TeamCommand::Ally { .. } => "ally",
            TeamCommand::SetLevel(_) => "setlevel",
            TeamCommand::Desc { .. } => "desc",
            TeamCommand::Stats { .. } => "stats",
            TeamCommand::TcToggle => "tctoggle",
            TeamCommand::Chat { .. } => "chat",
            TeamCommand::Help => "help",
        }
    }

    /// Permission node checked before the command runs.
    pub fn permission(&self) -> String {
        match self {
            TeamCommand::SetLevel(_) => "teams.admin.setlevel".to_string(),
            // the confirmation steps ride on the disband grant
            TeamCommand::Confirm | TeamCommand::Cancel => "teams.disband".to_string(),
            TeamCommand::TcToggle => "teams.chat".to_string(),
            other => format!("teams.{}", other.name()),
        }
    }

    /// True when a successful run changes persisted state.
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            TeamCommand::Create { name: None }
                | TeamCommand::Disband
                | TeamCommand::Cancel
                | TeamCommand::Info { .. }
                | TeamCommand::List
                | TeamCommand::Home
                | TeamCommand::Stats { .. }
                | TeamCommand::TcToggle
                | TeamCommand::Chat { .. }
                | TeamCommand::Help
        )
    }
}

/// Everything after the first `skip` words, with inner spacing kept.
fn rest_after(args: &str, skip: usize) -> String {
    let mut rest = args.trim_start();
    for _ in 0..skip {
        rest = match rest.split_once(char::is_whitespace) {
            Some((_, tail)) => tail.trim_start(),
            None => "",
        };
    }
    rest.trim_end().to_string()
}
