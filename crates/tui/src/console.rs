use anyhow::{anyhow, bail, Result};
use teams_core::HomeLocation;

/// Console verbs start with this character; everything else is typed by the
/// active player.
pub const VERB_MARK: char = ':';

pub const VERB_HELP: &[(&str, &str)] = &[
    (":login <name>", "Connect a player and act as them"),
    (":logout [name]", "Disconnect a player (default: active)"),
    (":as <name>", "Act as another online player"),
    (":op <name>", "Toggle operator permissions"),
    (":tp <world> <x> <y> <z>", "Move the active player"),
    (":hit <name>", "Active player attacks someone"),
    (":kill <name>", "Active player kills someone"),
    (":players", "List known players"),
    (":help", "Show this list"),
    (":quit", "Save and exit"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Login(String),
    Logout(Option<String>),
    As(String),
    Op(String),
    Tp(HomeLocation),
    Hit(String),
    Kill(String),
    Players,
    Help,
    Quit,
    /// Chat or a `/team` command from the active player.
    Say(String),
}

fn name_arg(verb: &str, arg: Option<&str>) -> Result<String> {
    arg.map(str::to_string)
        .ok_or_else(|| anyhow!("usage: :{verb} <name>"))
}

fn coordinate(raw: Option<&str>) -> Result<f64> {
    let raw = raw.ok_or_else(|| anyhow!("usage: :tp <world> <x> <y> <z>"))?;
    raw.parse::<f64>()
        .map_err(|_| anyhow!("'{raw}' is not a coordinate"))
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(verb_line) = line.strip_prefix(VERB_MARK) else {
            return Ok(Some(ConsoleInput::Say(line.to_string())));
        };

        let mut words = verb_line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let arg = words.next();
        let input = match verb.as_str() {
            "login" => ConsoleInput::Login(name_arg("login", arg)?),
            "logout" => ConsoleInput::Logout(arg.map(str::to_string)),
            "as" => ConsoleInput::As(name_arg("as", arg)?),
            "op" => ConsoleInput::Op(name_arg("op", arg)?),
            "tp" => {
                let world = arg.ok_or_else(|| anyhow!("usage: :tp <world> <x> <y> <z>"))?;
                let x = coordinate(words.next())?;
                let y = coordinate(words.next())?;
                let z = coordinate(words.next())?;
                ConsoleInput::Tp(HomeLocation::new(world, x, y, z))
            }
            "hit" => ConsoleInput::Hit(name_arg("hit", arg)?),
            "kill" => ConsoleInput::Kill(name_arg("kill", arg)?),
            "players" => ConsoleInput::Players,
            "help" | "" => ConsoleInput::Help,
            "quit" | "exit" => ConsoleInput::Quit,
            other => bail!("unknown console verb ':{other}', try :help"),
        };
        Ok(Some(input))
    }
}
