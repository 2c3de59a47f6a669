//! Flat-file persistence for teams and alliances.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    alliance::AllianceTable,
    config::AppConfig,
    models::{HomeLocation, ParticipantId, TeamColor},
    team::Team,
};

/// Document encoding, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.yml` / `.yaml`, and anything unrecognised.
    Yaml,
    /// `.json`.
    Json,
}

impl DocumentFormat {
    /// Detect the format of `path`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        Ok(match self {
            DocumentFormat::Yaml => serde_yaml::from_str(content)?,
            DocumentFormat::Json => serde_json::from_str(content)?,
        })
    }

    fn render<T: Serialize>(self, value: &T) -> Result<String> {
        Ok(match self {
            DocumentFormat::Yaml => serde_yaml::to_string(value)?,
            DocumentFormat::Json => serde_json::to_string_pretty(value)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTeamsDocument {
    #[serde(default)]
    teams: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize)]
struct TeamsDocument<'a> {
    teams: BTreeMap<&'a str, TeamSection>,
}

/// Stored home point. Missing coordinates read as 0; no world means no home.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HomeSection {
    #[serde(default)]
    world: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    z: Option<f64>,
    #[serde(default)]
    yaw: Option<f32>,
    #[serde(default)]
    pitch: Option<f32>,
}

impl HomeSection {
    fn from_location(home: &HomeLocation) -> Self {
        Self {
            world: Some(home.world.clone()),
            x: Some(home.x),
            y: Some(home.y),
            z: Some(home.z),
            yaw: Some(home.yaw),
            pitch: Some(home.pitch),
        }
    }

    fn into_location(self) -> Option<HomeLocation> {
        let world = self.world?;
        let mut home = HomeLocation::new(
            world,
            self.x.unwrap_or_default(),
            self.y.unwrap_or_default(),
            self.z.unwrap_or_default(),
        );
        home.yaw = self.yaw.unwrap_or_default();
        home.pitch = self.pitch.unwrap_or_default();
        Some(home)
    }
}

/// One team as laid out on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TeamSection {
    owner: String,
    #[serde(default, alias = "pvp")]
    pvp_enabled: bool,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    recruits: Vec<String>,
    #[serde(default)]
    invites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    home: Option<HomeSection>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    level: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    creation_time: Option<i64>,
    #[serde(default)]
    total_kills: u64,
    #[serde(default)]
    total_deaths: u64,
}

impl TeamSection {
    fn from_team(team: &Team) -> Self {
        let ids = |set: &std::collections::BTreeSet<ParticipantId>| {
            set.iter().map(ParticipantId::to_string).collect::<Vec<_>>()
        };
        Self {
            owner: team.owner().to_string(),
            pvp_enabled: team.pvp_enabled(),
            members: ids(team.members()),
            recruits: ids(team.recruits()),
            invites: ids(team.invites()),
            home: team.home().map(HomeSection::from_location),
            color: Some(team.color().tag()),
            level: Some(team.level() as i64),
            description: Some(team.description().to_string()),
            creation_time: Some(team.creation_time().timestamp_millis()),
            total_kills: team.total_kills(),
            total_deaths: team.total_deaths(),
        }
    }

    fn into_team(self, name: &str) -> Result<Team> {
        let owner = parse_id(&self.owner).context("invalid owner")?;
        let created = self
            .creation_time
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        let mut team = Team::with_creation_time(name, owner, created);
        team.set_pvp_enabled(self.pvp_enabled);

        for raw in &self.members {
            team.restore_member(parse_id(raw).context("invalid member")?);
        }
        // Recruits pass through the member rank first.
        for raw in &self.recruits {
            let id = parse_id(raw).context("invalid recruit")?;
            team.restore_member(id);
            team.promote_to_recruit(id);
        }
        for raw in &self.invites {
            let id = parse_id(raw).context("invalid invite")?;
            if !team.is_in_team(id) {
                team.invite_player(id);
            }
        }

        let home = self.home.and_then(|home| {
            let location = home.into_location();
            if location.is_none() {
                warn!(team = name, "Team home has no world, dropping it");
            }
            location
        });
        team.set_home(home);
        if let Some(tag) = self.color.as_deref() {
            match TeamColor::from_name(tag) {
                Some(color) => team.set_color(color),
                None => warn!(team = name, color = tag, "Unknown team color, using white"),
            }
        }
        if let Some(level) = self.level {
            team.set_level(level);
        }
        if let Some(description) = self.description {
            team.set_description(description);
        }
        team.set_stats(self.total_kills, self.total_deaths);
        Ok(team)
    }
}

fn parse_id(raw: &str) -> Result<ParticipantId> {
    raw.parse::<ParticipantId>()
        .with_context(|| format!("'{raw}' is not a participant id"))
}

/// Reads and writes the teams and alliances documents.
#[derive(Debug, Clone)]
pub struct TeamStore {
    teams_path: PathBuf,
    alliances_path: PathBuf,
}

impl TeamStore {
    /// Create a store over explicit file paths.
    pub fn new(teams_path: impl Into<PathBuf>, alliances_path: impl Into<PathBuf>) -> Self {
        Self {
            teams_path: teams_path.into(),
            alliances_path: alliances_path.into(),
        }
    }

    /// Store rooted at the configured data directory.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.teams_path(), config.alliances_path())
    }

    /// Location of the teams document.
    pub fn teams_path(&self) -> &Path {
        &self.teams_path
    }

    /// Location of the alliances document.
    pub fn alliances_path(&self) -> &Path {
        &self.alliances_path
    }

    /// Read every well-formed team. Malformed teams are logged and skipped.
    pub fn load_teams(&self) -> Result<Vec<Team>> {
        let Some(content) = read_optional(&self.teams_path)? else {
            return Ok(Vec::new());
        };
        let format = DocumentFormat::from_path(&self.teams_path);
        let document: RawTeamsDocument = if content.trim().is_empty() {
            RawTeamsDocument::default()
        } else {
            format
                .parse(&content)
                .with_context(|| format!("failed to parse {}", self.teams_path.display()))?
        };

        let mut teams = Vec::new();
        for (name, raw) in document.teams.unwrap_or_default() {
            let loaded = serde_json::from_value::<TeamSection>(raw)
                .map_err(anyhow::Error::from)
                .and_then(|section| section.into_team(&name));
            match loaded {
                Ok(team) => teams.push(team),
                Err(err) => warn!("Error loading team {name}: {err:#}"),
            }
        }
        debug!(count = teams.len(), "Parsed team sections");
        Ok(teams)
    }

    /// Rewrite the teams document with exactly `teams`.
    pub fn save_teams<'a>(&self, teams: impl IntoIterator<Item = &'a Team>) -> Result<()> {
        let document = TeamsDocument {
            teams: teams
                .into_iter()
                .map(|team| (team.name(), TeamSection::from_team(team)))
                .collect(),
        };
        let format = DocumentFormat::from_path(&self.teams_path);
        let rendered = format
            .render(&document)
            .context("failed to serialize teams")?;
        write_atomic(&self.teams_path, &rendered)
    }

    /// Read the alliance table, empty when the file does not exist yet.
    pub fn load_alliances(&self) -> Result<AllianceTable> {
        let Some(content) = read_optional(&self.alliances_path)? else {
            return Ok(AllianceTable::default());
        };
        if content.trim().is_empty() {
            return Ok(AllianceTable::default());
        }
        DocumentFormat::from_path(&self.alliances_path)
            .parse(&content)
            .with_context(|| format!("failed to parse {}", self.alliances_path.display()))
    }

    /// Rewrite the alliance table.
    pub fn save_alliances(&self, table: &AllianceTable) -> Result<()> {
        let rendered = DocumentFormat::from_path(&self.alliances_path)
            .render(table)
            .context("failed to serialize alliances")?;
        write_atomic(&self.alliances_path, &rendered)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Some(content))
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut file = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write temporary file for {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("failed to persist {}", path.display()))?;
    Ok(())
}
