#![allow(missing_docs)]

//! Shared domain models.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TeamError;

/// Stable identifier of a player as handed out by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Derive an id from a player name, stable across restarts.
    pub fn from_name(name: &str) -> Self {
        let key = format!("OfflinePlayer:{}", name.to_lowercase());
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Rank held by a participant inside their team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    /// Base rank.
    Member,
    /// Elevated rank; may invite and kick members.
    Recruiter,
    /// Exactly one per team.
    Owner,
}

impl Rank {
    /// Returns a user-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Rank::Member => "Member",
            Rank::Recruiter => "Recruiter",
            Rank::Owner => "Owner",
        }
    }
}

/// Cosmetic team color drawn from the fixed chat palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeamColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    #[default]
    White,
}

impl TeamColor {
    /// Every palette entry in display order.
    pub const ALL: [TeamColor; 16] = [
        TeamColor::Black,
        TeamColor::DarkBlue,
        TeamColor::DarkGreen,
        TeamColor::DarkAqua,
        TeamColor::DarkRed,
        TeamColor::DarkPurple,
        TeamColor::Gold,
        TeamColor::Gray,
        TeamColor::DarkGray,
        TeamColor::Blue,
        TeamColor::Green,
        TeamColor::Aqua,
        TeamColor::Red,
        TeamColor::LightPurple,
        TeamColor::Yellow,
        TeamColor::White,
    ];

    /// Lower-case name used in commands (`dark_aqua`).
    pub fn name(self) -> &'static str {
        match self {
            TeamColor::Black => "black",
            TeamColor::DarkBlue => "dark_blue",
            TeamColor::DarkGreen => "dark_green",
            TeamColor::DarkAqua => "dark_aqua",
            TeamColor::DarkRed => "dark_red",
            TeamColor::DarkPurple => "dark_purple",
            TeamColor::Gold => "gold",
            TeamColor::Gray => "gray",
            TeamColor::DarkGray => "dark_gray",
            TeamColor::Blue => "blue",
            TeamColor::Green => "green",
            TeamColor::Aqua => "aqua",
            TeamColor::Red => "red",
            TeamColor::LightPurple => "light_purple",
            TeamColor::Yellow => "yellow",
            TeamColor::White => "white",
        }
    }

    /// Upper-case tag written to storage (`DARK_AQUA`).
    pub fn tag(self) -> String {
        self.name().to_uppercase()
    }

    /// Parse either the command name or the stored tag, ignoring case.
    pub fn from_name(input: &str) -> Option<Self> {
        let needle = input.trim().to_lowercase();
        Self::ALL.into_iter().find(|color| color.name() == needle)
    }

    /// Single-character legacy formatting code.
    pub fn legacy_code(self) -> char {
        let index = Self::ALL
            .iter()
            .position(|color| *color == self)
            .unwrap_or(15);
        std::char::from_digit(index as u32, 16).unwrap_or('f')
    }

    /// 24-bit RGB value of the palette entry.
    pub fn rgb(self) -> u32 {
        match self {
            TeamColor::Black => 0x000000,
            TeamColor::DarkBlue => 0x0000AA,
            TeamColor::DarkGreen => 0x00AA00,
            TeamColor::DarkAqua => 0x00AAAA,
            TeamColor::DarkRed => 0xAA0000,
            TeamColor::DarkPurple => 0xAA00AA,
            TeamColor::Gold => 0xFFAA00,
            TeamColor::Gray => 0xAAAAAA,
            TeamColor::DarkGray => 0x555555,
            TeamColor::Blue => 0x5555FF,
            TeamColor::Green => 0x55FF55,
            TeamColor::Aqua => 0x55FFFF,
            TeamColor::Red => 0xFF5555,
            TeamColor::LightPurple => 0xFF55FF,
            TeamColor::Yellow => 0xFFFF55,
            TeamColor::White => 0xFFFFFF,
        }
    }

    /// Comma separated list of every color name, for usage messages.
    pub fn options() -> String {
        Self::ALL
            .iter()
            .map(|color| color.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_angle() -> f32 {
    0.0
}

/// Team home teleport point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    /// World or zone name known to the host.
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default = "default_angle")]
    pub yaw: f32,
    #[serde(default = "default_angle")]
    pub pitch: f32,
}

impl HomeLocation {
    /// Build a location facing the default direction.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Short coordinate summary, e.g. `world (10.0, 64.0, -3.5)`.
    pub fn describe(&self) -> String {
        format!("{} ({:.1}, {:.1}, {:.1})", self.world, self.x, self.y, self.z)
    }
}

/// Host server version, injected wherever behavior depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True when the server runs at least `major.minor`.
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }

    /// RGB chat colors arrived with 1.16.
    pub fn supports_hex_colors(&self) -> bool {
        self.is_at_least(1, 16)
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::new(1, 20, 4)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ServerVersion {
    type Err = TeamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TeamError::Validation(format!("invalid server version '{s}'"));
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(invalid)?;
        let minor = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(invalid)?;
        let patch = match parts.next() {
            Some(part) => part.parse().map_err(|_| invalid())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_ids_are_stable_per_name() {
        assert_eq!(ParticipantId::from_name("Steve"), ParticipantId::from_name("steve"));
        assert_ne!(ParticipantId::from_name("Steve"), ParticipantId::from_name("Alex"));

        let id = ParticipantId::from_name("Steve");
        let parsed: ParticipantId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ParticipantId>().is_err());
    }

    #[test]
    fn colors_parse_names_and_tags() {
        assert_eq!(TeamColor::from_name("dark_aqua"), Some(TeamColor::DarkAqua));
        assert_eq!(TeamColor::from_name("DARK_AQUA"), Some(TeamColor::DarkAqua));
        assert_eq!(TeamColor::from_name("magenta"), None);
        assert_eq!(TeamColor::DarkAqua.tag(), "DARK_AQUA");
        assert_eq!(TeamColor::default(), TeamColor::White);
        assert_eq!(TeamColor::Red.legacy_code(), 'c');
        assert_eq!(TeamColor::Black.legacy_code(), '0');
    }

    #[test]
    fn server_version_comparisons() {
        let version: ServerVersion = "1.16.5".parse().unwrap();
        assert!(version.supports_hex_colors());
        assert!(version.is_at_least(1, 13));
        assert!(!version.is_at_least(1, 19));

        let legacy: ServerVersion = "1.12".parse().unwrap();
        assert_eq!(legacy, ServerVersion::new(1, 12, 0));
        assert!(!legacy.supports_hex_colors());

        assert!("1.x".parse::<ServerVersion>().is_err());
        assert!("1.2.3.4".parse::<ServerVersion>().is_err());
    }
}
