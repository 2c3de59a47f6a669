#![warn(clippy::all, missing_docs)]

//! Core domain logic for the teams add-on.
//!
//! This crate hosts the team model, the registry and its flat-file
//! persistence, alliances, disband confirmation, chat routing and the
//! command handlers used by the console front end and any embedding host.

pub mod alliance;
pub mod chat;
pub mod clock;
pub mod combat;
pub mod command;
pub mod config;
pub mod disband;
pub mod error;
pub mod host;
pub mod models;
pub mod registry;
pub mod service;
pub mod storage;
pub mod team;
pub mod text;

pub use config::AppConfig;
pub use error::{TeamError, TeamResult};
pub use host::Host;
pub use models::{HomeLocation, ParticipantId, Rank, ServerVersion, TeamColor};
pub use registry::TeamRegistry;
pub use service::{ChatRoute, TeamService};
pub use storage::TeamStore;
pub use team::Team;
