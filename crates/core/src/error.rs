//! Error taxonomy shared by every team operation.

use thiserror::Error;

/// Recoverable failure reported back to the participant that issued a command.
#[derive(Debug, Error)]
pub enum TeamError {
    /// A team with the same case-insensitive name already exists.
    #[error("a team named '{0}' already exists")]
    DuplicateName(String),
    /// Unknown team, player or world.
    #[error("{0} not found")]
    NotFound(String),
    /// The participant's rank or permissions do not allow the action.
    #[error("not allowed: {0}")]
    NotAuthorized(String),
    /// The participant is not a member of any team.
    #[error("you're not in a team")]
    NotInTeam,
    /// The participant already belongs to a team.
    #[error("{0} is already in a team")]
    AlreadyInTeam(String),
    /// Promote/demote target does not hold the expected rank.
    #[error("{0}")]
    InvalidRank(String),
    /// Input rejected before touching any state.
    #[error("{0}")]
    Validation(String),
    /// The team has reached its member cap.
    #[error("team '{team}' is full ({max} members)")]
    TeamFull {
        /// Team display name.
        team: String,
        /// Cap derived from the team level.
        max: usize,
    },
    /// The target already holds an invite from this team.
    #[error("{0} already has an invite to your team")]
    AlreadyInvited(String),
    /// Join attempted without an invite.
    #[error("you don't have an invite to team '{0}'")]
    NoInvite(String),
    /// Confirm issued without a disband request.
    #[error("you don't have any pending confirmation")]
    NoPendingConfirmation,
    /// Confirm issued after the confirmation window closed.
    #[error("your disband request has expired, please try again")]
    ConfirmationExpired,
    /// Malformed command arguments.
    #[error("usage: {0}")]
    Usage(String),
    /// Reading or writing the backing files failed.
    #[error("storage failure: {0:#}")]
    Persistence(anyhow::Error),
}

impl From<anyhow::Error> for TeamError {
    fn from(err: anyhow::Error) -> Self {
        TeamError::Persistence(err)
    }
}

/// Convenience alias used across the crate.
pub type TeamResult<T> = std::result::Result<T, TeamError>;
