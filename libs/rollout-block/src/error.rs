use thiserror::Error;

/// Reasons an application or release is refused. The `Display` output is what users see in the
/// admission denial.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("malformed rollout block override {entry:?}: {reason}")]
    MalformedOverride { entry: String, reason: &'static str },

    #[error(
        "rollout block override(s) reference nonexistent rollout block(s): {}",
        .0.join(", ")
    )]
    NonExistentOverrides(Vec<String>),

    #[error("rollout is blocked by active rollout block(s): {}", .0.join(", "))]
    Blocked(Vec<String>),

    #[error("the Release environment must not be changed; consider editing the Application object")]
    EnvironmentChanged,

    #[error("update request has no old object")]
    MissingOldObject,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::MalformedOverride { .. } => "malformed_override",
            Error::NonExistentOverrides(_) => "nonexistent_override",
            Error::Blocked(_) => "blocked",
            Error::EnvironmentChanged => "environment_changed",
            Error::MissingOldObject => "missing_old_object",
        }
    }
}
