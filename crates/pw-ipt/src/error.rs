use std::fmt;

/// A filter or save command that did not complete successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub command: Vec<String>,
    /// `None` when the process could not be started or was killed by a signal
    pub exit_code: Option<i32>,
    pub output: String,
}

impl CommandFailure {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "`{}` exited with status {}", self.command_line(), code)?,
            None => write!(f, "`{}` did not run to completion", self.command_line())?,
        }
        let output = self.output.trim();
        if !output.is_empty() {
            write!(f, ": {}", output)?;
        }
        Ok(())
    }
}

/// Which half of jump-rule creation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpRuleStage {
    /// Listing the entry chain to work out where the jump belongs
    Listing,
    /// Inserting or appending the jump rule itself
    Insert,
}

impl fmt::Display for JumpRuleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpRuleStage::Listing => f.write_str("listing"),
            JumpRuleStage::Insert => f.write_str("insert"),
        }
    }
}

/// Terminal failure of one reconciliation.
///
/// Steps that succeeded before the failure are not undone: a chain created
/// ahead of a failed rule add stays in place.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    #[error("{message}")]
    Execution {
        message: String,
        failure: CommandFailure,
    },

    #[error("{message}")]
    ChainCreation {
        chain: String,
        message: String,
        failure: CommandFailure,
    },

    #[error("{message}")]
    JumpRuleCreation {
        chain: String,
        stage: JumpRuleStage,
        message: String,
        failure: CommandFailure,
    },

    #[error("{message}")]
    Persist {
        message: String,
        failure: CommandFailure,
    },

    #[error("invalid tool configuration: {0}")]
    Config(String),
}

impl FirewallError {
    pub fn failure(&self) -> Option<&CommandFailure> {
        match self {
            FirewallError::Execution { failure, .. }
            | FirewallError::ChainCreation { failure, .. }
            | FirewallError::JumpRuleCreation { failure, .. }
            | FirewallError::Persist { failure, .. } => Some(failure),
            FirewallError::Config(_) => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.failure().and_then(|f| f.exit_code)
    }

    pub fn chain(&self) -> Option<&str> {
        match self {
            FirewallError::ChainCreation { chain, .. }
            | FirewallError::JumpRuleCreation { chain, .. } => Some(chain.as_str()),
            _ => None,
        }
    }

    /// Short tag naming the error kind, stable for callers that match on it
    pub fn kind(&self) -> &'static str {
        match self {
            FirewallError::Execution { .. } => "execution",
            FirewallError::ChainCreation { .. } => "chain_creation",
            FirewallError::JumpRuleCreation { .. } => "jump_rule_creation",
            FirewallError::Persist { .. } => "persist",
            FirewallError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, FirewallError>;
