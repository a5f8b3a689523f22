//! iptables/ip6tables chain reconciliation engine

pub mod checker;
pub mod error;
pub mod listing;
pub mod manager;
pub mod rule;
pub mod runner;

#[cfg(test)]
mod testing;

pub use checker::*;
pub use error::*;
pub use listing::*;
pub use manager::*;
pub use rule::*;
pub use runner::*;

use pw_core::{Outcome, Request, ToolConfig};

/// A failed reconciliation together with whatever it had already applied.
///
/// Nothing is rolled back, so `changed` and `output` describe mutations that
/// are live on the host despite the error.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ReconcileFailure {
    #[source]
    pub error: FirewallError,
    pub changed: bool,
    pub output: Vec<String>,
}

/// Run one validated request against the host's filter table
pub fn reconcile<R: CommandRunner>(
    request: &Request,
    config: &ToolConfig,
    runner: R,
) -> std::result::Result<Outcome, ReconcileFailure> {
    let mut manager =
        IpTablesManager::new(request, config, runner).map_err(|error| ReconcileFailure {
            error,
            changed: false,
            output: Vec::new(),
        })?;

    match manager.apply(request.action) {
        Ok(status) => {
            let mut outcome = manager.into_outcome();
            outcome.status = status;
            Ok(outcome)
        }
        Err(error) => {
            tracing::error!(kind = error.kind(), %error, "reconciliation failed");
            let Outcome {
                changed, output, ..
            } = manager.into_outcome();
            Err(ReconcileFailure {
                error,
                changed,
                output,
            })
        }
    }
}
