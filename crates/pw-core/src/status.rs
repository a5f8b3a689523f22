use crate::policy::{IpVersion, Protocol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result handed back to the caller after one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub changed: bool,
    pub output: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChainStatus>,
}

/// Read-only snapshot of the managed chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub chain: String,
    pub jump_rule_chain: String,
    pub ip_version: IpVersion,
    pub chain_exists: bool,
    /// `None` when no jump rule is managed for this chain
    pub jump_rule_exists: Option<bool>,
    pub rule: Option<RuleStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStatus {
    pub protocol: Protocol,
    pub port: u16,
    pub exists: bool,
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "changed: {}", self.changed)?;
        for line in &self.output {
            writeln!(f, "  • {}", line)?;
        }
        if let Some(status) = &self.status {
            write!(f, "{}", status)?;
        }
        Ok(())
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chain {} ({})", self.chain, self.ip_version)?;
        writeln!(f, "  exists: {}", yes_no(self.chain_exists))?;
        match self.jump_rule_exists {
            Some(exists) => writeln!(
                f,
                "  jump from {}: {}",
                self.jump_rule_chain,
                yes_no(exists)
            )?,
            None => writeln!(f, "  jump rule: not managed")?,
        }
        if let Some(rule) = &self.rule {
            writeln!(
                f,
                "  rule {} {}: {}",
                rule.protocol,
                rule.port,
                yes_no(rule.exists)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_without_status() {
        let outcome = Outcome {
            changed: true,
            output: vec!["Create chain OS_FIREWALL_ALLOW".into()],
            status: None,
        };
        let yaml = serde_yaml::to_string(&outcome).unwrap();
        assert!(yaml.contains("changed: true"));
        assert!(!yaml.contains("status"));
    }

    #[test]
    fn chain_status_renders_rule_line() {
        let status = ChainStatus {
            chain: "OS_FIREWALL_ALLOW".into(),
            jump_rule_chain: "INPUT".into(),
            ip_version: IpVersion::Ipv4,
            chain_exists: true,
            jump_rule_exists: Some(false),
            rule: Some(RuleStatus {
                protocol: Protocol::Tcp,
                port: 443,
                exists: true,
            }),
        };
        let text = status.to_string();
        assert!(text.contains("jump from INPUT: no"));
        assert!(text.contains("rule tcp 443: yes"));
    }
}
