use pw_core::{PortRule, Protocol};

/// Allow rule for new connections to one (protocol, port) inside a chain.
///
/// The same argument list is used for `-C`, `-A` and `-D` so that an
/// existence check matches exactly what an add would create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowRule {
    pub chain: String,
    pub protocol: Protocol,
    pub port: u16,
}

/// Rule in an entry chain that sends traffic into the managed chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpRule {
    pub from_chain: String,
    pub to_chain: String,
}

impl AllowRule {
    pub fn new(chain: &str, rule: PortRule) -> Self {
        Self {
            chain: chain.to_string(),
            protocol: rule.protocol,
            port: rule.port,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let proto = self.protocol.as_str();
        let port = self.port.to_string();
        [
            self.chain.as_str(),
            "-p",
            proto,
            "-m",
            "state",
            "--state",
            "NEW",
            "-m",
            proto,
            "--dport",
            port.as_str(),
            "-j",
            "ACCEPT",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl JumpRule {
    pub fn new(from_chain: &str, to_chain: &str) -> Self {
        Self {
            from_chain: from_chain.to_string(),
            to_chain: to_chain.to_string(),
        }
    }

    /// `<from> -j <to>`, the form used by `-C`
    pub fn args(&self) -> Vec<String> {
        vec![
            self.from_chain.clone(),
            "-j".to_string(),
            self.to_chain.clone(),
        ]
    }
}

/// Prefix a rule's argument list with an operation flag such as `-C`
pub fn with_op(op: &str, rule_args: Vec<String>) -> Vec<String> {
    let mut args = Vec::with_capacity(rule_args.len() + 1);
    args.push(op.to_string());
    args.extend(rule_args);
    args
}
