use crate::policy::{ActionKind, IpVersion, Protocol};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CHAIN: &str = "OS_FIREWALL_ALLOW";
pub const DEFAULT_JUMP_RULE_CHAIN: &str = "INPUT";

/// Parameters as supplied by a caller, prior to validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawParams {
    pub action: ActionKind,
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default = "default_true")]
    pub create_jump_rule: bool,
    #[serde(default = "default_jump_rule_chain")]
    pub jump_rule_chain: String,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub ip_version: IpVersion,
    #[serde(default)]
    pub check_mode: bool,
}

/// A (protocol, port) pair identifying one allow rule inside the managed chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRule {
    pub protocol: Protocol,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Add(PortRule),
    Remove(PortRule),
    VerifyChain,
    Status(Option<PortRule>),
}

/// Validated request handed to the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,
    pub chain: String,
    pub create_jump_rule: bool,
    pub jump_rule_chain: String,
    pub ip_version: IpVersion,
    pub check_mode: bool,
}

fn default_chain() -> String {
    DEFAULT_CHAIN.to_string()
}

fn default_jump_rule_chain() -> String {
    DEFAULT_JUMP_RULE_CHAIN.to_string()
}

fn default_true() -> bool {
    true
}

impl RawParams {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            chain: default_chain(),
            create_jump_rule: true,
            jump_rule_chain: default_jump_rule_chain(),
            protocol: None,
            port: None,
            ip_version: IpVersion::default(),
            check_mode: false,
        }
    }

    pub fn with_rule(mut self, protocol: Protocol, port: i64) -> Self {
        self.protocol = Some(protocol);
        self.port = Some(port);
        self
    }
}

impl PortRule {
    pub fn new(protocol: Protocol, port: u16) -> Self {
        Self { protocol, port }
    }
}

impl fmt::Display for PortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.port)
    }
}
