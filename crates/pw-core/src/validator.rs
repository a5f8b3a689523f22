use regex::Regex;
use std::sync::LazyLock;

use crate::policy::ActionKind;
use crate::request::{Action, PortRule, RawParams, Request};

/// iptables refuses chain names longer than this
pub const MAX_CHAIN_NAME_LEN: usize = 28;

static CHAIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.][A-Za-z0-9_.\-]*$").expect("chain name pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("protocol is required when action is {0}")]
    MissingProtocol(ActionKind),
    #[error("port is required when action is {0}")]
    MissingPort(ActionKind),
    #[error("port {0} is out of range (1-65535)")]
    PortOutOfRange(i64),
    #[error("invalid chain name '{name}': {reason}")]
    InvalidChainName { name: String, reason: String },
    #[error("chain {0} cannot jump to itself")]
    SelfJump(String),
}

/// Turns caller-supplied parameters into a [`Request`] the engine can trust
pub struct ParamsValidator<'a> {
    params: &'a RawParams,
}

impl<'a> ParamsValidator<'a> {
    pub fn new(params: &'a RawParams) -> Self {
        Self { params }
    }

    pub fn validate(&self) -> Result<Request, ValidationError> {
        let params = self.params;

        Self::validate_chain_name(&params.chain)?;
        if params.create_jump_rule {
            Self::validate_chain_name(&params.jump_rule_chain)?;
            if params.chain == params.jump_rule_chain {
                return Err(ValidationError::SelfJump(params.chain.clone()));
            }
        }

        let action = match params.action {
            ActionKind::Add => Action::Add(self.required_rule()?),
            ActionKind::Remove => Action::Remove(self.required_rule()?),
            ActionKind::VerifyChain => Action::VerifyChain,
            ActionKind::Status => Action::Status(self.optional_rule()?),
        };

        Ok(Request {
            action,
            chain: params.chain.clone(),
            create_jump_rule: params.create_jump_rule,
            jump_rule_chain: params.jump_rule_chain.clone(),
            ip_version: params.ip_version,
            check_mode: params.check_mode,
        })
    }

    fn required_rule(&self) -> Result<PortRule, ValidationError> {
        let kind = self.params.action;
        let protocol = self
            .params
            .protocol
            .ok_or(ValidationError::MissingProtocol(kind))?;
        let port = self.params.port.ok_or(ValidationError::MissingPort(kind))?;

        Ok(PortRule::new(protocol, Self::validate_port(port)?))
    }

    fn optional_rule(&self) -> Result<Option<PortRule>, ValidationError> {
        if self.params.protocol.is_none() && self.params.port.is_none() {
            return Ok(None);
        }
        self.required_rule().map(Some)
    }

    fn validate_port(port: i64) -> Result<u16, ValidationError> {
        match u16::try_from(port) {
            Ok(0) | Err(_) => Err(ValidationError::PortOutOfRange(port)),
            Ok(port) => Ok(port),
        }
    }

    fn validate_chain_name(name: &str) -> Result<(), ValidationError> {
        let reason = if name.is_empty() {
            "name is empty"
        } else if name.len() > MAX_CHAIN_NAME_LEN {
            "name is longer than 28 characters"
        } else if name.starts_with('-') {
            "name must not start with '-'"
        } else if !CHAIN_NAME.is_match(name) {
            "only letters, digits, '_', '.' and '-' are allowed"
        } else {
            return Ok(());
        };

        Err(ValidationError::InvalidChainName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// Shorthand for `ParamsValidator::new(params).validate()`
pub fn validate(params: &RawParams) -> Result<Request, ValidationError> {
    ParamsValidator::new(params).validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Protocol;

    #[test]
    fn add_requires_protocol_and_port() {
        let mut params = RawParams::new(ActionKind::Add);
        params.port = Some(8080);
        let err = validate(&params).unwrap_err();
        assert_eq!(err.to_string(), "protocol is required when action is add");

        let mut params = RawParams::new(ActionKind::Remove);
        params.protocol = Some(Protocol::Udp);
        let err = validate(&params).unwrap_err();
        assert_eq!(err.to_string(), "port is required when action is remove");
    }

    #[test]
    fn verify_chain_ignores_rule_fields() {
        let request = validate(&RawParams::new(ActionKind::VerifyChain)).unwrap();
        assert_eq!(request.action, Action::VerifyChain);
        assert_eq!(request.chain, "OS_FIREWALL_ALLOW");
        assert_eq!(request.jump_rule_chain, "INPUT");
        assert!(request.create_jump_rule);
    }

    #[test]
    fn test_port_range() {
        assert!(ParamsValidator::validate_port(1).is_ok());
        assert!(ParamsValidator::validate_port(65535).is_ok());

        assert!(ParamsValidator::validate_port(0).is_err());
        assert!(ParamsValidator::validate_port(-22).is_err());
        assert!(ParamsValidator::validate_port(65536).is_err());
    }

    #[test]
    fn test_chain_names() {
        assert!(ParamsValidator::validate_chain_name("OS_FIREWALL_ALLOW").is_ok());
        assert!(ParamsValidator::validate_chain_name("docker-user.v2").is_ok());

        assert!(ParamsValidator::validate_chain_name("").is_err());
        assert!(ParamsValidator::validate_chain_name("-A").is_err());
        assert!(ParamsValidator::validate_chain_name("two words").is_err());
        assert!(ParamsValidator::validate_chain_name(&"X".repeat(29)).is_err());
    }

    #[test]
    fn chain_cannot_jump_to_itself() {
        let mut params = RawParams::new(ActionKind::VerifyChain);
        params.chain = "INPUT".into();
        assert_eq!(
            validate(&params).unwrap_err(),
            ValidationError::SelfJump("INPUT".into())
        );

        params.create_jump_rule = false;
        assert!(validate(&params).is_ok());
    }

    #[test]
    fn status_rule_is_optional_but_complete() {
        let request = validate(&RawParams::new(ActionKind::Status)).unwrap();
        assert_eq!(request.action, Action::Status(None));

        let request =
            validate(&RawParams::new(ActionKind::Status).with_rule(Protocol::Tcp, 22)).unwrap();
        assert_eq!(
            request.action,
            Action::Status(Some(PortRule::new(Protocol::Tcp, 22)))
        );

        let mut params = RawParams::new(ActionKind::Status);
        params.port = Some(22);
        assert_eq!(
            validate(&params).unwrap_err(),
            ValidationError::MissingProtocol(ActionKind::Status)
        );
    }
}
