use crate::rule::{AllowRule, JumpRule, with_op};
use crate::runner::{CommandRunner, FilterTool};

/// Read-only existence queries against the live filter table.
///
/// Every predicate maps exit status zero to true and anything else, including
/// a tool that could not be started, to false.
pub struct ChainStateChecker<'a, R> {
    tool: &'a FilterTool<R>,
}

impl<'a, R: CommandRunner> ChainStateChecker<'a, R> {
    pub fn new(tool: &'a FilterTool<R>) -> Self {
        Self { tool }
    }

    pub fn chain_exists(&self, chain: &str) -> bool {
        self.tool.check(&["-L".to_string(), chain.to_string()])
    }

    pub fn jump_rule_exists(&self, from_chain: &str, chain: &str) -> bool {
        self.tool
            .check(&with_op("-C", JumpRule::new(from_chain, chain).args()))
    }

    pub fn rule_exists(&self, rule: &AllowRule) -> bool {
        self.tool.check(&with_op("-C", rule.args()))
    }
}
