use crate::checker::ChainStateChecker;
use crate::error::{FirewallError, JumpRuleStage, Result};
use crate::listing::{JumpPlacement, decide_placement, parse_numbered_listing};
use crate::rule::{AllowRule, with_op};
use crate::runner::{CommandRunner, FilterTool, run_mutating};
use pw_core::{Action, ChainStatus, IpVersion, Outcome, PortRule, Request, RuleStatus, ToolConfig};

/// Reconciles one managed chain towards the requested state.
///
/// Every entry point is idempotent: it queries first and only mutates what is
/// missing. In check mode each mutation is replaced by a log line. Real
/// mutations are persisted right away through the configured save command.
///
/// There is no rollback. If a later step fails, earlier steps (a created chain,
/// an inserted jump rule) remain applied and saved.
pub struct IpTablesManager<R> {
    tool: FilterTool<R>,
    save_cmd: Vec<String>,
    chain: String,
    create_jump_rule: bool,
    jump_rule_chain: String,
    ip_version: IpVersion,
    check_mode: bool,
    output: Vec<String>,
    changed: bool,
}

impl<R: CommandRunner> IpTablesManager<R> {
    pub fn new(request: &Request, config: &ToolConfig, runner: R) -> Result<Self> {
        let base = config.filter_command(request.ip_version);
        if base.first().is_none_or(|binary| binary.is_empty()) {
            return Err(FirewallError::Config(format!(
                "no filter binary configured for {}",
                request.ip_version
            )));
        }

        let save_cmd = config.save_command(request.ip_version);
        if save_cmd.first().is_none_or(|binary| binary.is_empty()) {
            return Err(FirewallError::Config(format!(
                "save command for {} is empty",
                request.ip_version
            )));
        }

        Ok(Self {
            tool: FilterTool::new(runner, base),
            save_cmd,
            chain: request.chain.clone(),
            create_jump_rule: request.create_jump_rule,
            jump_rule_chain: request.jump_rule_chain.clone(),
            ip_version: request.ip_version,
            check_mode: request.check_mode,
            output: Vec::new(),
            changed: false,
        })
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_outcome(self) -> Outcome {
        Outcome {
            changed: self.changed,
            output: self.output,
            status: None,
        }
    }

    fn checker(&self) -> ChainStateChecker<'_, R> {
        ChainStateChecker::new(&self.tool)
    }

    /// Dispatch a validated action; only `Status` yields a report
    pub fn apply(&mut self, action: Action) -> Result<Option<ChainStatus>> {
        match action {
            Action::Add(rule) => self.add_rule(rule)?,
            Action::Remove(rule) => self.remove_rule(rule)?,
            Action::VerifyChain => self.verify_chain()?,
            Action::Status(rule) => return Ok(Some(self.status(rule))),
        }
        Ok(None)
    }

    /// Make sure the chain exists and, when requested, is jumped to from the entry chain
    pub fn verify_chain(&mut self) -> Result<()> {
        if !self.checker().chain_exists(&self.chain) {
            self.create_chain()?;
        }
        if self.create_jump_rule
            && !self
                .checker()
                .jump_rule_exists(&self.jump_rule_chain, &self.chain)
        {
            self.create_jump()?;
        }
        Ok(())
    }

    pub fn add_rule(&mut self, rule: PortRule) -> Result<()> {
        let allow = AllowRule::new(&self.chain, rule);
        if self.checker().rule_exists(&allow) {
            tracing::debug!(chain = %self.chain, %rule, "rule already present");
            return Ok(());
        }

        self.verify_chain()?;

        if self.check_mode {
            self.simulate(format!("Create rule for {}", rule));
            return Ok(());
        }

        let out = self
            .tool
            .run_mutating(&with_op("-A", allow.args()))
            .map_err(|failure| FirewallError::Execution {
                message: format!("Failed to create rule for {}", rule),
                failure,
            })?;
        tracing::info!(chain = %self.chain, %rule, "created rule");
        self.record(out);
        self.output.push(format!("Created rule for {}", rule));
        self.changed = true;
        self.save()
    }

    /// Delete the rule if present. The chain and its jump rule are left alone.
    pub fn remove_rule(&mut self, rule: PortRule) -> Result<()> {
        let allow = AllowRule::new(&self.chain, rule);
        if !self.checker().rule_exists(&allow) {
            tracing::debug!(chain = %self.chain, %rule, "rule already absent");
            return Ok(());
        }

        if self.check_mode {
            self.simulate(format!("Remove rule for {}", rule));
            return Ok(());
        }

        let out = self
            .tool
            .run_mutating(&with_op("-D", allow.args()))
            .map_err(|failure| FirewallError::Execution {
                message: format!("Failed to remove rule for {}", rule),
                failure,
            })?;
        tracing::info!(chain = %self.chain, %rule, "removed rule");
        self.record(out);
        self.output.push(format!("Removed rule for {}", rule));
        self.changed = true;
        self.save()
    }

    /// Report what is currently present without touching anything
    pub fn status(&self, rule: Option<PortRule>) -> ChainStatus {
        let checker = self.checker();
        let chain_exists = checker.chain_exists(&self.chain);
        let jump_rule_exists = self
            .create_jump_rule
            .then(|| checker.jump_rule_exists(&self.jump_rule_chain, &self.chain));
        let rule = rule.map(|rule| RuleStatus {
            protocol: rule.protocol,
            port: rule.port,
            exists: chain_exists && checker.rule_exists(&AllowRule::new(&self.chain, rule)),
        });

        ChainStatus {
            chain: self.chain.clone(),
            jump_rule_chain: self.jump_rule_chain.clone(),
            ip_version: self.ip_version,
            chain_exists,
            jump_rule_exists,
            rule,
        }
    }

    fn create_chain(&mut self) -> Result<()> {
        if self.check_mode {
            self.simulate(format!("Create chain {}", self.chain));
            return Ok(());
        }

        let out = self
            .tool
            .run_mutating(&["-N".to_string(), self.chain.clone()])
            .map_err(|failure| FirewallError::ChainCreation {
                chain: self.chain.clone(),
                message: format!("Failed to create chain: {}", self.chain),
                failure,
            })?;
        tracing::info!(chain = %self.chain, "created chain");
        self.record(out);
        self.output
            .push(format!("Successfully created chain {}", self.chain));
        self.changed = true;
        self.save()
    }

    fn create_jump(&mut self) -> Result<()> {
        if self.check_mode {
            self.simulate(format!("Create jump rule for chain {}", self.chain));
            return Ok(());
        }

        let placement = self.jump_placement()?;
        let out = self
            .tool
            .run_mutating(&placement.args(&self.jump_rule_chain, &self.chain))
            .map_err(|failure| FirewallError::JumpRuleCreation {
                chain: self.chain.clone(),
                stage: JumpRuleStage::Insert,
                message: format!("Failed to create jump rule for chain {}", self.chain),
                failure,
            })?;

        let described = match placement {
            JumpPlacement::Insert(line) => format!(
                "Inserted jump rule to {} at {} position {}",
                self.chain, self.jump_rule_chain, line
            ),
            JumpPlacement::Append => format!(
                "Appended jump rule to {} at end of {}",
                self.chain, self.jump_rule_chain
            ),
        };
        tracing::info!(
            chain = %self.chain,
            entry_chain = %self.jump_rule_chain,
            ?placement,
            "created jump rule"
        );
        self.record(out);
        self.output.push(described);
        self.changed = true;
        self.save()
    }

    /// List the entry chain and decide where the jump rule belongs
    fn jump_placement(&self) -> Result<JumpPlacement> {
        let listing = self
            .tool
            .query(&[
                "-L".to_string(),
                self.jump_rule_chain.clone(),
                "--line-numbers".to_string(),
            ])
            .map_err(|failure| FirewallError::JumpRuleCreation {
                chain: self.chain.clone(),
                stage: JumpRuleStage::Listing,
                message: format!(
                    "Failed to query existing {} rules to determine jump rule location",
                    self.jump_rule_chain
                ),
                failure,
            })?;

        Ok(decide_placement(&parse_numbered_listing(&listing)))
    }

    fn save(&mut self) -> Result<()> {
        let out = run_mutating(self.tool.runner(), self.save_cmd.clone()).map_err(|failure| {
            FirewallError::Persist {
                message: format!("Failed to save {} rules", self.ip_version),
                failure,
            }
        })?;
        tracing::info!(command = %self.save_cmd.join(" "), "saved filter rules");
        self.record(out);
        Ok(())
    }

    fn simulate(&mut self, message: String) {
        tracing::info!(check_mode = true, chain = %self.chain, "{}", message);
        self.changed = true;
        self.output.push(message);
    }

    fn record(&mut self, out: String) {
        let out = out.trim();
        if !out.is_empty() {
            self.output.push(out.to_string());
        }
    }
}
