use clap::{Args, Parser, Subcommand, ValueEnum};
use pw_core::{
    ActionKind, DEFAULT_CHAIN, DEFAULT_JUMP_RULE_CHAIN, IpVersion, Outcome, Protocol, RawParams,
    ToolConfig, validate,
};
use pw_ipt::{ReconcileFailure, SystemRunner, reconcile};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pwarden")]
#[command(version, about = "Keep an iptables allow chain in its desired state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Managed chain holding the allow rules
    #[arg(long, global = true, default_value = DEFAULT_CHAIN)]
    chain: String,

    /// Entry chain that jumps into the managed chain
    #[arg(long, global = true, default_value = DEFAULT_JUMP_RULE_CHAIN)]
    jump_rule_chain: String,

    /// Do not create or check the jump rule
    #[arg(long, global = true)]
    no_jump_rule: bool,

    #[arg(long, global = true, default_value = "ipv4")]
    ip_version: IpVersion,

    /// Report what would change without touching the filter table
    #[arg(long, global = true)]
    check: bool,

    /// Tool configuration file (defaults to /etc/pwarden/config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Allow new connections to a port
    Add(RuleArgs),
    /// Remove a previously added allow rule
    Remove(RuleArgs),
    /// Ensure the chain and its jump rule exist
    VerifyChain,
    /// Show what is currently in place
    Status(StatusArgs),
}

#[derive(Args)]
struct RuleArgs {
    #[arg(long)]
    protocol: Protocol,
    #[arg(long, allow_negative_numbers = true)]
    port: i64,
}

#[derive(Args)]
struct StatusArgs {
    #[arg(long)]
    protocol: Option<Protocol>,
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i64>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

impl Cli {
    fn raw_params(&self) -> RawParams {
        let (kind, protocol, port) = match &self.command {
            Commands::Add(rule) => (ActionKind::Add, Some(rule.protocol), Some(rule.port)),
            Commands::Remove(rule) => (ActionKind::Remove, Some(rule.protocol), Some(rule.port)),
            Commands::VerifyChain => (ActionKind::VerifyChain, None, None),
            Commands::Status(args) => (ActionKind::Status, args.protocol, args.port),
        };

        RawParams {
            action: kind,
            chain: self.chain.clone(),
            create_jump_rule: !self.no_jump_rule,
            jump_rule_chain: self.jump_rule_chain.clone(),
            protocol,
            port,
            ip_version: self.ip_version,
            check_mode: self.check,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let request = match validate(&cli.raw_params()) {
        Ok(request) => request,
        Err(e) => {
            print_message(&e.to_string(), cli.format)?;
            return Ok(ExitCode::from(2));
        }
    };

    let config = match ToolConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_message(&format!("{:#}", e), cli.format)?;
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::debug!(?request, "reconciling");

    match reconcile(&request, &config, SystemRunner::new()) {
        Ok(outcome) => {
            print_outcome(&outcome, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            print_failure(&failure, cli.format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_outcome(outcome: &Outcome, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        Format::Text => print!("{}", outcome),
    }
    Ok(())
}

fn message_document(msg: &str) -> serde_json::Value {
    json!({ "failed": true, "msg": msg })
}

/// Failure that has nothing beyond a message, such as bad parameters or config
fn print_message(msg: &str, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&message_document(msg))?),
        Format::Text => eprintln!("error: {}", msg),
    }
    Ok(())
}

fn print_failure(failure: &ReconcileFailure, format: Format) -> anyhow::Result<()> {
    let error = &failure.error;
    match format {
        Format::Json => {
            let doc = json!({
                "failed": true,
                "msg": error.to_string(),
                "kind": error.kind(),
                "chain": error.chain(),
                "cmd": error.failure().map(|f| f.command.clone()),
                "exit_code": error.exit_code(),
                "stderr": error.failure().map(|f| f.output.clone()),
                "changed": failure.changed,
                "output": failure.output,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Format::Text => {
            eprintln!("error: {}", error);
            if let Some(cmd) = error.failure() {
                eprintln!("  {}", cmd);
            }
            if failure.changed {
                eprintln!("  changes already applied (not rolled back):");
                for line in &failure.output {
                    eprintln!("    • {}", line);
                }
            }
        }
    }
    Ok(())
}
