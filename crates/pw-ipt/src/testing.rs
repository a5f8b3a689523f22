//! In-memory stand-in for `iptables` used by the unit tests.

use crate::runner::{CommandOutput, CommandRunner};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;

const BUILTIN_TARGETS: [&str; 5] = ["ACCEPT", "DROP", "REJECT", "RETURN", "LOG"];
const MUTATING_OPS: [&str; 4] = ["-N", "-A", "-I", "-D"];

type Predicate = Box<dyn Fn(&[String]) -> bool>;

struct Failure {
    matches: Predicate,
    exit_code: i32,
    output: String,
}

#[derive(Default)]
struct State {
    chains: BTreeMap<String, Vec<Vec<String>>>,
    commands: Vec<Vec<String>>,
    saves: usize,
}

pub(crate) struct FakeIptables {
    state: RefCell<State>,
    failures: RefCell<Vec<Failure>>,
}

/// Operation flag and the arguments after it, skipping the binary and `-w <secs>`
fn split_command(argv: &[String]) -> Option<(&str, &[String])> {
    let mut i = 1;
    while i < argv.len() {
        if argv[i] == "-w" {
            i += 2;
            continue;
        }
        return Some((argv[i].as_str(), &argv[i + 1..]));
    }
    None
}

fn jump_target(spec: &[String]) -> Option<&str> {
    spec.iter()
        .position(|arg| arg == "-j")
        .and_then(|i| spec.get(i + 1))
        .map(String::as_str)
}

fn exit(code: i32, stdout: &str, stderr: &str) -> io::Result<CommandOutput> {
    Ok(CommandOutput {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

const NO_CHAIN: &str = "iptables: No chain/target/match by that name.\n";
const BAD_RULE: &str = "iptables: Bad rule (does a matching rule exist in that chain?).\n";

impl FakeIptables {
    pub fn new() -> Self {
        let mut state = State::default();
        for chain in ["INPUT", "FORWARD", "OUTPUT"] {
            state.chains.insert(chain.to_string(), Vec::new());
        }
        Self {
            state: RefCell::new(state),
            failures: RefCell::new(Vec::new()),
        }
    }

    pub fn add_chain(&self, chain: &str) {
        self.state
            .borrow_mut()
            .chains
            .entry(chain.to_string())
            .or_default();
    }

    pub fn add_rule<S: AsRef<str>>(&self, chain: &str, spec: &[S]) {
        let spec = spec.iter().map(|s| s.as_ref().to_string()).collect();
        self.state
            .borrow_mut()
            .chains
            .entry(chain.to_string())
            .or_default()
            .push(spec);
    }

    /// Make every command whose operation flag is `op` (or `save`) fail
    pub fn fail_on(&self, op: &str, exit_code: i32, output: &str) {
        let op = op.to_string();
        self.fail_when(
            move |argv| {
                if op == "save" {
                    argv.last().is_some_and(|a| a == "save")
                } else {
                    split_command(argv).is_some_and(|(found, _)| found == op)
                }
            },
            exit_code,
            output,
        );
    }

    pub fn fail_when(
        &self,
        matches: impl Fn(&[String]) -> bool + 'static,
        exit_code: i32,
        output: &str,
    ) {
        self.failures.borrow_mut().push(Failure {
            matches: Box::new(matches),
            exit_code,
            output: output.to_string(),
        });
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.borrow().commands.clone()
    }

    /// Filter-table commands that change state, in the order issued
    pub fn mutations(&self) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|argv| {
                split_command(argv).is_some_and(|(op, _)| MUTATING_OPS.contains(&op))
                    && !argv.last().is_some_and(|a| a == "save")
            })
            .collect()
    }

    pub fn saves(&self) -> usize {
        self.state.borrow().saves
    }

    pub fn rules(&self, chain: &str) -> Option<Vec<Vec<String>>> {
        self.state.borrow().chains.get(chain).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<Vec<String>>> {
        self.state.borrow().chains.clone()
    }

    fn listing(chain: &str, rules: &[Vec<String>]) -> String {
        let mut out = format!(
            "Chain {} (policy ACCEPT)\nnum  target     prot opt source               destination\n",
            chain
        );
        for (i, spec) in rules.iter().enumerate() {
            out.push_str(&format!(
                "{:<4} {:<10} all  --  anywhere             anywhere\n",
                i + 1,
                jump_target(spec).unwrap_or("")
            ));
        }
        out
    }

    fn apply(&self, op: &str, rest: &[String]) -> io::Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        let Some((chain, spec)) = rest.split_first() else {
            return exit(2, "", "iptables v1.8.4: option requires an argument\n");
        };

        match op {
            "-L" => match state.chains.get(chain) {
                Some(rules) => exit(0, &Self::listing(chain, rules), ""),
                None => exit(1, "", NO_CHAIN),
            },
            "-N" => {
                if state.chains.contains_key(chain) {
                    return exit(1, "", "iptables: Chain already exists.\n");
                }
                state.chains.insert(chain.clone(), Vec::new());
                exit(0, "", "")
            }
            "-C" => match state.chains.get(chain) {
                Some(rules) if rules.iter().any(|r| r.as_slice() == spec) => exit(0, "", ""),
                Some(_) => exit(1, "", BAD_RULE),
                None => exit(1, "", NO_CHAIN),
            },
            "-D" => {
                let Some(rules) = state.chains.get_mut(chain) else {
                    return exit(1, "", NO_CHAIN);
                };
                match rules.iter().position(|r| r.as_slice() == spec) {
                    Some(i) => {
                        rules.remove(i);
                        exit(0, "", "")
                    }
                    None => exit(1, "", BAD_RULE),
                }
            }
            "-A" | "-I" => {
                let (index, spec) = if op == "-I" {
                    match spec.split_first().and_then(|(n, s)| Some((n.parse::<usize>().ok()?, s))) {
                        Some(found) => (Some(found.0), found.1),
                        None => (Some(1), spec),
                    }
                } else {
                    (None, spec)
                };

                if let Some(target) = jump_target(spec) {
                    if !BUILTIN_TARGETS.contains(&target) && !state.chains.contains_key(target) {
                        return exit(2, "", "iptables v1.8.4: Couldn't load target\n");
                    }
                }

                let Some(rules) = state.chains.get_mut(chain) else {
                    return exit(1, "", NO_CHAIN);
                };
                match index {
                    Some(n) if n == 0 || n > rules.len() + 1 => {
                        exit(1, "", "iptables: Index of insertion too big.\n")
                    }
                    Some(n) => {
                        rules.insert(n - 1, spec.to_vec());
                        exit(0, "", "")
                    }
                    None => {
                        rules.push(spec.to_vec());
                        exit(0, "", "")
                    }
                }
            }
            other => exit(2, "", &format!("iptables v1.8.4: unknown option \"{}\"\n", other)),
        }
    }
}

impl CommandRunner for FakeIptables {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        self.state.borrow_mut().commands.push(argv.to_vec());

        if let Some(failure) = self.failures.borrow().iter().find(|f| (f.matches)(argv)) {
            return exit(failure.exit_code, "", &failure.output);
        }

        if argv.last().is_some_and(|a| a == "save") {
            self.state.borrow_mut().saves += 1;
            return exit(
                0,
                "iptables: Saving firewall rules to /etc/sysconfig/iptables: [  OK  ]\n",
                "",
            );
        }

        match split_command(argv) {
            Some((op, rest)) => self.apply(op, rest),
            None => exit(2, "", "iptables v1.8.4: no command specified\n"),
        }
    }
}
