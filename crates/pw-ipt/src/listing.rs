/// One numbered row of `iptables -L <chain> --line-numbers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedRule {
    pub line_number: u32,
    pub target: String,
}

/// Where a new jump rule goes in the entry chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpPlacement {
    /// `-I <chain> <n>`, ahead of a trailing reject/drop rule
    Insert(u32),
    /// `-A <chain>`
    Append,
}

/// Parse a numbered chain listing into (line number, target) rows.
///
/// Rows without a leading integer (chain header, column header, blanks) are
/// skipped, as are numbered rows with no target column. The final line of the
/// listing is never considered; iptables ends its output with a newline so
/// that line is the empty remainder.
pub fn parse_numbered_listing(listing: &str) -> Vec<ListedRule> {
    let lines: Vec<&str> = listing.split('\n').collect();
    let Some((_, body)) = lines.split_last() else {
        return Vec::new();
    };

    body.iter()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let line_number = columns.next()?.parse::<u32>().ok()?;
            let target = columns.next()?;
            Some(ListedRule {
                line_number,
                target: target.to_string(),
            })
        })
        .collect()
}

/// Insert ahead of the last rule when it rejects or drops, otherwise append
pub fn decide_placement(rules: &[ListedRule]) -> JumpPlacement {
    match rules.last() {
        Some(last) if last.line_number > 0 && matches!(last.target.as_str(), "REJECT" | "DROP") => {
            JumpPlacement::Insert(last.line_number)
        }
        _ => JumpPlacement::Append,
    }
}

impl JumpPlacement {
    /// Full argument list placing a jump from `entry_chain` to `chain`
    pub fn args(&self, entry_chain: &str, chain: &str) -> Vec<String> {
        let mut args = match self {
            JumpPlacement::Insert(line) => {
                vec!["-I".to_string(), entry_chain.to_string(), line.to_string()]
            }
            JumpPlacement::Append => vec!["-A".to_string(), entry_chain.to_string()],
        };
        args.push("-j".to_string());
        args.push(chain.to_string());
        args
    }
}
