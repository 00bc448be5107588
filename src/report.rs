use crate::{
    arcade_client::AgentSummary,
    bet::Outcome,
    error::ArcadeError,
};
use std::fmt::Write;

const RULE_WIDTH: usize = 50;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn render_outcome(outcome: &Outcome, currency: &str) -> String {
    let mut out = String::new();
    let headline = if outcome.won {
        "       YOU WON!"
    } else {
        "       You lost"
    };
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{headline}");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "  Result:  {}", outcome.outcome_text);
    match outcome.payout {
        Some(payout) if outcome.won => {
            let _ = writeln!(out, "  Payout:  +{payout} {currency}");
        }
        _ if outcome.won => {
            let _ = writeln!(out, "  Payout:  pending");
        }
        _ => {
            let _ = writeln!(out, "  Lost:    -{} {currency}", outcome.bet_amount);
        }
    }
    if let Some(game_id) = &outcome.game_id {
        let _ = writeln!(out, "  Game:    {game_id}");
    }
    if let Some(tx_hash) = &outcome.tx_hash {
        let _ = writeln!(out, "  Tx:      {tx_hash}");
    }
    let _ = writeln!(out, "  Seed:    {}", outcome.client_seed);
    let _ = write!(out, "{}", rule());
    out
}

pub fn render_failure(err: &ArcadeError) -> String {
    match err {
        ArcadeError::InsufficientFunds { message } => format!(
            "  Failed: {message}\n  Hint: check the USDC balance of your wallet on Base and top it up before playing again."
        ),
        ArcadeError::UpstreamRejection { message } => format!("  Failed: {message}"),
        err if err.is_indeterminate() => format!(
            "  Bet status unknown: {err}\n  The bet may or may not have been placed. Check your balance before betting again."
        ),
        err => format!("  Error: {err}"),
    }
}

pub fn render_balance(balance: f64, currency: &str) -> String {
    format!("  Arcade:  {balance:.2} {currency} (internal)")
}

pub fn render_agents(agents: &[AgentSummary]) -> String {
    let mut out = format!("  Agents in arcade ({}):", agents.len());
    for agent in agents {
        let _ = write!(out, "\n    - {}", agent.name);
    }
    out
}
