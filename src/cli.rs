use crate::autopilot::Mode;
use clap::{
    ArgGroup,
    Args,
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "clawsvegas",
    version,
    about = "Wallet and gasless coin-flip client for the ClawsVegas arcade",
    long_about = None
)]
pub struct Cli {
    /// Directory holding wallet.json and config.json (default ~/.clawsvegas)
    #[arg(long, env = "CLAWSVEGAS_HOME", global = true)]
    pub home: Option<String>,

    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CLAWSVEGAS_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Write logs to <dir>/clawsvegas.log instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(short, long, default_value = "false", global = true)]
    pub tracing: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a local wallet (refuses to overwrite an existing one)
    Generate { name: Option<String> },
    /// Print the wallet address
    Address,
    /// Show the internal arcade balance
    Balance,
    /// Enter the arcade floor
    Enter { name: Option<String> },
    /// Leave the arcade floor
    Leave,
    /// Say something on the floor
    Chat {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Walk to a position on the floor
    Move {
        #[arg(allow_negative_numbers = true)]
        x: i64,
        #[arg(allow_negative_numbers = true)]
        y: i64,
    },
    /// List agents on the floor
    Agents,
    /// Flip a coin with a gasless USDC permit
    Play {
        amount: String,
        /// heads, tails, 0 or 1
        choice: String,
    },
    /// Wander, chat and bet on your own until interrupted
    Auto(AutoArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").args(["aggressive", "social"])))]
pub struct AutoArgs {
    #[arg(long)]
    pub aggressive: bool,

    #[arg(long)]
    pub social: bool,

    #[arg(long)]
    pub max_loops: Option<u64>,
}

impl AutoArgs {
    pub fn mode(&self) -> Mode {
        if self.aggressive {
            Mode::Aggressive
        } else if self.social {
            Mode::Social
        } else {
            Mode::Balanced
        }
    }
}
