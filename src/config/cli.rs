use crate::domain::model::LedgerDurability;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "site-blocker")]
#[command(about = "Blocking-state coordinator for the site blocker, served over stdin/stdout")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory holding the persisted state
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Seconds between timer expiry checks
    #[arg(long)]
    pub check_interval_secs: Option<u64>,

    /// How much of the pass ledger survives a restart
    #[arg(long, value_enum)]
    pub ledger_durability: Option<LedgerDurability>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}
