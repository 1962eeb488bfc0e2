use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Anticipated response inhibition task")]
pub struct Args {
    /// Task configuration (JSON); defaults apply when omitted
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Participant ID (overrides config)
    #[arg(long, short)]
    pub participant: Option<String>,

    /// Directory holding the condition tables (overrides config)
    #[arg(long, value_name = "DIR")]
    pub conditions: Option<PathBuf>,

    /// Directory for trial output (overrides config)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Run headless with a simulated participant
    #[arg(long, default_value_t = false)]
    pub simulate: bool,

    /// With --simulate, run against the wall clock instead of a virtual one
    #[arg(long, default_value_t = false, requires = "simulate")]
    pub realtime: bool,

    /// Seed for trial order, jitter and the simulated participant
    #[arg(long)]
    pub seed: Option<u64>,

    /// Save the effective parameters to this file for reuse with --config
    #[arg(long, value_name = "PATH")]
    pub save_config: Option<PathBuf>,

    /// Also append plain-text logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
