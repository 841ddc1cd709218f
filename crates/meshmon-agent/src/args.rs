use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version = "0.9.0", about = "meshmon cluster monitoring agent")]
pub struct Args {
    /// Path to the agent configuration file
    #[clap(short = 'c', long, value_name = "PATH", env = "MESHMON_CONFIG")]
    pub config: String,

    /// How often (in seconds) to log operational status
    #[clap(
        long,
        value_name = "SECONDS",
        env = "MESHMON_STATUS_INTERVAL",
        default_value = "600"
    )]
    pub status_interval: u64,

    /// Keep quiet and only log errors
    #[clap(short, long, conflicts_with = "verbose", default_value_t = false)]
    pub quiet: bool,

    #[clap(
        short = 'v',
        long,
        conflicts_with = "quiet",
        action = clap::ArgAction::Count,
        help = "Output details about traffic and scheduling; specify multiple times for more detail"
    )]
    pub verbose: u8,
}
