//! Clap derive structures for the `freedompro-bridge` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// freedompro-bridge -- keep Freedompro switches in sync with a local host
#[derive(Debug, Parser)]
#[command(
    name = "freedompro-bridge",
    version,
    about = "Bridge Freedompro cloud switches to a local accessory host",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FREEDOMPRO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Freedompro API key (overrides the config file)
    #[arg(long, global = true, hide_env = true, env = "FREEDOMPRO_API_KEY")]
    pub api_key: Option<String>,

    /// API base URL (overrides the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover accessories and keep their state in sync until Ctrl-C
    Run(RunArgs),

    /// Print the remote device list as JSON
    Devices,

    /// Switch one accessory on or off
    Set(SetArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory for the accessory store (defaults to the platform data dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Disable the live event stream and rely on polling
    #[arg(long)]
    pub no_stream: bool,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Composite accessory id (`deviceUid*accessoryUid`)
    pub composite_id: String,

    /// Target state
    pub state: SwitchArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SwitchArg {
    On,
    Off,
}

impl SwitchArg {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_set_command() {
        let cli = Cli::try_parse_from(["freedompro-bridge", "-vv", "set", "D1*A1", "on"])
            .expect("valid args");
        assert_eq!(cli.global.verbose, 2);
        match cli.command {
            Command::Set(args) => {
                assert_eq!(args.composite_id, "D1*A1");
                assert!(args.state.is_on());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
