//! `config` subcommand handlers.

use freedompro_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(freedompro_config::config_path);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }
            freedompro_config::save_config_to(&Config::default(), &path)?;
            eprintln!("Wrote default config to {}", path.display());
            eprintln!("Set FREEDOMPRO_API_KEY or add cloud.api_key before running the bridge.");
        }
    }
    Ok(())
}
