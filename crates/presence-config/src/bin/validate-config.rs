//! Config validation CLI tool
//!
//! Validates a presenced configuration file and reports any errors.

use presence_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a presenced configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match presence_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", presence_config::CURRENT_CONFIG_VERSION);
            println!("  Guild: {}", policy.target.guild_id);
            println!("  Channel: {}", policy.target.channel_id);
            if policy.window.is_zero_width() {
                println!("  Active window: {} (empty, no sessions will run)", policy.window);
            } else {
                println!("  Active window: {}", policy.window);
            }
            println!(
                "  Session duration: {}-{} min",
                policy.session.duration_min, policy.session.duration_max
            );
            println!(
                "  Delay between sessions: {}-{} min",
                policy.session.delay_min, policy.session.delay_max
            );
            println!("  Connect timeout: {}s", policy.daemon.connect_timeout.as_secs());

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                presence_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                presence_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                presence_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                presence_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        presence_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
