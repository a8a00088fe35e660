//! Config validation CLI tool
//!
//! Validates a gymtrack configuration file and reports any errors.

use gymtrack_api::TimeSlot;
use gymtrack_util::default_config_path;
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
            eprintln!("Validates a gymtrack configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match gymtrack_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", gymtrack_config::CURRENT_CONFIG_VERSION);
            println!("  Data directory: {}", settings.data_dir.display());
            println!(
                "  Confirm window: {}s",
                settings.tracker.confirm_window.as_secs()
            );
            println!(
                "  Timer period: {}ms",
                settings.tracker.tick_interval.as_millis()
            );
            println!();
            println!("Time slots:");
            for slot in TimeSlot::ALL {
                println!("  - {}", slot.display_range(&settings.slots));
            }
            println!();
            println!(
                "Crowd: Low <= {}, Medium <= {}, High above",
                settings.crowd.low_max, settings.crowd.medium_max
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                gymtrack_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                gymtrack_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                gymtrack_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                gymtrack_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        gymtrack_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
