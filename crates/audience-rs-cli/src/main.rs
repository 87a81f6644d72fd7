//! The `audience-rs` command-line entry point.

use std::process::ExitCode;

use audience_rs_cli::command::CommandRegistry;
use audience_rs_cli::commands::register_builtin_commands;
use audience_rs_core::logging::setup_logging;
use audience_rs_core::settings_loader;

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match matches.get_one::<String>("settings") {
        Some(path) => match settings_loader::from_file_with_env(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => settings_loader::from_env(),
    };
    setup_logging(&settings);

    match registry.execute(&matches, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
