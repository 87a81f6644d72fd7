//! Management command framework.
//!
//! [`ManagementCommand`] defines one subcommand and [`CommandRegistry`]
//! collects them into a clap application and dispatches parsed arguments.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use audience_rs_cli::command::ManagementCommand;
//! use audience_rs_core::{AudienceResult, Settings};
//!
//! struct DialectCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for DialectCommand {
//!     fn name(&self) -> &'static str { "dialect" }
//!     fn help(&self) -> &'static str { "Print the configured warehouse dialect" }
//!
//!     async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<()> {
//!         println!("{:?}", settings.warehouse.dialect);
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use audience_rs_core::{AudienceError, AudienceResult, Settings};

/// A command that can be registered and invoked through the CLI.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name used to invoke the command.
    fn name(&self) -> &'static str;

    /// Returns a short help description.
    fn help(&self) -> &'static str;

    /// Adds the command's arguments. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<()>;
}

/// Registered commands, keyed by name.
pub struct CommandRegistry {
    commands: HashMap<&'static str, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        self.commands.insert(command.name(), command);
    }

    /// Returns the command with the given name.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns the registered command names, sorted.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap application.
    ///
    /// The global `--settings` option names a TOML or JSON settings file.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("audience-rs")
            .about("Compile audience filters to warehouse SQL")
            .subcommand_required(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .global(true)
                    .value_name("FILE")
                    .help("Settings file (.toml or .json); AUDIENCE_* variables override it"),
            );

        for name in self.list_commands() {
            if let Some(cmd) = self.commands.get(name) {
                let subcmd = clap::Command::new(cmd.name()).about(cmd.help());
                app = app.subcommand(cmd.add_arguments(subcmd));
            }
        }
        app
    }

    /// Dispatches the parsed subcommand.
    pub async fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<()> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            AudienceError::ConfigurationError("No subcommand specified".to_string())
        })?;
        let cmd = self
            .get(name)
            .ok_or_else(|| AudienceError::ConfigurationError(format!("Unknown command: {name}")))?;

        tracing::debug!(command = name, "Running management command");
        cmd.handle(sub_matches, settings).await
    }
}
