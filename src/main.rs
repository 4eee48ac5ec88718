mod cli;
mod commands;
mod dispatch;
mod error;
mod materialize;
mod model;
mod prompt;
mod template;
#[cfg(test)]
mod test_support;

use std::path::Path;
use std::process::ExitCode;

use anyhow::anyhow;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand};
use commands::{CommandTarget, command_table, parse_command_id};
use dispatch::{Dispatcher, Outcome, report};
use error::{Result, StencilError};
use materialize::VaultMaterializer;
use model::config::AppConfig;
use model::params::ParameterBag;
use prompt::TerminalPrompter;
use template::TemplateRegistry;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("stencil: {err}");
            return exit(err.exit_code());
        }
    };

    // Log to file only; stdout carries command output and stderr the prompts.
    let _guard = match init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("stencil: logging disabled: {err:#}");
            None
        }
    };

    tracing::info!("stencil starting");

    match run(cli.command, config) {
        Ok(()) => exit(error::exit_codes::SUCCESS),
        Err(err) => {
            report(&err);
            exit(err.exit_code())
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

fn init_logging(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let log_dir = directories::ProjectDirs::from("", "", "stencil")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "stencil.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|err| {
        eprintln!("stencil: bad LOG_FILTER {:?}: {err}", config.log_filter);
        EnvFilter::new("stencil=info")
    });

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!("{err}"))?;

    Ok(guard)
}

fn run(command: Command, mut config: AppConfig) -> Result<()> {
    match command {
        Command::Invoke { params } => {
            let bag = ParameterBag::parse_invocation(&params, &config.protocol_scheme)?;
            finish(dispatcher(&config).invoke(&bag)?)
        }
        Command::Create { key } => finish(dispatcher(&config).create_manual(key.as_deref())?),
        Command::Run { id } => match parse_command_id(&id) {
            Some(CommandTarget::Manual) => finish(dispatcher(&config).create_manual(None)?),
            Some(CommandTarget::Template(key)) => {
                finish(dispatcher(&config).create_manual(Some(&key))?)
            }
            None => Err(StencilError::TemplateNotFound(format!("no command {id}"))),
        },
        Command::Commands => {
            let mut registry = TemplateRegistry::new(&config);
            for entry in command_table(&mut registry) {
                println!("{:<24} {}", entry.id, entry.label);
            }
            Ok(())
        }
        Command::Templates { errors, json } => {
            let mut registry = TemplateRegistry::new(&config);
            if errors {
                print_scan_errors(&mut registry);
            } else if json {
                print_templates_json(&mut registry)?;
            } else {
                let listed: Vec<_> = registry.list().collect();
                for (key, name) in &listed {
                    println!("{key:<20} {name}");
                }
                eprintln!("{}", registry.summary());
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            print!("{}", config.to_record());
            Ok(())
        }
        Command::Config(ConfigCommand::Path) => {
            match config.record_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(none)"),
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            config.reconfigure(&key, &value)?;
            println!("{key}={}", config.get(&key).unwrap_or_default());
            Ok(())
        }
    }
}

fn dispatcher(
    config: &AppConfig,
) -> Dispatcher<TerminalPrompter<std::io::StdinLock<'static>, std::io::Stderr>, VaultMaterializer> {
    Dispatcher::new(
        TemplateRegistry::new(config),
        TerminalPrompter::stdio(),
        VaultMaterializer::new(config.vault_path()),
    )
}

fn finish(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Created(path) => println!("{}", path.display()),
        Outcome::Abandoned => tracing::info!("invocation abandoned by user"),
    }
    Ok(())
}

fn print_scan_errors(registry: &mut TemplateRegistry) {
    let errors = registry.errors();
    if errors.is_empty() {
        println!("templates: no errors");
    }
    for error in errors {
        println!("{}: {}", error.path.display(), error.reason);
    }
}

fn print_templates_json(registry: &mut TemplateRegistry) -> Result<()> {
    let keys: Vec<_> = registry.list().map(|(key, _)| key).collect();
    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let handle = registry.resolve(key.as_str())?;
        rows.push(serde_json::json!({
            "key": key.as_str(),
            "export": handle.export_name(),
            "path": handle.path().display().to_string(),
            "descriptor": handle.descriptor(),
        }));
    }

    let out = serde_json::to_string_pretty(&rows)
        .map_err(|err| StencilError::Io(std::io::Error::other(err)))?;
    println!("{out}");
    Ok(())
}
