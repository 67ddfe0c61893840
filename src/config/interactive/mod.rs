
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, OllamaConfig};
use crate::embeddings::ollama::OllamaClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Answerdesk Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Configure the Ollama instance used to embed documents and queries.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Resolver").bold().yellow());
    configure_resolver(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config) {
        eprintln!("{}", style("✓ Embedding provider reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding provider").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting documents.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Provider:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Resolver:").bold().yellow());
    eprintln!(
        "  Max results: {}",
        style(config.resolver.max_results).cyan()
    );
    eprintln!(
        "  Timeout: {}s",
        style(config.resolver.timeout_seconds).cyan()
    );

    eprintln!();
    match config.ollama_url() {
        Ok(url) => eprintln!("  Provider URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Provider URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            let mut config = Config::default();
            config.base_dir = super::get_config_dir()?;
            Ok(config)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Provider protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    ollama.protocol = protocols[protocol_index].to_string();

    ollama.host = Input::new()
        .with_prompt("Provider host")
        .default(ollama.host.clone())
        .interact_text()?;

    ollama.port = Input::new()
        .with_prompt("Provider port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), ConfigError> {
            if *input == 0 {
                Err(ConfigError::InvalidPort(*input))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.model = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            if input.trim().is_empty() {
                Err(ConfigError::InvalidModel(input.clone()))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.embedding_dimension = Input::new()
        .with_prompt("Embedding dimension (must match the model)")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidEmbeddingDimension(*input))
            }
        })
        .interact_text()?;

    Ok(())
}

fn configure_resolver(config: &mut Config) -> Result<()> {
    config.resolver.max_results = Input::new()
        .with_prompt("Max passages per resolution")
        .default(config.resolver.max_results)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            if (1..=crate::resolver::MAX_RESULTS_CAP).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidMaxResults(
                    *input,
                    crate::resolver::MAX_RESULTS_CAP,
                ))
            }
        })
        .interact_text()?;

    Ok(())
}

fn test_ollama_connection(config: &Config) -> bool {
    match OllamaClient::new(config) {
        Ok(client) => client.ping().is_ok(),
        Err(_) => false,
    }
}
