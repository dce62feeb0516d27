use colored::*;
use eyre::Result;

use crate::cli::OutputFormat;
use crate::config::{Config, SinkKind};

pub fn run(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config.listeners)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&config.listeners)?),
        OutputFormat::Text => {
            println!("{}", "Configured listeners:".bold());
            println!();

            if config.listeners.is_empty() {
                println!("  {}", "(none)".dimmed());
                return Ok(());
            }

            for listener in &config.listeners {
                let sink = match listener.sink {
                    SinkKind::Stdout => "stdout".to_string(),
                    SinkKind::File => format!("file → {}", Config::expand_path(&config.paths.events).display()),
                };
                println!(
                    "  {} on {} {}",
                    listener.event_type.cyan(),
                    listener.element.as_deref().unwrap_or("*"),
                    sink.dimmed()
                );
            }
        }
    }

    Ok(())
}
