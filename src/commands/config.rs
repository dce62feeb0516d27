use colored::*;
use eyre::{Result, bail};

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
        ConfigAction::Get { key } => {
            println!("{}", get(&key, config)?);
            Ok(())
        }
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "pagelog configuration".bold());
            println!();

            println!("{}:", "collector".cyan());
            println!("  base_url: {}", config.collector.base_url);
            println!("  prefix: {}", config.collector.prefix.as_deref().unwrap_or("(none)"));
            println!("  endpoint: {}", config.collector.endpoint);
            println!("  page: {}", config.collector.page);
            println!("  timeout_secs: {}", config.collector.timeout_secs);
            println!();

            println!("{}:", "paths".cyan());
            println!("  events: {}", config.paths.events.display());
            println!();

            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
            println!("{}: {}", "listeners".cyan(), config.listeners.len());
        }
    }

    Ok(())
}

fn get(key: &str, config: &Config) -> Result<String> {
    let value = match key {
        "collector.base_url" => config.collector.base_url.clone(),
        "collector.prefix" => config.collector.prefix.clone().unwrap_or_default(),
        "collector.endpoint" => config.collector.endpoint.clone(),
        "collector.page" => config.collector.page.clone(),
        "collector.timeout_secs" => config.collector.timeout_secs.to_string(),
        "paths.events" => config.paths.events.display().to_string(),
        "log_level" | "log-level" => config.log_level.as_filter().to_string(),
        _ => bail!("Unknown config key: {}", key),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_known_keys() {
        let config = Config::default();
        assert_eq!(get("collector.endpoint", &config).unwrap(), "/event");
        assert_eq!(get("collector.prefix", &config).unwrap(), "");
        assert_eq!(get("log-level", &config).unwrap(), "info");
    }

    #[test]
    fn test_get_unknown_key() {
        assert!(get("nope", &Config::default()).is_err());
    }
}
