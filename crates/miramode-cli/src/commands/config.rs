//! Config command implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;

use crate::cli::{ConfigAction, ConfigKey};
use crate::config::Config;
use crate::format::FormatOptions;
use crate::util::write_output;

const CONFIG_TEMPLATE: &str = "\
# miramode configuration
#
# device = \"AA:BB:CC:DD:EE:FF\"
# client_id = 12345
# client_slot = 0
# timeout = 10
# response_timeout = 5000
# temperature_mapping = \"standard\"
# connect_attempts = 10
";

pub fn cmd_config(action: ConfigAction, opts: &FormatOptions) -> Result<()> {
    let path = Config::path();

    match action {
        ConfigAction::Show => {
            let config = Config::load_from(&path);
            let content = if opts.json {
                opts.as_json(&config)?
            } else {
                let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
                if text.is_empty() {
                    "# no settings\n".to_string()
                } else {
                    text
                }
            };
            write_output(&content)
        }
        ConfigAction::Get { key } => {
            let config = Config::load_from(&path);
            match config.get(key) {
                Some(value) => write_output(&format!("{}\n", value)),
                None => bail!("{} is not set", key_name(key)),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(&path);
            config.set(key, &value)?;
            config.save_to(&path)?;
            eprintln!("Set {} = {}", key_name(key), value);
            Ok(())
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load_from(&path);
            config.unset(key);
            config.save_to(&path)?;
            eprintln!("Unset {}", key_name(key));
            Ok(())
        }
        ConfigAction::Path => write_output(&format!("{}\n", path.display())),
        ConfigAction::Init => init(&path),
    }
}

fn init(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    eprintln!("Created {}", path.display());
    Ok(())
}

/// The key as typed on the command line.
fn key_name(key: ConfigKey) -> String {
    key.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_else(|| format!("{:?}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_is_kebab_case() {
        assert_eq!(key_name(ConfigKey::ClientId), "client-id");
        assert_eq!(key_name(ConfigKey::TemperatureMapping), "temperature-mapping");
    }

    #[test]
    fn test_template_parses_to_empty_config() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path).unwrap();
        assert!(path.exists());
        assert!(init(&path).is_err());
    }
}
