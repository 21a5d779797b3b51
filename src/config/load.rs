use super::setting::Setting;
use crate::cli::Cli;
use anyhow::{bail, Error};
use log::info;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub fn load(cli: &Cli) -> Result<Setting, Error> {
    let path = config_path(&cli.config);
    let setting = load_settings(&path)?;
    test_setting(&setting)?;
    Ok(setting)
}

fn config_path(file: &str) -> PathBuf {
    let mut path = PathBuf::from(file);
    if !path.exists() {
        info!("file not found, will try check for alternative extension");
        if let Some(ext) = path.extension().and_then(|v| v.to_str()) {
            match ext {
                "yaml" => {
                    path.set_extension("yml");
                }
                "yml" => {
                    path.set_extension("yaml");
                }
                _ => {}
            }
        }
    }
    path
}

fn load_settings(path: &PathBuf) -> Result<Setting, Error> {
    if !path.exists() {
        info!("config file not found, using defaults");
        return Ok(Setting::default());
    }
    let setting: Setting = serde_yaml::from_str(fs::read_to_string(path)?.as_str())?;
    Ok(setting)
}

fn test_setting(setting: &Setting) -> Result<(), Error> {
    if SocketAddr::from_str(&setting.bind).is_err() {
        bail!("invalid bind address: {}", setting.bind);
    }

    if reqwest::Url::parse(&setting.blocklist_url).is_err() {
        bail!("invalid blocklist url: {}", setting.blocklist_url);
    }

    if setting.refresh_interval == 0 {
        bail!("refresh_interval must be positive");
    }

    if setting.host.command.is_empty() {
        bail!("host.command must not be empty");
    }

    Ok(())
}
