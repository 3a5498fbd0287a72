use anyhow::{Context, Result};
use qhop_client::ClientConfig;
use qhop_migrator::MigratorConfig;
use serde::Deserialize;
use std::path::Path;

use crate::GlobalArgs;

/// Layout of the `--config` YAML file.
///
/// ```yaml
/// broker:
///   management_url: https://rabbit.internal:15671
///   username: migrator
/// migration:
///   concurrency: 2
///   retry:
///     max_retries: 5
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub broker: ClientConfig,
    pub migration: MigratorConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))
    }
}

/// Effective settings: flags over the YAML file over the environment over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub broker: ClientConfig,
    pub migration: MigratorConfig,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        let mut broker = file.broker;
        if let Some(url) = &args.management_url {
            broker.management_url = url.clone();
        }
        if let Some(url) = &args.amqp_url {
            broker.amqp_url = url.clone();
        }
        if let Some(user) = &args.user {
            broker.username = user.clone();
        }
        if let Some(password) = &args.password {
            broker.password = password.clone();
        }
        Ok(Self {
            broker,
            migration: file.migration,
        })
    }
}
