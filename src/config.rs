use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, DurationMilliSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverter: Inverter,

    #[serde(default)]
    pub poll: Poll,

    #[serde(default)]
    pub output: Output,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Inverter {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    pub device: String,
    pub baud_rate: Option<u32>,

    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub read_timeout_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub settle_ms: Option<Duration>,

    pub strict_checksum: Option<bool>,
}
impl Inverter {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(2400)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout_ms.unwrap_or(Duration::from_secs(1))
    }

    pub fn settle(&self) -> Duration {
        self.settle_ms.unwrap_or(crate::anern::inverter::DEFAULT_SETTLE)
    }

    pub fn strict_checksum(&self) -> bool {
        self.strict_checksum == Some(true) // Default to false if not specified
    }
} // }}}

// Poll {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Poll {
    #[serde(default = "Config::default_interval_secs")]
    pub interval_secs: u64,

    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default = "Config::default_commands")]
    pub commands: Vec<Command>,
}
impl Poll {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            interval_secs: Config::default_interval_secs(),
            commands: Config::default_commands(),
        }
    }
} // }}}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    /// `name value` lines, one per field
    #[default]
    Text,
    /// one JSON object per response
    Json,
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("error parsing {}", file))?;

        info!("Configuration loaded successfully:");
        info!("  Inverter:");
        info!("    Device: {}", config.inverter.device());
        info!("    Baud Rate: {}", config.inverter.baud_rate());
        info!("    Read Timeout: {:?}", config.inverter.read_timeout());
        info!("    Settle: {:?}", config.inverter.settle());
        info!("    Strict Checksum: {}", config.inverter.strict_checksum());
        info!("  Poll:");
        info!("    Interval: {}s", config.poll.interval_secs);
        info!(
            "    Commands: {}",
            config
                .poll
                .commands
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("  Output: {:?}", config.output);
        info!("  Log Level: {}", config.loglevel);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverter.device.is_empty() {
            bail!("inverter.device cannot be empty");
        }
        if self.inverter.baud_rate() == 0 {
            bail!("inverter.baud_rate must be greater than 0");
        }
        if self.inverter.read_timeout().is_zero() {
            bail!("inverter.read_timeout_ms must be greater than 0");
        }
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be greater than 0");
        }
        if self.poll.commands.is_empty() {
            bail!("poll.commands must name at least one command");
        }

        Ok(())
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_interval_secs() -> u64 {
        10
    }

    fn default_commands() -> Vec<Command> {
        vec![Command::Qpigs]
    }
}
