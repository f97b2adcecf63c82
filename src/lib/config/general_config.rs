use std::str::FromStr;
use std::time::Duration;

use super::config_error::*;
use super::parser_ini::strip_comment;

#[derive(Debug, PartialEq, Clone)]
pub struct GeneralConfig {
    pub name: String,
    pub pidfile: String,
    pub statusfile: String,
    pub stdfile: String,
    pub max_run_times: u64,
    pub max_run_seconds: u64,
    pub sleep_micros: u64,
    pub status_poll_millis: u64,
    pub status_timeout: u64,
}

impl GeneralConfig {
    pub fn new() -> Self {
        GeneralConfig {
            name: "prefork".to_owned(),
            pidfile: String::new(),
            statusfile: String::new(),
            stdfile: "/dev/null".to_owned(),
            max_run_times: 100_000,
            max_run_seconds: 3600,
            sleep_micros: 10_000,
            status_poll_millis: 1000,
            status_timeout: 0,
        }
    }

    fn parse<T: FromStr>(k: &str, v: &str) -> Result<T, ConfigValueError> {
        let value_error = ConfigValueError::new(k, v);
        v.parse::<T>().map_err(|_| value_error)
    }

    fn parse_positive(k: &str, v: &str) -> Result<u64, ConfigValueError> {
        match GeneralConfig::parse::<u64>(k, v)? {
            0 => Err(ConfigValueError::new(k, v)),
            n => Ok(n),
        }
    }

    pub fn from(prop: &ini::Properties) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = GeneralConfig::new();
        for (k, v) in prop.iter() {
            let v = strip_comment(v);
            match k {
                "name" => config.name = v.to_owned(),
                "pidfile" => config.pidfile = v.to_owned(),
                "statusfile" => config.statusfile = v.to_owned(),
                "stdfile" => config.stdfile = v.to_owned(),
                "max_run_times" => config.max_run_times = GeneralConfig::parse_positive(k, v)?,
                "max_run_seconds" => config.max_run_seconds = GeneralConfig::parse_positive(k, v)?,
                "sleep_micros" => config.sleep_micros = GeneralConfig::parse::<u64>(k, v)?,
                "status_poll_millis" => {
                    config.status_poll_millis = GeneralConfig::parse_positive(k, v)?
                }
                "status_timeout" => config.status_timeout = GeneralConfig::parse::<u64>(k, v)?,
                _ => return Err(Box::new(ConfigKeyError::new(k))),
            }
        }
        Ok(config)
    }

    /// Both persisted files are mandatory; there is no sensible default location.
    pub fn check(&self) -> Result<(), ConfigPathError> {
        if self.pidfile.is_empty() {
            return Err(ConfigPathError::new("pidfile"));
        }
        if self.statusfile.is_empty() {
            return Err(ConfigPathError::new("statusfile"));
        }
        Ok(())
    }

    pub fn sleep_interval(&self) -> Duration {
        Duration::from_micros(self.sleep_micros)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_millis)
    }

    pub fn status_deadline(&self) -> Option<Duration> {
        match self.status_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig::new()
    }
}
