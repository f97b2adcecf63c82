mod config_error;
mod general_config;
mod parser_ini;
mod task_config;

pub use config_error::*;
pub use general_config::GeneralConfig;
pub use task_config::TaskConfig;

use std::collections::BTreeMap;
use std::error::Error;

#[derive(Debug, PartialEq, Default)]
pub struct Config {
    pub general: GeneralConfig,
    pub tasks: BTreeMap<String, TaskConfig>,
}

impl Config {
    pub fn from(file_path: &str) -> Result<Self, Box<dyn Error>> {
        let ini = parser_ini::load_ini(file_path)?;
        let mut general = GeneralConfig::new();
        let mut tasks = BTreeMap::new();
        for (sec, prop) in ini.iter() {
            match sec {
                None => {}
                Some("general") => general = GeneralConfig::from(prop)?,
                Some(sec) => match sec.split_once(':') {
                    Some(("task", name)) if !name.is_empty() => {
                        tasks.insert(name.to_owned(), TaskConfig::from(name, prop)?);
                    }
                    _ => return Err(Box::new(ConfigSectionError::new(sec))),
                },
            }
        }
        Ok(Config { general, tasks })
    }
}
