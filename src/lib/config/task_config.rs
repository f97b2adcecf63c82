use super::config_error::*;
use super::parser_ini::strip_comment;

#[derive(Debug, PartialEq, Clone)]
pub struct TaskConfig {
    pub name: String,
    pub count: Option<u32>,
}

impl TaskConfig {
    pub fn new(name: &str) -> Self {
        TaskConfig {
            name: name.to_owned(),
            count: None,
        }
    }

    fn parse_count(k: &str, v: &str) -> Result<u32, ConfigValueError> {
        match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigValueError::new(k, v)),
        }
    }

    pub fn from(name: &str, prop: &ini::Properties) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = TaskConfig::new(name);
        for (k, v) in prop.iter() {
            let v = strip_comment(v);
            match k {
                "count" => config.count = Some(TaskConfig::parse_count(k, v)?),
                _ => return Err(Box::new(ConfigKeyError::new(k))),
            }
        }
        Ok(config)
    }
}
