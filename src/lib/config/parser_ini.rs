extern crate ini;
use super::config_error::*;
use ini::Ini;

pub fn load_ini(file_path: &str) -> Result<Ini, ConfigFileError> {
    Ini::load_from_file(file_path).map_err(|e| match e {
        ini::Error::Io(_) => ConfigFileError::Nofile(ConfigNoFileError),
        ini::Error::Parse(_) => ConfigFileError::Parsing(ConfigParsingError),
    })
}

// drops a trailing `; comment` from a value
pub fn strip_comment(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}
