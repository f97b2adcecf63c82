use libc::{c_char, localtime_r, strftime, time_t, tm};
use std::ffi::CStr;
use std::fmt;
use std::io::Write;
use std::mem::MaybeUninit;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DATETIME_FORMAT: &[u8] = b"%Y-%m-%d %H:%M:%S\0";

pub static LOG: Logger = Logger(LogLevel::Info);

#[derive(PartialEq, PartialOrd)]
pub enum LogLevel {
    Crit = 0,
    Warn = 1,
    Info = 2,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Crit => "CRIT",
            }
        )
    }
}

pub struct Logger(pub LogLevel);

impl Logger {
    pub fn epoch_seconds() -> i64 {
        Self::get_epoch_time().0
    }

    fn get_epoch_time() -> (i64, i64) {
        let since_the_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let millis = since_the_epoch.as_millis();

        ((millis / 1000) as i64, (millis % 1000) as i64)
    }

    /// Formats `seconds` since the epoch in local time with a nul-terminated
    /// `strftime` pattern.
    pub fn format_time(seconds: i64, format: &[u8]) -> String {
        let format = match CStr::from_bytes_with_nul(format) {
            Ok(format) => format,
            Err(_) => return String::new(),
        };
        let seconds = seconds as time_t;

        let mut datetime = unsafe { MaybeUninit::<tm>::zeroed().assume_init() };
        unsafe { localtime_r(&seconds, &mut datetime) };

        let mut buf: [u8; 64] = [0; 64];
        let length = unsafe {
            strftime(
                buf.as_mut_ptr() as *mut c_char,
                buf.len(),
                format.as_ptr(),
                &datetime,
            )
        };

        String::from_utf8_lossy(&buf[..length]).into_owned()
    }

    pub fn get_formated_timestamp() -> String {
        let (seconds, millis) = Self::get_epoch_time();

        let mut timestamp = Self::format_time(seconds, DATETIME_FORMAT);
        timestamp.push_str(&format!(".{:03}", millis));

        timestamp
    }

    fn log(&self, level: LogLevel, message: &str) {
        if self.0 >= level {
            // stdout may already be the configured sink or /dev/null
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{} {level} {message}", Self::get_formated_timestamp());
            let _ = out.flush();
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn crit(&self, message: &str) {
        self.log(LogLevel::Crit, message);
    }
}
