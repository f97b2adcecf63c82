//! Status snapshot file: written by the master and its workers on a status
//! request, read back and removed by the controller.
//!
//! ```text
//! line 1..5  master header, the 5th line is "<n> workers"
//! line 6     {"task": [pid, ...], ...}
//! line 7..   one fixed-width line per worker, first column is the pid
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use nix::unistd::Pid;

use crate::logger::{Logger, DATETIME_FORMAT};

pub const HEADER_LINES: usize = 5;
pub const SEPARATOR: &str =
    "--------------------------------------------------------------------------------";

pub type PidMap = BTreeMap<String, Vec<i32>>;

/// Current resident set size of the calling process, e.g. `"2.13M"`.
pub fn memory_usage() -> String {
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|content| vm_rss_kb(&content))
        .map_or_else(|| "--".to_owned(), |kb| format!("{:.2}M", kb as f64 / 1024.0))
}

// the `VmRSS:   2184 kB` line of /proc/<pid>/status
fn vm_rss_kb(proc_status: &str) -> Option<u64> {
    proc_status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

pub fn uptime(started: i64, now: i64) -> String {
    let elapsed = (now - started).max(0);
    let days = elapsed / 86400;
    let hours = (elapsed % 86400) / 3600;
    let mins = (elapsed % 3600) / 60;
    format!("{days} days {hours} hours {mins} min")
}

fn column_titles() -> String {
    format!(
        "{:<10}{:<15}{:<15}{:<25}{:<30}",
        "pid", "memory", "run times", "start time", "uptime"
    )
}

fn columns(pid: Pid, memory: &str, run_times: &str, started: i64, now: i64) -> String {
    format!(
        "{:<10}{:<15}{:<15}{:<25}{:<30}",
        pid.to_string(),
        memory,
        run_times,
        Logger::format_time(started, DATETIME_FORMAT),
        uptime(started, now)
    )
}

/// Header block plus the task → pids mapping, as one string.
pub fn compose_master(
    name: &str,
    pid: Pid,
    started: i64,
    now: i64,
    workers: &PidMap,
) -> Result<String, serde_json::Error> {
    let count: usize = workers.values().map(Vec::len).sum();
    let title = format!("Daemon [{name}] status");
    let master = format!("{:-^80}", " master ");
    Ok(format!(
        "{title}\n{master}\n{}\n{}\n{count} workers\n{}\n",
        column_titles().trim_end(),
        columns(pid, &memory_usage(), "--", started, now).trim_end(),
        serde_json::to_string(workers)?
    ))
}

pub fn compose_worker(pid: Pid, run_times: u64, started: i64, now: i64) -> String {
    let line = columns(pid, &memory_usage(), &run_times.to_string(), started, now);
    format!("{}\n", line.trim_end())
}

/// Starts a new snapshot, dropping whatever an earlier request left behind.
pub fn write_master(path: &str, content: &str) -> io::Result<()> {
    fs::write(path, content)
}

/// Appends one worker line with a single write.
pub fn append_worker(path: &str, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(line.as_bytes())
}

#[derive(Debug, PartialEq)]
pub struct Snapshot {
    pub header: Vec<String>,
    pub workers: PidMap,
    pub lines: HashMap<i32, String>,
}

impl Snapshot {
    /// `None` while the master has not finished its part of the file.
    pub fn parse(content: &str) -> Option<Snapshot> {
        let complete = match content.rfind('\n') {
            Some(end) => &content[..end],
            None => return None,
        };
        let mut lines = complete.lines();
        let header: Vec<String> = lines
            .by_ref()
            .take(HEADER_LINES)
            .map(str::to_owned)
            .collect();
        if header.len() < HEADER_LINES {
            return None;
        }
        let workers: PidMap = serde_json::from_str(lines.next()?).ok()?;
        let lines = lines
            .filter_map(|line| {
                let pid = line.split_whitespace().next()?.parse::<i32>().ok()?;
                Some((pid, line.to_owned()))
            })
            .collect();
        Some(Snapshot {
            header,
            workers,
            lines,
        })
    }

    pub fn expected(&self) -> usize {
        self.workers.values().map(Vec::len).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.workers
            .values()
            .flatten()
            .all(|pid| self.lines.contains_key(pid))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!("{:-^80}\n", " workers "));
        out.push_str(&column_titles());
        out.push('\n');
        for (task, pids) in &self.workers {
            out.push_str(&format!("task {task}:\n"));
            for pid in pids {
                match self.lines.get(pid) {
                    Some(line) => out.push_str(line),
                    None => out.push_str(&format!("{:<10}(no report)", pid)),
                }
                out.push('\n');
            }
            out.push_str(SEPARATOR);
            out.push('\n');
        }
        out
    }
}
