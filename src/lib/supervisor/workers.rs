use std::collections::{BTreeMap, BTreeSet};

use nix::unistd::Pid;

use crate::status::PidMap;

/// Live workers of the master, grouped by task name.
#[derive(Debug, Default)]
pub struct Workers {
    by_task: BTreeMap<String, BTreeSet<Pid>>,
}

impl Workers {
    pub fn new() -> Self {
        Workers {
            by_task: BTreeMap::new(),
        }
    }

    /// Records a freshly forked child. Returns `false` when the pid is
    /// already tracked, in which case nothing changes.
    pub fn insert(&mut self, task: &str, pid: Pid) -> bool {
        if self.task_of(pid).is_some() {
            return false;
        }
        self.by_task.entry(task.to_owned()).or_default().insert(pid)
    }

    /// Forgets a reaped child, returning the task it belonged to.
    pub fn remove(&mut self, pid: Pid) -> Option<String> {
        let task = self.task_of(pid)?.to_owned();
        if let Some(pids) = self.by_task.get_mut(&task) {
            pids.remove(&pid);
        }
        Some(task)
    }

    pub fn task_of(&self, pid: Pid) -> Option<&str> {
        self.by_task
            .iter()
            .find(|(_, pids)| pids.contains(&pid))
            .map(|(task, _)| task.as_str())
    }

    pub fn count(&self, task: &str) -> usize {
        self.by_task.get(task).map_or(0, BTreeSet::len)
    }

    /// How many workers `task` is short of `desired`.
    pub fn deficit(&self, task: &str, desired: u32) -> usize {
        (desired as usize).saturating_sub(self.count(task))
    }

    pub fn len(&self) -> usize {
        self.by_task.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.by_task.values().flatten().copied()
    }

    pub fn to_pid_map(&self) -> PidMap {
        self.by_task
            .iter()
            .map(|(task, pids)| (task.clone(), pids.iter().map(|p| p.as_raw()).collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn test_insert_and_remove() {
        let mut workers = Workers::new();
        assert!(workers.insert("mcq", pid(10)));
        assert!(workers.insert("mcq", pid(11)));
        assert!(workers.insert("other", pid(20)));
        assert_eq!(3, workers.len());
        assert_eq!(2, workers.count("mcq"));

        assert_eq!(Some("mcq".to_owned()), workers.remove(pid(10)));
        assert_eq!(None, workers.remove(pid(10)));
        assert_eq!(1, workers.count("mcq"));
        assert_eq!(2, workers.len());
    }

    #[test]
    fn test_pid_in_one_task_only() {
        let mut workers = Workers::new();
        assert!(workers.insert("mcq", pid(10)));
        assert!(!workers.insert("other", pid(10)));
        assert_eq!(Some("mcq"), workers.task_of(pid(10)));
        assert_eq!(0, workers.count("other"));
    }

    #[test]
    fn test_deficit_converges() {
        let mut workers = Workers::new();
        assert_eq!(3, workers.deficit("mcq", 3));

        let mut next = 100;
        let mut fill = |workers: &mut Workers| {
            for _ in 0..workers.deficit("mcq", 3) {
                workers.insert("mcq", pid(next));
                next += 1;
            }
        };

        fill(&mut workers);
        assert_eq!(0, workers.deficit("mcq", 3));

        // two exits, refill brings the count back without overshooting
        workers.remove(pid(100));
        workers.remove(pid(102));
        assert_eq!(2, workers.deficit("mcq", 3));
        fill(&mut workers);
        assert_eq!(3, workers.count("mcq"));
        fill(&mut workers);
        assert_eq!(3, workers.count("mcq"));
    }

    #[test]
    fn test_unknown_task_removed_reaps_nothing() {
        let mut workers = Workers::new();
        workers.insert("mcq", pid(10));
        assert_eq!(None, workers.remove(pid(99)));
        assert_eq!(1, workers.len());
    }

    #[test]
    fn test_pid_map() {
        let mut workers = Workers::new();
        workers.insert("other", pid(20));
        workers.insert("mcq", pid(11));
        workers.insert("mcq", pid(10));
        let map = workers.to_pid_map();
        assert_eq!(vec![10, 11], map["mcq"]);
        assert_eq!(vec![20], map["other"]);
        assert_eq!(3, workers.pids().count());
    }
}
