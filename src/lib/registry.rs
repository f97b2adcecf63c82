//! Task registry supplied by the embedding application.
//!
//! Each task has a unique name, the number of workers the master keeps
//! alive for it and the unit of work every worker invokes once per
//! iteration.

use std::collections::BTreeMap;

use crate::config::TaskConfig;
use crate::error::Error;

/// A unit of work. Panics inside `handle` terminate the worker process only.
pub trait Handle {
    fn handle(&mut self);
}

impl<F: FnMut()> Handle for F {
    fn handle(&mut self) {
        self()
    }
}

pub struct TaskSpec {
    pub name: String,
    pub count: u32,
    pub handle: Box<dyn Handle>,
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("count", &self.count)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    tasks: Vec<TaskSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { tasks: Vec::new() }
    }

    pub fn register(
        &mut self,
        name: &str,
        count: u32,
        handle: impl Handle + 'static,
    ) -> Result<&mut Self, Error> {
        if name.is_empty() {
            return Err(Error::Registry("task name must not be empty".to_owned()));
        }
        if count == 0 {
            return Err(Error::Registry(format!("{name}: count must be positive")));
        }
        if self.get(name).is_some() {
            return Err(Error::Registry(format!("duplicated task: {name}")));
        }
        self.tasks.push(TaskSpec {
            name: name.to_owned(),
            count,
            handle: Box::new(handle),
        });
        Ok(self)
    }

    /// Applies `[task:<name>] count` overrides from the configuration file.
    pub fn apply(&mut self, overrides: &BTreeMap<String, TaskConfig>) -> Result<(), Error> {
        for (name, conf) in overrides {
            let task = self
                .tasks
                .iter_mut()
                .find(|t| &t.name == name)
                .ok_or_else(|| Error::Registry(format!("no such task: {name}")))?;
            if let Some(count) = conf.count {
                task.count = count;
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.iter()
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut TaskSpec> {
        self.tasks.iter_mut()
    }

    pub fn total_count(&self) -> u32 {
        self.tasks.iter().map(|t| t.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
