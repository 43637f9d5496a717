use tracing::debug;

/// Collects background jobs during wiring and launches them together once
/// everything they depend on exists.
pub struct TaskRunner {
    tasks: Vec<(&'static str, Box<dyn FnOnce() + Send>)>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn add_task<F>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push((name, Box::new(task)));
    }

    pub fn start_all(self) {
        for (name, task) in self.tasks {
            debug!(name, "starting background task");
            task();
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}
