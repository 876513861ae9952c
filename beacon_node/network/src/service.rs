use slog::{warn, Logger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_MAX_TASKS: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Live-task ceiling above which `status` reports unhealthy.
    pub max_tasks: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_tasks: DEFAULT_MAX_TASKS,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ServiceError {
    TooManyTasks { live: usize, max: usize },
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ServiceError::TooManyTasks { live, max } => {
                write!(f, "too many live tasks: {} (max {})", live, max)
            }
        }
    }
}

/// Counts live validation tasks via RAII guards.
///
/// The core does not bound task creation; the count only feeds the health
/// check.
#[derive(Clone, Default)]
pub struct TaskTracker {
    live: Arc<AtomicUsize>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task for the guard's lifetime.
    pub fn guard(&self) -> TaskGuard {
        self.live.fetch_add(1, Ordering::Relaxed);
        TaskGuard {
            live: self.live.clone(),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

pub struct TaskGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The network service surface: owns the task tracker and answers health
/// probes.
pub struct Service {
    tasks: TaskTracker,
    config: ServiceConfig,
    log: Logger,
}

impl Service {
    pub fn new(config: ServiceConfig, log: Logger) -> Self {
        Self {
            tasks: TaskTracker::new(),
            config,
            log,
        }
    }

    /// The tracker handed to components spawning validation work.
    pub fn task_tracker(&self) -> TaskTracker {
        self.tasks.clone()
    }

    /// Healthy while the live task count is within configuration.
    pub fn status(&self) -> Result<(), ServiceError> {
        let live = self.tasks.live();
        if live > self.config.max_tasks {
            warn!(
                self.log,
                "Service is unhealthy";
                "live_tasks" => live,
                "max_tasks" => self.config.max_tasks,
            );
            return Err(ServiceError::TooManyTasks {
                live,
                max: self.config.max_tasks,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloggers::null::NullLoggerBuilder;
    use sloggers::Build;

    fn null_logger() -> Logger {
        NullLoggerBuilder.build().expect("builds a null logger")
    }

    #[test]
    fn status_tracks_live_guards() {
        let service = Service::new(ServiceConfig { max_tasks: 2 }, null_logger());
        let tracker = service.task_tracker();

        assert_eq!(service.status(), Ok(()));

        let _a = tracker.guard();
        let _b = tracker.guard();
        assert_eq!(service.status(), Ok(()));

        let c = tracker.guard();
        assert_eq!(
            service.status(),
            Err(ServiceError::TooManyTasks { live: 3, max: 2 })
        );

        drop(c);
        assert_eq!(service.status(), Ok(()));
    }
}
