use crate::SCHEDULER;
use std::time::Duration;
use timer::{Guard, Timer};

/// Handle to a task on the shared scheduler. Dropping it cancels the task.
pub struct ScheduledTask {
    _guard: Guard,
}

/// Runs `f` once after `delay`, unless the returned handle is dropped first.
#[inline]
pub fn schedule_once<F>(delay: Duration, f: F) -> Option<ScheduledTask>
where
    F: 'static + FnMut() + Send,
{
    SCHEDULER.schedule_once(delay, f)
}

/// Runs `f` every `interval` for as long as the returned handle lives.
#[inline]
pub fn schedule_repeating<F>(interval: Duration, f: F) -> Option<ScheduledTask>
where
    F: 'static + FnMut() + Send,
{
    SCHEDULER.schedule_repeating(interval, f)
}

/// A single timer thread shared by every collection of the process.
pub(crate) struct Scheduler {
    timer: Timer,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            timer: Timer::new(),
        }
    }

    pub fn schedule_once<F>(&self, delay: Duration, f: F) -> Option<ScheduledTask>
    where
        F: 'static + FnMut() + Send,
    {
        match chrono::Duration::from_std(delay) {
            Ok(delay) => Some(ScheduledTask {
                _guard: self.timer.schedule_with_delay(delay, f),
            }),
            Err(e) => {
                log::error!("Failed to convert delay to chrono::Duration: {}, task not scheduled", e);
                None
            }
        }
    }

    pub fn schedule_repeating<F>(&self, interval: Duration, f: F) -> Option<ScheduledTask>
    where
        F: 'static + FnMut() + Send,
    {
        match chrono::Duration::from_std(interval) {
            Ok(interval) => Some(ScheduledTask {
                _guard: self.timer.schedule_repeating(interval, f),
            }),
            Err(e) => {
                log::error!("Failed to convert interval to chrono::Duration: {}, task not scheduled", e);
                None
            }
        }
    }
}
