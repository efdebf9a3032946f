use std::cell::RefCell;
use std::time::Duration;

/// QoS priority levels, each overriding timeout/retries/batch-size multiplier
/// for the scope of a call (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Background,
}

#[derive(Debug, Clone, Copy)]
pub struct PriorityProfile {
    pub timeout: Duration,
    pub max_retries: u32,
    pub batch_size_multiplier: f64,
}

impl Priority {
    pub fn profile(self) -> PriorityProfile {
        match self {
            Priority::High => PriorityProfile {
                timeout: Duration::from_secs(60),
                max_retries: 5,
                batch_size_multiplier: 0.5,
            },
            Priority::Normal => PriorityProfile {
                timeout: Duration::from_secs(300),
                max_retries: 3,
                batch_size_multiplier: 1.0,
            },
            Priority::Background => PriorityProfile {
                timeout: Duration::from_secs(600),
                max_retries: 1,
                batch_size_multiplier: 1.5,
            },
        }
    }
}

thread_local! {
    static PRIORITY_STACK: RefCell<Vec<Priority>> = const { RefCell::new(Vec::new()) };
}

/// Nestable, stack-based priority context. `with(priority, ...)` pushes for
/// the duration of the closure and restores the previous priority on exit,
/// even on panic (spec.md §4.8, "Priority stacking" law in §8).
pub fn with<R>(priority: Priority, f: impl FnOnce() -> R) -> R {
    PRIORITY_STACK.with(|stack| stack.borrow_mut().push(priority));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    PRIORITY_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// The currently active priority, defaulting to `Normal` when the stack is
/// empty.
pub fn current() -> Priority {
    current_scoped().unwrap_or(Priority::Normal)
}

/// The active priority only if a `with` scope is open, `None` otherwise.
/// Lets `Chunker::effective_profile` tell "no scope open, use
/// `ChunkerConfig`'s own `timeout`/`max_retries`" apart from "an explicit
/// `Normal` scope is open, use the priority table's `Normal` entry" (spec.md
/// §4.8) — `current()` keeps defaulting to `Normal` for every other caller.
pub fn current_scoped() -> Option<Priority> {
    PRIORITY_STACK.with(|stack| stack.borrow().last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_normal() {
        assert_eq!(current(), Priority::Normal);
    }

    #[test]
    fn nested_scopes_restore_previous_priority() {
        with(Priority::High, || {
            assert_eq!(current(), Priority::High);
            with(Priority::Background, || {
                assert_eq!(current(), Priority::Background);
            });
            assert_eq!(current(), Priority::High);
        });
        assert_eq!(current(), Priority::Normal);
    }

    #[test]
    fn priority_table_matches_spec() {
        let high = Priority::High.profile();
        assert_eq!(high.timeout, Duration::from_secs(60));
        assert_eq!(high.max_retries, 5);
        assert_eq!(high.batch_size_multiplier, 0.5);

        let background = Priority::Background.profile();
        assert_eq!(background.timeout, Duration::from_secs(600));
        assert_eq!(background.max_retries, 1);
        assert_eq!(background.batch_size_multiplier, 1.5);
    }
}
