//! Thread-local naming scopes
//!
//! Each thread keeps its own stack of context names. The innermost name tags
//! every record the profiler takes on that thread. Scopes are RAII guards, so
//! a panicking closure still pops its scope while unwinding.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Arc<str>>> = const { RefCell::new(Vec::new()) };
}

/// Closes its context when dropped
///
/// Dropping a guard also closes every scope opened after it, so guards
/// dropped out of order never leave a stale name behind.
/// Not `Send`: the guard must drop on the thread that pushed it.
#[must_use = "the context is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    /// Stack length before this scope was pushed
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            if let Ok(mut stack) = stack.try_borrow_mut() {
                stack.truncate(self.depth);
            }
        });
    }
}

/// Enter a named scope on the current thread
pub fn context_scope(name: &str) -> ContextGuard {
    let name: Arc<str> = Arc::from(name);
    let depth = CONTEXT_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(name);
        stack.len() - 1
    });
    ContextGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// Innermost context of the current thread
pub fn current_context() -> Option<Arc<str>> {
    CONTEXT_STACK
        .try_with(|stack| stack.try_borrow().ok().and_then(|stack| stack.last().cloned()))
        .ok()
        .flatten()
}

/// Number of open scopes on the current thread
pub fn context_depth() -> usize {
    CONTEXT_STACK
        .try_with(|stack| stack.try_borrow().map_or(0, |stack| stack.len()))
        .unwrap_or(0)
}

/// Run `f` inside the scope `name`
pub fn with_context<R>(name: &str, f: impl FnOnce() -> R) -> R {
    let _guard = context_scope(name);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn out_of_order_drop_closes_inner_scopes() {
        let outer = context_scope("outer");
        let inner = context_scope("inner");
        drop(outer);
        assert_eq!(current_context(), None);
        assert_eq!(context_depth(), 0);

        drop(inner);
        assert_eq!(context_depth(), 0);

        let _next = context_scope("next");
        assert_eq!(current_context().as_deref(), Some("next"));
    }

    #[test]
    fn scopes_nest_and_unwind() {
        assert_eq!(current_context(), None);
        {
            let _outer = context_scope("forward");
            assert_eq!(current_context().as_deref(), Some("forward"));
            {
                let _inner = context_scope("attention");
                assert_eq!(current_context().as_deref(), Some("attention"));
                assert_eq!(context_depth(), 2);
            }
            assert_eq!(current_context().as_deref(), Some("forward"));
        }
        assert_eq!(current_context(), None);
        assert_eq!(context_depth(), 0);
    }

    #[test]
    fn panic_inside_scope_still_pops() {
        let result = panic::catch_unwind(|| {
            with_context("exploding", || {
                assert_eq!(current_context().as_deref(), Some("exploding"));
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert_eq!(context_depth(), 0);
    }

    #[test]
    fn stacks_are_per_thread() {
        let _guard = context_scope("main-thread");
        let seen = std::thread::spawn(current_context).join().unwrap();
        assert_eq!(seen, None);
        assert_eq!(current_context().as_deref(), Some("main-thread"));
    }

    #[test]
    fn with_context_returns_value() {
        let value = with_context("sum", || (1..=4).sum::<i32>());
        assert_eq!(value, 10);
        assert_eq!(context_depth(), 0);
    }
}
