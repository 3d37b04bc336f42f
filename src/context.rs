//! Explicit replacement for the source's process-wide interpreter control
//! block (SPEC_FULL.md §4.14, §9 "Global interpreter state"): a `Context`
//! value threaded through every core operation, carrying configuration,
//! the cooperative cancellation flag, and the bounded worker pool used for
//! read-only traversals (SPEC_FULL.md §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use threadpool::ThreadPool;

use crate::config::SurgeonConfig;

/// Threaded through surgical operations in place of global state. Cheap to
/// clone: the pool and abort flag are shared behind `Arc`.
#[derive(Clone)]
pub struct Context {
    config: Arc<SurgeonConfig>,
    abort: Arc<AtomicBool>,
    pool: Option<Arc<ThreadPool>>,
}

impl Context {
    pub fn new(config: SurgeonConfig) -> Self {
        let pool = if config.worker_pool_size > 1 {
            Some(Arc::new(ThreadPool::new(config.worker_pool_size)))
        } else {
            None
        };
        Context {
            config: Arc::new(config),
            abort: Arc::new(AtomicBool::new(false)),
            pool,
        }
    }

    pub fn config(&self) -> &SurgeonConfig {
        &self.config
    }

    /// Set by SIGINT delivery or a recoverable command error
    /// (SPEC_FULL.md §5, §7). Logs once per rising edge, so a caller that
    /// calls this repeatedly while already aborted doesn't spam the log.
    pub fn request_abort(&self) {
        if !self.abort.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                "{}",
                crate::errors::colorize_aborted("operation aborted, unwinding to caller")
            );
        }
    }

    pub fn should_abort(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Clears the abort flag after a recoverable error, as the source does
    /// unless `--relax` is off (SPEC_FULL.md §7's exit-code rule).
    pub fn recover(&self) {
        if !self.config.relax {
            self.abort.store(false, Ordering::SeqCst);
        }
    }

    /// Runs `hook` over every index in `0..len` using the bounded worker
    /// pool when configured for more than one worker, or serially
    /// otherwise. `hook` must be read-only and order-independent
    /// (SPEC_FULL.md §5); results are collected via `collect`, called
    /// under a mutex so the caller can use ordinary (non-atomic) state.
    pub fn for_each_index<F>(&self, len: usize, hook: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        match &self.pool {
            Some(pool) => {
                let hook = Arc::new(hook);
                for i in 0..len {
                    let hook = Arc::clone(&hook);
                    pool.execute(move || hook(i));
                }
                pool.join();
            }
            None => {
                for i in 0..len {
                    hook(i);
                }
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(SurgeonConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn abort_flag_round_trips() {
        let ctx = Context::default();
        assert!(!ctx.should_abort());
        ctx.request_abort();
        assert!(ctx.should_abort());
        ctx.recover();
        assert!(!ctx.should_abort());
    }

    #[test]
    fn relaxed_context_keeps_abort_set_after_recover() {
        let mut cfg = SurgeonConfig::default();
        cfg.relax = true;
        let ctx = Context::new(cfg);
        ctx.request_abort();
        ctx.recover();
        assert!(ctx.should_abort());
    }

    #[test]
    fn for_each_index_visits_every_index_serially() {
        let mut cfg = SurgeonConfig::default();
        cfg.worker_pool_size = 1;
        let ctx = Context::new(cfg);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        ctx.for_each_index(5, move |i| seen2.lock().unwrap().push(i));
        let mut got = seen.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn for_each_index_visits_every_index_pooled() {
        let mut cfg = SurgeonConfig::default();
        cfg.worker_pool_size = 4;
        let ctx = Context::new(cfg);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        ctx.for_each_index(50, move |i| seen2.lock().unwrap().push(i));
        let mut got = seen.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, (0..50).collect::<Vec<_>>());
    }
}
