mod worker;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::event::ChannelSink;
use crate::tlog;

pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(2 * 3600);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Everything a worker needs that is shared across all hosts.
#[derive(Debug)]
pub struct ExecutorConfig {
    pub max_concurrent: usize,
    pub connect_timeout: Duration,
    pub build_timeout: Duration,
    pub idle_timeout: Duration,
    pub tarball: PathBuf,
    pub agent_script: String,
}

/// Admits up to `max_concurrent` hosts into the active pool, one worker
/// thread per admitted host. Admission is FIFO; the controller pumps the
/// queue again whenever a worker reaches a terminal event.
pub struct Executor {
    config: Arc<ExecutorConfig>,
    queue: VecDeque<String>,
    active: HashMap<String, JoinHandle<()>>,
    finished: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    sink: ChannelSink,
}

impl Executor {
    pub fn new(config: ExecutorConfig, sink: ChannelSink) -> Self {
        assert!(config.max_concurrent >= 1);
        Self {
            config: Arc::new(config),
            queue: VecDeque::new(),
            active: HashMap::new(),
            finished: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    pub fn enqueue(&mut self, host_key: String) {
        self.queue.push_back(host_key);
    }

    /// Begin execution; returns immediately. Completion is observed through
    /// the event channel.
    pub fn start(&mut self) {
        self.pump_admissions();
    }

    /// The controller calls this after a host's terminal event; the freed
    /// slot admits the next queued host.
    pub fn on_host_finished(&mut self, host_key: &str) {
        if let Some(handle) = self.active.remove(host_key) {
            self.finished.push(handle);
        }
        self.pump_admissions();
    }

    fn pump_admissions(&mut self) {
        if self.is_cancelled() {
            return;
        }
        while self.active.len() < self.config.max_concurrent {
            let Some(host_key) = self.queue.pop_front() else {
                break;
            };
            tlog!(
                debug,
                "admitting {} ({} queued, {} active)",
                host_key,
                self.queue.len(),
                self.active.len()
            );
            let config = Arc::clone(&self.config);
            let cancel = Arc::clone(&self.cancel);
            let sink = self.sink.clone();
            let key = host_key.clone();
            let handle = std::thread::spawn(move || worker::run(key, config, cancel, sink));
            self.active.insert(host_key, handle);
        }
    }

    /// Request cooperative shutdown of all workers. Idempotent; queued hosts
    /// are never admitted afterwards.
    pub fn cancel_all(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.queue.clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Block until every spawned worker has exited.
    pub fn wait(&mut self) {
        for (_, handle) in self.active.drain() {
            let _ = handle.join();
        }
        for handle in self.finished.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_channel;

    fn test_executor(max_concurrent: usize) -> Executor {
        let (sink, _rx) = event_channel();
        // _rx dropped: sends become no-ops, which ChannelSink tolerates.
        Executor::new(
            ExecutorConfig {
                max_concurrent,
                connect_timeout: Duration::from_secs(1),
                build_timeout: Duration::from_secs(1),
                idle_timeout: Duration::from_secs(1),
                tarball: PathBuf::from("/tmp/t.tgz"),
                agent_script: String::new(),
            },
            sink,
        )
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut exec = test_executor(1);
        exec.enqueue("u@a".to_string());
        exec.enqueue("u@b".to_string());
        assert_eq!(exec.queued_count(), 2);
        assert_eq!(exec.queue.front().map(|s| s.as_str()), Some("u@a"));
    }

    #[test]
    fn test_cancel_is_idempotent_and_clears_queue() {
        let mut exec = test_executor(2);
        exec.enqueue("u@a".to_string());
        exec.cancel_all();
        assert!(exec.is_cancelled());
        assert_eq!(exec.queued_count(), 0);
        exec.cancel_all();
        assert!(exec.is_cancelled());
    }

    #[test]
    fn test_no_admission_after_cancel() {
        let mut exec = test_executor(4);
        exec.cancel_all();
        exec.enqueue("u@a".to_string());
        exec.start();
        assert_eq!(exec.active_count(), 0);
        assert_eq!(exec.queued_count(), 1);
    }

    #[test]
    fn test_wait_with_no_workers_returns() {
        let mut exec = test_executor(1);
        exec.wait();
    }

    #[test]
    #[should_panic]
    fn test_zero_concurrency_rejected() {
        let _ = test_executor(0);
    }
}
