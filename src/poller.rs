//! A background poller thread that periodically fetches flag definitions and publishes them to a
//! [`FlagStore`].
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use rand::{thread_rng, Rng};

use crate::{
    error_sink::ErrorSink,
    fetcher::FlagSource,
    flag_store::{FlagSnapshot, FlagStore},
    Error, Result,
};

/// Configuration for [`PollerThread`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval to wait between requests for flag definitions.
    ///
    /// Defaults to [`PollerConfig::DEFAULT_POLL_INTERVAL`].
    pub interval: Duration,
    /// Randomized duration subtracted from each interval. This helps to avoid multiple server
    /// instances synchronizing and producing spiky network load.
    ///
    /// Defaults to [`PollerConfig::DEFAULT_POLL_JITTER`].
    pub jitter: Duration,
}

impl PollerConfig {
    /// Default value for [`PollerConfig::interval`].
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
    /// Default value for [`PollerConfig::jitter`].
    pub const DEFAULT_POLL_JITTER: Duration = Duration::from_secs(30);
    /// Lower bound on the wait between two polls, whatever the interval and jitter.
    pub const MIN_POLL_WAIT: Duration = Duration::from_millis(10);

    pub fn new() -> PollerConfig {
        PollerConfig::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> PollerConfig {
        self.interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> PollerConfig {
        self.jitter = jitter;
        self
    }
}

impl Default for PollerConfig {
    fn default() -> PollerConfig {
        PollerConfig {
            interval: PollerConfig::DEFAULT_POLL_INTERVAL,
            jitter: PollerConfig::DEFAULT_POLL_JITTER,
        }
    }
}

/// Lifecycle of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No flags have been loaded yet.
    Uninitialized,
    /// A fetch is in flight.
    Loading,
    /// Flags have been loaded at least once and no fetch is in flight.
    Ready,
    /// Stop was requested; the thread has not exited yet.
    ShuttingDown,
    /// The thread has exited. Terminal.
    Stopped,
}

#[derive(Debug)]
enum Command {
    Reload,
    Stop,
}

/// A flag definition poller thread.
///
/// The thread fetches flags immediately on start, then every [`PollerConfig::interval`] and
/// whenever [`PollerThread::force_reload`] is called. It is the only writer of the store.
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send commands to the poller thread.
    command_sender: SyncSender<Command>,

    /// Set once stop has been requested, in case the command buffer was full.
    stop_requested: Arc<AtomicBool>,

    state: Arc<Mutex<PollerState>>,

    store: Arc<FlagStore>,
}

// Reload commands are coalesced, so a small buffer is enough.
const COMMAND_BUFFER: usize = 4;

impl PollerThread {
    /// Starts the poller thread.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the thread failed to spawn.
    pub fn start(
        source: impl FlagSource + Send + 'static,
        store: Arc<FlagStore>,
        error_sink: Arc<dyn ErrorSink + Send + Sync>,
        config: PollerConfig,
    ) -> Result<PollerThread> {
        let (command_sender, command_receiver) =
            std::sync::mpsc::sync_channel::<Command>(COMMAND_BUFFER);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(PollerState::Uninitialized));

        let join_handle = {
            let worker = Worker {
                source,
                store: Arc::clone(&store),
                error_sink,
                config,
                commands: command_receiver,
                stop_requested: Arc::clone(&stop_requested),
                state: Arc::clone(&state),
            };

            std::thread::Builder::new()
                .name("featureflags-poller".to_owned())
                .spawn(move || {
                    let state = Arc::clone(&worker.state);
                    let store = Arc::clone(&worker.store);

                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        worker.run()
                    }));
                    if result.is_err() {
                        log::error!(target: "featureflags", "poller thread panicked");
                    }

                    // Readers still waiting for the first load must not hang.
                    store.close();
                    set_state(&state, PollerState::Stopped);
                })?
        };

        Ok(PollerThread {
            join_handle,
            command_sender,
            stop_requested,
            state,
            store,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request an out-of-band refresh. Requests made while a refresh is pending are coalesced.
    pub fn force_reload(&self) {
        // A full buffer means a reload is already queued. A disconnected channel means the thread
        // has exited.
        let _ = self.command_sender.try_send(Command::Reload);
    }

    /// Stop the poller thread.
    ///
    /// Readers waiting for the first load are released immediately. This function does not wait
    /// for the thread to actually stop, and an in-flight fetch is not aborted.
    pub fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != PollerState::Stopped {
                *state = PollerState::ShuttingDown;
            }
        }
        self.store.close();
        // If the buffer is full, the thread wakes up on a pending reload and sees
        // `stop_requested`.
        let _ = self.command_sender.try_send(Command::Stop);
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the thread has panicked.
    pub fn shutdown(self) -> Result<()> {
        // Send stop signal in case it wasn't sent before.
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

struct Worker<S> {
    source: S,
    store: Arc<FlagStore>,
    error_sink: Arc<dyn ErrorSink + Send + Sync>,
    config: PollerConfig,
    commands: Receiver<Command>,
    stop_requested: Arc<AtomicBool>,
    state: Arc<Mutex<PollerState>>,
}

impl<S: FlagSource> Worker<S> {
    fn run(mut self) {
        loop {
            if self.should_stop() {
                return;
            }
            self.refresh();

            let timeout = poll_wait(&self.config);
            match self.commands.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    // Timed out. Loop back to fetch new flags.
                }
                Ok(Command::Reload) => {
                    log::debug!(target: "featureflags", "poller thread received reload command");
                    if self.drain_pending_reloads() {
                        return;
                    }
                }
                Ok(Command::Stop) => {
                    log::debug!(target: "featureflags", "poller thread received stop command");
                    return;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // The handle was dropped, nobody can stop us or read the state anymore.
                    log::debug!(target: "featureflags", "poller thread received disconnected");
                    return;
                }
            }
        }
    }

    /// Collapse queued reloads into the upcoming one. Returns `true` if stop was requested.
    fn drain_pending_reloads(&self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(Command::Reload) => {}
                Ok(Command::Stop) | Err(TryRecvError::Disconnected) => return true,
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn refresh(&mut self) {
        self.transition(PollerState::Loading);

        // Fetching outside of any lock; the store only locks for the swap.
        match self.source.fetch_flags() {
            Ok(definitions) => {
                let snapshot = FlagSnapshot::from_definitions(definitions);
                log::debug!(target: "featureflags", active = snapshot.len(); "publishing flag definitions");
                self.store.set_snapshot(snapshot);
            }
            Err(err) => {
                // Previous snapshot stays in place; retry on the next tick.
                log::warn!(target: "featureflags", "unable to fetch feature flags: {err}");
                self.error_sink.report("unable to fetch feature flags", &err);
            }
        }

        self.transition(if self.store.is_loaded() {
            PollerState::Ready
        } else {
            PollerState::Uninitialized
        });
    }

    /// Move to `next` unless a stop was requested in the meantime.
    fn transition(&self, next: PollerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, PollerState::ShuttingDown | PollerState::Stopped) {
            *state = next;
        }
    }
}

fn set_state(state: &Mutex<PollerState>, next: PollerState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Time to wait before the next poll, never below [`PollerConfig::MIN_POLL_WAIT`].
fn poll_wait(config: &PollerConfig) -> Duration {
    jitter(config.interval, config.jitter).max(PollerConfig::MIN_POLL_WAIT)
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}

#[cfg(test)]
mod jitter_tests {
    use std::time::Duration;

    use super::PollerConfig;

    #[test]
    fn poll_wait_has_a_floor() {
        let config = PollerConfig::new()
            .with_interval(Duration::ZERO)
            .with_jitter(Duration::ZERO);
        assert_eq!(super::poll_wait(&config), PollerConfig::MIN_POLL_WAIT);

        let config = PollerConfig::new()
            .with_interval(Duration::from_millis(5))
            .with_jitter(Duration::from_secs(1));
        assert_eq!(super::poll_wait(&config), PollerConfig::MIN_POLL_WAIT);
    }

    #[test]
    fn poll_wait_keeps_longer_intervals() {
        let config = PollerConfig::new()
            .with_interval(Duration::from_secs(30))
            .with_jitter(Duration::ZERO);
        assert_eq!(super::poll_wait(&config), Duration::from_secs(30));
    }

    #[test]
    fn jitter_is_subtractive() {
        let interval = Duration::from_secs(30);
        let jitter = Duration::from_secs(30);

        let result = super::jitter(interval, jitter);

        assert!(result <= interval, "{result:?} must be <= {interval:?}");
    }

    #[test]
    fn jitter_truncates_to_zero() {
        let result = super::jitter(Duration::ZERO, Duration::from_secs(30));

        assert_eq!(result, Duration::ZERO);
    }

    #[test]
    fn jitter_works_with_zero_jitter() {
        let interval = Duration::from_secs(30);

        let result = super::jitter(interval, Duration::ZERO);

        assert_eq!(result, interval);
    }
}
