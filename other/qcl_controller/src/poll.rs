//! Wait for scans to complete by polling the remaining scan count.
//!
//! All variants share one loop. They only differ in how they sleep between polls: the blocking
//! variants sleep the thread, the background watcher waits on its cancel channel so that a
//! cancellation takes effect immediately.

use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use instrumentrs::{InstrumentError, InstrumentInterface};

use crate::{Qcl, ScanMode};

/// Poll intervals below this make the controller miss commands.
const MIN_RECOMMENDED_INTERVAL: Duration = Duration::from_secs(2);

/// Timing and behavior of a scan poller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOptions {
    /// Time between two polls of the scan count.
    pub interval: Duration,
    /// Time to wait after the scan started before the first poll of a manual stepscan.
    pub grace: Duration,
    /// Advance a manual stepscan by one step before every poll except the first.
    pub manual_step: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            interval: MIN_RECOMMENDED_INTERVAL,
            grace: Duration::from_secs(1),
            manual_step: false,
        }
    }
}

impl PollOptions {
    /// Default options for the given scan mode: manual stepscans are stepped by the poller.
    pub fn for_mode(mode: ScanMode) -> Self {
        PollOptions {
            manual_step: mode == ScanMode::ManualStepscan,
            ..Default::default()
        }
    }
}

/// Progress reported after every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// Number of the poll, starting at 1.
    pub poll: usize,
    /// Scan cycles remaining, as reported by the controller.
    pub remaining: u32,
    /// The output wavenumber in cm⁻¹, only read when stepping a manual stepscan.
    pub output_wavenumber: Option<f64>,
}

/// How a poller ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan count reached zero.
    Completed,
    /// The poller was cancelled before the scan count reached zero.
    Cancelled,
}

/// The poll loop.
///
/// `sleep` is called with the time to wait and returns `false` if the poller was cancelled in
/// the meantime.
pub(crate) fn run_poll_loop<T, S, F>(
    qcl: &mut Qcl<T>,
    opts: &PollOptions,
    mut sleep: S,
    mut on_progress: F,
) -> Result<ScanOutcome, InstrumentError>
where
    T: InstrumentInterface,
    S: FnMut(Duration) -> bool,
    F: FnMut(&ScanProgress),
{
    if opts.interval < MIN_RECOMMENDED_INTERVAL {
        tracing::warn!(
            interval = ?opts.interval,
            recommended = ?MIN_RECOMMENDED_INTERVAL,
            "poll interval is shorter than recommended"
        );
    }

    if opts.manual_step && !sleep(opts.grace) {
        return Ok(ScanOutcome::Cancelled);
    }

    let mut poll = 0;
    loop {
        poll += 1;
        if opts.manual_step && poll > 1 {
            qcl.step_next()?;
        }
        let remaining = qcl.get_scan_count()?;
        let output_wavenumber = if opts.manual_step {
            Some(qcl.get_output_wavenumber()?)
        } else {
            None
        };
        tracing::debug!(poll, remaining, "polled scan count");
        on_progress(&ScanProgress {
            poll,
            remaining,
            output_wavenumber,
        });

        if remaining == 0 {
            return Ok(ScanOutcome::Completed);
        }
        if !sleep(opts.interval) {
            return Ok(ScanOutcome::Cancelled);
        }
    }
}

impl<T: InstrumentInterface> Qcl<T> {
    /// Block until the running scan completes.
    ///
    /// Polls the scan count every `opts.interval` until it reaches zero. The manual step flag of
    /// the options is ignored, use [`Qcl::wait_for_stepscan`] to drive a manual stepscan.
    pub fn wait_for_scan(&mut self, opts: &PollOptions) -> Result<(), InstrumentError> {
        let opts = PollOptions {
            manual_step: false,
            ..*opts
        };
        run_poll_loop(
            self,
            &opts,
            |d| {
                thread::sleep(d);
                true
            },
            |_| {},
        )?;
        Ok(())
    }

    /// Drive a manual stepscan and block until it completes.
    ///
    /// Waits `opts.grace` first, then moves one step before every poll except the first. Each
    /// poll is reported to `on_progress`, including the output wavenumber.
    pub fn wait_for_stepscan<F>(
        &mut self,
        opts: &PollOptions,
        on_progress: F,
    ) -> Result<(), InstrumentError>
    where
        F: FnMut(&ScanProgress),
    {
        let opts = PollOptions {
            manual_step: true,
            ..*opts
        };
        run_poll_loop(
            self,
            &opts,
            |d| {
                thread::sleep(d);
                true
            },
            on_progress,
        )?;
        Ok(())
    }
}

impl<T: InstrumentInterface + Send + 'static> Qcl<T> {
    /// Watch the running scan on a background thread.
    ///
    /// The watcher polls a clone of this driver, so every exchange is still serialized with
    /// the ones made from this thread. Whether a manual stepscan is stepped is taken from
    /// `opts`, see [`PollOptions::for_mode`].
    ///
    /// Dropping the returned [`ScanWatch`] cancels the watcher.
    pub fn watch_scan(&self, opts: &PollOptions) -> Result<ScanWatch, InstrumentError> {
        let (cancel_tx, cancel_rx) = channel::bounded::<()>(1);
        let (progress_tx, progress_rx) = channel::unbounded();
        let (done_tx, done_rx) = channel::bounded(1);

        let mut qcl = self.clone();
        let opts = *opts;
        let handle = thread::Builder::new()
            .name("qcl-scan-watch".to_string())
            .spawn(move || {
                let sleep = |d: Duration| matches!(cancel_rx.recv_timeout(d), Err(RecvTimeoutError::Timeout));
                let result = run_poll_loop(&mut qcl, &opts, sleep, |p| {
                    // Nobody listening is fine.
                    let _ = progress_tx.send(p.clone());
                });
                tracing::debug!(result = ?result, "scan watcher finished");
                let _ = done_tx.send(result);
            })?;

        Ok(ScanWatch {
            cancel: Some(cancel_tx),
            progress: progress_rx,
            done: done_rx,
            handle: Some(handle),
        })
    }
}

/// Handle to a scan watcher running in the background.
///
/// The watcher is cancelled when the handle is dropped.
#[derive(Debug)]
pub struct ScanWatch {
    cancel: Option<Sender<()>>,
    progress: Receiver<ScanProgress>,
    done: Receiver<Result<ScanOutcome, InstrumentError>>,
    handle: Option<JoinHandle<()>>,
}

impl ScanWatch {
    /// Stop the watcher.
    ///
    /// An exchange that is in progress is finished first. Calling this more than once has no
    /// effect.
    pub fn cancel(&mut self) {
        if self.cancel.take().is_some() {
            tracing::debug!("cancelling scan watcher");
        }
    }

    /// Progress of every poll, in order.
    pub fn progress(&self) -> &Receiver<ScanProgress> {
        &self.progress
    }

    /// Whether the watcher thread has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Block until the watcher ends and return how it ended.
    ///
    /// Errors of the controller that stopped the watcher are returned as they are.
    pub fn wait(mut self) -> Result<ScanOutcome, InstrumentError> {
        let result = self
            .done
            .recv()
            .map_err(|_| InstrumentError::PollerDisconnected)?;
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| InstrumentError::PollerDisconnected)?;
        }
        result
    }
}

impl Drop for ScanWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}
