/// Fill control loop
/// One sequential flow: poll the controller, decide whether a fill is due,
/// command the fill, wait out the controller's own ceiling fill duration,
/// re-poll, and evaluate the per-line outcome. Blocking network calls and
/// blocking sleeps are the only suspension points, so none of the shared
/// state needs locking.
///
/// Failure handling is deliberately asymmetric: network faults are expected
/// and transient, so they burn the shared retry budget; a status that fails
/// to parse means the protocol itself no longer matches and retrying cannot
/// help, so it terminates the loop after a final notification.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::Fetcher;
use crate::history::FillHistoryStore;
use crate::log_line;
use crate::notify::Notifier;
use crate::plot::PlotRenderer;
use crate::retry::RetryPolicy;
use crate::status::{self, FillOutcome, ParsedStatus};

/// Classification of a failed fill, from the sign-encoded elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Ended before the minimum plausible duration
    TooShort,
    /// Ran past the maximum allowed duration
    Timeout,
    /// Elapsed time of exactly zero; the controller should never report this
    UnexpectedZero,
    /// Elapsed value outside both known bands (between them, or positive)
    UnknownCondition,
}

/// On failure the controller reports the elapsed time negated, so the two
/// known bands are [-min, 0) for a too-short fill and (-inf, -max] for a
/// timeout. The gap strictly between them is reachable on the wire and is
/// surfaced as an anomaly rather than guessed away.
pub fn classify_failure(elapsed: i32, min_fill_time: u32, max_fill_time: u32) -> FailureClass {
    if elapsed == 0 {
        FailureClass::UnexpectedZero
    } else if elapsed < 0 && elapsed >= -(min_fill_time as i32) {
        FailureClass::TooShort
    } else if elapsed <= -(max_fill_time as i32) {
        FailureClass::Timeout
    } else {
        FailureClass::UnknownCondition
    }
}

/// Result of evaluating one fill cycle across all lines.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeReport {
    pub message: String,
    pub fail_count: u32,
    pub active_count: u32,
    pub inactive_count: u32,
}

/// Which network exchange a cycle is performing; both share one retry budget.
#[derive(Debug, Clone, Copy)]
enum Exchange {
    Status,
    FillCommand,
}

impl Exchange {
    fn describe(self) -> &'static str {
        match self {
            Exchange::Status => "fetching status message",
            Exchange::FillCommand => "initiating fill",
        }
    }
}

/// What a single pass through the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fill not due yet, nothing commanded
    Idle,
    /// A fill was commanded and its outcome evaluated
    Filled,
}

/// Process-wide control timing, owned and mutated only by the controller.
#[derive(Debug, Clone)]
pub struct ControlContext {
    pub poll_interval: Duration,
    pub fill_interval: Duration,
    /// None until the first fill of this process completes (first run fills
    /// immediately)
    pub last_fill: Option<DateTime<Utc>>,
}

pub struct FillController<F: Fetcher, N: Notifier> {
    fetcher: F,
    notifier: N,
    retry: RetryPolicy,
    history: FillHistoryStore,
    plot: Option<Box<dyn PlotRenderer>>,
    ctx: ControlContext,
    record_path: PathBuf,
    /// Injection point for blocking waits; tests swap in a no-op
    sleeper: fn(Duration),
}

impl<F: Fetcher, N: Notifier> FillController<F, N> {
    pub fn new(
        fetcher: F,
        notifier: N,
        retry: RetryPolicy,
        history: FillHistoryStore,
        plot: Option<Box<dyn PlotRenderer>>,
        ctx: ControlContext,
        record_path: &Path,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            retry,
            history,
            plot,
            ctx,
            record_path: record_path.to_path_buf(),
            sleeper: std::thread::sleep,
        }
    }

    /// Replace the blocking-wait primitive (used by tests to skip real sleeps).
    pub fn with_sleeper(mut self, sleeper: fn(Duration)) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn history(&self) -> &FillHistoryStore {
        &self.history
    }

    /// Run forever, one cycle per poll interval, until a terminal failure.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.run_cycle()?;
            (self.sleeper)(self.ctx.poll_interval);
        }
    }

    /// One full pass: poll, fill if due, evaluate.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let raw = self.exchange(Exchange::Status)?;
        let status = self.parse_or_terminate(&raw)?;

        if !self.fill_due() {
            return Ok(CycleOutcome::Idle);
        }

        log_line("Initiating fill...");
        let ack = self.exchange(Exchange::FillCommand)?;
        if let Some(first) = String::from_utf8_lossy(&ack).lines().next() {
            log_line(&format!("Fill command acknowledged: {first}"));
        }

        // The controller's own report declares the ceiling fill duration, so
        // a fixed grace period of MaxFillTime + 1 is enough before re-polling.
        log_line(&format!(
            "Waiting for fill timeout ({} seconds)...",
            status.max_fill_time
        ));
        (self.sleeper)(Duration::from_secs(u64::from(status.max_fill_time) + 1));
        log_line("MaxFillTime expired, checking fill status...");

        let raw = self.exchange(Exchange::Status)?;
        let status = self.parse_or_terminate(&raw)?;

        self.evaluate_and_report(&status)?;
        self.ctx.last_fill = Some(Utc::now());
        Ok(CycleOutcome::Filled)
    }

    /// A fill is due when the fill interval has elapsed, or on first run.
    fn fill_due(&self) -> bool {
        match self.ctx.last_fill {
            None => true,
            Some(t) => {
                let since = Utc::now().signed_duration_since(t);
                since.num_seconds() > self.ctx.fill_interval.as_secs() as i64
            }
        }
    }

    /// Perform one network exchange under the shared retry budget. Exhausting
    /// the budget sends the terminal notification and errors out of the loop.
    fn exchange(&mut self, which: Exchange) -> Result<Vec<u8>> {
        loop {
            let result = match which {
                Exchange::Status => self.fetcher.fetch_status(),
                Exchange::FillCommand => self.fetcher.send_fill_command(),
            };
            match result {
                Ok(bytes) => {
                    self.retry.record_success();
                    return Ok(bytes);
                }
                Err(err) => {
                    log_line(&format!("=== Network error {}: {err} ===", which.describe()));
                    self.retry.record_failure();
                    if !self.retry.should_retry() {
                        log_line("=== Maximum retries reached! ===");
                        self.notify(
                            "Cannot communicate with fill controller - max retries reached!",
                            &[],
                        );
                        return Err(anyhow!(
                            "gave up {} after {} failures",
                            which.describe(),
                            self.retry.failures()
                        ));
                    }
                    (self.sleeper)(self.retry.backoff_duration());
                }
            }
        }
    }

    /// A malformed status is a protocol mismatch, never retried: dump the raw
    /// payload, notify, and terminate.
    fn parse_or_terminate(&mut self, raw: &[u8]) -> Result<ParsedStatus> {
        match status::parse(raw) {
            Ok(status) => Ok(status),
            Err(err) => {
                let payload = String::from_utf8_lossy(raw).into_owned();
                log_line(&format!("=== Cannot parse status: {err} ==="));
                log_line("Bad status as follows:");
                println!("{payload}");
                self.notify(
                    &format!("Error parsing status message ({err}):\n\n{payload}"),
                    &[],
                );
                Err(anyhow!("status parse failed: {err}"))
            }
        }
    }

    /// Evaluate the post-fill status, update the duration history, render the
    /// report artifact, and notify subscribers.
    fn evaluate_and_report(&mut self, status: &ParsedStatus) -> Result<()> {
        let report = evaluate_outcome(status, &mut self.history);
        log_line(&report.message);

        let mut attachments = Vec::new();
        match self.plot.as_ref().map(|p| p.render(status, &self.history)) {
            Some(Ok(path)) => attachments.push(path),
            Some(Err(err)) => log_line(&format!("Fill report rendering failed: {err}")),
            None => {}
        }
        // Remember this fill's ADC traces for the next report's comparison
        for (idx, samples) in status.line_fill_samples.iter().enumerate() {
            self.history.set_last_fill(idx as u32 + 1, samples.clone());
        }

        self.notify(&report.message, &attachments);
        self.history.save(&self.record_path)?;
        Ok(())
    }

    /// Notification failures are logged, never fatal to the loop.
    fn notify(&self, message: &str, attachments: &[PathBuf]) {
        if let Err(err) = self.notifier.notify(message, attachments) {
            log_line(&format!("Notification failed: {err}"));
        }
    }
}

/// Build the per-line outcome report and append each active line's duration
/// to the history. Pure apart from the history mutation, for testability.
pub fn evaluate_outcome(status: &ParsedStatus, history: &mut FillHistoryStore) -> OutcomeReport {
    let mut fail_count = 0;
    let mut active_count = 0;
    let mut inactive_count = 0;

    let mut body = format!(
        "Current Min/Max/Hold time = {}/{}/{} s\n",
        status.min_fill_time, status.max_fill_time, status.fill_hold_time
    );

    for line in &status.lines {
        if !line.active {
            body.push_str(&format!("Line {} inactive.\n", line.number));
            inactive_count += 1;
            continue;
        }
        body.push_str(&format!("Line {} active. ", line.number));
        active_count += 1;
        match line.outcome {
            FillOutcome::Success => {
                body.push_str(&format!("Fill Success!!! ({}s)\n", line.elapsed_seconds));
            }
            FillOutcome::Failure => {
                let t = line.elapsed_seconds;
                let banner = match classify_failure(t, status.min_fill_time, status.max_fill_time)
                {
                    FailureClass::TooShort => {
                        format!("!!!!!!!!! FILL FAILED ({t}s) TOO SHORT !!!!!!!!!!\n")
                    }
                    FailureClass::Timeout => {
                        format!("!!!!!!!!! FILL FAILED ({t}s) TIMEOUT !!!!!!!!!!\n")
                    }
                    FailureClass::UnexpectedZero => {
                        format!("!!!!! FILL FAILED ({t}s) t=0 (not expecting this) !!!!!!!!!!\n")
                    }
                    FailureClass::UnknownCondition => {
                        format!("!!!!!!!!! FILL FAILED ({t}s) UNKNOWN CONDITION !!!!!!!!!!\n")
                    }
                };
                body.push_str(&banner);
                fail_count += 1;
            }
        }
        history.append(line.number, line.elapsed_seconds.unsigned_abs());
    }

    let message = if fail_count > 0 {
        format!("ATTENTION - {fail_count} failure(s) out of {active_count} active lines!!\n{body}")
    } else {
        format!("Looks good!\n{body}")
    };

    OutcomeReport {
        message,
        fail_count,
        active_count,
        inactive_count,
    }
}

// ============================================================================
// Tests
// ============================================================================
