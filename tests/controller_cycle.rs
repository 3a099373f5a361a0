// Integration tests for the fill control loop
//
// Drives FillController through full cycles with a scripted fetcher and a
// recording notifier: retry exhaustion, fatal parse failures, and the
// fill/evaluate happy path with history persistence.

use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use ln2_autofill::controller::{ControlContext, CycleOutcome, FillController};
use ln2_autofill::plot::{FillReportRenderer, PlotRenderer};
use ln2_autofill::{Fetcher, FillHistoryStore, NetworkError, Notifier, RetryPolicy};
use tempfile::TempDir;

// ============================================================================
// Test doubles
// ============================================================================

/// Plays back a fixed script of responses; panics on any call past the end,
/// which is how the "no further network calls" guarantees are asserted.
#[derive(Clone)]
struct ScriptedFetcher {
    script: Rc<RefCell<VecDeque<Result<Vec<u8>, NetworkError>>>>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedFetcher {
    fn new(script: Vec<Result<Vec<u8>, NetworkError>>) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.into())),
            calls: Rc::new(Cell::new(0)),
        }
    }

    fn next(&mut self) -> Result<Vec<u8>, NetworkError> {
        self.calls.set(self.calls.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .expect("unexpected network call past end of script")
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch_status(&mut self) -> Result<Vec<u8>, NetworkError> {
        self.next()
    }

    fn send_fill_command(&mut self) -> Result<Vec<u8>, NetworkError> {
        self.next()
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Rc<RefCell<Vec<(String, Vec<PathBuf>)>>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, attachments: &[PathBuf]) -> anyhow::Result<()> {
        self.sent
            .borrow_mut()
            .push((message.to_string(), attachments.to_vec()));
        Ok(())
    }
}

fn net_err() -> Result<Vec<u8>, NetworkError> {
    Err(NetworkError::BadStatus(503))
}

/// Status report with two active lines and two inactive ones.
fn status_text(line1_fill: &str, line2_fill: &str) -> Vec<u8> {
    format!(
        "\
Minimum fill time: 5 s
Maximum fill time: 15 s
Fill hold time: 2 s
Main tank valve is Closed
| LineNum | Active? | LED Pin | LED Thresh | ADC val | LED V | Valve Pin | Valve Status | Last Fill Status

| 1 | Y | 0 | 1.90 | 139 | 0.69 | 11 | Cl | {line1_fill}
| 2 | Y | 1 | 1.90 | 138 | 0.68 | 9 | Cl | {line2_fill}
| 3 | N | 2 | 1.90 | 842 | 4.17 | 10 | Cl | Fail! (0)
| 4 | N | 3 | 1.90 | 844 | 4.18 | 8 | Cl | Fail! (0)

Time  : 0 10 20 30
Line 1: 300 400 500 500
Line 2: 0
Line 3: 0
Line 4: 0"
    )
    .into_bytes()
}

fn no_sleep(_: Duration) {}

fn controller(
    fetcher: ScriptedFetcher,
    notifier: RecordingNotifier,
    retry_max: u32,
    record_path: &Path,
    plot: Option<Box<dyn PlotRenderer>>,
    last_fill: Option<chrono::DateTime<Utc>>,
) -> FillController<ScriptedFetcher, RecordingNotifier> {
    let ctx = ControlContext {
        poll_interval: Duration::from_secs(0),
        fill_interval: Duration::from_secs(3600),
        last_fill,
    };
    FillController::new(
        fetcher,
        notifier,
        RetryPolicy::new(retry_max, Duration::from_secs(0)),
        FillHistoryStore::new(4),
        plot,
        ctx,
        record_path,
    )
    .with_sleeper(no_sleep)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_retry_exhaustion_sends_one_terminal_notification() {
    // max = 5: five failures are retried, the sixth is terminal
    let fetcher = ScriptedFetcher::new((0..6).map(|_| net_err()).collect());
    let notifier = RecordingNotifier::default();
    let tmp = TempDir::new().unwrap();

    let mut ctl = controller(
        fetcher.clone(),
        notifier.clone(),
        5,
        &tmp.path().join("record.txt"),
        None,
        None,
    );
    assert!(ctl.run_cycle().is_err());

    assert_eq!(fetcher.calls.get(), 6, "exactly six network attempts");
    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1, "exactly one terminal notification");
    assert!(sent[0].0.contains("max retries reached"));
}

#[test]
fn test_parse_failure_is_fatal_and_not_retried() {
    let fetcher = ScriptedFetcher::new(vec![Ok(b"this is not a status report".to_vec())]);
    let notifier = RecordingNotifier::default();
    let tmp = TempDir::new().unwrap();

    let mut ctl = controller(
        fetcher.clone(),
        notifier.clone(),
        5,
        &tmp.path().join("record.txt"),
        None,
        None,
    );
    assert!(ctl.run_cycle().is_err());

    // One fetch, no retry, no fill command
    assert_eq!(fetcher.calls.get(), 1);
    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("Error parsing status message"));
    // The raw payload is included for diagnosis
    assert!(sent[0].0.contains("this is not a status report"));
}

#[test]
fn test_not_due_cycle_stays_idle() {
    let fetcher = ScriptedFetcher::new(vec![Ok(status_text("Succ! (10)", "Succ! (9)"))]);
    let notifier = RecordingNotifier::default();
    let tmp = TempDir::new().unwrap();

    let mut ctl = controller(
        fetcher.clone(),
        notifier.clone(),
        5,
        &tmp.path().join("record.txt"),
        None,
        // A fill just happened, so the next one is not due
        Some(Utc::now()),
    );

    assert_eq!(ctl.run_cycle().unwrap(), CycleOutcome::Idle);
    assert_eq!(fetcher.calls.get(), 1, "status poll only, no fill command");
    assert!(notifier.sent.borrow().is_empty());
}

#[test]
fn test_transient_errors_recover_within_budget() {
    // Two failures, then a clean poll; not due, so the cycle ends idle
    let fetcher = ScriptedFetcher::new(vec![
        net_err(),
        net_err(),
        Ok(status_text("Succ! (10)", "Succ! (9)")),
    ]);
    let notifier = RecordingNotifier::default();
    let tmp = TempDir::new().unwrap();

    let mut ctl = controller(
        fetcher.clone(),
        notifier.clone(),
        5,
        &tmp.path().join("record.txt"),
        None,
        Some(Utc::now()),
    );

    assert_eq!(ctl.run_cycle().unwrap(), CycleOutcome::Idle);
    assert_eq!(fetcher.calls.get(), 3);
    assert!(notifier.sent.borrow().is_empty());
}

#[test]
fn test_full_fill_cycle_with_one_failure() {
    // Poll, fill ack, post-fill poll: line 1 succeeded in 10s, line 2
    // reported failure with a literal (0) elapsed time
    let fetcher = ScriptedFetcher::new(vec![
        Ok(status_text("Succ! (8)", "Succ! (8)")),
        Ok(b"Filling all active lines...".to_vec()),
        Ok(status_text("Succ! (10)", "Fail! (0)")),
    ]);
    let notifier = RecordingNotifier::default();
    let tmp = TempDir::new().unwrap();
    let record_path = tmp.path().join("record.txt");

    let plot: Option<Box<dyn PlotRenderer>> =
        Some(Box::new(FillReportRenderer::new(tmp.path())));
    let mut ctl = controller(fetcher.clone(), notifier.clone(), 5, &record_path, plot, None);

    assert_eq!(ctl.run_cycle().unwrap(), CycleOutcome::Filled);
    assert_eq!(fetcher.calls.get(), 3);

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    let (message, attachments) = &sent[0];
    assert!(message.starts_with("ATTENTION - 1 failure(s) out of 2 active lines!!"));
    assert!(message.contains("Line 1 active. Fill Success!!! (10s)"));
    // Literal (0) under a failure token is the anomaly case, not a band
    assert!(message.contains("t=0"));
    assert!(message.contains("Line 3 inactive."));
    assert_eq!(attachments.len(), 1);
    assert!(attachments[0].exists(), "report artifact written");

    // Durations of both active lines landed in the persisted history
    let saved = FillHistoryStore::load(&record_path, 4).unwrap();
    assert_eq!(saved.durations(1), &[10]);
    assert_eq!(saved.durations(2), &[0]);
    assert!(saved.durations(3).is_empty());
}

#[test]
fn test_fill_command_failures_share_the_retry_budget() {
    // Clean poll, then six straight failures on the fill command
    let mut script = vec![Ok(status_text("Succ! (8)", "Succ! (8)"))];
    script.extend((0..6).map(|_| net_err()));
    let fetcher = ScriptedFetcher::new(script);
    let notifier = RecordingNotifier::default();
    let tmp = TempDir::new().unwrap();

    let mut ctl = controller(
        fetcher.clone(),
        notifier.clone(),
        5,
        &tmp.path().join("record.txt"),
        None,
        None,
    );
    assert!(ctl.run_cycle().is_err());

    assert_eq!(fetcher.calls.get(), 7);
    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("max retries reached"));
}
