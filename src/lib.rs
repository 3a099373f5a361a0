/// LN2 Autofill Supervisor
/// Polls the lab's fill controller over HTTP, initiates fills when due,
/// and reports the per-line outcome of each fill cycle.

pub mod controller;
pub mod fetcher;
pub mod history;
pub mod notify;
pub mod plot;
pub mod retry;
pub mod settings;
pub mod status;

pub use controller::{
    ControlContext, CycleOutcome, FailureClass, FillController, OutcomeReport, classify_failure,
    evaluate_outcome,
};
pub use fetcher::{Fetcher, HttpFetcher, NetworkError};
pub use history::FillHistoryStore;
pub use notify::{ConsoleNotifier, Notifier, SendmailNotifier};
pub use plot::{FillReportRenderer, PlotRenderer};
pub use retry::RetryPolicy;
pub use settings::Config;
pub use status::{FillOutcome, LineRecord, ParseError, ParsedStatus};

/// Console log line with a UTC timestamp, same shape everywhere in the crate.
pub fn log_line(msg: &str) {
    println!("{}: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"), msg);
}
