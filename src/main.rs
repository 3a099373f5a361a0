/// LN2 Autofill Supervisor - Main entry point
/// Keeps the lab's LN2 fill controller under supervision: polls its status,
/// commands fills when due, and mails the per-line outcome to subscribers.

use anyhow::Result;
use dotenvy::dotenv;

use ln2_autofill::controller::{ControlContext, FillController};
use ln2_autofill::log_line;
use ln2_autofill::plot::{FillReportRenderer, PlotRenderer};
use ln2_autofill::{
    Config, ConsoleNotifier, FillHistoryStore, HttpFetcher, Notifier, RetryPolicy,
    SendmailNotifier,
};

fn main() -> Result<()> {
    dotenv().ok();
    log_line("------ Starting LN2 autofill supervisor ------");
    log_line("--------------------------------------------------");

    let cfg = Config::from_env()?;
    log_line(&cfg.summary());

    let history = if cfg.fill_record_file.exists() {
        log_line(&format!(
            "Loading fill record from: {}",
            cfg.fill_record_file.display()
        ));
        FillHistoryStore::load(&cfg.fill_record_file, cfg.num_lines)?
    } else {
        log_line("Starting new fill time record.");
        FillHistoryStore::new(cfg.num_lines)
    };

    let fetcher = HttpFetcher::new(&cfg.controller_addr)?;
    let notifier: Box<dyn Notifier> = if cfg.mail_enabled {
        Box::new(SendmailNotifier::new(
            cfg.mail_from.clone(),
            cfg.mail_to.clone(),
        ))
    } else {
        Box::new(ConsoleNotifier)
    };

    // Subscribers get the active configuration whenever the supervisor starts
    if let Err(err) = notifier.notify(
        &format!(
            "LN2 autofill supervisor starting with configuration:\n\n{}",
            cfg.summary()
        ),
        &[],
    ) {
        log_line(&format!("Startup notification failed: {err}"));
    }

    let plot: Option<Box<dyn PlotRenderer>> = if cfg.plots_enabled {
        Some(Box::new(FillReportRenderer::new(&cfg.report_dir)))
    } else {
        None
    };

    let ctx = ControlContext {
        poll_interval: cfg.poll_interval,
        fill_interval: cfg.fill_interval,
        last_fill: None,
    };
    let retry = RetryPolicy::new(cfg.retry_max, cfg.retry_backoff);

    let mut controller = FillController::new(
        fetcher,
        notifier,
        retry,
        history,
        plot,
        ctx,
        &cfg.fill_record_file,
    );
    // Runs until a terminal failure; the final notification has already been
    // sent by the time this returns.
    controller.run()
}
