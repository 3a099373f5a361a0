/// Validate the supervisor's environment configuration without touching the
/// network. Run this after editing .env on a new deployment.

use anyhow::Result;
use dotenvy::dotenv;
use ln2_autofill::{Config, FillHistoryStore};

fn main() -> Result<()> {
    dotenv().ok();
    let cfg = Config::from_env()?;
    println!("Configuration OK:\n{}", cfg.summary());

    // A corrupt record file would otherwise only surface at startup
    if cfg.fill_record_file.exists() {
        let store = FillHistoryStore::load(&cfg.fill_record_file, cfg.num_lines)?;
        println!(
            "Fill record file OK: {} line(s), {} recorded fill(s)",
            store.num_lines(),
            store.records().iter().map(Vec::len).sum::<usize>()
        );
    } else {
        println!(
            "Fill record file {} does not exist yet (a new one will be created)",
            cfg.fill_record_file.display()
        );
    }
    Ok(())
}
