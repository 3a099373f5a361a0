/// Fill report artifact
/// The original rig graphed ADC voltage vs time and the long-term fill
/// durations. Here the renderer is a seam: anything that can turn the
/// current/previous ADC traces and the duration history into a file to attach
/// to the outcome mail satisfies it. The stock implementation emits a tabular
/// text report rather than an image.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::FillHistoryStore;
use crate::status::ParsedStatus;

pub trait PlotRenderer {
    /// Produce a file artifact for the latest evaluated fill. `history` holds
    /// the previous ADC traces and the full duration table.
    fn render(&self, status: &ParsedStatus, history: &FillHistoryStore) -> Result<PathBuf>;
}

pub const REPORT_FILE: &str = "ln2_fill_report.txt";

pub struct FillReportRenderer {
    out_dir: PathBuf,
}

impl FillReportRenderer {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
        }
    }
}

impl PlotRenderer for FillReportRenderer {
    fn render(&self, status: &ParsedStatus, history: &FillHistoryStore) -> Result<PathBuf> {
        let mut out = String::new();
        writeln!(out, "LN2 Fill: ADC value vs time (s)").ok();
        write!(out, "time     :").ok();
        for t in &status.fill_time_scale {
            write!(out, " {t}").ok();
        }
        writeln!(out).ok();

        for (idx, samples) in status.line_fill_samples.iter().enumerate() {
            let line_number = idx as u32 + 1;
            write!(out, "line {line_number}   :").ok();
            for s in samples {
                write!(out, " {s}").ok();
            }
            writeln!(out).ok();

            let previous = history.last_fill(line_number);
            if !previous.is_empty() {
                write!(out, "line {line_number} was:").ok();
                for s in previous {
                    write!(out, " {s}").ok();
                }
                writeln!(out).ok();
            }
        }

        writeln!(out).ok();
        writeln!(out, "LN2 Fill: total fill time per cycle (s)").ok();
        for (idx, durations) in history.records().iter().enumerate() {
            write!(out, "line {}   :", idx + 1).ok();
            for d in durations {
                write!(out, " {d}").ok();
            }
            writeln!(out).ok();
        }

        let path = self.out_dir.join(REPORT_FILE);
        fs::write(&path, out)
            .with_context(|| format!("Failed to write fill report {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status;
    use tempfile::TempDir;

    fn sample_status() -> ParsedStatus {
        let text = "\
Minimum fill time: 5 s
Maximum fill time: 15 s
Fill hold time: 2 s
Main tank valve is Closed
| LineNum | Active? | LED Pin | LED Thresh | ADC val | LED V | Valve Pin | Valve Status | Last Fill Status
| 1 | Y | 0 | 1.90 | 139 | 0.69 | 11 | Cl | Succ! (10)
| 2 | Y | 1 | 1.90 | 138 | 0.68 | 9 | Cl | Fail! (0)
Time  : 0 10 20
Line 1: 300 400 500
Line 2: 0";
        status::parse(text.as_bytes()).expect("sample should parse")
    }

    #[test]
    fn test_report_contains_current_previous_and_history() {
        let tmp = TempDir::new().unwrap();
        let mut history = FillHistoryStore::new(2);
        history.append(1, 10);
        history.append(1, 12);
        history.append(2, 9);
        history.set_last_fill(1, vec![290, 380, 495]);

        let renderer = FillReportRenderer::new(tmp.path());
        let path = renderer
            .render(&sample_status(), &history)
            .expect("render should succeed");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("time     : 0 10 20"));
        assert!(text.contains("line 1   : 300 400 500"));
        assert!(text.contains("line 1 was: 290 380 495"));
        assert!(text.contains("line 1   : 10 12"));
        assert!(text.contains("line 2   : 9"));
    }
}
