/// Long-term fill duration record
/// One in-memory table of cumulative fill durations per line, persisted to a
/// flat text file: one whitespace-joined row per line number, row order being
/// the only encoding of line identity (row i maps to line i+1). Save rewrites
/// the whole file. The most recent ADC sample trace per line is kept alongside
/// in memory only, for the current-vs-previous fill report.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct FillHistoryStore {
    /// records[i] is the full duration sequence for line i+1
    records: Vec<Vec<u32>>,
    /// ADC samples of each line's most recent evaluated fill (not persisted)
    last_fill: Vec<Vec<i32>>,
}

impl FillHistoryStore {
    /// Empty store with one empty sequence per configured line.
    pub fn new(num_lines: usize) -> Self {
        Self {
            records: vec![Vec::new(); num_lines],
            last_fill: vec![Vec::new(); num_lines],
        }
    }

    /// Load the record file, or start fresh when it does not exist yet.
    pub fn load(path: &Path, num_lines: usize) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(num_lines));
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fill record file {}", path.display()))?;
        let mut records: Vec<Vec<u32>> = Vec::new();
        for (i, row) in text.lines().enumerate() {
            let durations = row
                .split_whitespace()
                .map(|t| t.parse())
                .collect::<Result<Vec<u32>, _>>()
                .with_context(|| {
                    format!("Corrupt fill record row {} in {}", i + 1, path.display())
                })?;
            records.push(durations);
        }
        // A shorter file than the configured line count still gets a row per line
        while records.len() < num_lines {
            records.push(Vec::new());
        }
        let lines = records.len();
        Ok(Self {
            records,
            last_fill: vec![Vec::new(); lines],
        })
    }

    /// Rewrite the whole record file from the in-memory table.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for row in &self.records {
            let joined: Vec<String> = row.iter().map(|d| d.to_string()).collect();
            out.push_str(&joined.join(" "));
            out.push('\n');
        }
        fs::write(path, out)
            .with_context(|| format!("Failed to write fill record file {}", path.display()))
    }

    /// Record one completed fill for `line_number` (1-based). The only mutator
    /// of the persisted table.
    pub fn append(&mut self, line_number: u32, duration: u32) {
        let idx = line_number.saturating_sub(1) as usize;
        while self.records.len() <= idx {
            self.records.push(Vec::new());
            self.last_fill.push(Vec::new());
        }
        self.records[idx].push(duration);
    }

    pub fn durations(&self, line_number: u32) -> &[u32] {
        static EMPTY: [u32; 0] = [];
        let idx = line_number.saturating_sub(1) as usize;
        self.records.get(idx).map_or(&EMPTY[..], Vec::as_slice)
    }

    pub fn num_lines(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[Vec<u32>] {
        &self.records
    }

    pub fn last_fill(&self, line_number: u32) -> &[i32] {
        static EMPTY: [i32; 0] = [];
        let idx = line_number.saturating_sub(1) as usize;
        self.last_fill.get(idx).map_or(&EMPTY[..], Vec::as_slice)
    }

    /// Replace the remembered ADC trace for a line after evaluating a fill.
    pub fn set_last_fill(&mut self, line_number: u32, samples: Vec<i32>) {
        let idx = line_number.saturating_sub(1) as usize;
        if idx < self.last_fill.len() {
            self.last_fill[idx] = samples;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
