/// Status-report parser for the LN2 fill controller
/// Turns the controller's loosely formatted text report into a strict typed
/// model. Pure code, no I/O: bytes in, `ParsedStatus` or `ParseError` out.
///
/// The wire format is line oriented. Scalar fields are literal-prefix lines
/// ("Minimum fill time: 10 s"), the per-line table is a block of "|"-delimited
/// rows, and the last-fill ADC history is a "Time  :" header followed by one
/// row per fill line. A report is only accepted once every one of the eight
/// logical fields has been seen; a partially understood status is never valid.

use thiserror::Error;

/// Fill outcome token reported per line ("Succ!" / "Fail!").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Success,
    Failure,
}

/// One row of the per-line status table.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    /// 1-based fill line number as printed by the controller
    pub number: u32,
    pub active: bool,
    pub led_pin: u32,
    pub led_threshold: f64,
    pub adc_value: i32,
    pub led_volts: f64,
    pub valve_pin: u32,
    /// Free-text valve state token, e.g. "Cl" or "Op"
    pub valve_status: String,
    pub outcome: FillOutcome,
    /// Fill duration in seconds. Non-negative on success; on failure the
    /// controller reports the elapsed time negated (see controller.rs).
    pub elapsed_seconds: i32,
}

/// Fully parsed status report.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatus {
    pub min_fill_time: u32,
    pub max_fill_time: u32,
    pub fill_hold_time: u32,
    /// Main supply tank valve state, e.g. "Closed" / "Open"
    pub main_tank_status: String,
    pub lines: Vec<LineRecord>,
    pub num_lines: usize,
    /// Sample time offsets (seconds) for the ADC history rows
    pub fill_time_scale: Vec<u32>,
    /// One ADC sample sequence per line, index-aligned with `lines`
    pub line_fill_samples: Vec<Vec<i32>>,
    /// Table rows dropped for having the wrong field count (warned, not fatal)
    pub skipped_rows: usize,
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// The report ended without populating every required field. Retrying the
    /// request cannot fix this, so callers treat it as fatal.
    #[error("incomplete status, missing field(s): {}", missing.join(", "))]
    IncompleteStatus { missing: Vec<&'static str> },

    /// A line matched a known region but one of its values would not parse.
    #[error("malformed {what} in line {line:?}")]
    MalformedRow { what: &'static str, line: String },

    /// An ADC history row arrived out of order.
    #[error("fill history row out of sequence: expected line {expected}, got {found}")]
    SequenceMismatch { expected: usize, found: usize },
}

/// Tracks which of the eight required fields have been populated so far.
/// The parse only succeeds once every flag is set.
#[derive(Debug, Default)]
struct Checklist {
    min_fill_time: bool,
    max_fill_time: bool,
    fill_hold_time: bool,
    main_tank_status: bool,
    line_table: bool,
    line_count: bool,
    fill_time_scale: bool,
    line_fill_samples: bool,
}

impl Checklist {
    fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.min_fill_time {
            out.push("MinFillTime");
        }
        if !self.max_fill_time {
            out.push("MaxFillTime");
        }
        if !self.fill_hold_time {
            out.push("FillHoldTime");
        }
        if !self.main_tank_status {
            out.push("MainTankStatus");
        }
        if !self.line_table {
            out.push("LineTable");
        }
        if !self.line_count {
            out.push("LineCount");
        }
        if !self.fill_time_scale {
            out.push("FillTimeScale");
        }
        if !self.line_fill_samples {
            out.push("LineFillSamples");
        }
        out
    }
}

const MIN_FILL_PREFIX: &str = "Minimum fill time:";
const MAX_FILL_PREFIX: &str = "Maximum fill time:";
const HOLD_PREFIX: &str = "Fill hold time:";
const TANK_PREFIX: &str = "Main tank valve is";
const TABLE_HEADER_PREFIX: &str = "| LineNum |";
const HISTORY_PREFIX: &str = "Time  :";

/// Fields per "|"-split table row (index 0 is the empty slot before the
/// leading delimiter). Rows with any other count are skipped with a warning.
const TABLE_ROW_FIELDS: usize = 10;

/// Parse a raw status payload from the controller.
///
/// The device emits ASCII; stray bytes are decoded lossily so that the
/// comparison against the literal prefixes happens uniformly over text.
pub fn parse(raw: &[u8]) -> Result<ParsedStatus, ParseError> {
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text.lines().collect();

    let mut status = ParsedStatus {
        min_fill_time: 0,
        max_fill_time: 0,
        fill_hold_time: 0,
        main_tank_status: String::new(),
        lines: Vec::new(),
        num_lines: 0,
        fill_time_scale: Vec::new(),
        line_fill_samples: Vec::new(),
        skipped_rows: 0,
    };
    let mut seen = Checklist::default();

    let mut pos = 0;
    while pos < lines.len() {
        let line = lines[pos];
        pos += 1;
        if line.trim().is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(MIN_FILL_PREFIX) {
            status.min_fill_time = parse_seconds(rest, "MinFillTime", line)?;
            seen.min_fill_time = true;
        } else if let Some(rest) = line.strip_prefix(MAX_FILL_PREFIX) {
            status.max_fill_time = parse_seconds(rest, "MaxFillTime", line)?;
            seen.max_fill_time = true;
        } else if let Some(rest) = line.strip_prefix(HOLD_PREFIX) {
            status.fill_hold_time = parse_seconds(rest, "FillHoldTime", line)?;
            seen.fill_hold_time = true;
        } else if let Some(rest) = line.strip_prefix(TANK_PREFIX) {
            status.main_tank_status = rest.trim().to_string();
            seen.main_tank_status = true;
        } else if line.starts_with(TABLE_HEADER_PREFIX) {
            pos = parse_line_table(&lines, pos, &mut status, &mut seen)?;
        } else if line.starts_with(HISTORY_PREFIX) {
            pos = parse_fill_history(&lines, pos, line, &mut status, &mut seen)?;
        }
        // Anything else (banners, clock line, junk) is ignored.
    }

    let missing = seen.missing();
    if !missing.is_empty() {
        return Err(ParseError::IncompleteStatus { missing });
    }
    Ok(status)
}

/// Scalar time field: the remainder after the literal prefix is "<int> s".
fn parse_seconds(rest: &str, what: &'static str, line: &str) -> Result<u32, ParseError> {
    rest.trim()
        .trim_end_matches('s')
        .trim()
        .parse()
        .map_err(|_| ParseError::MalformedRow {
            what,
            line: line.to_string(),
        })
}

/// Consume the per-line status table. Entered just past the header row;
/// returns the index of the first line after the table region.
fn parse_line_table(
    lines: &[&str],
    mut pos: usize,
    status: &mut ParsedStatus,
    seen: &mut Checklist,
) -> Result<usize, ParseError> {
    // Blank separator lines between the column headings and the first row
    while pos < lines.len() && lines[pos].trim().is_empty() {
        pos += 1;
    }
    // The region is every consecutive non-empty line starting with "|"
    while pos < lines.len() {
        let line = lines[pos];
        if line.is_empty() || !line.starts_with('|') {
            break;
        }
        pos += 1;
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != TABLE_ROW_FIELDS {
            println!(
                "Warning: bad line data ({} chars, {} fields), row skipped",
                line.len(),
                fields.len()
            );
            status.skipped_rows += 1;
            continue;
        }
        status.lines.push(parse_table_row(&fields, line)?);
        status.num_lines += 1;
        seen.line_table = true;
        seen.line_count = true;
    }
    Ok(pos)
}

fn parse_table_row(fields: &[&str], line: &str) -> Result<LineRecord, ParseError> {
    let bad = |what: &'static str| ParseError::MalformedRow {
        what,
        line: line.to_string(),
    };

    let number = fields[1].trim().parse().map_err(|_| bad("line number"))?;
    let active = fields[2].trim() == "Y";
    let led_pin = fields[3].trim().parse().map_err(|_| bad("LED pin"))?;
    let led_threshold = fields[4].trim().parse().map_err(|_| bad("LED threshold"))?;
    let adc_value = fields[5].trim().parse().map_err(|_| bad("ADC value"))?;
    let led_volts = fields[6].trim().parse().map_err(|_| bad("LED volts"))?;
    let valve_pin = fields[7].trim().parse().map_err(|_| bad("valve pin"))?;
    let valve_status = fields[8].trim().to_string();

    // Final field is "Succ! (10)" or "Fail! (-3)"
    let mut fill_info = fields[9].split_whitespace();
    let outcome = match fill_info.next() {
        Some("Succ!") => FillOutcome::Success,
        Some("Fail!") => FillOutcome::Failure,
        _ => return Err(bad("fill outcome token")),
    };
    let elapsed_seconds = fill_info
        .next()
        .map(|t| t.trim_matches(|c| c == '(' || c == ')'))
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| bad("fill elapsed time"))?;

    Ok(LineRecord {
        number,
        active,
        led_pin,
        led_threshold,
        adc_value,
        led_volts,
        valve_pin,
        valve_status,
        outcome,
        elapsed_seconds,
    })
}

/// Consume the last-fill ADC history. `header` is the "Time  : ..." line
/// whose tail (after the "Time" and ":" tokens) is the shared time scale;
/// every remaining non-empty line is one per-line sample row.
fn parse_fill_history(
    lines: &[&str],
    mut pos: usize,
    header: &str,
    status: &mut ParsedStatus,
    seen: &mut Checklist,
) -> Result<usize, ParseError> {
    status.fill_time_scale = header
        .split_whitespace()
        .skip(2)
        .map(|t| {
            t.parse().map_err(|_| ParseError::MalformedRow {
                what: "fill time scale",
                line: header.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;
    seen.fill_time_scale = true;

    while pos < lines.len() {
        let line = lines[pos];
        pos += 1;
        if line.trim().is_empty() {
            continue;
        }
        let bad = |what: &'static str| ParseError::MalformedRow {
            what,
            line: line.to_string(),
        };
        // Row shape: "Line <n>: <sample> <sample> ..."
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let found: usize = tokens
            .get(1)
            .map(|t| t.trim_end_matches(':'))
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| bad("fill history line number"))?;
        // Rows arrive densely in line order, so the printed number must match
        // the count of rows consumed so far.
        let expected = status.line_fill_samples.len() + 1;
        if found != expected {
            return Err(ParseError::SequenceMismatch { expected, found });
        }
        let samples = tokens[2..]
            .iter()
            .map(|t| t.parse().map_err(|_| bad("fill history sample")))
            .collect::<Result<_, _>>()?;
        status.line_fill_samples.push(samples);
        seen.line_fill_samples = true;
    }
    Ok(pos)
}

// ============================================================================
// Tests
// ============================================================================
