//! Line classification for the trace format.
//!
//! Each relevant line begins `@<cycle> `. A line matching no marker, or
//! matching a marker but failing field extraction, yields no event and is
//! never fatal. The cycle tag is reported separately from classification
//! because every `@`-prefixed line moves the index block boundary, event or
//! not.

use crate::event::{ExecStateEvent, LandingEvent};
use meshtrace_core::{Cycle, Link, Unit};
use once_cell::sync::Lazy;
use regex::Regex;

static DIM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@\d+ dimX=(\d+), dimY=(\d+)").expect("dimension pattern"));
static LANDING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@(\d+) P(\d+)\.(\d+) \(\w+\) landing C(\d+) from link ([WESNR]),")
        .expect("landing pattern")
});
static EX_OP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@(\d+) P(\d+)\.(\d+):.*\[EX OP\]").expect("exec pattern"));
static OPCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"T\d+(?:\.\w+)?\s+(\S+)").expect("opcode pattern"));

/// Substring guard tried before the landing regex.
const LANDING_MARKER: &str = ") landing C";
/// Substring guard tried before the exec-state regex.
const EX_OP_MARKER: &str = "[EX OP]";
/// An explicit idle marker after the exec-op marker means not busy.
const IDLE_MARKER: &str = "[EX OP] IDLE";

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The one-time dimension declaration.
    Dimensions {
        /// Grid width.
        dim_x: u16,
        /// Grid height.
        dim_y: u16,
    },
    /// A packet landing.
    Landing(LandingEvent),
    /// A busy/opcode observation.
    Exec(ExecStateEvent),
}

/// Result of scanning one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// The cycle declared by the line's `@<cycle> ` prefix, if parseable.
    pub cycle_tag: Option<Cycle>,
    /// The extracted event, if the line qualified.
    pub event: Option<LineEvent>,
}

/// Classifies a forward-only stream of lines.
///
/// The scanner is stateful only for the dimension declaration: the pattern is
/// tried once per line until the first match, then never again.
#[derive(Debug, Default)]
pub struct LineScanner {
    dims: Option<(u16, u16)>,
}

impl LineScanner {
    /// Create a scanner with unknown dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The declared dimensions, once seen.
    #[must_use]
    pub const fn dims(&self) -> Option<(u16, u16)> {
        self.dims
    }

    /// Classify one line (without its terminator).
    pub fn scan(&mut self, line: &str) -> ScanOutcome {
        let cycle_tag = cycle_tag(line);

        if self.dims.is_none() {
            if let Some(caps) = DIM_RE.captures(line) {
                if let (Ok(dim_x), Ok(dim_y)) = (caps[1].parse(), caps[2].parse()) {
                    self.dims = Some((dim_x, dim_y));
                    return ScanOutcome {
                        cycle_tag,
                        event: Some(LineEvent::Dimensions { dim_x, dim_y }),
                    };
                }
            }
        }

        let event = if line.contains(LANDING_MARKER) {
            parse_landing(line).map(LineEvent::Landing)
        } else if line.contains(EX_OP_MARKER) {
            parse_exec(line).map(LineEvent::Exec)
        } else {
            None
        };

        ScanOutcome { cycle_tag, event }
    }
}

/// Extract the `@<cycle> ` prefix shared by every relevant line.
fn cycle_tag(line: &str) -> Option<Cycle> {
    let rest = line.strip_prefix('@')?;
    let (digits, _) = rest.split_once(' ')?;
    digits.parse::<u32>().ok().map(Cycle::from_raw)
}

fn parse_landing(line: &str) -> Option<LandingEvent> {
    let caps = LANDING_RE.captures(line)?;
    Some(LandingEvent {
        cycle: Cycle::from_raw(caps[1].parse().ok()?),
        unit: Unit::new(caps[2].parse().ok()?, caps[3].parse().ok()?),
        color: caps[4].parse().ok()?,
        link: Link::from_letter(caps[5].as_bytes()[0])?,
    })
}

fn parse_exec(line: &str) -> Option<ExecStateEvent> {
    let caps = EX_OP_RE.captures(line)?;
    let busy = !line.contains(IDLE_MARKER);
    let opcode = if busy {
        line.split_once(EX_OP_MARKER)
            .and_then(|(_, after)| OPCODE_RE.captures(after))
            .map(|op| op[1].to_string())
    } else {
        None
    };
    Some(ExecStateEvent {
        cycle: Cycle::from_raw(caps[1].parse().ok()?),
        unit: Unit::new(caps[2].parse().ok()?, caps[3].parse().ok()?),
        busy,
        opcode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_line() {
        let mut scanner = LineScanner::new();
        let outcome = scanner.scan("@0 dimX=2, dimY=2");
        assert_eq!(
            outcome.event,
            Some(LineEvent::Dimensions { dim_x: 2, dim_y: 2 })
        );
        assert_eq!(outcome.cycle_tag, Some(Cycle::zero()));
        assert_eq!(scanner.dims(), Some((2, 2)));
    }

    #[test]
    fn test_dimension_first_occurrence_wins() {
        let mut scanner = LineScanner::new();
        scanner.scan("@0 dimX=2, dimY=2");
        let outcome = scanner.scan("@1 dimX=9, dimY=9");
        assert_eq!(outcome.event, None);
        assert_eq!(scanner.dims(), Some((2, 2)));
    }

    #[test]
    fn test_landing_line() {
        let mut scanner = LineScanner::new();
        let outcome = scanner.scan("@5 P1.0 (x) landing C3 from link W, flit 0");
        let Some(LineEvent::Landing(event)) = outcome.event else {
            panic!("expected landing");
        };
        assert_eq!(event.cycle, Cycle::from_raw(5));
        assert_eq!(event.unit, Unit::new(1, 0));
        assert_eq!(event.color, 3);
        assert_eq!(event.link, Link::West);
        assert_eq!(event.source_coords(), Some((0, 0)));
    }

    #[test]
    fn test_exec_busy_line() {
        let mut scanner = LineScanner::new();
        let outcome = scanner.scan("@5 P0.0:[EX OP] T0 FADDS");
        let Some(LineEvent::Exec(event)) = outcome.event else {
            panic!("expected exec event");
        };
        assert!(event.busy);
        assert_eq!(event.opcode.as_deref(), Some("FADDS"));
        assert_eq!(event.unit, Unit::new(0, 0));
    }

    #[test]
    fn test_exec_task_suffix() {
        let mut scanner = LineScanner::new();
        let outcome = scanner.scan("@7 P2.3: ctx [EX OP] T12.main FMACS r0 r1");
        let Some(LineEvent::Exec(event)) = outcome.event else {
            panic!("expected exec event");
        };
        assert_eq!(event.opcode.as_deref(), Some("FMACS"));
    }

    #[test]
    fn test_exec_idle_line() {
        let mut scanner = LineScanner::new();
        let outcome = scanner.scan("@9 P0.1:[EX OP] IDLE");
        let Some(LineEvent::Exec(event)) = outcome.event else {
            panic!("expected exec event");
        };
        assert!(!event.busy);
        assert_eq!(event.opcode, None);
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let mut scanner = LineScanner::new();
        // Marker present, field extraction fails.
        assert_eq!(scanner.scan("oops ) landing C garbage").event, None);
        // No marker at all.
        assert_eq!(scanner.scan("@5 P0.0 some other activity").event, None);
        assert_eq!(scanner.scan("").event, None);
    }

    #[test]
    fn test_cycle_tag_without_event() {
        let mut scanner = LineScanner::new();
        let outcome = scanner.scan("@12 P0.0 router push");
        assert_eq!(outcome.cycle_tag, Some(Cycle::from_raw(12)));
        assert_eq!(outcome.event, None);
        // No space after the digits, tag is unparseable.
        assert_eq!(scanner.scan("@12").cycle_tag, None);
        assert_eq!(scanner.scan("@x 4").cycle_tag, None);
    }
}
