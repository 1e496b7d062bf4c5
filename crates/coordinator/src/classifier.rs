//! Log line classifier
//!
//! Workers emit free-text log lines; the monitor classifies them into coarse
//! events by keyword matching. This is a best-effort heuristic over an
//! unstructured stream, kept behind this module boundary so the structured
//! progress record stays the primary signal and this stays swappable. Lines
//! that fail to parse are ignored.

/// A coarse event extracted from one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// Worker stage changed (free-text stage label)
    StageChange(&'static str),
    /// Worker reported a processed counter
    Progress { current: usize, total: usize },
    /// Worker declared completion
    Completed,
}

/// Classify one log line, if it matches any known marker
pub fn classify_line(line: &str) -> Option<LogEvent> {
    if line.contains("Processing completed") {
        return Some(LogEvent::Completed);
    }
    if line.contains("Processed ") && line.contains(" entries") {
        if let Some(event) = parse_progress(line) {
            return Some(event);
        }
    }
    if line.contains("Starting enhancement service") {
        return Some(LogEvent::StageChange("starting service"));
    }
    if line.contains("Pulling model") {
        return Some(LogEvent::StageChange("pulling model"));
    }
    if line.contains("Enhancement service ready") {
        return Some(LogEvent::StageChange("service ready"));
    }
    if line.contains("processing fragment") {
        return Some(LogEvent::StageChange("processing"));
    }
    None
}

/// Parse a `Processed <current>/<total> entries` counter out of a line
fn parse_progress(line: &str) -> Option<LogEvent> {
    let rest = line.split("Processed ").nth(1)?;
    let counter = rest.split_whitespace().next()?;
    let (current, total) = counter.split_once('/')?;
    Some(LogEvent::Progress {
        current: current.parse().ok()?,
        total: total.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_markers() {
        assert_eq!(
            classify_line("2026-08-24 INFO Starting enhancement service for worker 2"),
            Some(LogEvent::StageChange("starting service"))
        );
        assert_eq!(
            classify_line("INFO Pulling model gemma3:1b-it-qat"),
            Some(LogEvent::StageChange("pulling model"))
        );
        assert_eq!(
            classify_line("INFO Enhancement service ready"),
            Some(LogEvent::StageChange("service ready"))
        );
        assert_eq!(
            classify_line("INFO Worker 2 processing fragment /data/fragments/fragment_2.json"),
            Some(LogEvent::StageChange("processing"))
        );
    }

    #[test]
    fn test_progress_counter() {
        assert_eq!(
            classify_line("INFO Processed 40/120 entries (33.3%)"),
            Some(LogEvent::Progress {
                current: 40,
                total: 120
            })
        );
    }

    #[test]
    fn test_completion_marker() {
        assert_eq!(
            classify_line("INFO Processing completed. Results saved to result_1.json"),
            Some(LogEvent::Completed)
        );
    }

    #[test]
    fn test_completion_wins_over_progress_keywords() {
        // A completion line mentioning entries must classify as completion
        let line = "Processing completed after Processed 10/10 entries";
        assert_eq!(classify_line(line), Some(LogEvent::Completed));
    }

    #[test]
    fn test_unrecognized_and_malformed_lines_ignored() {
        assert_eq!(classify_line("random chatter"), None);
        assert_eq!(classify_line(""), None);
        // Malformed counters fall through rather than erroring
        assert_eq!(classify_line("Processed ten/20 entries"), None);
        assert_eq!(classify_line("Processed 10 entries"), None);
    }
}
