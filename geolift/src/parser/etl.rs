//! Parsing of ETL engine output.
//!
//! The engine logs one line per event with a level marker and two
//! dash-separated framing columns before the message text. A Java
//! runtime exception on stderr bypasses normal parsing entirely: the
//! whole output becomes one fatal error, because the line framing is
//! not trustworthy once the JVM has unwound.

use crate::messages::MessageBag;

/// Stderr marker of a fatal engine crash.
const JAVA_EXCEPTION_MARKER: &str = "Exception in thread";

/// Performance summary prefix emitted at detailed log level.
const FINISHED_PREFIX: &str = "Finished processing (";

/// Parses one engine invocation into a message bag.
pub fn parse(stdout: &str, stderr: &str) -> MessageBag {
    if stderr.contains(JAVA_EXCEPTION_MARKER) {
        return MessageBag {
            error: vec![
                "Java Exception was raised from the ETL engine.".to_string(),
                "Check the file on a standalone ETL installation.".to_string(),
                stderr.to_string(),
            ],
            ..MessageBag::default()
        };
    }

    let mut bag = MessageBag::new();
    for line in stdout.split('\n') {
        let target = if line.contains("ERROR") {
            &mut bag.error
        } else if line.contains("WARN") {
            &mut bag.warn
        } else if line.contains("INFO") {
            &mut bag.info
        } else {
            continue;
        };
        // Message text starts after the second framing dash.
        if let Some(idx) = nth_index(line, '-', 2) {
            if let Some(message) = line.get(idx + 2..) {
                target.push(message.to_string());
            }
        }
    }
    bag
}

/// Rewrites a step-completion message into its performance summary,
/// e.g. `Write.0 - Finished processing (I=0, O=5, R=5, W=5, U=0, E=0)`
/// becomes `Performance by Write.0: I=0, O=5, R=5, W=5, U=0, E=0.`
pub fn performance_line(message: &str) -> Option<String> {
    let (step, rest) = message.split_once(" - ")?;
    let counters = rest.strip_prefix(FINISHED_PREFIX)?.strip_suffix(')')?;
    Some(format!("Performance by {step}: {counters}."))
}

/// Reduces a parsed bag to what operators want from a run: warnings
/// and errors verbatim, info narrowed to performance summaries.
pub fn summarize(bag: MessageBag) -> MessageBag {
    MessageBag {
        info: bag
            .info
            .iter()
            .filter_map(|m| performance_line(m))
            .collect(),
        warn: bag.warn,
        error: bag.error,
    }
}

fn nth_index(line: &str, needle: char, n: usize) -> Option<usize> {
    line.char_indices()
        .filter(|(_, c)| *c == needle)
        .map(|(i, _)| i)
        .nth(n.checked_sub(1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_STDOUT: &str = "\
INFO  23-08 10:15:02,101 - clean - Starting task\n\
INFO  23-08 10:15:04,020 - Write.0 - Finished processing (I=0, O=5, R=5, W=5, U=0, E=0)\n\
WARN  23-08 10:15:04,021 - Write.0 - Field truncated\n\
ERROR 23-08 10:15:04,022 - Write.0 - Could not write row\n\
unframed noise\n";

    #[test]
    fn test_lines_routed_by_level_marker() {
        let bag = parse(RUN_STDOUT, "");
        assert_eq!(bag.info.len(), 2);
        assert_eq!(bag.warn, vec!["Write.0 - Field truncated"]);
        assert_eq!(bag.error, vec!["Write.0 - Could not write row"]);
    }

    #[test]
    fn test_message_starts_after_second_dash() {
        let bag = parse(RUN_STDOUT, "");
        assert_eq!(bag.info[0], "clean - Starting task");
    }

    #[test]
    fn test_java_exception_short_circuits() {
        let stderr = "Exception in thread \"main\" java.lang.NullPointerException";
        let bag = parse(RUN_STDOUT, stderr);
        assert_eq!(bag.error.len(), 3);
        assert!(bag.error[2].contains("NullPointerException"));
        assert!(bag.info.is_empty());
    }

    #[test]
    fn test_performance_line_rewrite() {
        let line = "Write.0 - Finished processing (I=0, O=5, R=5, W=5, U=0, E=0)";
        assert_eq!(
            performance_line(line),
            Some("Performance by Write.0: I=0, O=5, R=5, W=5, U=0, E=0.".to_string())
        );
        assert_eq!(performance_line("Write.0 - Starting task"), None);
    }

    #[test]
    fn test_summarize_keeps_only_performance_info() {
        let bag = summarize(parse(RUN_STDOUT, ""));
        assert_eq!(
            bag.info,
            vec!["Performance by Write.0: I=0, O=5, R=5, W=5, U=0, E=0."]
        );
        assert_eq!(bag.warn, vec!["Write.0 - Field truncated"]);
        assert_eq!(bag.error, vec!["Write.0 - Could not write row"]);
    }

    #[test]
    fn test_empty_output_is_empty_bag() {
        assert!(parse("", "").is_empty());
    }
}
