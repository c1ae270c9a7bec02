//! Shared output channel with in-band spec attribution.
//!
//! Before a spec runs, its number is written to the channel wrapped in the
//! configured marker. Anything the submission prints incidentally follows.
//! [`OutputChannel::attribute`] parses the markers back out so the output can
//! be attached to the spec that produced it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use regex::Regex;

use crate::error::{GraderError, GraderResult};

/// Appended when captured output exceeds the configured length.
pub const TRUNCATION_NOTICE: &str = "... truncated due to excessive output!";

/// Output left after removing attribution markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    /// Spec numbers found in the channel, in order of appearance.
    pub numbers: Vec<u64>,
    pub output: String,
}

impl Attribution {
    /// The spec the output belongs to: the last one marked.
    pub fn owner(&self) -> Option<u64> {
        self.numbers.last().copied()
    }
}

#[derive(Debug)]
pub struct OutputChannel {
    marker: String,
    pattern: Regex,
    max_len: usize,
    buffer: Mutex<String>,
}

impl OutputChannel {
    pub fn new(marker: &str, max_len: usize) -> GraderResult<Self> {
        if marker.is_empty() {
            return Err(GraderError::InvalidConfig(
                "output marker must not be empty".to_string(),
            ));
        }
        let escaped = regex::escape(marker);
        let pattern = Regex::new(&format!(r"{0}(\d+){0}", escaped))
            .map_err(|e| GraderError::InvalidConfig(format!("output marker: {}", e)))?;
        Ok(Self {
            marker: marker.to_string(),
            pattern,
            max_len,
            buffer: Mutex::new(String::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Announce that output from here on belongs to spec `number`.
    pub fn mark(&self, number: u64) {
        let mut buf = self.lock();
        buf.push_str(&self.marker);
        buf.push_str(&number.to_string());
        buf.push_str(&self.marker);
    }

    pub fn write(&self, text: &str) {
        self.lock().push_str(text);
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Take everything written so far and split it into markers and output.
    pub fn attribute(&self) -> Attribution {
        let raw = std::mem::take(&mut *self.lock());
        let numbers = self
            .pattern
            .captures_iter(&raw)
            .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
            .collect();
        let output = self.pattern.replace_all(&raw, "").into_owned();
        Attribution { numbers, output }
    }

    /// Whatever output is left, without markers. Used for emergency reports.
    pub fn salvage(&self) -> String {
        self.attribute().output
    }

    /// The captured-output section appended to a result, or `None` when
    /// nothing was printed.
    pub fn captured_section(&self, output: &str) -> Option<String> {
        if output.is_empty() {
            return None;
        }
        let mut section = String::from(" Captured Test Output: \n");
        if output.chars().count() > self.max_len {
            section.extend(output.chars().take(self.max_len));
            section.push_str(TRUNCATION_NOTICE);
        } else {
            section.push_str(output);
        }
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_strips_markers() {
        let channel = OutputChannel::new("@@m@@", 100).expect("channel");
        channel.mark(7);
        channel.write("debug: i=3\n");
        let attribution = channel.attribute();
        assert_eq!(attribution.numbers, vec![7]);
        assert_eq!(attribution.owner(), Some(7));
        assert_eq!(attribution.output, "debug: i=3\n");
        assert_eq!(channel.attribute(), Attribution::default());
    }

    #[test]
    fn test_marker_with_regex_metacharacters() {
        let channel = OutputChannel::new("$[x]$", 100).expect("channel");
        channel.write("before ");
        channel.mark(12);
        channel.write("after");
        let attribution = channel.attribute();
        assert_eq!(attribution.numbers, vec![12]);
        assert_eq!(attribution.output, "before after");
    }

    #[test]
    fn test_captured_section_truncates() {
        let channel = OutputChannel::new("@@", 4).expect("channel");
        assert_eq!(channel.captured_section(""), None);
        assert_eq!(
            channel.captured_section("abc").as_deref(),
            Some(" Captured Test Output: \nabc")
        );
        let long = channel.captured_section("abcdefgh").expect("section");
        assert!(long.ends_with("abcd... truncated due to excessive output!"));
    }

    #[test]
    fn test_empty_marker_rejected() {
        assert!(matches!(
            OutputChannel::new("", 10),
            Err(GraderError::InvalidConfig(_))
        ));
    }
}
