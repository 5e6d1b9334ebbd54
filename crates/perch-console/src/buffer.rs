//! Bounded scrollback held for late subscribers.

use std::collections::VecDeque;

const EULA_MARKER: &str = "you need to agree to the eula in order to run the server";

/// Ring buffer of recent console lines.
///
/// Holds at most `capacity` lines; older lines are discarded as new ones
/// arrive. Also watches for the Minecraft EULA prompt so the UI can surface
/// a one-shot acceptance dialog.
#[derive(Debug)]
pub struct ConsoleBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    eula_prompt: bool,
}

impl ConsoleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            eula_prompt: false,
        }
    }

    /// Append a line, evicting the oldest when full.
    pub fn push(&mut self, line: String) {
        if line.to_lowercase().contains(EULA_MARKER) {
            self.eula_prompt = true;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consume the pending EULA prompt flag, if set.
    pub fn take_eula_prompt(&mut self) -> bool {
        std::mem::take(&mut self.eula_prompt)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn retains_only_the_most_recent_lines() {
        let mut buffer = ConsoleBuffer::new(200);
        for i in 0..250 {
            buffer.push(format!("line {i}"));
        }
        assert_eq!(buffer.len(), 200);
        let lines = buffer.snapshot();
        assert_eq!(lines.first().unwrap(), "line 50");
        assert_eq!(lines.last().unwrap(), "line 249");
    }

    #[test]
    fn stays_below_capacity_until_full() {
        let mut buffer = ConsoleBuffer::new(200);
        for i in 0..10 {
            buffer.push(format!("line {i}"));
        }
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn detects_eula_prompt_case_insensitively() {
        let mut buffer = ConsoleBuffer::new(16);
        buffer.push("[Server] starting".to_string());
        assert!(!buffer.take_eula_prompt());
        buffer.push(
            "[INFO] You need to agree to the EULA in order to run the server.".to_string(),
        );
        assert!(buffer.take_eula_prompt());
        // One-shot: consumed until the marker shows up again.
        assert!(!buffer.take_eula_prompt());
    }

    #[test]
    fn clear_drops_lines_but_not_pending_prompt() {
        let mut buffer = ConsoleBuffer::new(16);
        buffer.push("you need to agree to the eula in order to run the server".to_string());
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.take_eula_prompt());
    }
}
