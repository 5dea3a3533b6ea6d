//! Char-level text scanner context.
//!
//! The reference context for scanner-driven expressions: a character
//! cursor with non-consuming failure (a primitive that does not match
//! leaves the position untouched, which is what lets containers treat a
//! decline as "not this alternative") and an error log for fail-action
//! diagnostics.

use super::error_log::{line_col, ScanError, ScanErrorLog};

pub struct TextScanner {
    chars: Vec<char>,
    pos: usize,
    source: String,
    log: ScanErrorLog,
}

impl TextScanner {
    pub fn new(source: &str) -> Self {
        TextScanner {
            chars: source.chars().collect(),
            pos: 0,
            source: source.to_string(),
            log: ScanErrorLog::new(),
        }
    }

    // ========================================================================
    // CURSOR
    // ========================================================================

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_eos(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    // ========================================================================
    // PRIMITIVES
    // ========================================================================

    /// Consume `c` if it is next.
    pub fn take_ch(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the next character if it is one of `valid`.
    pub fn take_any(&mut self, valid: &str) -> Option<char> {
        match self.peek() {
            Some(c) if valid.contains(c) => {
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }

    /// Consume the next character if it is an ASCII digit.
    pub fn take_digit(&mut self) -> Option<char> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }

    /// Consume `lit` in full, or nothing.
    pub fn take_lit(&mut self, lit: &str) -> bool {
        let end = self.pos + lit.chars().count();
        if end > self.chars.len() {
            return false;
        }
        if self.chars[self.pos..end].iter().copied().eq(lit.chars()) {
            self.pos = end;
            true
        } else {
            false
        }
    }

    /// Consume an unsigned decimal number (`123`, `4.5`); signs belong
    /// to the grammar, not the scanner.
    pub fn take_num_decimal(&mut self) -> Option<f64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        if self.peek() == Some('.') {
            let dot = self.pos;
            self.pos += 1;
            let frac_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == frac_start {
                // Trailing dot is not part of the number.
                self.pos = dot;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.pos = start;
                None
            }
        }
    }

    /// Skip whitespace; always applicable, so it is the usual default
    /// skip for `global_skip()`.
    pub fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Record a diagnostic at the current position.
    pub fn log_error(&mut self, message: impl Into<String>) {
        let pos = self.pos;
        self.log.log_error(message, pos);
    }

    /// Record a diagnostic at an explicit position.
    pub fn log_error_at(&mut self, message: impl Into<String>, position: usize) {
        self.log.log_error(message, position);
    }

    pub fn error_log(&self) -> &ScanErrorLog {
        &self.log
    }

    pub fn error_log_mut(&mut self) -> &mut ScanErrorLog {
        &mut self.log
    }

    pub fn first_error(&self) -> Option<&ScanError> {
        self.log.first()
    }

    /// Render the collected diagnostics against the scanned source.
    pub fn render_errors(&self) -> String {
        self.log.render(&self.source)
    }

    /// 1-based line and column of a character offset in the source.
    pub fn line_col(&self, position: usize) -> (usize, usize) {
        line_col(&self.source, position)
    }
}
