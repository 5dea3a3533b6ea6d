//! Positioned diagnostics collected while a scanner-driven expression
//! runs.
//!
//! Fail-actions log through [`TextScanner::log_error`], the driver's
//! caller inspects or renders the log afterwards.
//!
//! [`TextScanner::log_error`]: super::text_scanner::TextScanner::log_error

/// One diagnostic: a message anchored at a character position in the
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub message: String,
    pub position: usize,
}

#[derive(Debug, Default)]
pub struct ScanErrorLog {
    errors: Vec<ScanError>,
}

impl ScanErrorLog {
    pub fn new() -> Self {
        ScanErrorLog { errors: Vec::new() }
    }

    pub fn log_error(&mut self, message: impl Into<String>, position: usize) {
        self.errors.push(ScanError {
            message: message.into(),
            position,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn first(&self) -> Option<&ScanError> {
        self.errors.first()
    }

    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// Render each diagnostic as `message at line:col` against `source`.
    pub fn render(&self, source: &str) -> String {
        self.errors
            .iter()
            .map(|e| {
                let (line, col) = line_col(source, e.position);
                format!("{} at {}:{}", e.message, line, col)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 1-based line and column of a character offset.
pub(crate) fn line_col(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in source.chars().take(position) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
