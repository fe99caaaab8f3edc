//! Compile diagnostics: one message anchored to a file position.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Diagnostic {
    pub file: String,
    /// 1-based line and column, when the message has a location
    pub position: Option<(u32, u32)>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self { file: file.into(), position: None, message: message.into() }
    }

    /// Anchor at a byte offset into `source`.
    pub fn at(file: impl Into<String>, source: &str, offset: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            position: Some(line_column(source, offset)),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some((line, column)) => write!(f, "{}:{}:{}: {}", self.file, line, column, self.message),
            None => write!(f, "{}: {}", self.file, self.message),
        }
    }
}

/// 1-based line and character column of a byte offset.
pub fn line_column(source: &str, offset: u32) -> (u32, u32) {
    let offset = (offset as usize).min(source.len());
    let mut end = offset;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    let before = &source[..end];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() as u32 + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let src = "a\nbc\nd";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 3), (2, 2));
        assert_eq!(line_column(src, 5), (3, 1));
        assert_eq!(line_column(src, 99), (3, 2));
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::at("main.tsx", "let x = ;", 8, "Unexpected token");
        assert_eq!(d.to_string(), "main.tsx:1:9: Unexpected token");
        assert_eq!(Diagnostic::new("a.ts", "boom").to_string(), "a.ts: boom");
    }
}
