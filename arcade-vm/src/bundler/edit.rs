//! Span edits over an original source text.
//!
//! The transformer never prints an AST. It records edits against byte spans
//! of the original text and [`EditList::render`] splices them back together.
//! A [`Edit::Composite`] rebuilds a node from generated text and *source
//! pieces*; each source piece is rendered recursively, so edits nested
//! inside it (renamed identifiers, erased types, inner JSX) still apply.
//!
//! Edits must nest or be disjoint. An edit that crosses the end of the range
//! being rendered is ignored for that range.

use oxc_span::Span;

/// One piece of a composite replacement.
#[derive(Debug, Clone)]
pub enum Piece {
    Text(String),
    Source(Span),
}

#[derive(Debug, Clone)]
pub enum Edit {
    /// Drop the span
    Delete,
    /// Replace the span with text (zero-width span = insertion)
    Replace(String),
    /// Replace the span with a mix of text and re-rendered source pieces
    Composite(Vec<Piece>),
    /// Replace the span with one separator unless the output already ends
    /// in whitespace (used for stripped comments)
    Separator { newline: bool },
}

#[derive(Debug, Clone)]
struct Entry {
    start: u32,
    end: u32,
    seq: usize,
    edit: Edit,
}

/// Whitespace and comment policy applied to emitted source slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whitespace {
    Preserve,
    Collapse,
}

/// Ordered collection of edits plus the spans minification must not touch.
#[derive(Debug, Default)]
pub struct EditList {
    entries: Vec<Entry>,
    protected: Vec<(u32, u32)>,
    sorted: bool,
}

impl EditList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&mut self, span: Span) {
        self.push(span.start, span.end, Edit::Delete);
    }

    pub fn delete_range(&mut self, start: u32, end: u32) {
        if start < end {
            self.push(start, end, Edit::Delete);
        }
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.push(span.start, span.end, Edit::Replace(text.into()));
    }

    pub fn replace_range(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.push(start, end, Edit::Replace(text.into()));
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.push(at, at, Edit::Replace(text.into()));
    }

    pub fn composite(&mut self, span: Span, pieces: Vec<Piece>) {
        self.push(span.start, span.end, Edit::Composite(pieces));
    }

    pub fn separator(&mut self, span: Span, newline: bool) {
        self.push(span.start, span.end, Edit::Separator { newline });
    }

    /// Mark a span as verbatim (string, template or regex text).
    pub fn protect(&mut self, start: u32, end: u32) {
        if start < end {
            self.protected.push((start, end));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, start: u32, end: u32, edit: Edit) {
        let seq = self.entries.len();
        self.entries.push(Entry { start, end, seq, edit });
        self.sorted = false;
    }

    fn sort(&mut self) {
        if self.sorted {
            return;
        }
        // Insertions before spans that start at the same offset, outer spans
        // before the spans they contain, then recording order.
        self.entries.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| (a.start != a.end).cmp(&(b.start != b.end)))
                .then_with(|| b.end.cmp(&a.end))
                .then_with(|| a.seq.cmp(&b.seq))
        });
        self.protected.sort_unstable();
        self.sorted = true;
    }

    /// Render the whole source with all edits applied.
    pub fn render(&mut self, source: &str, whitespace: Whitespace) -> String {
        self.sort();
        let mut out = String::with_capacity(source.len());
        let renderer = Renderer { source, entries: &self.entries, protected: &self.protected, whitespace };
        renderer.range(&mut out, 0, source.len() as u32, true);
        out
    }
}

struct Renderer<'r> {
    source: &'r str,
    entries: &'r [Entry],
    protected: &'r [(u32, u32)],
    whitespace: Whitespace,
}

impl Renderer<'_> {
    fn range(&self, out: &mut String, start: u32, end: u32, inclusive_end: bool) {
        let mut cursor = start;
        let mut idx = self.entries.partition_point(|e| e.start < start);

        while let Some(entry) = self.entries.get(idx) {
            idx += 1;
            let in_range = entry.start < end || (inclusive_end && entry.start == end && entry.end == end);
            if !in_range {
                break;
            }
            if entry.start < cursor || entry.end > end {
                continue;
            }
            self.source_slice(out, cursor, entry.start);
            match &entry.edit {
                Edit::Delete => {}
                Edit::Replace(text) => out.push_str(text),
                Edit::Composite(pieces) => {
                    for piece in pieces {
                        match piece {
                            Piece::Text(text) => out.push_str(text),
                            Piece::Source(span) => self.range(out, span.start, span.end, false),
                        }
                    }
                }
                Edit::Separator { newline } => match out.chars().last() {
                    None => {}
                    Some(' ') if *newline => {
                        out.pop();
                        out.push('\n');
                    }
                    Some(c) if c.is_whitespace() || is_tight_punct(c) => {}
                    Some(_) => out.push(if *newline { '\n' } else { ' ' }),
                },
            }
            cursor = cursor.max(entry.end);
        }
        self.source_slice(out, cursor, end);
    }

    fn source_slice(&self, out: &mut String, start: u32, end: u32) {
        if start >= end {
            return;
        }
        let text = &self.source[start as usize..end as usize];
        if self.whitespace == Whitespace::Preserve {
            out.push_str(text);
            return;
        }

        // Verbatim spans inside the slice are copied as-is; the gaps between
        // them are collapsed.
        let mut pos = start;
        let first = self.protected.partition_point(|&(_, e)| e <= start);
        for &(p_start, p_end) in &self.protected[first..] {
            if p_start >= end {
                break;
            }
            let gap_end = p_start.max(pos);
            let next = self.source[gap_end as usize..].chars().next();
            collapse_into(out, &self.source[pos as usize..gap_end as usize], next);
            let copy_end = p_end.min(end);
            if gap_end < copy_end {
                out.push_str(&self.source[gap_end as usize..copy_end as usize]);
            }
            pos = copy_end.max(pos);
        }
        if pos < end {
            // What follows the slice may be an edit, so the next character
            // is unknown here.
            collapse_into(out, &self.source[pos as usize..end as usize], None);
        }
    }
}

/// Characters next to which a single space is never needed.
fn is_tight_punct(c: char) -> bool {
    matches!(c, '{' | '}' | '(' | ')' | '[' | ']' | ';' | ',' | ':' | '=' | '?' | '<' | '>' | '&' | '|' | '*' | '^' | '%' | '~')
}

/// After these a line break can never trigger automatic semicolon insertion.
fn swallows_newline_after(c: char) -> bool {
    matches!(c, '{' | '(' | '[' | ';' | ',' | '=' | ':')
}

/// Before these a line break can be dropped.
fn swallows_newline_before(c: char) -> bool {
    matches!(c, '}' | ')' | ']' | ';' | ',')
}

/// Append `text`, collapsing each whitespace run to one space or newline and
/// dropping it where neighbouring punctuation makes it redundant. `after` is
/// the first character following the slice when it is known to be emitted.
fn collapse_into(out: &mut String, text: &str, after: Option<char>) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }
        let mut newline = c == '\n' || c == '\r';
        while let Some(&n) = chars.peek() {
            if !n.is_whitespace() {
                break;
            }
            newline |= n == '\n' || n == '\r';
            chars.next();
        }
        let Some(prev) = out.chars().last() else {
            continue;
        };
        let next = chars.peek().copied().or(after);

        if prev.is_whitespace() {
            if newline && prev == ' ' {
                out.pop();
                out.push('\n');
            }
            continue;
        }
        let redundant = if newline {
            swallows_newline_after(prev) || next.is_some_and(swallows_newline_before)
        } else {
            is_tight_punct(prev) || next.is_some_and(is_tight_punct)
        };
        if !redundant {
            out.push(if newline { '\n' } else { ' ' });
        }
    }
}
