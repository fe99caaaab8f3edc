//! JSX text handling for the automatic runtime.
//!
//! Text children follow React's whitespace rules: lines are trimmed, lines
//! that are only whitespace disappear, and the surviving lines are joined
//! with single spaces. HTML entities are decoded in text and in attribute
//! strings.

/// Clean a JSX text child. `None` when nothing survives trimming.
pub fn clean_text(raw: &str) -> Option<String> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let is_first = i == 0;
        let is_last = i == lines.len() - 1;
        let mut text = line.replace('\t', " ");
        if !is_first {
            text = text.trim_start_matches(' ').to_string();
        }
        if !is_last {
            text = text.trim_end_matches(' ').to_string();
        }
        if text.is_empty() {
            continue;
        }
        out.push_str(&text);
        if last_non_empty.is_some_and(|last| i < last) {
            out.push(' ');
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(decode_entities(&out))
    }
}

/// Decode `&name;`, `&#123;` and `&#x7B;` entities. Unknown entities are
/// kept verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi > 1 && semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "times" => '×',
        "divide" => '÷',
        "middot" => '·',
        "bull" => '•',
        "deg" => '°',
        "laquo" => '«',
        "raquo" => '»',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        "hearts" => '♥',
        "spades" => '♠',
        "clubs" => '♣',
        "diams" => '♦',
        "euro" => '€',
        "pound" => '£',
        "yen" => '¥',
        "cent" => '¢',
        "sect" => '§',
        "para" => '¶',
        "plusmn" => '±',
        "frac12" => '½',
        "infin" => '∞',
        "check" => '✓',
        _ => return None,
    };
    Some(c)
}

/// A JS string literal for `text`.
pub fn quote(text: &str) -> String {
    // JSON strings are valid JS string literals.
    serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""))
}

/// Object key for a JSX attribute name: bare when it is a plain identifier.
pub fn prop_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

/// Whether `name` can be written as a bare JS identifier / property name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Intrinsic elements (`div`, `my-widget`, `svg:rect`) are passed as strings.
pub fn is_intrinsic(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase()) || name.contains('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_trims_lines() {
        assert_eq!(clean_text("\n    Hello\n    world  \n  ").as_deref(), Some("Hello world"));
        assert_eq!(clean_text("  a  ").as_deref(), Some("  a  "));
        assert_eq!(clean_text("\n   \n  "), None);
        assert_eq!(clean_text("Score: ").as_deref(), Some("Score: "));
        assert_eq!(clean_text(" ").as_deref(), Some(" "));
        assert_eq!(clean_text("\t").as_deref(), Some(" "));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("&bogus; &"), "&bogus; &");
        assert_eq!(decode_entities("&lt;3"), "<3");
    }

    #[test]
    fn test_prop_key() {
        assert_eq!(prop_key("className"), "className");
        assert_eq!(prop_key("data-id"), "\"data-id\"");
        assert_eq!(prop_key("xlink:href"), "\"xlink:href\"");
    }

    #[test]
    fn test_is_intrinsic() {
        assert!(is_intrinsic("div"));
        assert!(is_intrinsic("my-widget"));
        assert!(!is_intrinsic("Board"));
    }
}
