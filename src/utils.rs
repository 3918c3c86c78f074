/// Calculates the 1-based line and column number for a given byte position in the source text.
/// Columns count characters, not bytes. Only called when a diagnostic is rendered.
pub fn get_line_and_column(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in source.char_indices() {
        if i >= position {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Escapes the characters that have a special meaning inside a `\text{...}` group.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\backslash "),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reverses [`escape_text`] on the raw contents of a `\text{...}` group.
pub fn unescape_text(raw: &str) -> String {
    raw.replace("\\backslash ", "\\")
        .replace("\\{", "{")
        .replace("\\}", "}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column() {
        let source = "x+1\n\\foo";
        assert_eq!(get_line_and_column(source, 0), (1, 1));
        assert_eq!(get_line_and_column(source, 2), (1, 3));
        assert_eq!(get_line_and_column(source, 4), (2, 1));
        assert_eq!(get_line_and_column("é+x", 3), (1, 3));
    }

    #[test]
    fn test_text_escaping() {
        let text = "a{b}\\c";
        assert_eq!(escape_text(text), "a\\{b\\}\\backslash c");
        assert_eq!(unescape_text(&escape_text(text)), text);
    }
}
