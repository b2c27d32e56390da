//! Escaping helper for the `<messages>` context window the Intake Loop (C3)
//! builds before handing a prompt to the Container Runner.

/// Escapes the five XML special characters. Attribute and text content use
/// the same escaping rule here since neither spec field permits raw quotes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// One line of the context window: `<message sender="…" time="…">…</message>`.
pub fn message_line(sender: &str, time: &str, content: &str) -> String {
    format!(
        r#"<message sender="{}" time="{}">{}</message>"#,
        escape(sender),
        escape(time),
        escape(content)
    )
}

/// Wraps a sequence of already-rendered `<message>` lines in `<messages>`.
pub fn wrap_messages(lines: impl IntoIterator<Item = String>) -> String {
    let mut out = String::from("<messages>\n");
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("</messages>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five_special_characters() {
        assert_eq!(escape(r#"<a> & "b" 'c'"#), "&lt;a&gt; &amp; &quot;b&quot; &apos;c&apos;");
    }

    #[test]
    fn message_line_escapes_every_field() {
        let line = message_line("Bob & Alice", "2026-01-01T00:00:00Z", "<hi>");
        assert!(line.contains("Bob &amp; Alice"));
        assert!(line.contains("&lt;hi&gt;"));
    }

    #[test]
    fn wrap_messages_joins_with_newlines() {
        let wrapped = wrap_messages(vec!["<message></message>".to_string()]);
        assert!(wrapped.starts_with("<messages>\n"));
        assert!(wrapped.ends_with("</messages>"));
    }
}
