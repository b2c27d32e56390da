//! Context-window assembly (spec.md §4.3 step 4).

use huddle_core::types::Message;

/// Render `messages` (already filtered to exclude the assistant's own, in
/// ascending timestamp order) as the `<messages>…</messages>` context
/// window handed to the Container Runner.
pub fn build_context_window(messages: &[Message]) -> String {
    let lines = messages.iter().map(|m| {
        huddle_core::xml::message_line(&m.sender_name, &m.timestamp.to_rfc3339(), &m.content)
    });
    huddle_core::xml::wrap_messages(lines)
}

/// Wraps KB search results in `<knowledge_base>…</knowledge_base>` for
/// optional prepending ahead of the context window (spec.md §4.3 step 5).
pub fn build_knowledge_base_block(snippets: &[String]) -> String {
    let mut out = String::from("<knowledge_base>\n");
    for snippet in snippets {
        out.push_str(&huddle_core::xml::escape(snippet));
        out.push('\n');
    }
    out.push_str("</knowledge_base>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::types::Jid;

    #[test]
    fn build_context_window_escapes_and_wraps() {
        let messages = vec![Message {
            id: "1".into(),
            chat_jid: Jid::from("g@g.us"),
            sender_name: "Bob & Alice".into(),
            from_assistant: false,
            content: "<hi>".into(),
            timestamp: chrono::Utc::now(),
        }];
        let window = build_context_window(&messages);
        assert!(window.starts_with("<messages>"));
        assert!(window.contains("Bob &amp; Alice"));
        assert!(window.contains("&lt;hi&gt;"));
        assert!(window.ends_with("</messages>"));
    }

    #[test]
    fn empty_messages_produce_empty_wrapper() {
        let window = build_context_window(&[]);
        assert_eq!(window, "<messages>\n</messages>");
    }
}
