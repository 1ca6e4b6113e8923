use crate::ChatMessage;

/// Renders prior turns as `User: ...` / `Bot: ...` lines, oldest first.
pub fn format_conv_history(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.sender.label(), message.text))
        .collect::<Vec<_>>()
        .join("\n")
}
