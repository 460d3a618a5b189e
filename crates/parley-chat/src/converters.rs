// Message conversion between stored and agent representations

use chrono::{DateTime, Utc};
use parley_core::{
    AgentMessage, ContentBlock, MessageModel, MessageRole, SearchResult, SimpleMessage,
};

/// Convert stored history into the messages handed to the agent
///
/// Search results are folded into the latest user message as a
/// `<search_results>` block placed ahead of the user's own content.
pub fn to_agent_messages(
    messages: &[SimpleMessage],
    search_results: &[SearchResult],
) -> Vec<AgentMessage> {
    let mut converted: Vec<AgentMessage> = messages.iter().map(AgentMessage::from).collect();

    if search_results.is_empty() {
        return converted;
    }

    let context = ContentBlock::text(format_search_results(search_results));
    match converted
        .iter_mut()
        .rev()
        .find(|m| m.role == MessageRole::User)
    {
        Some(latest) => latest.content.insert(0, context),
        None => converted.push(AgentMessage {
            role: MessageRole::User,
            content: vec![context],
        }),
    }

    converted
}

fn format_search_results(results: &[SearchResult]) -> String {
    let mut out = String::from("<search_results>\n");
    for result in results {
        out.push_str(&format!(
            "<search_result index=\"{}\" source=\"{}\">\n{}\n</search_result>\n",
            result.rank, result.source_name, result.content
        ));
    }
    out.push_str("</search_results>");
    out
}

/// Text of the latest non-empty user message
///
/// `None` when that message does not open with a text block; older user
/// messages are never consulted.
pub fn latest_user_text(messages: &[SimpleMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User && !m.content.is_empty())
        .and_then(SimpleMessage::first_text)
}

/// Convert the agent's final message into its persisted form
pub fn to_message_model(
    message: &AgentMessage,
    model: &str,
    create_time: DateTime<Utc>,
    thinking_log: Vec<SimpleMessage>,
) -> MessageModel {
    MessageModel {
        role: message.role,
        content: message.content.clone(),
        model: model.to_string(),
        thinking_log,
        create_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rank: usize, content: &str) -> SearchResult {
        SearchResult {
            rank,
            content: content.to_string(),
            source_name: format!("doc-{}", rank),
            source_link: None,
            page_number: None,
        }
    }

    #[test]
    fn test_history_converts_without_search_results() {
        let history = vec![
            SimpleMessage::user("hi"),
            SimpleMessage::assistant("hello"),
            SimpleMessage::user("how are you?"),
        ];

        let converted = to_agent_messages(&history, &[]);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[2].text(), "how are you?");
    }

    #[test]
    fn test_search_results_fold_into_latest_user_message() {
        let history = vec![
            SimpleMessage::user("first"),
            SimpleMessage::assistant("answer"),
            SimpleMessage::user("second"),
        ];

        let converted = to_agent_messages(&history, &[result(1, "alpha"), result(2, "beta")]);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].content.len(), 1);
        let latest = &converted[2];
        assert_eq!(latest.content.len(), 2);
        let context = latest.content[0].as_text().unwrap();
        assert!(context.starts_with("<search_results>"));
        assert!(context.contains("<search_result index=\"1\" source=\"doc-1\">\nalpha\n"));
        assert!(context.contains("beta"));
        assert_eq!(latest.content[1].as_text(), Some("second"));
    }

    #[test]
    fn test_search_results_without_user_message_become_one() {
        let converted = to_agent_messages(&[], &[result(1, "alpha")]);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, MessageRole::User);
    }

    #[test]
    fn test_latest_user_text() {
        let history = vec![
            SimpleMessage::user("first"),
            SimpleMessage::user("second"),
            SimpleMessage::assistant("answer"),
        ];
        assert_eq!(latest_user_text(&history), Some("second"));
        assert_eq!(latest_user_text(&[SimpleMessage::assistant("x")]), None);
    }

    #[test]
    fn test_latest_user_text_never_falls_back_to_older_messages() {
        let tool_result = SimpleMessage {
            role: MessageRole::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                status: parley_core::ToolResultStatus::Success,
                content: vec![serde_json::json!({ "text": "42" })],
            }],
        };
        let empty = SimpleMessage {
            role: MessageRole::User,
            content: Vec::new(),
        };

        let history = vec![SimpleMessage::user("older"), tool_result.clone()];
        assert_eq!(latest_user_text(&history), None);

        let history = vec![SimpleMessage::user("older"), tool_result, empty.clone()];
        assert_eq!(latest_user_text(&history), None);

        let history = vec![SimpleMessage::user("current"), empty];
        assert_eq!(latest_user_text(&history), Some("current"));
    }

    #[test]
    fn test_message_model_carries_thinking_log() {
        let now = Utc::now();
        let model = to_message_model(
            &AgentMessage::assistant("done"),
            "claude-v3.7-sonnet",
            now,
            vec![SimpleMessage::assistant("tool call")],
        );

        assert_eq!(model.role, MessageRole::Assistant);
        assert_eq!(model.model, "claude-v3.7-sonnet");
        assert_eq!(model.thinking_log.len(), 1);
        assert_eq!(model.create_time, now);
    }
}
