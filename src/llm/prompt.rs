use super::types::{ChatMessage, ChatRequest};

/// Placed between retrieved passages in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the question using only the \
provided context. If the context does not contain the answer, say that you do not know.";

/// Joins passages, in ranking order, into a single context block.
pub fn context_block(context: &[String]) -> String {
    context
        .iter()
        .map(|passage| passage.trim())
        .filter(|passage| !passage.is_empty())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn build_chat_request(query: &str, context: &[String]) -> ChatRequest {
    let user = format!(
        "Context:\n{}\n\nQuestion: {}",
        context_block(context),
        query.trim()
    );
    ChatRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)])
}
