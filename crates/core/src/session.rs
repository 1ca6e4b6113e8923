use crate::config::SessionConfig;
use crate::pipeline::AnswerPipeline;
use crate::traits::{CompletionModel, Retriever};
use crate::ChatMessage;
use tracing::debug;

/// In-memory state of one chat: the transcript, the text being typed, and
/// whether a reply is pending. Renderers only read it.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    pending_input: String,
    is_loading: bool,
    max_input_chars: usize,
}

impl ChatSession {
    pub fn new(config: &SessionConfig) -> Self {
        let messages = config
            .greeting
            .as_ref()
            .map(|greeting| vec![ChatMessage::bot(greeting.clone())])
            .unwrap_or_default();

        Self {
            messages,
            pending_input: String::new(),
            is_loading: false,
            max_input_chars: config.max_input_chars,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Replaces the pending input, keeping at most `max_input_chars` characters.
    pub fn set_input(&mut self, text: &str) {
        self.pending_input = text.chars().take(self.max_input_chars).collect();
    }

    /// Sends the pending input through the pipeline and appends both turns.
    ///
    /// Blank input is ignored and returns `None`. The pipeline sees the
    /// transcript as it was before the new user message.
    pub async fn submit<M, R>(&mut self, pipeline: &AnswerPipeline<M, R>) -> Option<&ChatMessage>
    where
        M: CompletionModel,
        R: Retriever,
    {
        if self.pending_input.trim().is_empty() {
            return None;
        }

        let question = std::mem::take(&mut self.pending_input);
        let history_len = self.messages.len();
        self.messages.push(ChatMessage::user(question.clone()));
        self.is_loading = true;

        debug!(history_len, "submitting question");
        let reply = pipeline.respond(&self.messages[..history_len], &question).await;

        self.messages.push(ChatMessage::bot(reply));
        self.is_loading = false;
        self.messages.last()
    }
}
