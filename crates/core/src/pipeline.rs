use crate::config::PipelineConfig;
use crate::conversation::format_conv_history;
use crate::prompt::{PromptTemplate, ANSWER_TEMPLATE, STANDALONE_QUESTION_TEMPLATE};
use crate::traits::{CompletionModel, Retriever};
use crate::{ChatMessage, DocumentChunk, PipelineError};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

/// What the chat caller sees when any stage fails.
pub const FALLBACK_RESPONSE: &str = "Error getting response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Rewrite,
    Retrieval,
    Answer,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Rewrite => "rewrite",
            PipelineStage::Retrieval => "retrieval",
            PipelineStage::Answer => "answer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub standalone_question: String,
    pub context: String,
    pub answer: String,
}

/// Joins chunk contents with blank lines, in retrieval order.
pub fn combine_documents(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rewrite → retrieve → answer.
///
/// The rewritten standalone question only drives retrieval. The answer prompt
/// always receives the question exactly as the user typed it.
pub struct AnswerPipeline<M, R>
where
    M: CompletionModel,
    R: Retriever,
{
    model: M,
    retriever: R,
    standalone_prompt: PromptTemplate,
    answer_prompt: PromptTemplate,
    stage_timeout: Option<Duration>,
}

impl<M, R> AnswerPipeline<M, R>
where
    M: CompletionModel,
    R: Retriever,
{
    pub fn new(model: M, retriever: R) -> Self {
        Self {
            model,
            retriever,
            standalone_prompt: PromptTemplate::new(STANDALONE_QUESTION_TEMPLATE),
            answer_prompt: PromptTemplate::new(ANSWER_TEMPLATE),
            stage_timeout: None,
        }
    }

    pub fn with_templates(mut self, standalone: PromptTemplate, answer: PromptTemplate) -> Self {
        self.standalone_prompt = standalone;
        self.answer_prompt = answer;
        self
    }

    pub fn with_stage_timeout(mut self, stage_timeout: Option<Duration>) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Applies template overrides and the stage timeout from configuration.
    pub fn configured(mut self, config: &PipelineConfig) -> Self {
        if let Some(template) = &config.standalone_template {
            self.standalone_prompt = PromptTemplate::new(template);
        }
        if let Some(template) = &config.answer_template {
            self.answer_prompt = PromptTemplate::new(template);
        }
        self.with_stage_timeout(config.stage_timeout())
    }

    async fn within<T, F>(&self, stage: PipelineStage, future: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| PipelineError::Timeout {
                    stage,
                    seconds: limit.as_secs(),
                })?,
            None => future.await,
        }
    }

    pub async fn rewrite(&self, conv_history: &str, question: &str) -> Result<String, PipelineError> {
        let prompt = self
            .standalone_prompt
            .format(&[("conv_history", conv_history), ("question", question)])?;

        self.within(PipelineStage::Rewrite, async {
            self.model.complete(&prompt).await.map_err(PipelineError::Rewrite)
        })
        .await
    }

    pub async fn retrieve_context(&self, standalone_question: &str) -> Result<String, PipelineError> {
        self.within(PipelineStage::Retrieval, async {
            let chunks = self
                .retriever
                .retrieve(standalone_question)
                .await
                .map_err(PipelineError::Retrieval)?;
            debug!(chunk_count = chunks.len(), "context assembled");
            Ok(combine_documents(&chunks))
        })
        .await
    }

    pub async fn answer(
        &self,
        context: &str,
        question: &str,
        conv_history: &str,
    ) -> Result<String, PipelineError> {
        let prompt = self.answer_prompt.format(&[
            ("context", context),
            ("question", question),
            ("conv_history", conv_history),
        ])?;

        self.within(PipelineStage::Answer, async {
            self.model.complete(&prompt).await.map_err(PipelineError::Answer)
        })
        .await
    }

    pub async fn run(&self, history: &[ChatMessage], question: &str) -> Result<PipelineOutput, PipelineError> {
        let conv_history = format_conv_history(history);

        let standalone_question = self.rewrite(&conv_history, question).await?;
        debug!(standalone_question = %standalone_question, "question rewritten");

        let context = self.retrieve_context(&standalone_question).await?;
        let answer = self.answer(&context, question, &conv_history).await?;

        Ok(PipelineOutput {
            standalone_question,
            context,
            answer,
        })
    }

    /// Chat entry point. Always yields a string: failures are logged and
    /// replaced by [`FALLBACK_RESPONSE`].
    pub async fn respond(&self, history: &[ChatMessage], question: &str) -> String {
        match self.run(history, question).await {
            Ok(output) => output.answer,
            Err(err) => {
                error!(
                    stage = ?err.stage(),
                    error = %err,
                    "error getting question response"
                );
                FALLBACK_RESPONSE.to_string()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use crate::traits::{CompletionModel, Retriever};
    use crate::{DocumentChunk, ModelError, StoreError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Replays queued replies and records every prompt it receives.
    #[derive(Clone, Default)]
    pub struct ScriptedModel {
        pub replies: Arc<Mutex<VecDeque<Result<String, ModelError>>>>,
        pub prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedModel {
        pub fn replying(replies: &[&str]) -> Self {
            let model = Self::default();
            if let Ok(mut queue) = model.replies.lock() {
                queue.extend(replies.iter().map(|reply| Ok(reply.to_string())));
            }
            model
        }

        pub fn push_error(&self) {
            if let Ok(mut queue) = self.replies.lock() {
                queue.push_back(Err(ModelError::Status {
                    provider: "scripted".to_string(),
                    status: 500,
                    body: "boom".to_string(),
                }));
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            self.replies
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front())
                .unwrap_or_else(|| {
                    Err(ModelError::MalformedResponse {
                        provider: "scripted".to_string(),
                        details: "no reply queued".to_string(),
                    })
                })
        }
    }

    /// Returns fixed chunks and records the queries it was asked.
    #[derive(Clone, Default)]
    pub struct RecordingRetriever {
        pub chunks: Vec<String>,
        pub fail: bool,
        pub delay: Option<Duration>,
        pub queries: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingRetriever {
        pub fn with_chunks(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|chunk| chunk.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().map(|queries| queries.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Retriever for RecordingRetriever {
        async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, StoreError> {
            if let Ok(mut queries) = self.queries.lock() {
                queries.push(query.to_string());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(StoreError::BackendResponse {
                    backend: "recording".to_string(),
                    details: "503".to_string(),
                });
            }
            Ok(self
                .chunks
                .iter()
                .map(|chunk| DocumentChunk::new(chunk.clone(), Value::Null))
                .collect())
        }
    }
}
