//! Prompt construction and answer generation.

use clap::ValueEnum;

use crate::llm::{ChatProvider, ChatRequest};

/// Prompt flavor used when answering a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptStyle {
    /// Single-shot expert answer; admits missing data explicitly.
    Direct,
    /// Thought/Action/Observation reasoning pattern before the answer.
    Reasoning,
}

/// Outcome of one generation attempt. Transport and API failures land in
/// `Failed` so callers never probe a response shape; retrieval results stay
/// valid either way.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedAnswer {
    /// The model produced a response; the text is returned verbatim.
    Answer(String),
    /// The call failed for the given reason.
    Failed(String),
}

/// Joins retrieved text representations into the prompt context block.
pub fn join_context<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    rows.into_iter().collect::<Vec<_>>().join("\n\n")
}

/// Renders the full prompt for `style`.
pub fn build_prompt(style: PromptStyle, question: &str, context: &str) -> String {
    match style {
        PromptStyle::Direct => format!(
            "You are an expert cricket analyst. Use the provided context to answer the user's question accurately.\n\
             \n\
             Question: {question}\n\
             \n\
             Context:\n\
             {context}\n\
             \n\
             If the information is not clearly available, reply exactly with:\n\
             \"Not enough data to determine.\"\n\
             \n\
             Answer:\n"
        ),
        PromptStyle::Reasoning => format!(
            "You are an expert cricket analyst. Use the provided match context to answer the user's question accurately.\n\
             \n\
             You may reason using the following pattern:\n\
             Thought: <your reasoning>\n\
             Action: <look up info in context>\n\
             Observation: <what you find>\n\
             Repeat as needed, then conclude:\n\
             Final Answer: <answer to the question>\n\
             \n\
             Question: {question}\n\
             \n\
             Context (top relevant matches from database):\n\
             {context}\n\
             \n\
             Answer:\n"
        ),
    }
}

/// Answer generator bound to one provider and fixed sampling settings.
pub struct AnswerGenerator {
    provider: Box<dyn ChatProvider>,
    style: PromptStyle,
    temperature: f32,
    max_tokens: usize,
}

impl AnswerGenerator {
    /// Default sampling temperature; low, favoring determinism over flair.
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    /// Default completion token budget.
    pub const DEFAULT_MAX_TOKENS: usize = 512;

    /// Builds a generator with default sampling settings.
    pub fn new(provider: Box<dyn ChatProvider>, style: PromptStyle) -> Self {
        Self {
            provider,
            style,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }

    /// Overrides the sampling temperature and completion budget.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Builds the prompt for `question` over `context` and asks the model.
    /// Failures are converted into [`GeneratedAnswer::Failed`], never
    /// propagated; the pipeline's retrieval value stands without generation.
    pub fn generate(&self, question: &str, context: &str) -> GeneratedAnswer {
        let prompt = build_prompt(self.style, question, context);
        let request = ChatRequest {
            prompt: &prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        match self.provider.complete(&request) {
            Ok(text) => GeneratedAnswer::Answer(text),
            Err(err) => GeneratedAnswer::Failed(format!("{err:#}")),
        }
    }
}
