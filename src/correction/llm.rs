use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::TextCorrector;
use crate::llm::{create_llm, ChatMessage, LLMConfig, LLM};

/// One `original -> replacement` edit proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextReplacement {
    pub original: String,
    pub replacement: String,
    /// Trailing `(...)` note, if the model gave one
    pub reason: Option<String>,
}

/// Edits parsed from one model reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionResponse {
    pub replacements: Vec<TextReplacement>,
    pub notes: Option<String>,
}

/// Transcript corrector backed by a chat model
pub struct LlmCorrector {
    llm: Box<dyn LLM>,
    correction_prompt: String,
}

impl LlmCorrector {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        Ok(Self::with_llm(create_llm(config)?))
    }

    pub fn with_llm(llm: Box<dyn LLM>) -> Self {
        Self {
            llm,
            correction_prompt: Self::default_prompt().to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.correction_prompt = prompt.into();
        self
    }

    /// Ask the model which replacements the transcript needs
    pub async fn get_corrections(&self, text: &str) -> Result<CorrectionResponse> {
        debug!("Getting structured corrections for transcript ({} chars)", text.len());

        let messages = vec![
            ChatMessage::system(self.correction_prompt.clone()),
            ChatMessage::user(format!(
                "Analyze this transcript and return only the corrections needed:\n\n{}",
                text
            )),
        ];

        let response = self.llm.chat(messages).await?;

        debug!(
            "LLM correction analysis completed (tokens: {:?})",
            response.tokens_used
        );

        Ok(parse_correction_response(&response.content))
    }

    fn default_prompt() -> &'static str {
        r#"You proofread transcripts produced by a speech recognizer.

Reply with the fixes only, one per line, written as:

misheard words -> intended words

Fix misheard words, misspellings and obvious grammar slips. Leave
everything else as the speaker said it; never rephrase or summarize.
Do not repeat the transcript and do not explain your changes.
If the transcript is fine, reply with: No corrections needed

Example reply:
I am gong home -> I am going home
their going -> they're going"#
    }
}

#[async_trait]
impl TextCorrector for LlmCorrector {
    async fn correct(&self, text: &str) -> String {
        let corrections = match self.get_corrections(text).await {
            Ok(corrections) => corrections,
            Err(e) => {
                warn!("LLM correction unavailable, keeping transcript as is: {}", e);
                return text.to_string();
            }
        };

        if corrections.replacements.is_empty() {
            debug!("Model proposed no edits");
            return text.to_string();
        }

        info!("✏️ Applying {} model edits to transcript", corrections.replacements.len());
        for edit in &corrections.replacements {
            debug!("Edit: {:?} -> {:?}", edit.original, edit.replacement);
        }

        apply_text_replacements(text, &corrections.replacements)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

const SEPARATORS: [&str; 3] = [" -> ", " → ", " => "];

/// Parse a model reply into edits.
///
/// Accepts the JSON form of [`CorrectionResponse`] or plain
/// `original -> replacement` lines, with an optional `(reason)` suffix.
pub fn parse_correction_response(reply: &str) -> CorrectionResponse {
    if let Ok(structured) = serde_json::from_str::<CorrectionResponse>(reply) {
        return structured;
    }

    CorrectionResponse {
        replacements: reply.lines().filter_map(parse_replacement_line).collect(),
        notes: None,
    }
}

fn parse_replacement_line(line: &str) -> Option<TextReplacement> {
    let line = line.trim();
    if line.starts_with("```") || line.starts_with('#') || line.starts_with("//") {
        return None;
    }

    let (original, rest) = SEPARATORS
        .iter()
        .find_map(|separator| line.split_once(separator))?;

    let (replacement, reason) = match rest.split_once('(') {
        Some((replacement, note)) => {
            let note = note.trim_end_matches(')').trim();
            (replacement, (!note.is_empty()).then(|| note.to_string()))
        }
        None => (rest, None),
    };

    let original = unquote(original);
    let replacement = unquote(replacement);
    if original.is_empty() || replacement.is_empty() || original == replacement {
        return None;
    }

    Some(TextReplacement {
        original: original.to_string(),
        replacement: replacement.to_string(),
        reason,
    })
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches('"')
}

/// Apply edits longest original first, so a short edit cannot break up a
/// longer one that contains it
pub fn apply_text_replacements(text: &str, replacements: &[TextReplacement]) -> String {
    let mut ordered: Vec<&TextReplacement> = replacements.iter().collect();
    ordered.sort_by_key(|edit| std::cmp::Reverse(edit.original.len()));

    ordered.into_iter().fold(text.to_string(), |acc, edit| {
        acc.replace(&edit.original, &edit.replacement)
    })
}
