use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::domain::{InterestSet, Item, PipelineError};

use super::parser::{IRRELEVANT_TOKEN, RELEVANT_TOKEN};

const SYSTEM_PROMPT: &str = "You are a content analysis assistant. You decide whether each of several items is related to the topics a user is interested in. Reply strictly in the requested format.";

pub fn build_prompt(batch: &[Item], interests: &InterestSet) -> String {
    let mut prompt = format!(
        "Decide whether each of the following {} items is related to the user's topics of interest.\n\n",
        batch.len()
    );
    let _ = writeln!(prompt, "Topics of interest: {}\n", interests.joined(", "));
    prompt.push_str("Items:\n");
    for (index, item) in batch.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", index + 1, single_line(&item.text));
    }
    let _ = write!(
        prompt,
        "\nFor every item reply only with its number and \"{RELEVANT_TOKEN}\" or \"{IRRELEVANT_TOKEN}\", \
         separated by semicolons, with no other text. \
         Example: \"1:{RELEVANT_TOKEN};2:{IRRELEVANT_TOKEN};3:{RELEVANT_TOKEN}\""
    );
    prompt
}

pub fn build_request(
    model: String,
    temperature: f32,
    batch: &[Item],
    interests: &InterestSet,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: build_prompt(batch, interests),
            },
        ],
        temperature,
    }
}

/// Pulls the reply text out of a completion body.
pub fn extract_reply(body: &str) -> Result<String, PipelineError> {
    let completion: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| PipelineError::Parse(format!("undecodable completion body: {err}")))?;
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Parse("completion did not contain any choices".into()))?;
    let content = choice
        .message
        .and_then(|msg| msg.content)
        .ok_or_else(|| PipelineError::Parse("completion missing message content".into()))?;
    Ok(content.trim().to_string())
}

// Numbered list entries must stay on one line or the model loses the numbering.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}
