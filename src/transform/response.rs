use crate::error::BridgeError;
use crate::protocol::gemini::{Candidate, GenerateResponse, Part};
use crate::protocol::mapping::{finish_reason_to_source, usage_to_source, TEXT_PART_SEPARATOR};
use crate::protocol::openai::{
    ChatCompletion, Choice, ResponseMessage, ToolCall, ToolCallFunction,
};
use crate::util::{next_call_id, next_completion_id, unix_now_secs};

/// Convert one complete target response body into one source completion.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidCompletionObject`] when the payload carries
/// no `candidates` field at all (including non-JSON bodies); the raw body
/// rides on the error so the handler can surface it verbatim.
pub fn assemble_completion(
    body: bytes::Bytes,
    fallback_model: &str,
) -> Result<ChatCompletion, BridgeError> {
    let parsed: Option<GenerateResponse> = serde_json::from_slice(&body).ok();
    let Some(response) = parsed else {
        return Err(BridgeError::InvalidCompletionObject { raw: body });
    };
    let Some(candidates) = response.candidates else {
        return Err(BridgeError::InvalidCompletionObject { raw: body });
    };

    let choices = if candidates.is_empty() {
        blocked_prompt_choices(&response.prompt_feedback)
    } else {
        candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| candidate_choice(candidate, position))
            .collect()
    };

    Ok(ChatCompletion {
        id: next_completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now_secs(),
        model: response
            .model_version
            .unwrap_or_else(|| fallback_model.to_string()),
        choices,
        usage: response.usage_metadata.as_ref().map(usage_to_source),
    })
}

/// Zero candidates: a prompt-level safety block becomes one synthetic
/// `content_filter` choice with a null message.
fn blocked_prompt_choices(
    feedback: &Option<crate::protocol::gemini::PromptFeedback>,
) -> Vec<Choice> {
    let blocked = feedback
        .as_ref()
        .and_then(|fb| fb.block_reason.as_deref())
        .is_some();
    if !blocked {
        return Vec::new();
    }
    vec![Choice {
        index: 0,
        message: None,
        logprobs: None,
        finish_reason: Some("content_filter".to_string()),
    }]
}

fn candidate_choice(candidate: &Candidate, position: usize) -> Choice {
    let (content, tool_calls) = candidate_message_parts(candidate);
    let has_tool_calls = tool_calls.is_some();
    Choice {
        index: candidate.index.unwrap_or(position as u32),
        message: Some(ResponseMessage {
            role: "assistant".to_string(),
            content,
            tool_calls,
        }),
        logprobs: None,
        finish_reason: candidate_finish_reason(candidate, has_tool_calls),
    }
}

/// A candidate that called tools always reports `tool_calls`, whatever the
/// backend's stated reason.
pub(crate) fn candidate_finish_reason(
    candidate: &Candidate,
    has_tool_calls: bool,
) -> Option<String> {
    if has_tool_calls {
        return Some("tool_calls".to_string());
    }
    candidate
        .finish_reason
        .as_deref()
        .map(|reason| finish_reason_to_source(reason).to_string())
}

/// Flatten a candidate's parts into (content, tool_calls).
///
/// Multiple text parts collapse into one string joined by the reserved
/// separator; function calls become an ordered `tool_calls` list with the
/// conventional id prefix restored.
pub(crate) fn candidate_message_parts(
    candidate: &Candidate,
) -> (Option<String>, Option<Vec<ToolCall>>) {
    let Some(content) = &candidate.content else {
        return (None, None);
    };

    let mut texts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    for part in &content.parts {
        match part {
            Part::Text(text) => texts.push(text),
            Part::FunctionCall(call) => {
                let id = match &call.id {
                    Some(id) => format!("call_{id}"),
                    None => next_call_id(),
                };
                tool_calls.push(ToolCall {
                    id,
                    type_: "function".to_string(),
                    function: ToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.args.to_string(),
                    },
                });
            }
            Part::InlineData(_) | Part::FunctionResponse(_) => {
                // Not expected in model output; skip.
            }
        }
    }

    let content = if texts.is_empty() {
        None
    } else {
        Some(texts.join(TEXT_PART_SEPARATOR))
    };
    let tool_calls = if tool_calls.is_empty() {
        None
    } else {
        Some(tool_calls)
    };
    (content, tool_calls)
}
