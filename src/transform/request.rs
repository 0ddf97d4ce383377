use std::collections::HashMap;

use crate::error::BridgeError;
use crate::protocol::gemini::{
    Content, FunctionCall, FunctionCallingConfig, FunctionDeclaration, FunctionResponse,
    GenerateRequest, GenerationConfig, Part, ThinkingConfig, Tool, ToolConfig,
};
use crate::protocol::mapping::{block_none_safety_settings, thinking_budget_for_effort};
use crate::protocol::openai::{ChatMessage, ChatRequest, MessageContent, Stop, ToolCall, ToolChoice};
use crate::transform::content::message_parts;
use crate::transform::schema::sanitize_schema;
use crate::transport::UpstreamClient;

/// Conventional id prefix the source protocol uses; the backend's id grammar
/// does not accept it.
const CALL_ID_PREFIX: &str = "call_";

/// Model-name suffix that turns on the native web-search capability.
const SEARCH_MODEL_SUFFIX: &str = "-search";

/// Tool name that selects the native web-search capability.
const SEARCH_TOOL_NAME: &str = "googleSearch";

/// A fully translated request plus the (possibly rewritten) model the
/// upstream path should name.
#[derive(Debug, Clone)]
pub struct TransformedRequest {
    pub model: String,
    pub request: GenerateRequest,
}

/// Where a pending tool call's result belongs.
struct PendingCall {
    position: usize,
    name: String,
}

/// A `function`-role turn under construction, paired with the side-table
/// that routes each incoming result to its slot.
struct FunctionTurn {
    parts: Vec<Option<Part>>,
    calls: HashMap<String, PendingCall>,
}

impl FunctionTurn {
    fn new(calls: HashMap<String, PendingCall>) -> Self {
        let mut parts = Vec::new();
        parts.resize_with(calls.len(), || None);
        Self { parts, calls }
    }

    /// Place one tool result at the position recorded for its call id.
    fn insert_result(&mut self, message: &ChatMessage) -> Result<(), BridgeError> {
        let call_id = message
            .tool_call_id
            .as_deref()
            .ok_or_else(|| BridgeError::InvalidInput("tool message without tool_call_id".into()))?;
        let pending = self
            .calls
            .get(call_id)
            .ok_or_else(|| BridgeError::UnknownToolCallId(call_id.to_string()))?;
        if self.parts[pending.position].is_some() {
            return Err(BridgeError::DuplicateToolCallId(call_id.to_string()));
        }

        let text = result_text(message.content.as_ref());
        self.parts[pending.position] = Some(Part::FunctionResponse(FunctionResponse {
            id: Some(strip_call_prefix(call_id).to_string()),
            name: pending.name.clone(),
            response: result_payload(&text),
        }));
        Ok(())
    }

    /// Close the turn, keeping original call order for whatever arrived.
    fn into_content(self) -> Content {
        Content {
            role: Some("function".to_string()),
            parts: self.parts.into_iter().flatten().collect(),
        }
    }
}

#[inline]
fn strip_call_prefix(id: &str) -> &str {
    id.strip_prefix(CALL_ID_PREFIX).unwrap_or(id)
}

fn result_text(content: Option<&MessageContent>) -> String {
    match content {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(items)) => items
            .iter()
            .filter_map(|item| item.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    }
}

/// The backend requires an object payload: valid JSON objects pass through,
/// everything else is wrapped as `{result: ...}`.
fn result_payload(text: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(other) => serde_json::json!({ "result": other }),
        Err(_) => serde_json::json!({ "result": text }),
    }
}

/// Convert an assistant message's tool calls into `functionCall` parts and
/// the side-table a later `function`-role turn consumes.
fn tool_call_parts(
    calls: &[ToolCall],
) -> Result<(Vec<Part>, HashMap<String, PendingCall>), BridgeError> {
    let mut parts = Vec::with_capacity(calls.len());
    let mut table = HashMap::with_capacity(calls.len());
    for (position, call) in calls.iter().enumerate() {
        let args: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .map_err(|err| BridgeError::InvalidArguments(format!("{}: {err}", call.id)))?;
        parts.push(Part::FunctionCall(FunctionCall {
            id: Some(strip_call_prefix(&call.id).to_string()),
            name: call.function.name.clone(),
            args,
        }));
        table.insert(
            call.id.clone(),
            PendingCall {
                position,
                name: call.function.name.clone(),
            },
        );
    }
    Ok((parts, table))
}

/// Translate a full source request into a target request.
///
/// Runs entirely before the backend call: any error here aborts the request
/// with no upstream side effects.
///
/// # Errors
///
/// Returns the transformer-time subset of [`BridgeError`]: unsupported
/// roles/content/response formats/tool choices, broken tool-call pairing,
/// and remote image fetch failures.
pub async fn transform_request(
    client: &UpstreamClient,
    source: &ChatRequest,
) -> Result<TransformedRequest, BridgeError> {
    let (model, mut search) = match source.model.strip_suffix(SEARCH_MODEL_SUFFIX) {
        Some(base) => (base.to_string(), true),
        None => (source.model.clone(), false),
    };

    let mut contents: Vec<Content> = Vec::with_capacity(source.messages.len());
    let mut system_instruction: Option<Content> = None;
    let mut pending_calls: Option<HashMap<String, PendingCall>> = None;
    let mut open_function_turn: Option<FunctionTurn> = None;

    for message in &source.messages {
        if message.role != "tool" {
            if let Some(turn) = open_function_turn.take() {
                contents.push(turn.into_content());
            }
        }

        match message.role.as_str() {
            "system" => {
                let parts = match &message.content {
                    Some(content) => message_parts(client, content).await?,
                    None => Vec::new(),
                };
                system_instruction = Some(Content { role: None, parts });
            }
            "user" => {
                let parts = match &message.content {
                    Some(content) => message_parts(client, content).await?,
                    None => Vec::new(),
                };
                contents.push(Content {
                    role: Some("user".to_string()),
                    parts,
                });
            }
            "assistant" => match &message.tool_calls {
                Some(calls) => {
                    // Assistant text is ignored when tool calls are present.
                    let (parts, table) = tool_call_parts(calls)?;
                    pending_calls = Some(table);
                    contents.push(Content {
                        role: Some("model".to_string()),
                        parts,
                    });
                }
                None => {
                    let content = message.content.as_ref().ok_or_else(|| {
                        BridgeError::InvalidInput(
                            "assistant message without content or tool_calls".into(),
                        )
                    })?;
                    contents.push(Content {
                        role: Some("model".to_string()),
                        parts: message_parts(client, content).await?,
                    });
                }
            },
            "tool" => {
                if open_function_turn.is_none() {
                    let calls = pending_calls.take().ok_or(BridgeError::NoPendingCalls)?;
                    open_function_turn = Some(FunctionTurn::new(calls));
                }
                if let Some(turn) = open_function_turn.as_mut() {
                    turn.insert_result(message)?;
                }
            }
            other => return Err(BridgeError::UnsupportedRole(other.to_string())),
        }
    }
    if let Some(turn) = open_function_turn.take() {
        contents.push(turn.into_content());
    }

    // The backend requires the first turn to carry text when a system
    // instruction is present.
    if system_instruction.is_some() {
        let first_has_text = contents
            .first()
            .is_some_and(|turn| turn.parts.iter().any(|part| matches!(part, Part::Text(_))));
        if !first_has_text {
            contents.insert(
                0,
                Content {
                    role: Some("user".to_string()),
                    parts: vec![Part::Text(" ".to_string())],
                },
            );
        }
    }

    let mut declarations: Vec<FunctionDeclaration> = Vec::new();
    for tool in source.tools.as_deref().unwrap_or_default() {
        if tool.function.name == SEARCH_TOOL_NAME {
            search = true;
            continue;
        }
        declarations.push(FunctionDeclaration {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: tool.function.parameters.as_ref().map(sanitize_schema),
        });
    }

    let mut tools: Vec<Tool> = Vec::new();
    if !declarations.is_empty() {
        tools.push(Tool {
            function_declarations: Some(declarations),
            ..Tool::default()
        });
    }
    if search {
        tools.push(Tool {
            google_search: Some(serde_json::json!({})),
            ..Tool::default()
        });
    }

    let tool_config = source
        .tool_choice
        .as_ref()
        .map(tool_choice_config)
        .transpose()?;

    Ok(TransformedRequest {
        model,
        request: GenerateRequest {
            contents,
            system_instruction,
            safety_settings: block_none_safety_settings(),
            tools: (!tools.is_empty()).then_some(tools),
            tool_config,
            generation_config: generation_config(source)?,
        },
    })
}

fn tool_choice_config(choice: &ToolChoice) -> Result<ToolConfig, BridgeError> {
    let function_calling_config = match choice {
        ToolChoice::Mode(mode) => FunctionCallingConfig {
            mode: mode.to_uppercase(),
            allowed_function_names: None,
        },
        ToolChoice::Function(selector) if selector.type_ == "function" => {
            FunctionCallingConfig {
                mode: "ANY".to_string(),
                allowed_function_names: Some(vec![selector.function.name.clone()]),
            }
        }
        ToolChoice::Function(selector) => {
            return Err(BridgeError::UnsupportedToolChoice(selector.type_.clone()))
        }
    };
    Ok(ToolConfig {
        function_calling_config,
    })
}

/// Build the generation config: a fixed field rename table plus response
/// format, reasoning budget, and stop sequences.
fn generation_config(source: &ChatRequest) -> Result<Option<GenerationConfig>, BridgeError> {
    let mut config = GenerationConfig {
        temperature: source.temperature,
        top_p: source.top_p,
        top_k: source.top_k,
        max_output_tokens: source.max_completion_tokens.or(source.max_tokens),
        stop_sequences: source.stop.clone().map(Stop::into_sequences),
        candidate_count: source.n,
        frequency_penalty: source.frequency_penalty,
        presence_penalty: source.presence_penalty,
        seed: source.seed,
        response_mime_type: None,
        response_schema: None,
        thinking_config: None,
    };

    if let Some(format) = &source.response_format {
        match format.format_type.as_str() {
            "json_schema" => {
                let schema = format
                    .json_schema
                    .as_ref()
                    .and_then(|spec| spec.schema.as_ref())
                    .map(sanitize_schema);
                match schema {
                    Some(schema) => {
                        // A bare enum renders as plain enum text, not JSON.
                        let is_enum = schema
                            .as_object()
                            .is_some_and(|obj| obj.contains_key("enum"));
                        config.response_mime_type = Some(if is_enum {
                            "text/x.enum".to_string()
                        } else {
                            "application/json".to_string()
                        });
                        config.response_schema = Some(schema);
                    }
                    None => {
                        config.response_mime_type = Some("application/json".to_string());
                    }
                }
            }
            "json_object" => {
                config.response_mime_type = Some("application/json".to_string());
            }
            "text" => {
                config.response_mime_type = Some("text/plain".to_string());
            }
            other => {
                return Err(BridgeError::UnsupportedResponseFormat(other.to_string()));
            }
        }
    }

    if let Some(effort) = source.reasoning_effort.as_deref() {
        if let Some(thinking_budget) = thinking_budget_for_effort(effort) {
            config.thinking_config = Some(ThinkingConfig { thinking_budget });
        }
    }

    let has_any = config.temperature.is_some()
        || config.top_p.is_some()
        || config.top_k.is_some()
        || config.max_output_tokens.is_some()
        || config.stop_sequences.is_some()
        || config.candidate_count.is_some()
        || config.frequency_penalty.is_some()
        || config.presence_penalty.is_some()
        || config.seed.is_some()
        || config.response_mime_type.is_some()
        || config.thinking_config.is_some();
    Ok(has_any.then_some(config))
}
