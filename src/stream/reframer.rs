use bytes::Bytes;

use crate::protocol::gemini::{Candidate, GenerateResponse};
use crate::protocol::mapping::usage_to_source;
use crate::protocol::openai::{
    ChatChunk, ChunkChoice, Delta, DeltaToolCall, DeltaToolCallFunction,
};
use crate::stream::sse::FRAME_DELIMITER;
use crate::transform::response::{candidate_finish_reason, candidate_message_parts};
use crate::util::{next_completion_id, unix_now_secs};

/// Stage 2 of the re-framer: translate extracted target-protocol payloads
/// into source-protocol stream chunks, one tick at a time.
///
/// Per-stream state lives here and nowhere else: the generated completion id,
/// the model name, and `last[index]`, the most recently built chunk per
/// candidate. The retained chunk holds back `finish_reason` (and usage) until
/// flush so the terminal chunk is emitted exactly once, at the true end.
pub struct ChunkReframer {
    id: String,
    model: String,
    created: u64,
    include_usage: bool,
    last: Vec<Option<ChatChunk>>,
}

impl ChunkReframer {
    #[must_use]
    pub fn new(model: String, include_usage: bool) -> Self {
        Self {
            id: next_completion_id(),
            model,
            created: unix_now_secs(),
            include_usage,
            last: Vec::new(),
        }
    }

    /// Translate one frame-terminated payload from stage 1.
    pub fn translate(&mut self, payload: &str, out: &mut Vec<Bytes>) {
        self.translate_with(payload, true, out);
    }

    /// Translate one payload, knowing whether stage 1 saw a frame terminator.
    ///
    /// A payload that does not parse as a candidates-bearing object is passed
    /// through opaquely; no recovery is attempted, and a single malformed
    /// tick never aborts the rest of the stream. The delimiter is withheld
    /// for the unterminated tail so already-malformed data is not "repaired".
    pub fn translate_with(&mut self, payload: &str, frame_terminated: bool, out: &mut Vec<Bytes>) {
        let parsed: Option<GenerateResponse> = serde_json::from_str(payload).ok();
        let candidates = parsed.as_ref().and_then(|tick| tick.candidates.as_ref());
        let Some(candidates) = candidates else {
            tracing::error!(payload = %payload, "unparseable stream tick, passing through");
            let mut raw = String::with_capacity(payload.len() + FRAME_DELIMITER.len());
            raw.push_str(payload);
            if frame_terminated {
                raw.push_str(FRAME_DELIMITER);
            }
            out.push(Bytes::from(raw));
            return;
        };
        // Candidates were present, so parsed is too.
        let Some(tick) = parsed.as_ref() else { return };

        let model = tick
            .model_version
            .clone()
            .unwrap_or_else(|| self.model.clone());

        if candidates.is_empty() {
            let blocked = tick
                .prompt_feedback
                .as_ref()
                .and_then(|fb| fb.block_reason.as_deref())
                .is_some();
            if blocked {
                self.emit(
                    &self.chunk(
                        model,
                        vec![ChunkChoice {
                            index: 0,
                            delta: Delta::default(),
                            finish_reason: Some("content_filter".to_string()),
                        }],
                    ),
                    out,
                );
            }
            return;
        }

        if candidates.len() > 1 {
            tracing::warn!(
                count = candidates.len(),
                "stream tick carried multiple candidates"
            );
        }

        for candidate in candidates {
            self.translate_candidate(candidate, &model, tick, out);
        }
    }

    fn translate_candidate(
        &mut self,
        candidate: &Candidate,
        model: &str,
        tick: &GenerateResponse,
        out: &mut Vec<Bytes>,
    ) {
        let index = candidate.index.unwrap_or(0) as usize;
        if self.last.len() <= index {
            self.last.resize_with(index + 1, || None);
        }

        // Announce the responder role once per candidate, before any content.
        if self.last[index].is_none() {
            self.emit(
                &self.chunk(
                    model.to_string(),
                    vec![ChunkChoice {
                        index: index as u32,
                        delta: Delta {
                            role: Some("assistant".to_string()),
                            content: Some(String::new()),
                            tool_calls: None,
                        },
                        finish_reason: None,
                    }],
                ),
                out,
            );
        }

        let delta = candidate_delta(candidate);
        let finish_reason = candidate_finish_reason(candidate, delta.tool_calls.is_some());

        // Forward only deltas that actually say something; a bare terminal
        // tick would otherwise surface as a confusing blank update.
        if delta.has_content() {
            self.emit(
                &self.chunk(
                    model.to_string(),
                    vec![ChunkChoice {
                        index: index as u32,
                        delta,
                        finish_reason: None,
                    }],
                ),
                out,
            );
        }

        let mut retained = self.chunk(
            model.to_string(),
            vec![ChunkChoice {
                index: index as u32,
                delta: Delta::default(),
                finish_reason,
            }],
        );
        if self.include_usage {
            if let Some(metadata) = &tick.usage_metadata {
                retained.usage = Some(usage_to_source(metadata));
            }
        }
        self.last[index] = Some(retained);
    }

    /// End of stream: release every retained terminal chunk, then the
    /// termination sentinel. If no candidate was ever seen, nothing is
    /// emitted beyond whatever passthrough already occurred.
    pub fn flush(&mut self, out: &mut Vec<Bytes>) {
        let retained: Vec<ChatChunk> = self.last.drain(..).flatten().collect();
        if retained.is_empty() {
            return;
        }
        for chunk in &retained {
            self.emit(chunk, out);
        }
        out.push(Bytes::from_static(b"data: [DONE]\n\n"));
    }

    fn chunk(&self, model: String, choices: Vec<ChunkChoice>) -> ChatChunk {
        ChatChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model,
            choices,
            usage: None,
        }
    }

    fn emit(&self, chunk: &ChatChunk, out: &mut Vec<Bytes>) {
        if let Ok(json) = serde_json::to_string(chunk) {
            let mut frame = String::with_capacity(8 + json.len());
            frame.push_str("data: ");
            frame.push_str(&json);
            frame.push_str(FRAME_DELIMITER);
            out.push(Bytes::from(frame));
        }
    }
}

/// Build the delta for one candidate tick: text parts collapse into
/// `content`, function calls become indexed tool-call deltas with the
/// conventional id prefix restored.
fn candidate_delta(candidate: &Candidate) -> Delta {
    let (content, tool_calls) = candidate_message_parts(candidate);
    Delta {
        role: None,
        content,
        tool_calls: tool_calls.map(|calls| {
            calls
                .into_iter()
                .enumerate()
                .map(|(position, call)| DeltaToolCall {
                    index: position as u32,
                    id: Some(call.id),
                    type_: Some(call.type_),
                    function: Some(DeltaToolCallFunction {
                        name: Some(call.function.name),
                        arguments: Some(call.function.arguments),
                    }),
                })
                .collect()
        }),
    }
}
