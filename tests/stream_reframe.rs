//! End-to-end streaming re-framing: backend SSE bytes in, source-protocol
//! SSE frames out.

use bytes::Bytes;
use futures_util::StreamExt;
use gembridge::stream::reframe_stream;

async fn reframe(chunks: Vec<Vec<u8>>, include_usage: bool) -> Vec<String> {
    let source = futures_util::stream::iter(
        chunks
            .into_iter()
            .map(|chunk| Ok::<Bytes, std::convert::Infallible>(Bytes::from(chunk))),
    );
    reframe_stream(source, "gemini-2.0-flash".into(), include_usage)
        .map(|frame| String::from_utf8(frame.to_vec()).unwrap())
        .collect()
        .await
}

fn tick(json: serde_json::Value) -> Vec<u8> {
    format!("data: {json}\r\n\r\n").into_bytes()
}

fn payload(frame: &str) -> serde_json::Value {
    serde_json::from_str(frame.strip_prefix("data: ").unwrap().trim_end()).unwrap()
}

fn text_tick(text: &str, finish: Option<&str>) -> Vec<u8> {
    let mut candidate = serde_json::json!({
        "content": {"role": "model", "parts": [{"text": text}]},
        "index": 0
    });
    if let Some(reason) = finish {
        candidate["finishReason"] = reason.into();
    }
    tick(serde_json::json!({"candidates": [candidate]}))
}

#[tokio::test]
async fn preamble_appears_once_before_first_content() {
    let out = reframe(
        vec![text_tick("Hel", None), text_tick("lo", Some("STOP"))],
        false,
    )
    .await;

    let role_chunks: Vec<usize> = out
        .iter()
        .enumerate()
        .filter(|(_, frame)| frame.contains("\"role\":\"assistant\""))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(role_chunks, vec![0]);
    assert_eq!(payload(&out[0])["choices"][0]["delta"]["content"], "");
    assert_eq!(payload(&out[1])["choices"][0]["delta"]["content"], "Hel");
}

#[tokio::test]
async fn split_point_never_changes_the_result() {
    // Each run generates a fresh completion id, so compare with ids removed.
    fn normalized(frames: &[String]) -> Vec<serde_json::Value> {
        frames
            .iter()
            .map(|frame| {
                if frame == "data: [DONE]\n\n" {
                    return serde_json::Value::String("[DONE]".into());
                }
                let mut chunk = payload(frame);
                chunk.as_object_mut().unwrap().remove("id");
                chunk
            })
            .collect()
    }

    let wire = {
        let mut bytes = text_tick("Hi", None);
        bytes.extend(text_tick("!", Some("STOP")));
        bytes
    };

    let whole = normalized(&reframe(vec![wire.clone()], false).await);
    for split in 1..wire.len() {
        let parts = vec![wire[..split].to_vec(), wire[split..].to_vec()];
        let out = normalized(&reframe(parts, false).await);
        assert_eq!(out, whole, "split at byte {split}");
    }
}

#[tokio::test]
async fn max_tokens_with_no_trailing_text_ends_cleanly() {
    let out = reframe(
        vec![
            text_tick("truncated thought", None),
            tick(serde_json::json!({
                "candidates": [{"finishReason": "MAX_TOKENS", "index": 0}]
            })),
        ],
        false,
    )
    .await;

    // Preamble, one content chunk, terminal chunk, sentinel. No blank
    // update for the finish-only tick.
    assert_eq!(out.len(), 4);
    assert_eq!(
        payload(&out[2])["choices"][0]["finish_reason"],
        "length"
    );
    assert!(payload(&out[2])["choices"][0]["delta"]
        .get("content")
        .is_none());
    assert_eq!(out[3], "data: [DONE]\n\n");
}

#[tokio::test]
async fn finish_reason_appears_only_in_terminal_chunk() {
    let out = reframe(vec![text_tick("done", Some("STOP"))], false).await;
    assert_eq!(out.len(), 4);
    assert!(payload(&out[0])["choices"][0]["finish_reason"].is_null());
    assert!(payload(&out[1])["choices"][0]["finish_reason"].is_null());
    assert_eq!(payload(&out[2])["choices"][0]["finish_reason"], "stop");
    assert_eq!(out[3], "data: [DONE]\n\n");
}

#[tokio::test]
async fn usage_rides_on_the_terminal_chunk_when_requested() {
    let chunks = vec![
        tick(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "x"}]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {
                "promptTokenCount": 7,
                "candidatesTokenCount": 2,
                "totalTokenCount": 9
            }
        })),
    ];

    let out = reframe(chunks.clone(), true).await;
    let terminal = payload(&out[out.len() - 2]);
    assert_eq!(terminal["usage"]["prompt_tokens"], 7);
    assert_eq!(terminal["usage"]["completion_tokens"], 2);

    let out = reframe(chunks, false).await;
    let terminal = payload(&out[out.len() - 2]);
    assert!(terminal.get("usage").is_none());
}

#[tokio::test]
async fn streamed_tool_call_is_indexed_and_prefixed() {
    let out = reframe(
        vec![tick(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{
                    "functionCall": {"id": "w1", "name": "get_weather", "args": {"city": "Oslo"}}
                }]},
                "finishReason": "STOP",
                "index": 0
            }]
        }))],
        false,
    )
    .await;

    let call = &payload(&out[1])["choices"][0]["delta"]["tool_calls"][0];
    assert_eq!(call["index"], 0);
    assert_eq!(call["id"], "call_w1");
    assert_eq!(call["type"], "function");
    assert_eq!(
        payload(&out[2])["choices"][0]["finish_reason"],
        "tool_calls"
    );
}

#[tokio::test]
async fn malformed_ticks_degrade_to_passthrough_without_killing_the_stream() {
    let mut chunks = vec![text_tick("ok", None)];
    chunks.push(b"data: %%%not json%%%\r\n\r\n".to_vec());
    chunks.push(text_tick("still ok", Some("STOP")));
    let out = reframe(chunks, false).await;

    assert!(out.iter().any(|frame| frame == "%%%not json%%%\n\n"));
    assert!(out
        .iter()
        .any(|frame| frame.contains("\"content\":\"still ok\"")));
    assert_eq!(out.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn unterminated_tail_is_forwarded_as_is() {
    let out = reframe(vec![b"data: {\"cand".to_vec()], false).await;
    assert_eq!(out, vec!["data: {\"cand".to_string()]);
}

#[tokio::test]
async fn prompt_block_yields_single_synthetic_chunk() {
    let out = reframe(
        vec![tick(serde_json::json!({
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }))],
        false,
    )
    .await;

    assert_eq!(out.len(), 1);
    assert_eq!(
        payload(&out[0])["choices"][0]["finish_reason"],
        "content_filter"
    );
}
