pub mod reframer;
pub mod sse;

pub use reframer::ChunkReframer;
pub use sse::{FrameExtractor, MalformedTail};

use std::collections::VecDeque;

use futures_util::Stream;

struct PipelineState<S> {
    upstream: std::pin::Pin<Box<S>>,
    extractor: FrameExtractor,
    reframer: ChunkReframer,
    pending: VecDeque<bytes::Bytes>,
    payloads: Vec<String>,
    frames: Vec<bytes::Bytes>,
    finished: bool,
}

impl<S> PipelineState<S> {
    /// End of input: run the stage-1 flush (malformed tail, if any) through
    /// stage 2, then the stage-2 flush, and queue everything for delivery.
    fn finish(&mut self) {
        if let Some(MalformedTail(tail)) = self.extractor.flush() {
            self.reframer.translate_with(&tail, false, &mut self.frames);
        }
        self.reframer.flush(&mut self.frames);
        self.pending.extend(self.frames.drain(..));
        self.finished = true;
    }
}

/// Pipe a raw backend SSE byte stream through both re-framer stages,
/// yielding source-protocol SSE bytes.
///
/// All mutable state (the stage-1 buffer, the stage-2 last-chunk table) is
/// constructed here, scoped to this one response, and dropped with the
/// stream; nothing is shared across requests.
pub fn reframe_stream<S, E>(
    byte_stream: S,
    model: String,
    include_usage: bool,
) -> impl Stream<Item = bytes::Bytes> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    use futures_util::StreamExt;

    let state = PipelineState {
        upstream: Box::pin(byte_stream),
        extractor: FrameExtractor::new(),
        reframer: ChunkReframer::new(model, include_usage),
        pending: VecDeque::new(),
        payloads: Vec::with_capacity(4),
        frames: Vec::with_capacity(4),
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((frame, state));
            }
            if state.finished {
                return None;
            }

            match state.upstream.as_mut().next().await {
                Some(Ok(bytes)) => {
                    state.extractor.feed(&bytes, &mut state.payloads);
                    for payload in state.payloads.drain(..) {
                        state.reframer.translate(&payload, &mut state.frames);
                    }
                    state.pending.extend(state.frames.drain(..));
                }
                Some(Err(err)) => {
                    // A broken upstream read ends the stream; whatever was
                    // already translated still reaches the client, followed
                    // by the normal flush sequence.
                    tracing::error!(error = %err, "upstream stream read failed");
                    state.finish();
                }
                None => {
                    state.finish();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    async fn collect(chunks: Vec<&'static [u8]>) -> Vec<String> {
        let source = futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<bytes::Bytes, std::convert::Infallible>(bytes::Bytes::from_static(chunk))),
        );
        reframe_stream(source, "m".into(), false)
            .map(|frame| String::from_utf8(frame.to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_end_to_end_reframing() {
        let out = collect(vec![
            b"data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hi\"}]},\"index\":0}]}\r\n\r\n",
            b"data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"!\"}]},\"finishReason\":\"STOP\",\"index\":0}]}\r\n\r\n",
        ])
        .await;

        // Preamble, two content chunks, terminal chunk, sentinel.
        assert_eq!(out.len(), 5);
        assert!(out[0].contains("\"role\":\"assistant\""));
        assert!(out[1].contains("\"content\":\"Hi\""));
        assert!(out[2].contains("\"content\":\"!\""));
        assert!(out[3].contains("\"finish_reason\":\"stop\""));
        assert_eq!(out[4], "data: [DONE]\n\n");
        for frame in &out {
            assert!(frame.starts_with("data: "));
            assert!(frame.ends_with("\n\n"));
        }
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks_survive() {
        let out = collect(vec![
            b"data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"pa",
            b"rts\":[{\"text\":\"Hi\"}]},\"index\":0}]}\r\n",
            b"\r\n",
        ])
        .await;
        assert!(out.iter().any(|frame| frame.contains("\"content\":\"Hi\"")));
    }

    #[tokio::test]
    async fn test_malformed_tail_passes_through_without_delimiter() {
        let out = collect(vec![b"data: {\"broken\":"]).await;
        assert_eq!(out, vec!["data: {\"broken\":".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_stream_emits_nothing() {
        let out = collect(vec![]).await;
        assert!(out.is_empty());
    }
}
