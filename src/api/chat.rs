use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::auth::client_credential;
use crate::error::BridgeError;
use crate::protocol::openai::ChatRequest;
use crate::state::AppState;
use crate::stream::reframe_stream;
use crate::transform::{assemble_completion, transform_request};

/// `POST /v1/chat/completions`.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(
    state: Arc<AppState>,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, BridgeError> {
    let credential = client_credential(headers)?;
    let source: ChatRequest = serde_json::from_slice(body)
        .map_err(|err| BridgeError::InvalidInput(format!("invalid request body: {err}")))?;

    let transformed = transform_request(&state.upstream, &source).await?;

    if source.stream.unwrap_or(false) {
        let include_usage = source
            .stream_options
            .as_ref()
            .and_then(|options| options.include_usage)
            .unwrap_or(false);
        let upstream = state
            .upstream
            .stream_generate_content(&transformed.model, &credential, &transformed.request)
            .await?;
        let frames = reframe_stream(
            upstream.bytes_stream(),
            transformed.model.clone(),
            include_usage,
        )
        .map(Ok::<Bytes, Infallible>);
        return Ok(sse_response(Body::from_stream(frames)));
    }

    let raw = state
        .upstream
        .generate_content(&transformed.model, &credential, &transformed.request)
        .await?;
    let completion = assemble_completion(raw, &transformed.model)?;
    Ok(axum::Json(completion).into_response())
}

fn sse_response(body: Body) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
