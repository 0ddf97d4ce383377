use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::BridgeError;
use crate::protocol::gemini::{InlineData, Part};
use crate::protocol::openai::{ContentPart, MessageContent};
use crate::transport::UpstreamClient;

/// Convert one message's content into target parts.
///
/// Bare strings become a single text part. Array content is converted item by
/// item; remote image fetches run concurrently but each result is written
/// back at its original position, so completion order never reorders parts.
///
/// # Errors
///
/// - [`BridgeError::UnsupportedContent`] for unknown item tags
/// - [`BridgeError::InvalidInput`] for malformed items or data URIs
/// - [`BridgeError::FetchError`] when a remote image GET fails
pub async fn message_parts(
    client: &UpstreamClient,
    content: &MessageContent,
) -> Result<Vec<Part>, BridgeError> {
    let items = match content {
        MessageContent::Text(text) => return Ok(vec![Part::Text(text.clone())]),
        MessageContent::Parts(items) => items,
    };

    let mut parts =
        futures_util::future::try_join_all(items.iter().map(|item| item_part(client, item)))
            .await?;

    // The target protocol rejects image-only turns; pad with an empty text
    // part so the turn stays valid.
    if !items.is_empty() && items.iter().all(|item| item.part_type == "image_url") {
        parts.push(Part::Text(String::new()));
    }

    Ok(parts)
}

async fn item_part(client: &UpstreamClient, item: &ContentPart) -> Result<Part, BridgeError> {
    match item.part_type.as_str() {
        "text" => {
            let text = item
                .text
                .as_ref()
                .ok_or_else(|| BridgeError::InvalidInput("text part without text".into()))?;
            Ok(Part::Text(text.clone()))
        }
        "image_url" => {
            let image = item.image_url.as_ref().ok_or_else(|| {
                BridgeError::InvalidInput("image_url part without image_url".into())
            })?;
            Ok(Part::InlineData(resolve_image(client, &image.url).await?))
        }
        "input_audio" => {
            let audio = item.input_audio.as_ref().ok_or_else(|| {
                BridgeError::InvalidInput("input_audio part without input_audio".into())
            })?;
            Ok(Part::InlineData(InlineData {
                mime_type: format!("audio/{}", audio.format),
                data: audio.data.clone(),
            }))
        }
        other => Err(BridgeError::UnsupportedContent(other.to_string())),
    }
}

async fn resolve_image(client: &UpstreamClient, url: &str) -> Result<InlineData, BridgeError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return client.fetch_inline_data(url).await;
    }
    if url.starts_with("data:") {
        return parse_data_uri(url);
    }
    Err(BridgeError::InvalidInput(format!(
        "unsupported image url scheme: {url}"
    )))
}

/// Parse a `data:<mime>[;base64],<payload>` URI into inline data.
///
/// With `;base64` the payload is forwarded as-is; otherwise the raw payload
/// is base64-encoded for the wire.
fn parse_data_uri(uri: &str) -> Result<InlineData, BridgeError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| invalid_data_uri(uri))?;
    let comma = rest.find(',').ok_or_else(|| invalid_data_uri(uri))?;
    let (header, payload) = (&rest[..comma], &rest[comma + 1..]);

    let (mime_type, is_base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    if mime_type.is_empty() {
        return Err(invalid_data_uri(uri));
    }

    let data = if is_base64 {
        payload.to_string()
    } else {
        BASE64.encode(payload.as_bytes())
    };

    Ok(InlineData {
        mime_type: mime_type.to_string(),
        data,
    })
}

fn invalid_data_uri(uri: &str) -> BridgeError {
    let shown = if uri.len() > 64 { &uri[..64] } else { uri };
    BridgeError::InvalidInput(format!("malformed data URI: {shown}"))
}
