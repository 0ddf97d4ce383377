use crate::protocol::gemini::{SafetySetting, UsageMetadata};
use crate::protocol::openai::Usage;

/// Separator used when several target text parts are flattened back into the
/// single content string the source protocol expects.
pub const TEXT_PART_SEPARATOR: &str = "\n\n|>";

/// Map a source role to a target turn role.
///
/// `system` never reaches this table (it becomes the system instruction) and
/// `tool` turns are assembled by the correlator, so both return `None` along
/// with every unknown role.
#[must_use]
pub fn source_role_to_turn_role(role: &str) -> Option<&'static str> {
    match role {
        "user" => Some("user"),
        "assistant" => Some("model"),
        _ => None,
    }
}

/// Map a target finish reason to the source protocol's vocabulary.
///
/// Unrecognized values pass through unchanged: new backend reasons reach the
/// client rather than being masked.
#[must_use]
pub fn finish_reason_to_source(reason: &str) -> &str {
    match reason {
        "STOP" => "stop",
        "MAX_TOKENS" => "length",
        "SAFETY" | "RECITATION" => "content_filter",
        other => other,
    }
}

/// Map a `reasoning_effort` hint to a thinking-token budget.
#[must_use]
pub fn thinking_budget_for_effort(effort: &str) -> Option<u32> {
    match effort {
        "low" => Some(1024),
        "medium" => Some(8192),
        "high" => Some(24576),
        _ => None,
    }
}

const HARM_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

/// The fixed safety policy: block nothing, for every harm category.
///
/// This is a deliberate policy choice of the bridge, not a per-request knob.
#[must_use]
pub fn block_none_safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: (*category).to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
}

/// Translate target usage metadata into the source protocol's usage shape.
#[must_use]
pub fn usage_to_source(metadata: &UsageMetadata) -> Usage {
    Usage {
        prompt_tokens: metadata.prompt_token_count.unwrap_or(0),
        completion_tokens: metadata.candidates_token_count.unwrap_or(0),
        total_tokens: metadata.total_token_count.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_table() {
        assert_eq!(finish_reason_to_source("STOP"), "stop");
        assert_eq!(finish_reason_to_source("MAX_TOKENS"), "length");
        assert_eq!(finish_reason_to_source("SAFETY"), "content_filter");
        assert_eq!(finish_reason_to_source("RECITATION"), "content_filter");
    }

    #[test]
    fn test_unknown_finish_reason_passes_through() {
        assert_eq!(finish_reason_to_source("MALFORMED_FUNCTION_CALL"), "MALFORMED_FUNCTION_CALL");
    }

    #[test]
    fn test_turn_roles() {
        assert_eq!(source_role_to_turn_role("user"), Some("user"));
        assert_eq!(source_role_to_turn_role("assistant"), Some("model"));
        assert_eq!(source_role_to_turn_role("system"), None);
        assert_eq!(source_role_to_turn_role("tool"), None);
    }

    #[test]
    fn test_safety_policy_covers_all_categories() {
        let settings = block_none_safety_settings();
        assert_eq!(settings.len(), 5);
        assert!(settings.iter().all(|s| s.threshold == "BLOCK_NONE"));
    }

    #[test]
    fn test_thinking_budgets() {
        assert_eq!(thinking_budget_for_effort("low"), Some(1024));
        assert_eq!(thinking_budget_for_effort("medium"), Some(8192));
        assert_eq!(thinking_budget_for_effort("high"), Some(24576));
        assert_eq!(thinking_budget_for_effort("maximal"), None);
    }

    #[test]
    fn test_usage_translation() {
        let usage = usage_to_source(&UsageMetadata {
            prompt_token_count: Some(12),
            candidates_token_count: Some(34),
            total_token_count: Some(46),
        });
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 34);
        assert_eq!(usage.total_tokens, 46);
    }
}
