//! Pulling a JSON object out of free-form model output.

/// Extract the JSON object from an LLM response.
///
/// Handles a bare object, a fenced code block, and an object embedded in
/// surrounding prose.
pub fn extract_json_object(text: &str) -> &str {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed;
    }

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('{') {
                    return inner;
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_object() {
        let input = r#"{"is_scam": true}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn fenced_block() {
        let input = "```json\n{\"is_scam\": false}\n```";
        assert_eq!(extract_json_object(input), r#"{"is_scam": false}"#);
    }

    #[test]
    fn bare_fence() {
        let input = "```\n{\"reply\": \"ok\"}\n```";
        assert_eq!(extract_json_object(input), r#"{"reply": "ok"}"#);
    }

    #[test]
    fn embedded_in_prose() {
        let input = "Sure, here you go: {\"reply\": \"hello\"} hope that helps";
        assert_eq!(extract_json_object(input), r#"{"reply": "hello"}"#);
    }

    #[test]
    fn no_object_returns_trimmed() {
        assert_eq!(extract_json_object("  nothing here "), "nothing here");
    }
}
