use serde::de::DeserializeOwned;

/// Parses `content` as JSON, tolerating a leading/trailing markdown code
/// fence (```` ```json ... ``` ```` or bare ```` ``` ... ``` ````) the way an
/// LLM commonly wraps structured output (SPEC_FULL.md §6, §9). Returns `None`
/// on any parse failure so the caller can substitute its own neutral default
/// — this helper never panics and never propagates a parse error.
pub fn strip_fences_and_parse<T: DeserializeOwned>(content: &str) -> Option<T> {
    let stripped = strip_fences(content);
    serde_json::from_str(stripped.trim()).ok()
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Narrative {
        narrative: String,
    }

    #[test]
    fn parses_bare_json() {
        let parsed: Narrative = strip_fences_and_parse(r#"{"narrative": "it rains"}"#).unwrap();
        assert_eq!(parsed.narrative, "it rains");
    }

    #[test]
    fn parses_fenced_json() {
        let content = "```json\n{\"narrative\": \"it rains\"}\n```";
        let parsed: Narrative = strip_fences_and_parse(content).unwrap();
        assert_eq!(parsed.narrative, "it rains");
    }

    #[test]
    fn returns_none_on_garbage() {
        let parsed: Option<Narrative> = strip_fences_and_parse("not json at all");
        assert!(parsed.is_none());
    }
}
