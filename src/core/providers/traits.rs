use std::future::Future;
use std::pin::Pin;

/// Chat-completion backend used by the describer and narrator capabilities.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "openrouter").
    fn name(&self) -> &str;

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

    /// Chat with image inputs attached to the user message.
    /// Default: unsupported.
    fn chat_with_images<'a>(
        &'a self,
        _system_prompt: Option<&'a str>,
        _message: &'a str,
        _image_urls: &'a [String],
        _model: &'a str,
        _temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { anyhow::bail!("{} does not accept image input", self.name()) })
    }
}

/// Pull the JSON object out of a model reply, tolerating markdown fences and
/// leading prose.
pub fn extract_json(reply: &str) -> &str {
    let trimmed = reply.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TextOnly;

    impl Provider for TextOnly {
        fn name(&self) -> &str {
            "text-only"
        }

        fn chat_with_system<'a>(
            &'a self,
            _system_prompt: Option<&'a str>,
            message: &'a str,
            _model: &'a str,
            _temperature: f64,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move { Ok(message.to_string()) })
        }
    }

    #[tokio::test]
    async fn images_unsupported_by_default() {
        let err = TextOnly
            .chat_with_images(None, "hi", &[], "m", 0.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("text-only"));
    }

    #[test]
    fn extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn extract_json_skips_prose() {
        assert_eq!(extract_json("Here you go: {\"a\": {\"b\": 2}} thanks"), "{\"a\": {\"b\": 2}}");
        assert_eq!(extract_json("no json"), "no json");
    }
}
