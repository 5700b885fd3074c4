use super::reliable::classify_provider_error;
use super::traits::{Provider, extract_json};
use crate::core::listing::{ListingMetadata, VisionDescriptor};
use crate::error::{Result, ValidationError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Capability: turn a listing's images into a structured descriptor.
pub trait VisionDescriber: Send + Sync {
    fn describe<'a>(
        &'a self,
        listing_id: &'a str,
        metadata: &'a ListingMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<VisionDescriptor>> + Send + 'a>>;
}

const VISION_SYSTEM_PROMPT: &str = "You are assessing real estate listing photos for a buyer \
with a strong aesthetic point of view. Identify each distinct room or space, the materials \
actually visible (hardwood vs laminate, stone vs formica), the natural light, and the condition. \
Flag concerning patterns such as recent-flip signs (grey paint everywhere, cheap vinyl plank, \
builder-grade finishes), cheap materials, awkward proportions and visible damage. Note positive \
signals such as original detail, good light and architectural character. Reply with JSON only.";

const VISION_RESPONSE_SHAPE: &str = r#"Respond with a JSON object in exactly this shape:
{
  "rooms": [
    {
      "room_type": "kitchen",
      "aesthetic_quality": 7,
      "materials": ["soapstone counters", "oak floors"],
      "light_quality": "abundant | moderate | poor",
      "condition": "original | updated | renovated | flip | dated",
      "notes": "short observation"
    }
  ],
  "overall_aesthetic": 7,
  "architectural_style": "craftsman",
  "red_flags": ["grey paint throughout suggests a recent flip"],
  "positive_signals": ["original hardwood floors", "large windows"],
  "renovation_state": "original | partial | full | flip"
}"#;

/// `VisionDescriber` backed by a multimodal chat provider.
pub struct LlmDescriber {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    max_images: usize,
}

impl LlmDescriber {
    pub fn new(provider: Arc<dyn Provider>, model: &str, temperature: f64, max_images: usize) -> Self {
        Self {
            provider,
            model: model.to_string(),
            temperature,
            max_images: max_images.max(1),
        }
    }

    fn build_prompt(metadata: &ListingMetadata) -> String {
        let mut prompt = format!("Listing: {}\n", metadata.address);
        if let Some(price) = metadata.price {
            prompt.push_str(&format!("Price: ${price}\n"));
        }
        if !metadata.description.is_empty() {
            let description: String = metadata.description.chars().take(800).collect();
            prompt.push_str(&format!("Description: {description}\n"));
        }
        prompt.push('\n');
        prompt.push_str(VISION_RESPONSE_SHAPE);
        prompt
    }
}

/// Parse and validate a descriptor reply.
pub fn parse_descriptor(reply: &str) -> Result<VisionDescriptor> {
    let descriptor: VisionDescriptor =
        serde_json::from_str(extract_json(reply)).map_err(|err| ValidationError::Unparseable {
            what: "vision",
            message: err.to_string(),
        })?;
    descriptor.validate()?;
    Ok(descriptor)
}

impl VisionDescriber for LlmDescriber {
    fn describe<'a>(
        &'a self,
        listing_id: &'a str,
        metadata: &'a ListingMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<VisionDescriptor>> + Send + 'a>> {
        Box::pin(async move {
            let images: Vec<String> = metadata
                .image_urls
                .iter()
                .take(self.max_images)
                .cloned()
                .collect();
            tracing::debug!(listing_id, images = images.len(), "requesting vision descriptor");

            let prompt = Self::build_prompt(metadata);
            let reply = self
                .provider
                .chat_with_images(
                    Some(VISION_SYSTEM_PROMPT),
                    &prompt,
                    &images,
                    &self.model,
                    self.temperature,
                )
                .await
                .map_err(|err| classify_provider_error("vision", &err))?;
            parse_descriptor(&reply)
        })
    }
}
