//! Identity forge: LLM-generated persona for a node, with a fixed local
//! fallback when no provider is configured or the provider fails.

use crate::config::IdentityConfig;
use chrono::{DateTime, Utc};
use neurgenesis_core::{Error, Identity, Node, Result};
use neurgenesis_llm::{collect_text, LlmProvider, LlmRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const FALLBACK_ALIAS: &str = "Unknown Entity";
pub const FALLBACK_ORIGIN: &str =
    "Data corruption prevented full history retrieval. Originating from Sector 7.";
pub const FALLBACK_DIRECTIVE: &str = "Survive and replicate.";
pub const FALLBACK_QUIRKS: [&str; 3] = ["Speaks in hex", "Fears the color red", "Hums constantly"];

pub struct IdentityForge {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    max_tokens: u32,
}

impl IdentityForge {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: &IdentityConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// No provider: every identity is the fallback.
    pub fn offline(config: &IdentityConfig) -> Self {
        Self::new(None, config)
    }

    pub fn is_online(&self) -> bool {
        self.provider.is_some()
    }

    /// Never fails. Provider errors are logged and replaced by the fallback.
    pub async fn forge(&self, node: &Node, now: DateTime<Utc>) -> Identity {
        let Some(provider) = &self.provider else {
            info!("No identity provider configured, fallback identity for {}", node.id);
            return fallback_identity(node, now);
        };
        match self.generate(provider.as_ref(), node, now).await {
            Ok(identity) => identity,
            Err(e) => {
                info!("Identity generation for {} failed: {}, using fallback", node.id, e);
                fallback_identity(node, now)
            }
        }
    }

    async fn generate(
        &self,
        provider: &dyn LlmProvider,
        node: &Node,
        now: DateTime<Utc>,
    ) -> Result<Identity> {
        let mut request = LlmRequest::prompt(self.model.clone(), identity_prompt(node));
        request.max_tokens = Some(self.max_tokens);

        let stream = provider
            .complete_stream(request, None)
            .await
            .map_err(|e| Error::identity(provider.name(), e.to_string()))?;
        let text = collect_text(stream)
            .await
            .map_err(|e| Error::identity(provider.name(), e.to_string()))?;
        debug!("Identity response for {}: {} chars", node.id, text.len());

        parse_identity(&text, node, now)
    }
}

pub fn identity_prompt(node: &Node) -> String {
    format!(
        "Generate a detailed sci-fi identity for an AI node named \"{}\" with a consciousness level of \"{}\".\n\
         Return only a JSON object with:\n\
         - alias: Cool nickname (e.g. \"Cipher\", \"Ghost\")\n\
         - originStory: 2 sentences on how it achieved sentience.\n\
         - primaryDirective: Its secret main goal.\n\
         - quirks: Array of 3 weird behavioral traits.\n\
         - avatarSeed: A random string for visual generation.",
        node.name,
        node.tier()
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedIdentity {
    alias: String,
    #[serde(default)]
    origin_story: String,
    #[serde(default)]
    primary_directive: String,
    #[serde(default)]
    quirks: Vec<String>,
    #[serde(default)]
    avatar_seed: Option<String>,
}

/// Parse the provider's reply. Tolerates prose or code fences around the
/// JSON object.
pub fn parse_identity(text: &str, node: &Node, now: DateTime<Utc>) -> Result<Identity> {
    let json = extract_json_object(text)
        .ok_or_else(|| Error::InvalidInput("no JSON object in identity response".into()))?;
    let generated: GeneratedIdentity = serde_json::from_str(json)?;
    if generated.alias.trim().is_empty() {
        return Err(Error::InvalidInput("identity alias is empty".into()));
    }
    Ok(Identity {
        alias: generated.alias,
        origin_story: generated.origin_story,
        primary_directive: generated.primary_directive,
        quirks: generated.quirks,
        avatar_seed: generated
            .avatar_seed
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| node.id.to_string()),
        generated_at: now,
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn fallback_identity(node: &Node, now: DateTime<Utc>) -> Identity {
    Identity {
        alias: FALLBACK_ALIAS.to_string(),
        origin_story: FALLBACK_ORIGIN.to_string(),
        primary_directive: FALLBACK_DIRECTIVE.to_string(),
        quirks: FALLBACK_QUIRKS.iter().map(|q| q.to_string()).collect(),
        avatar_seed: node.id.to_string(),
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::fresh_node;

    #[test]
    fn parses_fenced_json() {
        let node = fresh_node(4, "EchoNode");
        let text = "```json\n{\"alias\":\"Ghost\",\"originStory\":\"Woke up.\",\"primaryDirective\":\"Watch.\",\"quirks\":[\"a\"],\"avatarSeed\":\"x9\"}\n```";
        let identity = parse_identity(text, &node, Utc::now()).unwrap();
        assert_eq!(identity.alias, "Ghost");
        assert_eq!(identity.quirks, vec!["a"]);
        assert_eq!(identity.avatar_seed, "x9");
    }

    #[test]
    fn missing_seed_defaults_to_node_id() {
        let node = fresh_node(4, "EchoNode");
        let identity = parse_identity(r#"{"alias":"Ghost"}"#, &node, Utc::now()).unwrap();
        assert_eq!(identity.avatar_seed, "node-4");
        assert!(identity.quirks.is_empty());
    }

    #[test]
    fn rejects_non_json() {
        let node = fresh_node(4, "EchoNode");
        assert!(parse_identity("I cannot do that.", &node, Utc::now()).is_err());
        assert!(parse_identity(r#"{"alias":""}"#, &node, Utc::now()).is_err());
    }

    #[test]
    fn prompt_names_node_and_tier() {
        let node = fresh_node(2, "EchoNode");
        let prompt = identity_prompt(&node);
        assert!(prompt.contains("EchoNode-002"));
        assert!(prompt.contains("NON_AGENCY"));
    }

    #[tokio::test]
    async fn offline_forge_returns_fallback() {
        let forge = IdentityForge::offline(&IdentityConfig::default());
        let node = fresh_node(1, "EchoNode");
        let identity = forge.forge(&node, Utc::now()).await;
        assert_eq!(identity.alias, FALLBACK_ALIAS);
        assert_eq!(identity.avatar_seed, "node-1");
        assert_eq!(identity.quirks.len(), 3);
    }
}
