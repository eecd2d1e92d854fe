//! Embedding issued nonces into form fields and URLs.

use crate::error::{NonceError, Result};

/// Default name of the referer field emitted next to the nonce field
pub const DEFAULT_REFERER_FIELD: &str = "_http_referer";

/// Renders the form fragment carrying a nonce
pub trait FieldRenderer: Send + Sync {
    /// Render `token` under `binding_name`, plus a referer marker when requested
    fn render_field(&self, binding_name: &str, token: &str, include_referer: bool) -> String;
}

/// Renders a URL carrying a nonce as a query parameter
pub trait UrlRenderer: Send + Sync {
    fn render_url(&self, base_url: &str, binding_name: &str, token: &str) -> Result<String>;
}

/// Hidden `<input>` renderer
#[derive(Debug, Clone)]
pub struct HiddenInputRenderer {
    referer_field: String,
    referer: Option<String>,
}

impl HiddenInputRenderer {
    pub fn new() -> Self {
        Self {
            referer_field: DEFAULT_REFERER_FIELD.to_string(),
            referer: None,
        }
    }

    /// Set the name of the referer field
    pub fn with_referer_field(mut self, name: impl Into<String>) -> Self {
        self.referer_field = name.into();
        self
    }

    /// Set the URI of the current request, emitted as the referer value
    pub fn with_referer(mut self, uri: impl Into<String>) -> Self {
        self.referer = Some(uri.into());
        self
    }
}

impl Default for HiddenInputRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRenderer for HiddenInputRenderer {
    fn render_field(&self, binding_name: &str, token: &str, include_referer: bool) -> String {
        let name = encode_attribute(binding_name);
        let mut field = format!(
            r#"<input type="hidden" id="{}" name="{}" value="{}" />"#,
            name,
            name,
            encode_attribute(token)
        );

        if include_referer {
            field.push_str(&format!(
                r#"<input type="hidden" name="{}" value="{}" />"#,
                encode_attribute(&self.referer_field),
                encode_attribute(self.referer.as_deref().unwrap_or_default())
            ));
        }

        field
    }
}

/// Query string renderer.
///
/// Appends `binding_name=token` to the query, replacing an existing pair with
/// the same name. Fragments are kept at the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryUrlRenderer;

impl UrlRenderer for QueryUrlRenderer {
    fn render_url(&self, base_url: &str, binding_name: &str, token: &str) -> Result<String> {
        let pair = serde_urlencoded::to_string(&[(binding_name, token)])
            .map_err(|e| NonceError::collaborator(format!("Failed to encode query: {}", e)))?;

        let (without_fragment, fragment) = match base_url.split_once('#') {
            Some((url, fragment)) => (url, Some(fragment)),
            None => (base_url, None),
        };
        let (path, query) = without_fragment
            .split_once('?')
            .unwrap_or((without_fragment, ""));

        let mut pairs: Vec<&str> = query
            .split('&')
            .filter(|p| !p.is_empty() && decode_name(p).as_deref() != Some(binding_name))
            .collect();
        pairs.push(&pair);

        let mut url = format!("{}?{}", path, pairs.join("&"));
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }

        Ok(url)
    }
}

/// Decoded name of a single `name=value` query pair
fn decode_name(pair: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(pair)
        .ok()?
        .into_iter()
        .next()
        .map(|(name, _)| name)
}

fn encode_attribute(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '"' => "&quot;".to_string(),
            '\'' => "&#x27;".to_string(),
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}
