//! Source map reference discovery and payload retrieval.
//!
//! Fetches a compiled resource, looks for a `sourceMappingURL` comment in
//! either the line form used by scripts (`//# sourceMappingURL=...`) or the
//! block form used by stylesheets (`/*# sourceMappingURL=... */`), resolves it
//! against the resource URL and fetches the map payload.

use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;
use url::Url;

use crate::error::{HarvestError, HarvestResult};
use crate::http_client::HttpClient;
use crate::types::SourceMapReference;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"//[#@][ \t]*sourceMappingURL[ \t]*=[ \t]*(\S+)|/\*[#@][ \t]*sourceMappingURL[ \t]*=[ \t]*([^\s*]+)[^*]*\*/",
        )
        .expect("valid regex")
    })
}

/// Find the first source map reference in `body`, in either comment form.
pub fn extract_reference(body: &str) -> Option<&str> {
    let caps = reference_pattern().captures(body)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Resolve `reference` against the resource that contains it.
pub fn resolve_reference(resource_url: &Url, reference: &str) -> HarvestResult<Url> {
    resource_url
        .join(reference)
        .map_err(|source| HarvestError::InvalidUrl {
            url: reference.to_string(),
            source,
        })
}

/// Decode an inline `data:` source map.
pub fn decode_data_uri(uri: &str) -> HarvestResult<String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| HarvestError::InlineMap("not a data: URI".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| HarvestError::InlineMap("missing ',' separator".to_string()))?;

    let bytes = if header.to_ascii_lowercase().ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| HarvestError::InlineMap(format!("invalid base64: {e}")))?
    } else {
        urlencoding::decode_binary(data.as_bytes()).into_owned()
    };

    String::from_utf8(bytes).map_err(|e| HarvestError::InlineMap(format!("not UTF-8: {e}")))
}

/// A resource whose body carried a source map reference.
#[derive(Debug, Clone)]
pub struct ResolvedMap {
    pub reference: SourceMapReference,
    /// Body of the compiled resource itself.
    pub resource_body: String,
    /// Raw map payload, ready for decoding.
    pub payload: String,
}

/// Outcome of resolving one resource.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The body has no `sourceMappingURL` comment.
    NoReference,
    Found(ResolvedMap),
}

/// Fetches resources and the maps they point to.
#[derive(Clone)]
pub struct MapResolver {
    client: HttpClient,
}

impl MapResolver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetch `resource_url`, find its map reference and fetch the payload.
    pub async fn resolve(&self, resource_url: &str) -> HarvestResult<Resolution> {
        let parsed = Url::parse(resource_url).map_err(|source| HarvestError::InvalidUrl {
            url: resource_url.to_string(),
            source,
        })?;

        let resource_body = self.client.get_text(resource_url).await?.body;

        let Some(reference) = extract_reference(&resource_body) else {
            return Ok(Resolution::NoReference);
        };

        let map_ref = SourceMapReference {
            map_url: resolve_reference(&parsed, reference)?,
            resource_url: parsed,
        };
        tracing::debug!(resource = %resource_url, map = %map_ref.map_url, "found source map reference");

        let payload = if map_ref.is_inline() {
            decode_data_uri(reference)?
        } else {
            self.client.get_text(map_ref.map_url.as_str()).await?.body
        };

        Ok(Resolution::Found(ResolvedMap {
            reference: map_ref,
            resource_body,
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_line_form() {
        let body = "console.log(1);\n//# sourceMappingURL=bundle.js.map\n";
        assert_eq!(extract_reference(body), Some("bundle.js.map"));
    }

    #[test]
    fn test_extract_legacy_at_form() {
        let body = "x()\n//@ sourceMappingURL=old.js.map";
        assert_eq!(extract_reference(body), Some("old.js.map"));
    }

    #[test]
    fn test_extract_block_form() {
        let body = ".a{color:red}\n/*# sourceMappingURL=main.css.map */";
        assert_eq!(extract_reference(body), Some("main.css.map"));
    }

    #[test]
    fn test_extract_block_form_without_space() {
        let body = ".a{}/*# sourceMappingURL=main.css.map*/";
        assert_eq!(extract_reference(body), Some("main.css.map"));
    }

    #[test]
    fn test_extract_stops_at_line_end() {
        let body = "//# sourceMappingURL=a.js.map\r\nmore()";
        assert_eq!(extract_reference(body), Some("a.js.map"));
    }

    #[test]
    fn test_extract_first_reference_wins() {
        let body = "//# sourceMappingURL=first.map\n//# sourceMappingURL=second.map";
        assert_eq!(extract_reference(body), Some("first.map"));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_reference("function f(){return 1}"), None);
        assert_eq!(extract_reference("// sourceMappingURL is documented here"), None);
    }

    #[test]
    fn test_resolve_relative_to_resource() {
        let resource = Url::parse("https://a.example/app/bundle.js").unwrap();
        let map = resolve_reference(&resource, "bundle.js.map").unwrap();
        assert_eq!(map.as_str(), "https://a.example/app/bundle.js.map");
    }

    #[test]
    fn test_resolve_absolute_and_root_relative() {
        let resource = Url::parse("https://a.example/app/bundle.js").unwrap();
        assert_eq!(
            resolve_reference(&resource, "/maps/b.map").unwrap().as_str(),
            "https://a.example/maps/b.map"
        );
        assert_eq!(
            resolve_reference(&resource, "https://cdn.example/b.map")
                .unwrap()
                .as_str(),
            "https://cdn.example/b.map"
        );
    }

    #[test]
    fn test_decode_base64_data_uri() {
        let uri = "data:application/json;charset=utf-8;base64,eyJ2ZXJzaW9uIjozfQ==";
        assert_eq!(decode_data_uri(uri).unwrap(), r#"{"version":3}"#);
    }

    #[test]
    fn test_decode_percent_encoded_data_uri() {
        let uri = "data:application/json,%7B%22version%22%3A3%7D";
        assert_eq!(decode_data_uri(uri).unwrap(), r#"{"version":3}"#);
    }

    #[test]
    fn test_decode_bad_data_uri() {
        assert!(decode_data_uri("data:application/json;base64").is_err());
        assert!(decode_data_uri("data:application/json;base64,!!!").is_err());
    }
}
