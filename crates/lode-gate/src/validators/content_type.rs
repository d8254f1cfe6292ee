use async_trait::async_trait;
use futures::StreamExt;
use lode_store::{AccessError, AccessResult};
use lode_stream::GuardedStream;

use crate::validator::{DataValidator, ValidationRequest};

/// Only admits documents whose declared content type is in an allow-list.
///
/// Entries are either exact media types (`text/plain`) or a whole top-level
/// type (`image/*`). Matching ignores case and media type parameters such as
/// `; charset=utf-8`. A document without a content type is rejected.
#[derive(Clone, Debug, Default)]
pub struct ContentTypeValidator {
    pub allowed: Vec<String>,
}

impl ContentTypeValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `content_type` matches an allow-list entry.
    pub fn allows(&self, content_type: &str) -> bool {
        let wanted = essence(content_type);
        self.allowed.iter().any(|entry| {
            let entry = essence(entry);
            match entry.strip_suffix("/*") {
                Some(top) => wanted
                    .split_once('/')
                    .is_some_and(|(candidate, _)| candidate == top),
                None => entry == wanted,
            }
        })
    }
}

/// `type/subtype` in lower case, without parameters.
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[async_trait]
impl DataValidator for ContentTypeValidator {
    fn name(&self) -> &str {
        "content-type"
    }

    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
        let reason = match request.metadata.content_type() {
            Some(content_type) if self.allows(content_type) => return Ok(request.data),
            Some(content_type) => format!("content type {content_type} is not allowed"),
            None => "document has no content type".to_string(),
        };

        // A rejected body is still read to the end before reporting.
        let mut data = request.data;
        while let Some(chunk) = data.next().await {
            chunk?;
        }
        Err(AccessError::validation(request.identifier, reason))
    }
}
