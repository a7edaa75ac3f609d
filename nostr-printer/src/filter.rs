//! Subscription filter document: built once at startup, then persisted and used as the
//! resumption cursor.

use crate::errors::{SetupError, StoreError, TemplateError};
use crate::store::{CursorStore, CURSOR_KEY, TEMPLATE_KEY};
use nostr_printer_common::types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fmt::Formatter;

/// Topic values for settled payments.
pub const ACCEPTED_TOPICS: [&str; 2] = ["inbound-transaction-ok", "internal-transaction-ok"];

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FilterDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,

    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,

    #[serde(rename = "#t", skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,

    /// `None` means open-ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<Timestamp>,

    /// Anything else the template carries (`limit`, `authors`, ...), passed through as is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterDocument {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Moves `since` forward to `candidate`. Never moves it back.
    pub fn advance_since(&mut self, candidate: Timestamp) -> Timestamp {
        let since = self.since.unwrap_or_default().max(candidate);
        self.since = Some(since);
        since
    }
}

impl fmt::Display for FilterDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = self.to_json().map_err(|_| fmt::Error)?;
        write!(f, "{}", text)
    }
}

/// Where the `#p` recipient filter comes from. A deployment uses exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSource {
    /// Single key resolved at startup from a lightning address.
    Resolved(String),
    /// Keys listed in the configuration.
    Configured(Vec<String>),
    /// No recipient filter.
    Unfiltered,
}

impl RecipientSource {
    fn recipients(&self) -> Option<Vec<String>> {
        match self {
            RecipientSource::Resolved(pubkey) => Some(vec![pubkey.clone()]),
            RecipientSource::Configured(pubkeys) if !pubkeys.is_empty() => Some(pubkeys.clone()),
            RecipientSource::Configured(_) | RecipientSource::Unfiltered => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterBuilder {
    kinds: Vec<u32>,
    recipients: RecipientSource,
    until: Option<Timestamp>,
    topics: Vec<String>,
}

impl FilterBuilder {
    pub fn new(recipients: RecipientSource) -> Self {
        Self {
            kinds: Vec::new(),
            recipients,
            until: None,
            topics: ACCEPTED_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn kinds(mut self, kinds: Vec<u32>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn until(mut self, until: Option<Timestamp>) -> Self {
        self.until = until;
        self
    }

    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Builds the initial document from `template`, with `since` set to `now`.
    ///
    /// Fields set here replace whatever the template holds for them.
    pub fn build(&self, template: &str, now: Timestamp) -> Result<FilterDocument, TemplateError> {
        if template.trim().is_empty() {
            return Err(TemplateError::TemplateEmpty);
        }
        let mut doc = FilterDocument::from_json(template)
            .map_err(|err| TemplateError::TemplateInvalid(err.to_string()))?;

        if !self.kinds.is_empty() {
            doc.kinds = Some(self.kinds.clone());
        }
        if let Some(recipients) = self.recipients.recipients() {
            doc.recipients = Some(recipients);
        }
        doc.since = Some(now);
        doc.until = self.until;
        doc.topics = Some(self.topics.clone());

        Ok(doc)
    }

    /// Reads the template from `store` and builds from it.
    pub fn build_from_store<S: CursorStore>(
        &self,
        store: &S,
        now: Timestamp,
    ) -> Result<FilterDocument, TemplateError> {
        let template = store.read_document(TEMPLATE_KEY).map_err(|err| match err {
            StoreError::Empty(_) => TemplateError::TemplateEmpty,
            other => TemplateError::TemplateMissing(other.to_string()),
        })?;
        self.build(&template, now)
    }

    /// Writes the startup cursor document and returns it.
    ///
    /// The document is rebuilt from the template so configuration changes take effect, but a
    /// `since` left by a previous run is kept, so events published while the process was down
    /// are still delivered. `now` is only used when there is no usable cursor yet.
    pub fn seed<S: CursorStore>(
        &self,
        store: &mut S,
        now: Timestamp,
    ) -> Result<FilterDocument, SetupError> {
        let mut doc = self.build_from_store(store, now)?;

        match store.read_document(CURSOR_KEY) {
            Ok(text) => match FilterDocument::from_json(&text) {
                Ok(FilterDocument {
                    since: Some(since), ..
                }) => {
                    tracing::info!(since, "resuming from stored cursor");
                    doc.since = Some(since);
                }
                Ok(_) => tracing::warn!("stored cursor has no since, starting at {now}"),
                Err(err) => tracing::warn!("stored cursor is invalid ({err}), starting at {now}"),
            },
            Err(StoreError::NotFound(_)) | Err(StoreError::Empty(_)) => {
                tracing::info!("no stored cursor, starting at {now}")
            }
            Err(err) => return Err(err.into()),
        }

        let text = doc
            .to_json()
            .map_err(|err| TemplateError::TemplateInvalid(err.to_string()))?;
        store.write_document(CURSOR_KEY, &text)?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const PUBKEY: &str = "e17feb5f2cf83546bcf7fd9c8237b05275be958bd521543c2285ffc6c2d654b3";

    #[test]
    fn test_build_resolved_recipient() {
        let builder = FilterBuilder::new(RecipientSource::Resolved(PUBKEY.to_string()))
            .kinds(vec![1112])
            .until(Some(2_000_000_000));
        let doc = builder.build("{}", 1_700_000_000).unwrap();

        assert_eq!(doc.kinds, Some(vec![1112]));
        assert_eq!(doc.recipients, Some(vec![PUBKEY.to_string()]));
        assert_eq!(doc.since, Some(1_700_000_000));
        assert_eq!(doc.until, Some(2_000_000_000));
        assert_eq!(
            doc.topics,
            Some(vec![
                "inbound-transaction-ok".to_string(),
                "internal-transaction-ok".to_string()
            ])
        );
    }

    #[test]
    fn test_build_configured_recipients_and_open_until() {
        let builder = FilterBuilder::new(RecipientSource::Configured(vec![
            "aa".to_string(),
            "bb".to_string(),
        ]));
        let doc = builder.build(r#"{"limit":10}"#, 5).unwrap();

        assert_eq!(doc.kinds, None);
        assert_eq!(doc.recipients, Some(vec!["aa".to_string(), "bb".to_string()]));
        assert_eq!(doc.until, None);
        assert_eq!(doc.extra.get("limit"), Some(&Value::from(10)));

        let text = doc.to_json().unwrap();
        assert!(!text.contains("until"));
        assert!(!text.contains("kinds"));
        assert!(text.contains(r#""limit":10"#));
    }

    #[test]
    fn test_build_overrides_template_fields() {
        let template = r##"{"kinds":[1],"since":1,"#t":["old"],"#p":["cc"]}"##;
        let doc = FilterBuilder::new(RecipientSource::Unfiltered)
            .build(template, 99)
            .unwrap();
        // kinds and #p kept from the template when nothing is configured
        assert_eq!(doc.kinds, Some(vec![1]));
        assert_eq!(doc.recipients, Some(vec!["cc".to_string()]));
        assert_eq!(doc.since, Some(99));
        assert_eq!(doc.topics.unwrap().len(), 2);
    }

    #[test]
    fn test_build_template_errors() {
        let builder = FilterBuilder::new(RecipientSource::Unfiltered);
        assert!(matches!(
            builder.build("", 1),
            Err(TemplateError::TemplateEmpty)
        ));
        assert!(matches!(
            builder.build("[1,2]", 1),
            Err(TemplateError::TemplateInvalid(_))
        ));
        assert!(matches!(
            builder.build("{not json", 1),
            Err(TemplateError::TemplateInvalid(_))
        ));

        let store = MemoryStore::new();
        assert!(matches!(
            builder.build_from_store(&store, 1),
            Err(TemplateError::TemplateMissing(_))
        ));
        let store = MemoryStore::new().with_document(TEMPLATE_KEY, "");
        assert!(matches!(
            builder.build_from_store(&store, 1),
            Err(TemplateError::TemplateEmpty)
        ));
    }

    #[test]
    fn test_seed_fresh_store_starts_now() {
        let mut store = MemoryStore::new().with_document(TEMPLATE_KEY, "{}");
        let doc = FilterBuilder::new(RecipientSource::Unfiltered)
            .seed(&mut store, 1_700_000_000)
            .unwrap();
        assert_eq!(doc.since, Some(1_700_000_000));

        let stored = FilterDocument::from_json(&store.read_document(CURSOR_KEY).unwrap()).unwrap();
        assert_eq!(stored, doc);
    }

    #[test]
    fn test_seed_keeps_cursor_across_restart() {
        let mut store = MemoryStore::new().with_document(TEMPLATE_KEY, "{}");
        let builder = FilterBuilder::new(RecipientSource::Unfiltered).kinds(vec![1112]);
        builder.seed(&mut store, 1_000).unwrap();

        // Events seen before the restart moved the cursor
        let mut doc = FilterDocument::from_json(&store.read_document(CURSOR_KEY).unwrap()).unwrap();
        doc.advance_since(1_500);
        store
            .write_document(CURSOR_KEY, &doc.to_json().unwrap())
            .unwrap();

        // Restart much later with a changed configuration
        let builder = builder.kinds(vec![1112, 4]);
        let doc = builder.seed(&mut store, 9_000).unwrap();
        assert_eq!(doc.since, Some(1_500));
        assert_eq!(doc.kinds, Some(vec![1112, 4]));

        let stored = FilterDocument::from_json(&store.read_document(CURSOR_KEY).unwrap()).unwrap();
        assert_eq!(stored.since, Some(1_500));
    }

    #[test]
    fn test_seed_replaces_unusable_cursor() {
        let builder = FilterBuilder::new(RecipientSource::Unfiltered);

        let mut store = MemoryStore::new()
            .with_document(TEMPLATE_KEY, "{}")
            .with_document(CURSOR_KEY, "{broken");
        assert_eq!(builder.seed(&mut store, 42).unwrap().since, Some(42));

        let mut store = MemoryStore::new()
            .with_document(TEMPLATE_KEY, "{}")
            .with_document(CURSOR_KEY, r#"{"kinds":[1]}"#);
        assert_eq!(builder.seed(&mut store, 43).unwrap().since, Some(43));
    }

    #[test]
    fn test_seed_errors() {
        let builder = FilterBuilder::new(RecipientSource::Unfiltered);

        let mut store = MemoryStore::new();
        assert!(matches!(
            builder.seed(&mut store, 1),
            Err(SetupError::Template(TemplateError::TemplateMissing(_)))
        ));

        let mut store = MemoryStore::new().with_document(TEMPLATE_KEY, "{}");
        store.set_fail_writes(true);
        assert!(matches!(
            builder.seed(&mut store, 1),
            Err(SetupError::Store(StoreError::WriteFailure { .. }))
        ));
    }

    #[test]
    fn test_advance_since_is_monotonic() {
        let mut doc = FilterDocument::from_json(r#"{"since":100}"#).unwrap();
        assert_eq!(doc.advance_since(120), 120);
        assert_eq!(doc.advance_since(110), 120);
        assert_eq!(doc.since, Some(120));

        let mut doc = FilterDocument::default();
        assert_eq!(doc.advance_since(7), 7);
    }

    #[test]
    fn test_roundtrip_keeps_unknown_fields() {
        let text = r##"{"since":100,"until":0,"#t":["a","b"],"authors":["x"]}"##;
        let doc = FilterDocument::from_json(text).unwrap();
        let again = FilterDocument::from_json(&doc.to_string()).unwrap();
        assert_eq!(doc, again);
        assert_eq!(again.until, Some(0));
        assert_eq!(again.extra.get("authors"), Some(&serde_json::json!(["x"])));
    }
}
