use serde::Serialize;

/// Cell metadata key owned by the citation-manager extension.
pub const CITATION_MANAGER_KEY: &str = "citation-manager";

/// Key under [`CITATION_MANAGER_KEY`] mapping cite ids to reference lists.
pub const CITATIONS_KEY: &str = "citations";

/// One external reference attached to a cite id in cell metadata.
///
/// Serialized as `{"id": "<external-id>", "source": "<provider>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationRecord {
    pub id: String,
    pub source: String,
}

impl CitationRecord {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }

    /// The single-element reference list stored under a cite id.
    pub fn to_entry(&self) -> serde_json::Value {
        serde_json::json!([{ "id": self.id, "source": self.source }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_shape_matches_extension_format() {
        let record = CitationRecord::new("111/ABC", "zotero");
        assert_eq!(
            record.to_entry(),
            serde_json::json!([{ "id": "111/ABC", "source": "zotero" }])
        );
    }

    #[test]
    fn entry_keeps_id_before_source() {
        let text = serde_json::to_string(&CitationRecord::new("1/X", "zotero").to_entry()).unwrap();
        assert_eq!(text, r#"[{"id":"1/X","source":"zotero"}]"#);
    }
}
