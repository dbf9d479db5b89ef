use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field definition inside a collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,
    /// Only meaningful in schema updates: removes the field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop: Option<bool>,
    // Server options the dashboard passes through untouched (locale, infix, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            facet: None,
            optional: None,
            index: None,
            sort: None,
            drop: None,
            extra: Map::new(),
        }
    }

    /// Flag the field for faceting
    pub fn facet(mut self) -> Self {
        self.facet = Some(true);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = Some(true);
        self
    }

    /// Schema-update entry that removes `name`
    pub fn dropped(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, "");
        field.drop = Some(true);
        field
    }
}

/// Schema sent when creating a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sorting_field: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            default_sorting_field: None,
            extra: Map::new(),
        }
    }
}

/// Collection as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sorting_field: Option<String>,
    #[serde(default)]
    pub num_documents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Collection {
    /// Fields flagged for aggregation in search results
    pub fn facet_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.facet == Some(true))
    }
}

/// PATCH body for a collection: fields to add, or to drop with `drop: true`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionUpdate {
    pub fields: Vec<Field>,
}

/// Query parameters for `GET /collections/{name}/documents/search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub query_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_fields: Option<String>,
}

impl SearchParams {
    pub fn new(q: impl Into<String>, query_by: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            query_by: query_by.into(),
            ..Default::default()
        }
    }

    pub fn filter_by(mut self, filter: impl Into<String>) -> Self {
        self.filter_by = Some(filter.into());
        self
    }

    pub fn sort_by(mut self, sort: impl Into<String>) -> Self {
        self.sort_by = Some(sort.into());
        self
    }

    pub fn facet_by(mut self, facets: impl Into<String>) -> Self {
        self.facet_by = Some(facets.into());
        self
    }

    /// 1-based page and page size
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    /// Raw (unencoded) query pairs in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("q", self.q.clone()), ("query_by", self.query_by.clone())];
        push_opt(&mut pairs, "filter_by", &self.filter_by);
        push_opt(&mut pairs, "sort_by", &self.sort_by);
        push_opt(&mut pairs, "facet_by", &self.facet_by);
        push_opt(&mut pairs, "page", &self.page.map(|p| p.to_string()));
        push_opt(&mut pairs, "per_page", &self.per_page.map(|p| p.to_string()));
        push_opt(&mut pairs, "include_fields", &self.include_fields);
        push_opt(&mut pairs, "exclude_fields", &self.exclude_fields);
        pairs
    }
}

fn push_opt(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        pairs.push((key, v.clone()));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: Value,
    #[serde(default)]
    pub highlights: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_match: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub found: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_of: Option<u64>,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub search_time_ms: u64,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facet_counts: Vec<Value>,
}

/// One search inside a multi-search batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchQuery {
    pub collection: String,
    #[serde(flatten)]
    pub params: SearchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchRequest {
    pub searches: Vec<MultiSearchQuery>,
}

/// Per-search results, in request order; failed searches carry `error` and `code`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchResponse {
    pub results: Vec<Value>,
}

/// Query parameters for `GET /collections/{name}/documents/export`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_fields: Option<String>,
}

impl ExportParams {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "filter_by", &self.filter_by);
        push_opt(&mut pairs, "include_fields", &self.include_fields);
        push_opt(&mut pairs, "exclude_fields", &self.exclude_fields);
        pairs
    }
}

/// Write mode for bulk imports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    #[default]
    Create,
    Upsert,
    Update,
    Emplace,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportAction::Create => "create",
            ImportAction::Upsert => "upsert",
            ImportAction::Update => "update",
            ImportAction::Emplace => "emplace",
        }
    }
}

/// Outcome of a single JSONL line in an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLineResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ImportLineResult>,
}

impl ImportSummary {
    pub fn from_results(results: Vec<ImportLineResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Result of the create-collection-then-import composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionImport {
    pub collection: Collection,
    pub import: ImportSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Full key; only returned once, at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_prefix: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    pub description: String,
    pub actions: Vec<String>,
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyList {
    pub keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedKey {
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
}

/// Flat metric map from `/metrics.json`; the server reports most values as strings
pub type Metrics = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_keeps_unknown_options() {
        let field: Field = serde_json::from_value(json!({
            "name": "title", "type": "string", "facet": true, "locale": "ja"
        }))
        .unwrap();
        assert_eq!(field.facet, Some(true));
        assert_eq!(field.extra["locale"], "ja");

        let back = serde_json::to_value(&field).unwrap();
        assert_eq!(back, json!({"name": "title", "type": "string", "facet": true, "locale": "ja"}));
    }

    #[test]
    fn test_schema_serializes_minimal_body() {
        let schema = CollectionSchema::new("books", vec![Field::new("title", "string")]);
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"name": "books", "fields": [{"name": "title", "type": "string"}]})
        );
    }

    #[test]
    fn test_facet_fields() {
        let collection: Collection = serde_json::from_value(json!({
            "name": "books",
            "num_documents": 3,
            "fields": [
                {"name": "title", "type": "string"},
                {"name": "genre", "type": "string", "facet": true}
            ]
        }))
        .unwrap();
        let facets: Vec<&str> = collection.facet_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(facets, vec!["genre"]);
    }

    #[test]
    fn test_search_query_pairs_order() {
        let params = SearchParams::new("dune", "title")
            .filter_by("year:>1960")
            .sort_by("year:desc");
        let keys: Vec<&str> = params.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["q", "query_by", "filter_by", "sort_by"]);
    }

    #[test]
    fn test_multi_search_query_is_flat() {
        let query = MultiSearchQuery {
            collection: "books".to_string(),
            params: SearchParams::new("*", "title"),
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"collection": "books", "q": "*", "query_by": "title"})
        );
    }

    #[test]
    fn test_import_summary_counts() {
        let ok = ImportLineResult { success: true, error: None, code: None, document: None };
        let bad = ImportLineResult {
            success: false,
            error: Some("A document with id 1 already exists.".to_string()),
            code: Some(409),
            document: None,
        };
        let summary = ImportSummary::from_results(vec![ok.clone(), bad, ok]);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_complete());
    }
}
