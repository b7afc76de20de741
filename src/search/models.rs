//! Search request and response data models

use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Aggregation payload keyed by facet name (`categories`, `materials`, `colors`)
pub type FacetMap = serde_json::Map<String, serde_json::Value>;

/// Structured product search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Free-text query (may be empty)
    pub query: String,
    /// Facet filters keyed by filter name
    pub filters: BTreeMap<String, String>,
    /// Page number (1-indexed)
    pub page: i64,
    /// Number of results per page
    pub page_size: i64,
    /// Field to sort on
    pub sort_field: Option<String>,
    /// Sort direction, `desc` for descending
    pub sort_order: String,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: BTreeMap::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_field: None,
            sort_order: String::new(),
        }
    }
}

impl SearchRequest {
    /// Create a request for a free-text query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Add a facet filter
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    /// Set page number
    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    /// Set page size
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set sort field and direction
    pub fn with_sort(mut self, field: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = order.into();
        self
    }

    /// Clamp paging parameters into their valid ranges.
    ///
    /// Out-of-range values are never rejected: a page below 1 becomes 1, a
    /// page size below 1 falls back to [`DEFAULT_PAGE_SIZE`] and anything
    /// above [`MAX_PAGE_SIZE`] is capped.
    pub fn normalized(mut self) -> Self {
        if self.page < 1 {
            self.page = 1;
        }
        if self.page_size < 1 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.page_size > MAX_PAGE_SIZE {
            self.page_size = MAX_PAGE_SIZE;
        }
        self
    }

    /// Requested sort direction
    pub fn sort_direction(&self) -> SortOrder {
        SortOrder::parse(&self.sort_order)
    }

    /// Offset of the first result in the requested page
    pub fn offset(&self) -> usize {
        let page = self.page.max(1) - 1;
        page.saturating_mul(self.page_size.max(0)) as usize
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Only `desc` (any case) selects descending order
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    /// Engine keyword for this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Product category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Product variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Product attribute (name/value pair such as `Material`/`Cotton`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

/// A single product hit.
///
/// Sparse documents decode leniently: missing or `null` fields take their
/// empty value. Only a value of the wrong type is a decode error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<Category>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<Variant>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Vec<Attribute>,
    /// Engine-assigned relevance score
    #[serde(rename = "_score", default)]
    pub score: f64,
    /// Indexed document, untouched
    #[serde(skip)]
    pub raw_source: serde_json::Value,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Normalized search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Results in engine order
    pub results: Vec<SearchResult>,
    /// Total number of matches (may exceed the page)
    pub total: u64,
    pub page: i64,
    pub page_size: i64,
    pub aggregations: FacetMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_page() {
        for page in [0, -1, -50] {
            let request = SearchRequest::new("shirt").with_page(page).normalized();
            assert_eq!(request.page, 1);
        }
        assert_eq!(SearchRequest::new("").with_page(7).normalized().page, 7);
    }

    #[test]
    fn test_normalize_page_size() {
        let request = SearchRequest::new("").with_page_size(0).normalized();
        assert_eq!(request.page_size, 10);

        let request = SearchRequest::new("").with_page_size(-3).normalized();
        assert_eq!(request.page_size, 10);

        let request = SearchRequest::new("").with_page_size(250).normalized();
        assert_eq!(request.page_size, 100);

        let request = SearchRequest::new("").with_page_size(1).normalized();
        assert_eq!(request.page_size, 1);

        let request = SearchRequest::new("").with_page_size(100).normalized();
        assert_eq!(request.page_size, 100);
    }

    #[test]
    fn test_sort_direction() {
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Descending);
        assert_eq!(SortOrder::parse("desc"), SortOrder::Descending);
        assert_eq!(SortOrder::parse("DeSc"), SortOrder::Descending);
        assert_eq!(SortOrder::parse("asc"), SortOrder::Ascending);
        assert_eq!(SortOrder::parse(""), SortOrder::Ascending);
        assert_eq!(SortOrder::parse("descending"), SortOrder::Ascending);
    }

    #[test]
    fn test_offset() {
        let request = SearchRequest::new("").with_page(3).with_page_size(10);
        assert_eq!(request.offset(), 20);
        assert_eq!(SearchRequest::default().offset(), 0);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"query":"jeans","filters":{"color":"Blue"}}"#).unwrap();
        assert_eq!(request.query, "jeans");
        assert_eq!(request.filters.get("color").map(String::as_str), Some("Blue"));
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 10);
        assert_eq!(request.sort_field, None);
    }

    #[test]
    fn test_result_serialized_field_names() {
        let result = SearchResult {
            id: "P001".to_string(),
            name: "Classic White T-Shirt".to_string(),
            categories: vec![],
            variants: vec![],
            attributes: vec![],
            score: 1.5,
            raw_source: serde_json::json!({"id": "P001"}),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["_score"], 1.5);
        assert!(json.get("raw_source").is_none());
        assert!(json.get("categories").is_some());
    }
}
