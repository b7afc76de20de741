//! Translation between search requests and engine queries

use super::dsl::{Aggregation, BoolQuery, EngineQuery, Query, SortClause, WeightedField};
use crate::engines::RawResults;
use crate::error::DecodeError;
use crate::search::{SearchRequest, SearchResponse, SearchResult};
use crate::FACET_SIZE;
use std::collections::BTreeMap;
use tracing::debug;

const ATTRIBUTES_PATH: &str = "attributes";
const ATTRIBUTE_NAME_FIELD: &str = "attributes.name.keyword";
const ATTRIBUTE_VALUE_FIELD: &str = "attributes.value.keyword";
const CATEGORY_NAME_FIELD: &str = "categories.name.keyword";

/// Recognized facet filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetFilter {
    Category,
    Material,
    Color,
}

impl FacetFilter {
    /// Look up a filter by its request key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "category" => Some(FacetFilter::Category),
            "material" => Some(FacetFilter::Material),
            "color" => Some(FacetFilter::Color),
            _ => None,
        }
    }

    /// Build the filter clause for `value`.
    ///
    /// Attribute filters are nested so the name and value must hold on the
    /// same attribute element.
    pub fn clause(&self, value: &str) -> Query {
        match self {
            FacetFilter::Category => Query::term(CATEGORY_NAME_FIELD, value),
            FacetFilter::Material => attribute_pair("Material", value),
            FacetFilter::Color => attribute_pair("Color", value),
        }
    }
}

fn attribute_pair(name: &str, value: &str) -> Query {
    Query::nested(
        ATTRIBUTES_PATH,
        Query::Bool(
            BoolQuery::new()
                .must(Query::term(ATTRIBUTE_NAME_FIELD, name))
                .must(Query::term(ATTRIBUTE_VALUE_FIELD, value)),
        ),
    )
}

fn attribute_values(name: &str) -> Aggregation {
    Aggregation::Nested {
        path: ATTRIBUTES_PATH.to_string(),
        aggs: BTreeMap::from([(
            "filter".to_string(),
            Aggregation::Filter {
                filter: Query::term(ATTRIBUTE_NAME_FIELD, name),
                aggs: BTreeMap::from([(
                    "values".to_string(),
                    Aggregation::terms(ATTRIBUTE_VALUE_FIELD, FACET_SIZE),
                )]),
            },
        )]),
    }
}

/// Pure translation layer between the service and the engine
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTranslator;

impl QueryTranslator {
    /// Fields scored by the free-text clause; names dominate, attributes weigh least
    pub fn text_fields() -> Vec<WeightedField> {
        vec![
            WeightedField::new("name", 3),
            WeightedField::new("categories.name", 2),
            WeightedField::new("attributes.value", 1),
        ]
    }

    /// The facet aggregations attached to every search
    pub fn facet_aggregations() -> BTreeMap<String, Aggregation> {
        BTreeMap::from([
            (
                "categories".to_string(),
                Aggregation::terms(CATEGORY_NAME_FIELD, FACET_SIZE),
            ),
            ("materials".to_string(), attribute_values("Material")),
            ("colors".to_string(), attribute_values("Color")),
        ])
    }

    /// Build the engine query for a (normalized) request
    pub fn build_query(request: &SearchRequest) -> EngineQuery {
        let mut query = BoolQuery::new();

        if !request.query.is_empty() {
            query = query.must(Query::MultiMatch {
                query: request.query.clone(),
                fields: Self::text_fields(),
            });
        }

        for (key, value) in &request.filters {
            match FacetFilter::from_key(key) {
                Some(filter) => query = query.filter(filter.clause(value)),
                // Unknown facets are skipped so newer callers keep working
                None => debug!("Ignoring unrecognized filter '{}'", key),
            }
        }

        let sort = request
            .sort_field
            .as_ref()
            .filter(|field| !field.is_empty())
            .map(|field| SortClause {
                field: field.clone(),
                order: request.sort_direction(),
            })
            .into_iter()
            .collect();

        EngineQuery {
            query,
            sort,
            from: request.offset(),
            size: request.page_size.max(0) as usize,
            aggregations: Self::facet_aggregations(),
        }
    }

    /// Aggregations-only query used for facet discovery
    pub fn build_facets_query() -> EngineQuery {
        EngineQuery {
            size: 0,
            aggregations: Self::facet_aggregations(),
            ..Default::default()
        }
    }

    /// Normalize raw engine results.
    ///
    /// One undecodable hit fails the whole response.
    pub fn parse_results(
        raw: RawResults,
        request: &SearchRequest,
    ) -> Result<SearchResponse, DecodeError> {
        let results = raw
            .hits
            .into_iter()
            .enumerate()
            .map(|(position, hit)| {
                let mut result: SearchResult = serde_json::from_value(hit.source.clone())
                    .map_err(|source| DecodeError {
                        position,
                        id: hit.id.clone(),
                        source,
                    })?;
                result.score = hit.score.unwrap_or(0.0);
                result.raw_source = hit.source;
                Ok(result)
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        Ok(SearchResponse {
            results,
            total: raw.total,
            page: request.page,
            page_size: request.page_size,
            aggregations: raw.aggregations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::RawHit;
    use crate::search::SortOrder;
    use serde_json::json;

    fn only_filter(query: &EngineQuery) -> &Query {
        assert_eq!(query.query.filter.len(), 1);
        &query.query.filter[0]
    }

    #[test]
    fn test_text_query_weights() {
        let query = QueryTranslator::build_query(&SearchRequest::new("T-Shirt"));
        assert_eq!(
            query.query.must,
            vec![Query::MultiMatch {
                query: "T-Shirt".to_string(),
                fields: vec![
                    WeightedField::new("name", 3),
                    WeightedField::new("categories.name", 2),
                    WeightedField::new("attributes.value", 1),
                ],
            }]
        );
        assert_eq!(
            query.to_json()["query"]["bool"]["must"][0]["multi_match"]["fields"],
            json!(["name^3", "categories.name^2", "attributes.value"])
        );
    }

    #[test]
    fn test_empty_query_has_no_text_clause() {
        let query = QueryTranslator::build_query(&SearchRequest::new(""));
        assert!(query.query.must.is_empty());
        assert!(query.query.filter.is_empty());
    }

    #[test]
    fn test_category_filter_is_keyword_term() {
        let request = SearchRequest::new("").with_filter("category", "T-Shirts");
        let query = QueryTranslator::build_query(&request);
        assert_eq!(
            only_filter(&query),
            &Query::term("categories.name.keyword", "T-Shirts")
        );
    }

    #[test]
    fn test_material_filter_requires_pair_in_one_element() {
        let request = SearchRequest::new("").with_filter("material", "Cotton");
        let query = QueryTranslator::build_query(&request);

        match only_filter(&query) {
            Query::Nested { path, query } => {
                assert_eq!(path, "attributes");
                assert_eq!(
                    **query,
                    Query::Bool(BoolQuery {
                        must: vec![
                            Query::term("attributes.name.keyword", "Material"),
                            Query::term("attributes.value.keyword", "Cotton"),
                        ],
                        filter: vec![],
                    })
                );
            }
            other => panic!("expected nested clause, got {:?}", other),
        }
    }

    #[test]
    fn test_color_filter_uses_color_attribute() {
        let request = SearchRequest::new("").with_filter("color", "White");
        let body = QueryTranslator::build_query(&request).to_json();
        let must = &body["query"]["bool"]["filter"][0]["nested"]["query"]["bool"]["must"];
        assert_eq!(must[0], json!({ "term": { "attributes.name.keyword": "Color" } }));
        assert_eq!(must[1], json!({ "term": { "attributes.value.keyword": "White" } }));
    }

    #[test]
    fn test_unknown_filter_is_ignored() {
        let base = SearchRequest::new("shoes").with_filter("color", "Black");
        let with_brand = base.clone().with_filter("brand", "Nike");
        assert_eq!(
            QueryTranslator::build_query(&base),
            QueryTranslator::build_query(&with_brand)
        );
    }

    #[test]
    fn test_aggregations_always_present() {
        let plain = QueryTranslator::build_query(&SearchRequest::new(""));
        let filtered = QueryTranslator::build_query(
            &SearchRequest::new("").with_filter("material", "Denim"),
        );
        for query in [plain, filtered] {
            let names: Vec<_> = query.aggregations.keys().cloned().collect();
            assert_eq!(names, vec!["categories", "colors", "materials"]);
        }

        let body = QueryTranslator::build_facets_query().to_json();
        assert_eq!(
            body["aggs"]["materials"],
            json!({
                "nested": { "path": "attributes" },
                "aggs": {
                    "filter": {
                        "filter": { "term": { "attributes.name.keyword": "Material" } },
                        "aggs": {
                            "values": {
                                "terms": { "field": "attributes.value.keyword", "size": 20 }
                            }
                        }
                    }
                }
            })
        );
        assert_eq!(
            body["aggs"]["categories"],
            json!({ "terms": { "field": "categories.name.keyword", "size": 20 } })
        );
    }

    #[test]
    fn test_sort_direction() {
        for (order, expected) in [
            ("DESC", SortOrder::Descending),
            ("desc", SortOrder::Descending),
            ("asc", SortOrder::Ascending),
            ("", SortOrder::Ascending),
        ] {
            let request = SearchRequest::new("").with_sort("name", order);
            let query = QueryTranslator::build_query(&request);
            assert_eq!(query.sort.len(), 1);
            assert_eq!(query.sort[0].order, expected);
        }

        let query = QueryTranslator::build_query(&SearchRequest::new(""));
        assert!(query.sort.is_empty());
    }

    #[test]
    fn test_pagination_window() {
        let request = SearchRequest::new("").with_page(3).with_page_size(10);
        let query = QueryTranslator::build_query(&request);
        assert_eq!(query.from, 20);
        assert_eq!(query.size, 10);
    }

    #[test]
    fn test_facets_query_has_empty_window() {
        let query = QueryTranslator::build_facets_query();
        assert_eq!(query.size, 0);
        assert!(query.query.is_empty());
        assert_eq!(query.aggregations.len(), 3);
        assert!(query.aggregations.contains_key("categories"));
        assert!(query.aggregations.contains_key("materials"));
        assert!(query.aggregations.contains_key("colors"));
    }

    #[test]
    fn test_parse_results_keeps_order_and_source() {
        let first = json!({
            "id": "P001",
            "name": "Classic White T-Shirt",
            "categories": [{ "id": "C002", "name": "T-Shirts", "parent_id": "C001" }],
            "attributes": [{ "id": "A001", "name": "Material", "value": "Cotton" }],
            "price": 19.99
        });
        let second = json!({ "id": "P002", "name": "Slim Fit Jeans" });
        let raw = RawResults {
            total: 57,
            hits: vec![
                RawHit {
                    id: Some("P001".to_string()),
                    score: Some(2.5),
                    source: first.clone(),
                },
                RawHit {
                    id: Some("P002".to_string()),
                    score: None,
                    source: second,
                },
            ],
            aggregations: Default::default(),
        };
        let request = SearchRequest::new("shirt").with_page(2).with_page_size(2);

        let response = QueryTranslator::parse_results(raw, &request).unwrap();
        assert_eq!(response.total, 57);
        assert_eq!(response.page, 2);
        assert_eq!(response.page_size, 2);
        assert_eq!(response.results[0].id, "P001");
        assert_eq!(response.results[0].score, 2.5);
        assert_eq!(response.results[0].raw_source, first);
        assert_eq!(response.results[0].categories[0].parent_id.as_deref(), Some("C001"));
        assert_eq!(response.results[1].id, "P002");
        assert_eq!(response.results[1].score, 0.0);
        assert!(response.results[1].variants.is_empty());
    }

    #[test]
    fn test_parse_results_fails_on_bad_hit() {
        let raw = RawResults {
            total: 2,
            hits: vec![
                RawHit {
                    id: Some("P001".to_string()),
                    score: Some(1.0),
                    source: json!({ "id": "P001", "name": "Classic White T-Shirt" }),
                },
                RawHit {
                    id: Some("P002".to_string()),
                    score: Some(0.5),
                    source: json!({ "id": "P002", "name": ["not", "a", "string"] }),
                },
            ],
            aggregations: Default::default(),
        };

        let err = QueryTranslator::parse_results(raw, &SearchRequest::default()).unwrap_err();
        assert_eq!(err.position, 1);
        assert_eq!(err.id.as_deref(), Some("P002"));
    }

    fn single_hit(source: serde_json::Value) -> RawResults {
        RawResults {
            total: 1,
            hits: vec![RawHit {
                id: source["id"].as_str().map(str::to_string),
                score: Some(1.0),
                source,
            }],
            aggregations: Default::default(),
        }
    }

    #[test]
    fn test_parse_results_null_lists_are_empty() {
        let raw = single_hit(json!({
            "id": "P001",
            "name": "Classic White T-Shirt",
            "categories": null,
            "variants": null,
            "attributes": null
        }));

        let response = QueryTranslator::parse_results(raw, &SearchRequest::default()).unwrap();
        let result = &response.results[0];
        assert_eq!(result.name, "Classic White T-Shirt");
        assert!(result.categories.is_empty());
        assert!(result.variants.is_empty());
        assert!(result.attributes.is_empty());
    }

    #[test]
    fn test_parse_results_missing_fields_are_empty() {
        let raw = single_hit(json!({
            "id": "P001",
            "attributes": [{ "name": "Material", "value": null }],
            "categories": [{ "name": "T-Shirts" }]
        }));

        let response = QueryTranslator::parse_results(raw, &SearchRequest::default()).unwrap();
        let result = &response.results[0];
        assert_eq!(result.id, "P001");
        assert_eq!(result.name, "");
        assert_eq!(result.attributes[0].id, "");
        assert_eq!(result.attributes[0].value, "");
        assert_eq!(result.categories[0].name, "T-Shirts");
        assert_eq!(result.categories[0].parent_id, None);
    }

    #[test]
    fn test_parse_results_rejects_wrong_list_type() {
        let raw = single_hit(json!({ "id": "P001", "name": "Shirt", "variants": "Small" }));
        let err = QueryTranslator::parse_results(raw, &SearchRequest::default()).unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(err.id.as_deref(), Some("P001"));
    }
}
