use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::core::listings::{FilterUpdate, ListingSearch, PropertyType, SharedFilters, SortBy};
use crate::core::realtime::{FunctionDeclaration, ToolCall, ToolResponse};

/// Name of the filter update tool.
pub const UPDATE_SEARCH_FILTERS: &str = "updateSearchFilters";

/// Schema of `updateSearchFilters` in the Live API's OpenAPI subset.
pub fn update_search_filters_declaration() -> FunctionDeclaration {
    let property_types: Vec<&str> = PropertyType::all().iter().map(|t| t.as_str()).collect();
    let sort_orders: Vec<&str> = SortBy::all().iter().map(|s| s.as_str()).collect();

    FunctionDeclaration {
        name: UPDATE_SEARCH_FILTERS.to_string(),
        description: Some(
            "Update the property search filters with the criteria the user just mentioned. \
             Only pass the fields that changed."
                .to_string(),
        ),
        parameters: Some(json!({
            "type": "OBJECT",
            "properties": {
                "city": {"type": "STRING", "description": "City or neighbourhood name"},
                "minPrice": {"type": "NUMBER", "description": "Minimum price in euro"},
                "maxPrice": {"type": "NUMBER", "description": "Maximum price in euro"},
                "minSize": {"type": "NUMBER", "description": "Minimum living area in square metres"},
                "bedrooms": {"type": "NUMBER", "description": "Minimum number of bedrooms"},
                "petsAllowed": {"type": "BOOLEAN", "description": "Whether pets must be allowed"},
                "type": {
                    "type": "STRING",
                    "enum": property_types,
                    "description": "Kind of property"
                },
                "sortBy": {
                    "type": "STRING",
                    "enum": sort_orders,
                    "description": "Result ordering"
                }
            }
        })),
    }
}

/// Every tool declared to the model.
pub fn declarations() -> Vec<FunctionDeclaration> {
    vec![update_search_filters_declaration()]
}

/// Text returned to the model after a successful update.
pub fn result_text(matches: usize) -> String {
    format!("Filters updated. Found {matches} properties matching criteria.")
}

/// Executes tool calls against the shared search filters.
#[derive(Clone)]
pub struct ToolDispatcher {
    filters: SharedFilters,
    search: Arc<dyn ListingSearch>,
}

impl ToolDispatcher {
    pub fn new(filters: SharedFilters, search: Arc<dyn ListingSearch>) -> Self {
        Self { filters, search }
    }

    pub fn filters(&self) -> &SharedFilters {
        &self.filters
    }

    /// Run one call. Returns `None` for tools this dispatcher does not know.
    pub async fn handle(&self, call: &ToolCall) -> Option<ToolResponse> {
        if call.name != UPDATE_SEARCH_FILTERS {
            debug!(call_id = %call.id, tool = %call.name, "Ignoring unknown tool call");
            return None;
        }

        let response = self.update_search_filters(&call.id, &call.args).await;
        Some(ToolResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        })
    }

    /// Run every call of one server message in order.
    ///
    /// The result holds one response per recognized call, in call order.
    pub async fn handle_batch(&self, calls: &[ToolCall]) -> Vec<ToolResponse> {
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            if let Some(response) = self.handle(call).await {
                responses.push(response);
            }
        }
        responses
    }

    async fn update_search_filters(&self, call_id: &str, args: &Value) -> Value {
        let update = match FilterUpdate::from_args(args) {
            Ok(update) => update,
            Err(e) => {
                warn!(call_id, "Rejected filter arguments: {}", e);
                return json!({ "error": format!("Invalid filter arguments: {e}") });
            }
        };

        let filters = self.filters.update(update);
        match self.search.search(&filters).await {
            Ok(listings) => {
                info!(call_id, matches = listings.len(), "Search filters updated");
                json!({ "result": result_text(listings.len()) })
            }
            Err(e) => {
                warn!(call_id, "Listing search failed after filter update: {}", e);
                json!({ "error": "Filters updated but the listing search failed" })
            }
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("filters", &self.filters.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::listings::{InMemoryListings, SearchError, SearchFilters};
    use async_trait::async_trait;

    fn call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            args,
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let store = InMemoryListings::seeded().unwrap();
        ToolDispatcher::new(SharedFilters::default(), Arc::new(store))
    }

    struct BrokenSearch;

    #[async_trait]
    impl ListingSearch for BrokenSearch {
        async fn search(
            &self,
            _filters: &SearchFilters,
        ) -> Result<Vec<crate::core::listings::Listing>, SearchError> {
            Err(SearchError::Unavailable("database offline".to_string()))
        }
    }

    #[test]
    fn test_declaration_lists_every_field() {
        let decl = update_search_filters_declaration();
        assert_eq!(decl.name, "updateSearchFilters");
        let params = decl.parameters.unwrap();
        let properties = params["properties"].as_object().unwrap();
        for field in [
            "city",
            "minPrice",
            "maxPrice",
            "minSize",
            "bedrooms",
            "petsAllowed",
            "type",
            "sortBy",
        ] {
            assert!(properties.contains_key(field), "missing {field}");
        }
        assert!(params.get("required").is_none());
        assert_eq!(properties["sortBy"]["enum"][0], "price_asc");
    }

    #[test]
    fn test_result_text() {
        assert_eq!(
            result_text(3),
            "Filters updated. Found 3 properties matching criteria."
        );
    }

    #[tokio::test]
    async fn test_handle_merges_and_counts() {
        let dispatcher = dispatcher();
        dispatcher
            .filters()
            .replace(SearchFilters {
                property_type: Some(PropertyType::Apartment),
                ..Default::default()
            });

        let response = dispatcher
            .handle(&call("c1", UPDATE_SEARCH_FILTERS, json!({"city": "Ghent", "maxPrice": 1200})))
            .await
            .unwrap();

        let filters = dispatcher.filters().snapshot();
        assert_eq!(filters.property_type, Some(PropertyType::Apartment));
        assert_eq!(filters.city.as_deref(), Some("Ghent"));
        assert_eq!(filters.max_price, Some(1200.0));

        let expected = InMemoryListings::seeded().unwrap().query(&filters).len();
        assert_eq!(response.id, "c1");
        assert_eq!(response.name, UPDATE_SEARCH_FILTERS);
        assert_eq!(response.response, json!({"result": result_text(expected)}));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_ignored() {
        let dispatcher = dispatcher();
        assert!(dispatcher.handle(&call("x", "foo", json!({}))).await.is_none());
        assert!(dispatcher.filters().snapshot().is_unconstrained());
    }

    #[tokio::test]
    async fn test_batch_keeps_call_order() {
        let dispatcher = dispatcher();
        let responses = dispatcher
            .handle_batch(&[
                call("1", UPDATE_SEARCH_FILTERS, json!({"city": "Ghent"})),
                call("2", UPDATE_SEARCH_FILTERS, json!({"maxPrice": 1000})),
                call("3", "foo", json!({})),
            ])
            .await;

        let ids: Vec<&str> = responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(
            dispatcher.filters().snapshot(),
            SearchFilters {
                city: Some("Ghent".to_string()),
                max_price: Some(1000.0),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_leave_filters_alone() {
        let dispatcher = dispatcher();
        let response = dispatcher
            .handle(&call("bad", UPDATE_SEARCH_FILTERS, json!({"bedrooms": "many"})))
            .await
            .unwrap();

        assert!(response.response["error"].as_str().unwrap().contains("Invalid"));
        assert!(dispatcher.filters().snapshot().is_unconstrained());
    }

    #[tokio::test]
    async fn test_search_failure_still_updates_filters() {
        let dispatcher = ToolDispatcher::new(SharedFilters::default(), Arc::new(BrokenSearch));
        let response = dispatcher
            .handle(&call("c", UPDATE_SEARCH_FILTERS, json!({"city": "Mons"})))
            .await
            .unwrap();

        assert!(response.response.get("error").is_some());
        assert_eq!(dispatcher.filters().snapshot().city.as_deref(), Some("Mons"));
    }
}
