use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use crate::client::FhirClient;
use crate::error::FhirResult;
use crate::node::DisplayNode;
use crate::tree::{render, ExpandMap};
use crate::types::{Bundle, ResourceType, SearchParams};

/// The record on screen and its expand/collapse flags.
#[derive(Debug, Default)]
pub struct ViewState {
    pub record: Option<Arc<Value>>,
    pub expanded: ExpandMap,
    pub default_expanded: bool,
}

impl ViewState {
    pub fn render(&self) -> Option<DisplayNode> {
        let record = self.record.as_deref()?;
        render(record, &self.expanded, self.default_expanded)
    }
}

pub struct AppState {
    pub client: FhirClient,
    pub view: RwLock<ViewState>,
}

impl AppState {
    pub fn new(client: FhirClient) -> Self {
        Self {
            client,
            view: RwLock::new(ViewState {
                default_expanded: true,
                ..ViewState::default()
            }),
        }
    }

    /// Shows `record`, forgetting the flags of the previous one.
    pub fn open_record(&self, record: Value, default_expanded: bool) -> Option<DisplayNode> {
        let mut view = self.view.write();
        view.record = Some(Arc::new(record));
        view.expanded.clear();
        view.default_expanded = default_expanded;
        view.render()
    }

    /// Fetches `resource_type/id` and puts it on screen.
    pub async fn view_resource(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> FhirResult<Option<DisplayNode>> {
        let record = self.client.get_resource(resource_type, id).await?;
        Ok(self.open_record(record, true))
    }

    /// Follows a link shown in the tree and puts its target on screen.
    pub async fn follow_reference(&self, reference: &str) -> FhirResult<Option<DisplayNode>> {
        let record = self.client.resolve_reference(reference).await?;
        Ok(self.open_record(record, true))
    }

    /// Searches with explicit parameters plus an optional free-text term.
    pub async fn search(
        &self,
        resource_type: ResourceType,
        params: SearchParams,
        term: Option<&str>,
    ) -> FhirResult<Bundle> {
        let params = params.with_term(resource_type, term.unwrap_or_default());
        self.client.search(resource_type, &params).await
    }

    pub fn close_record(&self) {
        let mut view = self.view.write();
        view.record = None;
        view.expanded.clear();
    }

    pub fn render(&self) -> Option<DisplayNode> {
        self.view.read().render()
    }

    pub fn toggle(&self, path: &str) -> Option<DisplayNode> {
        let mut view = self.view.write();
        let default_expanded = view.default_expanded;
        view.expanded.toggle(path, default_expanded);
        view.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use serde_json::json;

    fn state() -> AppState {
        AppState::new(FhirClient::with_http_client(
            reqwest::Client::new(),
            ServerConfig::default(),
        ))
    }

    #[test]
    fn nothing_open_renders_nothing() {
        assert_eq!(state().render(), None);
    }

    #[test]
    fn opening_a_record_resets_toggles() {
        let state = state();
        let record = json!({"id": "o1", "code": {"coding": [{"code": "8867-4"}]}});
        let open = state.open_record(record.clone(), true).unwrap();
        let toggled = state.toggle("o1.code..coding[]").unwrap();
        assert_ne!(open, toggled);
        assert_eq!(state.render(), Some(toggled));

        assert_eq!(state.open_record(record, true), Some(open));
        assert!(state.view.read().expanded.is_empty());

        state.close_record();
        assert_eq!(state.render(), None);
    }
}
