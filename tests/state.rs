mod common;

use fhir_viewer_lib::state::AppState;
use fhir_viewer_lib::types::{ResourceType, SearchParams};
use fhir_viewer_lib::{AuthMode, DisplayNode, FhirClient, ServerConfig, ServerKind};
use serde_json::json;

use crate::common::{MockServer, Reply};

fn state(server: &MockServer) -> AppState {
    let config = ServerConfig {
        kind: ServerKind::Custom,
        base_url: server.url("/fhir"),
        name: "Local".into(),
        auth: AuthMode::None,
    };
    AppState::new(FhirClient::new(config).unwrap())
}

fn fhir_server() -> MockServer {
    MockServer::start(|req| {
        if req.url.starts_with("/fhir/Patient?") {
            Reply::json(
                200,
                json!({
                    "resourceType": "Bundle",
                    "type": "searchset",
                    "total": 1,
                    "entry": [{
                        "fullUrl": "http://ignored/fhir/Patient/p1",
                        "resource": {
                            "resourceType": "Patient",
                            "id": "p1",
                            "name": [{"family": "Smith", "given": ["Ann"]}],
                            "managingOrganization": {"reference": "Organization/7"}
                        }
                    }]
                }),
            )
        } else if req.url == "/fhir/Organization/7" {
            Reply::json(
                200,
                json!({"resourceType": "Organization", "id": "7", "alias": ["Acme", "ACME Corp"]}),
            )
        } else {
            Reply::json(404, json!({"resourceType": "OperationOutcome", "issue": []}))
        }
    })
}

#[tokio::test]
async fn search_hit_opens_and_follows_its_reference() {
    let server = fhir_server();
    let state = state(&server);

    let bundle = state
        .search(
            ResourceType::Patient,
            SearchParams::new().with("_count", "10"),
            Some("smith"),
        )
        .await
        .unwrap();
    assert_eq!(server.requests()[0].url, "/fhir/Patient?_count=10&name=smith");

    let hit = bundle.resources().next().cloned().unwrap();
    let tree = state.open_record(hit, true).unwrap();
    assert_eq!(tree.sequence_paths(), vec!["p1.name[]", "p1.name[][0]..given[]"]);
    let collapsed = state.toggle("p1.name[]").unwrap();
    assert_eq!(collapsed.sequence_paths(), vec!["p1.name[]"]);

    let followed = state.follow_reference("Organization/7").await.unwrap().unwrap();
    assert_eq!(
        followed.field("alias").map(|n| n.sequence_paths()),
        Some(vec!["7.alias[]"])
    );
    assert!(state.view.read().expanded.is_empty());
    assert_eq!(state.render(), Some(followed));
}

#[tokio::test]
async fn failed_fetch_keeps_the_current_record() {
    let server = fhir_server();
    let state = state(&server);
    let shown = state
        .view_resource(ResourceType::Organization, "7")
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(shown, DisplayNode::Record { .. }));

    let err = state
        .view_resource(ResourceType::Organization, "missing")
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(state.render(), Some(shown));
}
