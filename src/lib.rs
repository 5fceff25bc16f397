//! FHIR server viewer.
//!
//! The core is a REST client ([`client::FhirClient`]) that authenticates,
//! refreshes client-credentials tokens and normalizes every failure into a
//! [`error::FhirError`], and a renderer ([`tree::render`]) that turns any
//! record into a [`node::DisplayNode`] tree with per-path expand state. The
//! `desktop` feature wraps both in a Tauri shell.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod node;
pub mod state;
pub mod tree;
pub mod types;

#[cfg(feature = "desktop")]
mod commands;

pub use client::FhirClient;
pub use config::{AuthMode, ServerConfig, ServerKind};
pub use error::{ErrorKind, FhirError, FhirResult};
pub use node::DisplayNode;
pub use tree::{render, ExpandMap};

#[cfg(feature = "desktop")]
pub fn run() {
    use crate::state::AppState;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = FhirClient::new(ServerConfig::default()).expect("failed to build HTTP client");

    tauri::Builder::default()
        .manage(AppState::new(client))
        .invoke_handler(tauri::generate_handler![
            commands::list_servers,
            commands::current_server,
            commands::select_server,
            commands::configure_server,
            commands::test_connection,
            commands::capability_statement,
            commands::get_resource,
            commands::get_resource_by_url,
            commands::search_resources,
            commands::create_resource,
            commands::update_resource,
            commands::delete_resource,
            commands::execute_batch,
            commands::open_record,
            commands::view_resource,
            commands::follow_reference,
            commands::render_record,
            commands::toggle_node,
            commands::close_record
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
