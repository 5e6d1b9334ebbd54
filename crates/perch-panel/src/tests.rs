//! Tests for the panel API clients and types.

#![allow(clippy::unwrap_used)]

use crate::application::{ApplicationClient, urlencode};
use crate::client_api::ClientApiClient;
use crate::types::{Allocation, EggWithVariables, ListEnvelope, PowerSignal, Server, Wrapped};
use crate::{PanelCredentials, PanelError, UserUpdate};

// =============================================================================
// Client construction
// =============================================================================

#[test]
fn empty_base_url_returns_config_error() {
    let creds = PanelCredentials::new("", "key");
    let err = ApplicationClient::new(&creds).unwrap_err();
    assert!(matches!(err, PanelError::Config(_)));
}

#[test]
fn empty_api_key_returns_config_error() {
    let creds = PanelCredentials::new("https://panel.example.com", "");
    let err = ApplicationClient::new(&creds).unwrap_err();
    assert!(matches!(err, PanelError::Config(_)));
}

#[test]
fn trailing_slash_stripped_from_base_url() {
    let creds = PanelCredentials::new("https://panel.example.com/", "key");
    let client = ApplicationClient::new(&creds).unwrap();
    let url = client.api_url("/nodes");
    assert_eq!(url, "https://panel.example.com/api/application/nodes");
}

#[test]
fn client_api_url_scoped_to_server() {
    let creds = PanelCredentials::new("https://panel.example.com", "key");
    let client = ClientApiClient::new(&creds).unwrap();
    assert_eq!(
        client.server_url("abc123", "/power"),
        "https://panel.example.com/api/client/servers/abc123/power"
    );
}

// =============================================================================
// Request serialization
// =============================================================================

#[test]
fn user_update_strips_unset_fields() {
    let update = UserUpdate {
        username: Some("alice".into()),
        ..UserUpdate::default()
    };
    let json = serde_json::to_value(&update).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 1);
    assert_eq!(obj["username"], "alice");
    assert!(!obj.contains_key("password"));
    assert!(!obj.contains_key("email"));
}

#[test]
fn power_signal_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&PowerSignal::Kill).unwrap(), "\"kill\"");
    assert_eq!(PowerSignal::Restart.as_str(), "restart");
}

#[test]
fn urlencode_escapes_reserved_characters() {
    assert_eq!(urlencode("a@b.com"), "a%40b.com");
    assert_eq!(urlencode("dir/eula.txt"), "dir%2Feula.txt");
    assert_eq!(urlencode("plain-name_1.txt"), "plain-name_1.txt");
}

// =============================================================================
// Response envelopes
// =============================================================================

#[test]
fn list_envelope_unwraps_attributes() {
    let body = r#"{
        "object": "list",
        "data": [
            {"object": "allocation", "attributes": {"id": 7, "ip": "10.0.0.1", "port": 25565, "assigned": false}}
        ],
        "meta": {"pagination": {"total": 1, "count": 1, "per_page": 50, "current_page": 1, "total_pages": 1}}
    }"#;
    let envelope: ListEnvelope<Allocation> = serde_json::from_str(body).unwrap();
    assert_eq!(envelope.data.len(), 1);
    assert_eq!(envelope.data[0].attributes.id, 7);
    assert!(!envelope.data[0].attributes.assigned);
    assert_eq!(envelope.meta.unwrap().pagination.total_pages, 1);
}

#[test]
fn server_envelope_carries_owner_and_identifier() {
    let body = r#"{
        "object": "server",
        "attributes": {
            "id": 3, "uuid": "u-3", "identifier": "abc123", "name": "SMP",
            "limits": {"memory": 4096, "swap": 0, "disk": 10240, "io": 500, "cpu": 100},
            "feature_limits": {"databases": 2, "allocations": 1, "backups": 4},
            "user": 42, "node": 1, "allocation": 7, "nest": 1, "egg": 5
        }
    }"#;
    let wrapped: Wrapped<Server> = serde_json::from_str(body).unwrap();
    assert_eq!(wrapped.attributes.user, 42);
    assert_eq!(wrapped.attributes.identifier, "abc123");
    assert_eq!(wrapped.attributes.status, None);
}

#[test]
fn egg_variables_ride_in_relationships() {
    let body = r#"{
        "object": "egg",
        "attributes": {
            "relationships": {
                "variables": {
                    "data": [
                        {"object": "egg_variable", "attributes": {"name": "Version", "env_variable": "MC_VERSION", "default_value": "latest"}}
                    ]
                }
            }
        }
    }"#;
    let wrapped: Wrapped<EggWithVariables> = serde_json::from_str(body).unwrap();
    let vars = wrapped
        .attributes
        .relationships
        .and_then(|r| r.variables)
        .map(|v| v.data)
        .unwrap();
    assert_eq!(vars[0].attributes.env_variable, "MC_VERSION");
    assert_eq!(vars[0].attributes.default_value, "latest");
}

#[test]
fn egg_without_included_variables_yields_none() {
    let body = r#"{"object": "egg", "attributes": {}}"#;
    let wrapped: Wrapped<EggWithVariables> = serde_json::from_str(body).unwrap();
    assert!(wrapped.attributes.relationships.is_none());
}
