//! HTTP-level tests for the record store client against a mock server

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string, header, method, path, query_param, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

use core_kernel::{AdjustmentId, Amount, ClaimId, PortError, RecordFetchPort, RecordQuery};
use domain_reconciliation::{AdjustmentStore, ClaimSource, PayerRank};
use infra_store::{
    AuthConfig, ClientCredentialsTokenProvider, DataverseAdjustmentStore, DataverseClaimSource,
    DataverseClient, StaticTokenProvider, StoreConfig, TokenProvider,
};

const API: &str = "/api/data/v9.1";

fn client_for(server: &MockServer) -> Arc<DataverseClient> {
    let client = DataverseClient::new(
        StoreConfig::new(server.uri()),
        Arc::new(StaticTokenProvider::new("test-token")),
    )
    .unwrap();
    Arc::new(client)
}

fn claim_row(id: Uuid) -> serde_json::Value {
    json!({
        "smvs_claimid": id.to_string(),
        "smvs_claimed_amount": 1000,
        "smvs_recieved_amount": 400,
        "smvs_patient_responsible_payment": 50,
        "smvs_pending_from_additional_payer": 0,
        "smvs_adjustment_amount": 600,
    })
}

#[tokio::test]
async fn test_fetch_pages_until_short_page() {
    let server = MockServer::start().await;
    let full_page: Vec<_> = (0..2).map(|_| claim_row(Uuid::new_v4())).collect();

    Mock::given(method("GET"))
        .and(path(format!("{}/smvs_claims", API)))
        .and(query_param_contains("fetchXml", r#"page="1""#))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": full_page })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/smvs_claims", API)))
        .and(query_param_contains("fetchXml", r#"page="2""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [claim_row(Uuid::new_v4())] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let rows = client.fetch(&RecordQuery::new("smvs_claim"), 2).await.unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_claim_source_projects_rows() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("{}/smvs_claims", API)))
        .and(query_param_contains("fetchXml", r#"distinct="true""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [claim_row(id)] })))
        .mount(&server)
        .await;

    let source = DataverseClaimSource::new(client_for(&server));
    let claims = source.list_claims().await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(*claims[0].id.as_uuid(), id);
    assert_eq!(claims[0].excess(), Amount::new(dec!(50)));
}

#[tokio::test]
async fn test_remittances_for_claim() {
    let server = MockServer::start().await;
    let claim_id = ClaimId::new();

    Mock::given(method("GET"))
        .and(path(format!("{}/smvs_patient_remittances", API)))
        .and(query_param_contains("fetchXml", claim_id.as_uuid().to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "smvs_patient_remittanceid": Uuid::new_v4().to_string(),
                    "_smvs_claim_id_value": claim_id.as_uuid().to_string(),
                    "smvs_remit_type_indicator": 622490001,
                    "smvs_check_processed_date": "2024-01-15T00:00:00Z"
                }
            ]
        })))
        .mount(&server)
        .await;

    let source = DataverseClaimSource::new(client_for(&server));
    let remittances = source.remittances_for_claim(claim_id).await.unwrap();
    assert_eq!(remittances.len(), 1);
    assert_eq!(remittances[0].rank, PayerRank::Secondary);
    assert_eq!(remittances[0].claim_id, claim_id);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .mount(&server)
        .await;

    let store = DataverseAdjustmentStore::new(client_for(&server));
    let err = store.current_amount(AdjustmentId::new()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("record does not exist"))
        .mount(&server)
        .await;

    let store = DataverseAdjustmentStore::new(client_for(&server));
    let err = store.current_amount(AdjustmentId::new()).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = DataverseAdjustmentStore::new(client_for(&server));
    let err = store
        .set_amount(AdjustmentId::new(), Amount::new(dec!(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::ServiceUnavailable { status: Some(503), .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_read_and_patch_amount() {
    let server = MockServer::start().await;
    let id = AdjustmentId::new();
    let record_path = format!("{}/smvs_claim_adjustment_details({})", API, id.as_uuid());

    Mock::given(method("GET"))
        .and(path(record_path.clone()))
        .and(query_param("$select", "smvs_amount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "smvs_amount": 40.0 })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(record_path))
        .and(body_string(r#"{"smvs_amount":20.00}"#))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = DataverseAdjustmentStore::new(client_for(&server));
    assert_eq!(store.current_amount(id).await.unwrap(), Amount::new(dec!(40)));
    store.set_amount(id, Amount::new(dec!(20))).await.unwrap();
}

#[tokio::test]
async fn test_client_credentials_token_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "issued-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = AuthConfig::new("tenant-1", "client-1", "secret", "https://org.example.com")
        .authority(server.uri());
    let provider = ClientCredentialsTokenProvider::new(config).unwrap();

    assert_eq!(provider.access_token().await.unwrap(), "issued-token");
    assert_eq!(provider.access_token().await.unwrap(), "issued-token");
}

#[tokio::test]
async fn test_token_endpoint_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let config = AuthConfig::new("tenant-1", "client-1", "wrong", "https://org.example.com")
        .authority(server.uri());
    let provider = ClientCredentialsTokenProvider::new(config).unwrap();
    let err = provider.access_token().await.unwrap_err();
    assert!(err.to_string().contains("invalid_client"));
}
