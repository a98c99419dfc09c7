//! ApiClient against a mock clinic server.

use std::time::Duration;

use clinicdesk_core::api::{ApiClient, ApiError, AuthFailure};
use clinicdesk_core::auth::{TokenIssuer, TokenValidator, Validation};
use clinicdesk_core::models::{NewAppointment, PageRequest, Patient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

/// Address on a port nothing listens on: bind an ephemeral port, then release it.
fn closed_port_uri() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

#[tokio::test]
async fn test_request_token_uses_basic_auth() {
    let server = MockServer::start().await;
    // "nurse:secret" in base64
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", "Basic bnVyc2U6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc.def"})))
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server).request_token("nurse", "secret").await.unwrap();
    assert_eq!(token, "abc.def");
}

#[tokio::test]
async fn test_request_token_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).issue_token("nurse", "wrong").await.unwrap_err();
    assert_eq!(err, AuthFailure::CredentialRejected);
}

#[tokio::test]
async fn test_request_token_wrong_base_path_is_not_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).issue_token("nurse", "secret").await.unwrap_err();
    assert!(matches!(err, AuthFailure::MalformedResponse(_)));
}

#[tokio::test]
async fn test_request_token_missing_field_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "abc"})))
        .mount(&server)
        .await;

    let err = client(&server).request_token("nurse", "secret").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
    assert!(matches!(err.classify(), AuthFailure::MalformedResponse(_)));
}

#[tokio::test]
async fn test_validate_token_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/validate-token"))
        .and(header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/validate-token"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/validate-token"))
        .and(header("authorization", "Bearer flaky"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(api.validate("good").await, Validation::Valid);
    assert_eq!(api.validate("revoked").await, Validation::Invalid);
    assert_eq!(api.validate("flaky").await, Validation::NetworkError);
}

#[tokio::test]
async fn test_validate_token_connection_refused() {
    let api = ApiClient::new(&closed_port_uri(), Duration::from_secs(2)).unwrap();
    assert_eq!(api.validate("whatever").await, Validation::NetworkError);
}

#[tokio::test]
async fn test_list_patients_sends_paging_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient"))
        .and(query_param("pageNo", "1"))
        .and(query_param("pageSize", "5"))
        .and(header("authorization", "Bearer tkn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"patientId": 6, "firstName": "Ada", "lastName": "Lovelace",
                 "dob": "1815-12-10", "gender": "Female"}
            ],
            "totalElements": 6
        })))
        .mount(&server)
        .await;

    let api = client(&server).with_token("tkn".into());
    let page = api.list_patients(PageRequest::new(1, 5)).await.unwrap();
    assert_eq!(page.total_elements, 6);
    assert_eq!(page.content[0].first_name, "Ada");
    assert_eq!(page.page_count(5), 2);
}

#[tokio::test]
async fn test_patient_mutations() {
    let server = MockServer::start().await;
    let patient = Patient {
        patient_id: 12,
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        dob: "1906-12-09".into(),
        gender: String::new(),
    };

    Mock::given(method("POST"))
        .and(path("/patient"))
        .and(body_json(&patient))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/patient/11"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/patient/12"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patient/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&patient))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).with_token("tkn".into());
    api.create_patient(&patient).await.unwrap();
    api.update_patient(11, &patient).await.unwrap();
    assert_eq!(api.get_patient(12).await.unwrap(), patient);
    api.delete_patient(12).await.unwrap();
}

#[tokio::test]
async fn test_create_appointment_posts_under_patient() {
    let server = MockServer::start().await;
    let body = NewAppointment {
        description: "Checkup".into(),
        appointment_date: "2024-03-05".into(),
    };
    Mock::given(method("POST"))
        .and(path("/appointment/42"))
        .and(body_json(json!({"description": "Checkup", "appointmentDate": "2024-03-05"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .with_token("tkn".into())
        .create_appointment(42, &body)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resource_401_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appointment"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server)
        .with_token("expired".into())
        .list_appointments(PageRequest::new(0, 5))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_list_appointments_tolerates_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appointment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let page = client(&server)
        .with_token("tkn".into())
        .list_appointments(PageRequest::new(0, 5))
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total_elements, 0);
}
