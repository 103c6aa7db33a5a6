//! Backend client and inspection flows against a mock server

use pdi_common::{
    DefectCategory, DefectForm, DefectLocation, RectificationEntry, Section, Severity,
};
use pdi_inspect::api::ApiClient;
use pdi_inspect::config::Config;
use pdi_inspect::error::PdiError;
use pdi_inspect::workflow::Session;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHASSIS: &str = "PM2ABC123";

fn client(server: &MockServer) -> ApiClient {
    let config = Config {
        api_base_url: format!("{}/api", server.uri()),
        token: Some("tok".into()),
        username: Some("inspector".into()),
        ..Config::default()
    };
    ApiClient::new(&config).expect("client")
}

fn vehicle_json() -> Value {
    json!({
        "model_name": "Saga",
        "variant_name": "BASE",
        "engine_no": "E123",
        "chassis_no": CHASSIS,
        "colour_code": "WHT",
        "entry_date": "2026-10-01"
    })
}

async fn mount_vehicle(server: &MockServer, job_card_status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/api/vehicles/{}", CHASSIS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(vehicle_json()))
        .mount(server)
        .await;
    let body = if job_card_status == 404 {
        json!({ "message": "Job Card not found" })
    } else {
        json!({ "chassis_no": CHASSIS })
    };
    Mock::given(method("GET"))
        .and(path(format!("/api/jobcards/{}", CHASSIS)))
        .respond_with(ResponseTemplate::new(job_card_status).set_body_json(body))
        .mount(server)
        .await;
}

/// Everything checked, battery measured, one painting defect on the last overall item
fn complete_checklist(session: &mut Session) {
    let ctx = session.context_mut();
    for section in Section::ALL {
        ctx.checklist_mut().toggle_check_all(section, true).unwrap();
    }
    ctx.checklist_mut()
        .set_item_value_and_check(Section::C, "Battery Terminal", 12.6)
        .unwrap();

    let last = ctx.checklist().checklist().unwrap()[&Section::Overall]
        .last()
        .unwrap()
        .id;
    let mut form = DefectForm::new();
    form.select_category(DefectCategory::Painting);
    form.select_type("Scratch").unwrap();
    form.select_location(DefectLocation::Exterior).unwrap();
    form.select_severity(Severity::Minor).unwrap();
    ctx.commit_defect(Section::Overall, last, &form).unwrap();
}

#[tokio::test]
async fn test_vehicle_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/vehicles/{}", CHASSIS)))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vehicle_json()))
        .expect(1)
        .mount(&server)
        .await;

    let vehicle = client(&server).vehicle(CHASSIS).await.unwrap();
    assert_eq!(vehicle.model_name, "Saga");
    assert_eq!(vehicle.engine_no, "E123");
}

#[tokio::test]
async fn test_job_card_exists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobcards/EXISTS1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobcards/MISSING1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Job Card not found" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobcards/BROKEN1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such route"))
        .mount(&server)
        .await;

    let api = client(&server);
    assert!(api.job_card_exists("EXISTS1").await.unwrap());
    assert!(!api.job_card_exists("MISSING1").await.unwrap());
    assert!(matches!(
        api.job_card_exists("BROKEN1").await,
        Err(PdiError::Api { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_search_passes_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vehicles/search"))
        .and(query_param("query", "PM2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "chassis_no": "PM2ABC123", "model_name": "Saga", "variant_name": "BASE" },
            { "chassis": "PM2XYZ999", "model": "Bezza", "variant": "PLUS" }
        ])))
        .mount(&server)
        .await;

    let rows = client(&server).search_vehicles("PM2").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].chassis_no, "PM2XYZ999");
    assert_eq!(rows[1].model, "Bezza");
}

#[tokio::test]
async fn test_supervisors_are_filtered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "username": "sv1", "name": "Aina", "type": "Supervisor" },
            { "id": 2, "username": "st1", "name": "Ben", "type": "Staff" }
        ])))
        .mount(&server)
        .await;

    let supervisors = client(&server).supervisors().await.unwrap();
    assert_eq!(supervisors.len(), 1);
    assert_eq!(supervisors[0].username, "sv1");
}

#[tokio::test]
async fn test_no_supervisors_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let session = Session::new(client(&server), "inspector");
    assert!(matches!(session.supervisors().await, Err(PdiError::NoSupervisors)));
}

#[tokio::test]
async fn test_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).supervisors().await.unwrap_err();
    assert!(matches!(err, PdiError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_cancelled_scope_aborts_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/vehicles/{}", CHASSIS)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(vehicle_json())
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let api = client(&server);
    let scope = api.scope().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        scope.cancel();
    });

    assert!(matches!(api.vehicle(CHASSIS).await, Err(PdiError::Cancelled)));
    // a cancelled scope rejects new requests until renewed
    assert!(matches!(api.vehicle(CHASSIS).await, Err(PdiError::Cancelled)));
}

#[tokio::test]
async fn test_invalid_chassis_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    assert!(matches!(
        session.lookup("??").await,
        Err(PdiError::InvalidChassis(_))
    ));
    assert!(!session.is_scan_locked());
}

#[tokio::test]
async fn test_inspection_submit_round_trip() {
    let server = MockServer::start().await;
    mount_vehicle(&server, 404).await;
    Mock::given(method("POST"))
        .and(path("/api/jobcards"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    let lookup = session.lookup("pm2abc123").await.unwrap();
    assert!(!lookup.job_card_exists);
    assert!(session.start_inspection(lookup, None).await.unwrap());

    complete_checklist(&mut session);
    let body = session.submit_inspection("sv1").await.unwrap();
    assert_eq!(body.defect, 1);
    assert_eq!(body.defect_count(), 1);

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let sent: Value = post.body_json().unwrap();
    assert_eq!(sent["chassis_no"], CHASSIS);
    assert_eq!(sent["staff_username"], "inspector");
    assert_eq!(sent["supervisor_username"], "sv1");
    assert!(sent["start_time"].is_string());
    assert!(sent["end_time"].is_string());

    let items = sent["items"].as_array().unwrap();
    let battery = items
        .iter()
        .find(|i| i["name"] == "Battery Terminal")
        .unwrap();
    assert_eq!(battery["value"], 12.6);
    let failed: Vec<&Value> = items.iter().filter(|i| i["pass"] == false).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["defect"][0]["category"], "PAINTING");
    assert_eq!(failed[0]["defect"][0]["type"], "Scratch");

    let vehicle = session.context().vehicle().unwrap();
    assert!(vehicle.end_time.is_some());
}

#[tokio::test]
async fn test_failed_submission_leaves_state_untouched() {
    let server = MockServer::start().await;
    mount_vehicle(&server, 404).await;
    Mock::given(method("POST"))
        .and(path("/api/jobcards"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "database offline" })))
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    let lookup = session.lookup(CHASSIS).await.unwrap();
    session.start_inspection(lookup, None).await.unwrap();
    complete_checklist(&mut session);

    let err = session.submit_inspection("sv1").await.unwrap_err();
    assert_eq!(err.to_string(), "database offline");

    assert!(session.context().checklist().is_complete());
    assert!(session.context().vehicle().unwrap().end_time.is_none());
}

#[tokio::test]
async fn test_submission_succeeds_when_retried() {
    let server = MockServer::start().await;
    mount_vehicle(&server, 404).await;
    Mock::given(method("POST"))
        .and(path("/api/jobcards"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/jobcards"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    let lookup = session.lookup(CHASSIS).await.unwrap();
    session.start_inspection(lookup, None).await.unwrap();
    complete_checklist(&mut session);

    let err = session.submit_inspection("sv1").await.unwrap_err();
    assert!(err.is_retryable());

    let body = session.submit_inspection("sv1").await.unwrap();
    assert_eq!(body.defect_count(), 1);
    assert!(session.context().vehicle().unwrap().end_time.is_some());

    session.teardown();
    assert!(session.context().current_chassis().is_none());
    assert!(session.context().checklist().checklist_for(CHASSIS).is_some());
}

#[tokio::test]
async fn test_incomplete_checklist_is_not_sent() {
    let server = MockServer::start().await;
    mount_vehicle(&server, 404).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    let lookup = session.lookup(CHASSIS).await.unwrap();
    session.start_inspection(lookup, None).await.unwrap();

    let err = session.submit_inspection("sv1").await.unwrap_err();
    assert!(matches!(err, PdiError::Common(pdi_common::Error::Incomplete(_))));
}

#[tokio::test]
async fn test_override_requires_password() {
    let server = MockServer::start().await;
    mount_vehicle(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({ "username": "inspector", "password": "right" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t2" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })))
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    let lookup = session.lookup(CHASSIS).await.unwrap();
    assert!(lookup.job_card_exists);

    assert!(matches!(
        session.start_inspection(lookup.clone(), None).await,
        Err(PdiError::JobCardExists(_))
    ));
    assert!(matches!(
        session.start_inspection(lookup.clone(), Some("wrong")).await,
        Err(PdiError::VerificationFailed)
    ));
    assert!(session.context().vehicle().is_none());

    session.start_inspection(lookup, Some("right")).await.unwrap();
    assert_eq!(session.context().current_chassis(), Some(CHASSIS));
}

fn rectify_json() -> Value {
    json!({
        "chassis_no": CHASSIS,
        "model_name": "Saga",
        "variant_name": "BASE",
        "engine_no": "E123",
        "colour_code": "WHT",
        "entry_date": "2026-10-01",
        "sections": [
            { "section": 2, "items": [
                { "id": 21, "name": "Bonnet", "pass": false, "defect": [
                    { "id": 501, "category": "PAINTING", "type": "Scratch", "severity": "Minor",
                      "location": "Exterior", "mark": { "x": 0.5, "y": 0.25, "image_id": 7 } }
                ] },
                { "id": 22, "name": "Roof Panel", "pass": true, "defect": [] }
            ] },
            { "section": 7, "items": [
                { "id": 71, "name": "Road Test", "pass": false, "defect": [
                    { "id": 502, "category": "MECHANICAL", "type": "Noise", "severity": "Major",
                      "location": "Interior" }
                ] }
            ] }
        ],
        "images": [ { "id": 7, "name": "front", "url": "https://img.example.com/7.png" } ]
    })
}

#[tokio::test]
async fn test_rectification_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/jobcards/rectify/{}", CHASSIS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rectify_json()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/jobcards/rectify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    session.load_rectification(CHASSIS).await.unwrap();

    let tracker = session.context().rectification();
    assert_eq!(tracker.items().len(), 2);
    assert_eq!(tracker.marks_for_image(7).len(), 1);
    let numbers: Vec<String> = tracker.numbered().into_iter().map(|(n, _)| n).collect();
    assert_eq!(numbers, vec!["2.1", "7.1"]);

    // still open, nothing is sent
    assert!(session.submit_rectification(1).await.is_err());

    let tracker = session.context_mut().rectification_mut();
    for id in [21, 71] {
        assert!(tracker.mark_rectified(
            id,
            RectificationEntry {
                name: "Chong".into(),
                no: "S-88".into(),
                remark: "polished".into(),
                date: "2026-10-15".into(),
                closed: true,
            },
        ));
    }

    let body = session.submit_rectification(1).await.unwrap();
    assert_eq!(body.supervisor_id, 1);
    assert_eq!(body.rectify_items[0].defect_id, Some(501));
    assert_eq!(body.rectify_items[1].defect_id, Some(502));
    assert!(session.context().rectification().items().is_empty());
}

#[tokio::test]
async fn test_rectification_fetch_failure_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/jobcards/rectify/{}", CHASSIS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Job Card not found" })))
        .mount(&server)
        .await;

    let mut session = Session::new(client(&server), "inspector");
    assert!(session.load_rectification(CHASSIS).await.is_err());

    let tracker = session.context().rectification();
    assert!(!tracker.is_loading());
    assert_eq!(tracker.error(), Some("Job Card not found"));
}

#[tokio::test]
async fn test_approve_posts_decision() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/approvals/{}", CHASSIS)))
        .and(body_json(json!({ "approval": "NOK" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new(client(&server), "inspector");
    session
        .approve("pm2abc123", pdi_common::Approval::NotOk)
        .await
        .unwrap();
}
