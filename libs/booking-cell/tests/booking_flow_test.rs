use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::router::{booking_routes, BookingState};
use booking_cell::services::HttpLogSink;
use booking_cell::{BookingService, BookingStore};
use payment_cell::services::razorpay::expected_signature;
use payment_cell::RazorpayGateway;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};
use therapist_cell::TherapistCatalog;

struct TestApp {
    router: Router,
    server: MockServer,
    config: TestConfig,
}

impl TestApp {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::default()
            .with_supabase_url(&server.uri())
            .with_razorpay_url(&server.uri())
            .with_booking_log_url(&format!("{}/log", server.uri()));

        Mock::given(method("POST"))
            .and(path("/log"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let app_config = config.to_arc();
        let service = BookingService::new(
            BookingStore::new(),
            TherapistCatalog::seeded().unwrap(),
            Arc::new(RazorpayGateway::new(&app_config)),
            Arc::new(HttpLogSink::new(&app_config)),
        );
        let router = booking_routes(BookingState { config: app_config, service });

        Self { router, server, config }
    }

    async fn login(&self, user: &TestUser) -> String {
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", format!("eq.{}", user.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::profile_response(&user.full_name, user.role, user.therapist_id)
            ])))
            .mount(&self.server)
            .await;

        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn mount_order(&self, order_id: &str, amount_paise: i64) {
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(MockSupabaseResponses::razorpay_order_response(order_id, amount_paise)),
            )
            .mount(&self.server)
            .await;
    }

    async fn call(&self, method_name: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method_name)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn logged_records(&self, count: usize) -> Vec<Value> {
        for _ in 0..50 {
            let records: Vec<Value> = self
                .server
                .received_requests()
                .await
                .unwrap_or_default()
                .into_iter()
                .filter(|r| r.url.path() == "/log")
                .filter_map(|r| serde_json::from_slice(&r.body).ok())
                .collect();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        vec![]
    }
}

fn booking_form(date: &str, time: &str) -> Value {
    json!({
        "patient_name": "Asha Menon",
        "phone_no": "9800000000",
        "service": "Back Pain",
        "date": date,
        "time": time
    })
}

/// Books a pay-at-clinic appointment with therapist 1 and returns its id.
async fn book_at_clinic(app: &TestApp, token: &str, date: &str, time: &str) -> String {
    let (status, _) = app.call("POST", "/flow/start", Some(token), Some(json!({ "therapist_id": 1 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call("POST", "/flow/submit", Some(token), Some(booking_form(date, time))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "finalized");
    body["booking"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_pay_at_clinic_booking_is_confirmed_unpaid() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;

    let (status, opened) = app.call("POST", "/flow/start", Some(&token), Some(json!({ "therapist_id": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["state"], "composing");
    assert_eq!(opened["form"]["patient_name"], "asha");
    assert_eq!(opened["form"]["default_service"], "Back Pain");
    assert_eq!(opened["form"]["time_slots"][0], "09:00 AM");

    let (status, body) = app
        .call("POST", "/flow/submit", Some(&token), Some(booking_form("2030-03-10", "10:00 AM")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "finalized");
    assert_eq!(body["paid_online"], false);
    assert_eq!(body["booking"]["is_paid"], false);
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["booking"]["therapist"]["id"], 1);
    assert!(body["booking"]["id"].as_str().unwrap().ends_with("-1"));

    let (_, overview) = app.call("GET", "/", Some(&token), None).await;
    assert_eq!(overview["upcoming"].as_array().unwrap().len(), 1);
    assert_eq!(overview["upcoming"][0]["display_status"], "confirmed");

    let records = app.logged_records(1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["date"], "Sun Mar 10 2030");
    assert_eq!(records[0]["therapistName"], "Dr. Rohan Kulkarni");
    assert_eq!(records[0]["isPaid"], false);
}

#[tokio::test]
async fn test_online_payment_success_creates_paid_booking() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;
    app.mount_order("order_B", 80000).await;

    app.call("POST", "/flow/start", Some(&token), Some(json!({ "therapist_id": 2 }))).await;
    let (status, pending) = app
        .call("POST", "/flow/submit", Some(&token), Some(booking_form("2030-03-10", "10:00 AM")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["state"], "payment_pending");
    assert_eq!(pending["attempt"], 1);
    assert_eq!(pending["checkout"]["order_id"], "order_B");
    assert_eq!(pending["checkout"]["amount"], 80000);
    assert_eq!(pending["checkout"]["key"], "rzp_test_key");
    assert_eq!(pending["checkout"]["name"], "BookMyPhysiotherapy");

    let (_, overview) = app.call("GET", "/", Some(&token), None).await;
    assert!(overview["upcoming"].as_array().unwrap().is_empty());

    let signature = expected_signature("rzp_test_secret", "order_B", "pay_123").unwrap();
    let (status, done) = app
        .call(
            "POST",
            "/flow/payment/outcome",
            Some(&token),
            Some(json!({ "attempt": 1, "outcome": "success", "payment_id": "pay_123", "signature": signature })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["state"], "finalized");
    assert_eq!(done["paid_online"], true);
    assert_eq!(done["booking"]["is_paid"], true);

    let (_, overview) = app.call("GET", "/", Some(&token), None).await;
    assert_eq!(overview["upcoming"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_payment_creates_no_booking() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;
    app.mount_order("order_C", 80000).await;

    app.call("POST", "/flow/start", Some(&token), Some(json!({ "therapist_id": 2 }))).await;
    app.call("POST", "/flow/submit", Some(&token), Some(booking_form("2030-03-10", "10:00 AM"))).await;

    let (status, failed) = app
        .call(
            "POST",
            "/flow/payment/outcome",
            Some(&token),
            Some(json!({ "attempt": 1, "outcome": "failed", "description": "Card declined" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["state"], "payment_pending");
    assert_eq!(failed["failure"]["message"], "Card declined");
    assert_eq!(failed["failure"]["retry_allowed"], true);

    let (_, closed) = app.call("POST", "/flow/close", Some(&token), None).await;
    assert_eq!(closed["state"], "idle");

    let (_, overview) = app.call("GET", "/", Some(&token), None).await;
    assert!(overview["upcoming"].as_array().unwrap().is_empty());
    assert!(overview["history"].as_array().unwrap().is_empty());

    // A late success for the closed attempt must not book
    let signature = expected_signature("rzp_test_secret", "order_C", "pay_late").unwrap();
    let (status, _) = app
        .call(
            "POST",
            "/flow/payment/outcome",
            Some(&token),
            Some(json!({ "attempt": 1, "outcome": "success", "payment_id": "pay_late", "signature": signature })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_order_failure_is_reported_and_retryable() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(MockSupabaseResponses::razorpay_error_response("Amount exceeds maximum")),
        )
        .mount(&app.server)
        .await;

    app.call("POST", "/flow/start", Some(&token), Some(json!({ "therapist_id": 2 }))).await;
    let (_, body) = app
        .call("POST", "/flow/submit", Some(&token), Some(booking_form("2030-03-10", "10:00 AM")))
        .await;
    assert_eq!(body["state"], "payment_pending");
    assert_eq!(body["checkout"], Value::Null);
    assert_eq!(body["failure"]["message"], "Amount exceeds maximum");

    let (status, retried) = app.call("POST", "/flow/payment/retry", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retried["attempt"], 2);
}

#[tokio::test]
async fn test_reschedule_moves_existing_booking() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;

    let booking_id = book_at_clinic(&app, &token, "2030-03-10", "10:00 AM").await;

    let (status, opened) = app
        .call("POST", &format!("/flow/reschedule/{}", booking_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["form"]["phone_no"], "9800000000");

    let (status, done) = app
        .call("POST", "/flow/submit", Some(&token), Some(booking_form("2030-03-12", "02:00 PM")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["rescheduled"], true);
    assert_eq!(done["booking"]["id"], booking_id.as_str());

    let (_, booking) = app.call("GET", &format!("/{}", booking_id), Some(&token), None).await;
    assert_eq!(booking["date"], "2030-03-12");
    assert_eq!(booking["time"], "02:00 PM");

    let (_, overview) = app.call("GET", "/", Some(&token), None).await;
    assert_eq!(overview["upcoming"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_and_intake() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;
    let booking_id = book_at_clinic(&app, &token, "2030-03-10", "11:00 AM").await;
    let intake_uri = format!("/{}/intake", booking_id);

    let mut intake = json!({
        "personal_info": { "full_name": "Asha Menon", "dob": "1990-04-02", "gender": "Female" },
        "current_condition": { "primary_complaint": "Lower back pain", "pain_level": 6 },
        "goals": { "patient_goals": "" }
    });
    let (status, body) = app.call("POST", &intake_uri, Some(&token), Some(intake.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please describe your goals for physiotherapy.");

    intake["goals"]["patient_goals"] = json!("Sit through a workday without pain");
    let (status, _) = app.call("POST", &intake_uri, Some(&token), Some(intake.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("POST", &intake_uri, Some(&token), Some(intake)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, stored) = app.call("GET", &intake_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["current_condition"]["pain_level"], 6);

    let cancel_uri = format!("/{}/cancel", booking_id);
    let (status, cancelled) = app.call("POST", &cancel_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, again) = app.call("POST", &cancel_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "cancelled");

    let (_, overview) = app.call("GET", "/", Some(&token), None).await;
    assert!(overview["upcoming"].as_array().unwrap().is_empty());
    assert_eq!(overview["history"][0]["display_status"], "cancelled");

    let (status, _) = app
        .call("POST", &format!("/flow/reschedule/{}", booking_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_therapist_dashboard_and_access() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("asha@example.com");
    let patient_token = app.login(&patient).await;
    let therapist = TestUser::therapist("rohan@example.com", 1);
    let therapist_token = app.login(&therapist).await;
    let stranger = TestUser::patient("ravi@example.com");
    let stranger_token = app.login(&stranger).await;

    let booking_id = book_at_clinic(&app, &patient_token, "2030-03-10", "09:00 AM").await;
    book_at_clinic(&app, &patient_token, "2030-03-11", "09:00 AM").await;

    let (status, dashboard) = app.call("GET", "/dashboard", Some(&therapist_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["therapist_id"], 1);
    assert_eq!(dashboard["total_bookings"], 2);
    assert_eq!(dashboard["total_patients"], 1);
    assert_eq!(dashboard["upcoming"].as_array().unwrap().len(), 2);

    let (status, _) = app.call("GET", &format!("/{}", booking_id), Some(&therapist_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", "/dashboard", Some(&patient_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call("POST", &format!("/{}/cancel", booking_id), Some(&stranger_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to access this booking");

    let (status, _) = app.call("GET", "/all", Some(&patient_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submit_validation_and_state_errors() {
    let app = TestApp::new().await;
    let user = TestUser::patient("asha@example.com");
    let token = app.login(&user).await;

    let (status, _) = app
        .call("POST", "/flow/submit", Some(&token), Some(booking_form("2030-03-10", "10:00 AM")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.call("POST", "/flow/start", Some(&token), Some(json!({ "therapist_id": 999 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Therapist not found");

    app.call("POST", "/flow/start", Some(&token), Some(json!({ "therapist_id": 1 }))).await;
    let (status, body) = app
        .call("POST", "/flow/submit", Some(&token), Some(json!({ "patient_name": "Asha", "date": "2030-03-10" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please fill in all fields, and select a date and time.");

    let (_, flow) = app.call("GET", "/flow", Some(&token), None).await;
    assert_eq!(flow["state"], "composing");
}

#[tokio::test]
async fn test_booking_routes_require_session() {
    let app = TestApp::new().await;

    let (status, _) = app.call("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("POST", "/flow/start", None, Some(json!({ "therapist_id": 1 }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
