// HTTP-level tests driving the axum router in-process: login content
// negotiation, guard behavior on the admin surface, and the JSON triage
// endpoints.

mod helpers;

use aquavoice::settings::Settings;
use aquavoice::storage::{self, NewFeedback};
use aquavoice::web::{router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use helpers::db::{seed_test_station, seed_test_user};
use helpers::TestDb;
use http_body_util::BodyExt;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower::util::ServiceExt;

fn app(db: &DatabaseConnection) -> Router {
    router(AppState {
        settings: Arc::new(Settings::default()),
        db: db.clone(),
    })
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

async fn html_body(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

/// Logs in via the AJAX path and returns the session cookie pair.
async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "username={}&password={}&ajax=true",
                    username, password
                )))
                .unwrap(),
        )
        .await
        .expect("Login request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("No session cookie set")
        .to_str()
        .expect("Bad cookie header")
        .to_string();
    cookie.split(';').next().expect("Empty cookie").to_string()
}

#[tokio::test]
async fn test_index_lists_stations_and_sets_security_headers() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_test_station(db, "Station A").await;
    let app = app(db);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-frame-options").unwrap(),
        "DENY"
    );
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body = html_body(response).await;
    assert!(body.contains("Station A"));
}

#[tokio::test]
async fn test_submit_feedback_roundtrip() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    let station = seed_test_station(db, "Station A").await;
    let app = app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/feedback")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "station={}&customer_name=Juan&rating=5&feedback=Great+service",
                    station.id
                )))
                .unwrap(),
        )
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.contains("notice="));

    let all = storage::list_feedback(db).await.expect("List failed");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].customer_name, "Juan");
}

#[tokio::test]
async fn test_submit_feedback_out_of_range_rating_is_rejected() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    let station = seed_test_station(db, "Station A").await;
    let app = app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/feedback")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "station={}&customer_name=Juan&rating=9&feedback=text",
                    station.id
                )))
                .unwrap(),
        )
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.contains("error="));
    assert!(storage::list_feedback(db).await.expect("List failed").is_empty());
}

#[tokio::test]
async fn test_login_ajax_negotiation() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_test_user(db, "admin", "admin123", true).await;
    let app = app(db);

    // Wrong password: 401 with a JSON body
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("x-requested-with", "XMLHttpRequest")
                .body(Body::from("username=admin&password=wrong"))
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);

    // Correct password: JSON success + session cookie
    let cookie = login(&app, "admin", "admin123").await;
    assert!(cookie.starts_with("aquavoice_session="));

    // The session now resolves on a page route
    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let body = html_body(response).await;
    assert!(body.contains("admin"));
}

#[tokio::test]
async fn test_login_form_redirects_to_next() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_test_user(db, "admin", "admin123", true).await;
    let app = app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "username=admin&password=admin123&next=%2Fadmin%2Fusers",
                ))
                .unwrap(),
        )
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/admin/users"
    );
}

#[tokio::test]
async fn test_admin_page_requires_login_then_admin() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_test_user(db, "maria", "secret1", false).await;
    let app = app(db);

    // No session: sent to login with the destination preserved
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/login?next="));

    // Logged in but not admin: back to the index with a warning
    let cookie = login(&app, "maria", "secret1").await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/?error="));
}

#[tokio::test]
async fn test_feedback_triage_endpoints() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_test_user(db, "admin", "admin123", true).await;
    let station = seed_test_station(db, "Station A").await;
    let feedback = storage::submit_feedback(
        db,
        NewFeedback {
            station_id: station.id,
            customer_name: "Juan".to_string(),
            email: None,
            phone: None,
            rating: 5,
            feedback_text: "Great service".to_string(),
            suggestions: None,
        },
    )
    .await
    .expect("Submit failed");

    let app = app(db);
    let cookie = login(&app, "admin", "admin123").await;

    // Unauthenticated: 401 JSON
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/feedback/{}/status", feedback.id))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"status":"read"}"#))
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid status update
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/feedback/{}/status", feedback.id))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, cookie.clone())
                .body(Body::from(r#"{"status":"archived"}"#))
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);

    // Unknown status: 400, stored value untouched
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/feedback/{}/status", feedback.id))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, cookie.clone())
                .body(Body::from(r#"{"status":"resolved"}"#))
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Delete, then delete again
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/feedback/{}", feedback.id))
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/feedback/{}", feedback.id))
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_management_endpoints() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    let admin = seed_test_user(db, "admin", "admin123", true).await;
    let other = seed_test_user(db, "maria", "secret1", false).await;

    let app = app(db);
    let cookie = login(&app, "admin", "admin123").await;

    // Self toggle: 400 with message
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/users/{}/toggle-admin", admin.id))
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Cannot modify your own admin status");

    // Toggle someone else
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/users/{}/toggle-admin", other.id))
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["is_admin"], true);

    // Self delete: 400
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/users/{}", admin.id))
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "Cannot delete your own account"
    );

    // Delete someone else
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/users/{}", other.id))
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(storage::get_user_by_id(db, other.id)
        .await
        .expect("Lookup failed")
        .is_none());
}

#[tokio::test]
async fn test_registration_flow() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    let app = app(db);

    // Short password bounces back to the form with the validation message
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "username=maria&email=maria%40example.com&password=123&confirm_password=123",
                ))
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/register?error="));

    // Valid registration lands on the login page
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "username=maria&email=maria%40example.com&password=secret1&confirm_password=secret1",
                ))
                .unwrap(),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/login?notice="));

    let user = storage::get_user_by_username(db, "maria")
        .await
        .expect("Lookup failed")
        .expect("User not created");
    assert!(!user.is_admin);
}
