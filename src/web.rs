//! HTTP surface: the public submission form, session login, and the
//! admin dashboard with its JSON triage endpoints.
//!
//! Page routes answer guard rejections with redirects (carrying a
//! flash-style notice in the query string); the AJAX endpoints under
//! /admin answer with 401/403 JSON instead.

use crate::auth::{self, AuthRejection};
use crate::session::SessionCookie;
use crate::settings::Settings;
use crate::storage::{self, NewFeedback};
use axum::body::Body;
use axum::extract::{Form, Json, Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
}

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // X-Frame-Options: Prevent clickjacking
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );

    // X-Content-Type-Options: Prevent MIME sniffing
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    // Content-Security-Policy: Restrict resource loading
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static(
            "default-src 'self'; style-src 'self' 'unsafe-inline'; form-action 'self'",
        ),
    );

    // Referrer-Policy: Control referrer information
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/feedback", post(submit_feedback))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout))
        .route("/profile", get(profile))
        .route("/admin", get(admin_dashboard))
        .route("/admin/feedback/{id}/status", post(update_feedback_status))
        .route("/admin/feedback/{id}", delete(delete_feedback))
        .route("/admin/users", get(admin_users))
        .route("/admin/users/{id}/toggle-admin", post(toggle_admin))
        .route("/admin/users/{id}", delete(delete_user));

    // Conditionally add public registration routes
    if state.settings.server.allow_public_registration {
        tracing::info!("Public registration is ENABLED");
        router = router.route("/register", get(register_page).post(register_submit));
    } else {
        tracing::info!("Public registration is DISABLED");
    }

    router
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let state = AppState {
        settings: Arc::new(settings),
        db,
    };

    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let app = router(state);

    tracing::info!(%addr, "AquaVoice listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

// ============================================================================
// Guard rejection rendering
// ============================================================================

/// Page routes: send the visitor to login (preserving the destination) or
/// back to the index with a warning.
fn page_guard_redirect(rejection: AuthRejection, next: &str) -> Response {
    match rejection {
        AuthRejection::NotLoggedIn => {
            Redirect::to(&format!("/login?next={}", urlencoded(next))).into_response()
        }
        AuthRejection::NotAdmin => Redirect::to(&format!(
            "/?error={}",
            urlencoded("You need admin privileges to access this page.")
        ))
        .into_response(),
    }
}

/// AJAX routes: 401/403 with a JSON body instead of a redirect.
fn api_guard_response(rejection: AuthRejection) -> Response {
    match rejection {
        AuthRejection::NotLoggedIn => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Authentication required"})),
        )
            .into_response(),
        AuthRejection::NotAdmin => (
            StatusCode::FORBIDDEN,
            Json(json!({"success": false, "message": "Admin privileges required"})),
        )
            .into_response(),
    }
}

// ============================================================================
// Public pages
// ============================================================================

#[derive(Debug, Deserialize)]
struct NoticeQuery {
    notice: Option<String>,
    error: Option<String>,
}

fn notice_html(q: &NoticeQuery) -> String {
    let mut out = String::new();
    if let Some(notice) = &q.notice {
        out.push_str(&format!(
            "<p class='notice'>{}</p>",
            html_escape(notice)
        ));
    }
    if let Some(error) = &q.error {
        out.push_str(&format!("<p class='error'>{}</p>", html_escape(error)));
    }
    out
}

const PAGE_CSS: &str = r#"
        body { font-family: Arial, sans-serif; max-width: 720px; margin: 40px auto; padding: 20px; }
        h1 { color: #006994; }
        label { display: block; margin-top: 10px; }
        input, select, textarea { width: 100%; padding: 8px; margin-top: 5px; box-sizing: border-box; }
        button { margin-top: 20px; padding: 10px 20px; background-color: #006994; color: white; border: none; cursor: pointer; }
        button:hover { background-color: #00506f; }
        table { border-collapse: collapse; width: 100%; margin-top: 20px; }
        th, td { border: 1px solid #ccc; padding: 6px 10px; text-align: left; }
        .notice { color: #1a7f37; }
        .error { color: #c62828; }
        nav a { margin-right: 12px; }
"#;

async fn index(State(state): State<AppState>, Query(q): Query<NoticeQuery>) -> Response {
    let stations = match storage::list_stations(&state.db).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list stations");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let options: String = stations
        .iter()
        .map(|s| format!("<option value=\"{}\">{}</option>", s.id, html_escape(&s.name)))
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>AquaVoice - Water Station Feedback</title>
    <style>{css}</style>
</head>
<body>
    <h1>AquaVoice</h1>
    <nav><a href="/login">Admin login</a></nav>
    {notices}
    <p>Tell us about your last visit to one of our water refilling stations.</p>
    <form method="POST" action="/feedback">
        <label>
            Station:
            <select name="station" required>{options}</select>
        </label>
        <label>
            Your name:
            <input type="text" name="customer_name" required>
        </label>
        <label>
            Email (optional):
            <input type="email" name="email">
        </label>
        <label>
            Phone (optional):
            <input type="text" name="phone">
        </label>
        <label>
            Rating (1-5):
            <select name="rating" required>
                <option value="5">5 - Excellent</option>
                <option value="4">4 - Good</option>
                <option value="3">3 - Okay</option>
                <option value="2">2 - Poor</option>
                <option value="1">1 - Very poor</option>
            </select>
        </label>
        <label>
            Feedback:
            <textarea name="feedback" rows="4" required></textarea>
        </label>
        <label>
            Suggestions (optional):
            <textarea name="suggestions" rows="2"></textarea>
        </label>
        <button type="submit">Submit feedback</button>
    </form>
</body>
</html>"#,
        css = PAGE_CSS,
        notices = notice_html(&q),
        options = options,
    );

    Html(html).into_response()
}

#[derive(Debug, Deserialize)]
struct FeedbackForm {
    station: String,
    customer_name: String,
    email: Option<String>,
    phone: Option<String>,
    rating: String,
    feedback: String,
    suggestions: Option<String>,
}

async fn submit_feedback(
    State(state): State<AppState>,
    Form(form): Form<FeedbackForm>,
) -> Response {
    // Coerce the select values; a mangled form gets the generic notice
    let (station_id, rating) = match (form.station.parse::<i32>(), form.rating.parse::<i32>()) {
        (Ok(s), Ok(r)) => (s, r),
        _ => {
            return Redirect::to(&format!(
                "/?error={}",
                urlencoded("Error submitting feedback. Please try again.")
            ))
            .into_response();
        }
    };

    let input = NewFeedback {
        station_id,
        customer_name: form.customer_name,
        email: form.email,
        phone: form.phone,
        rating,
        feedback_text: form.feedback,
        suggestions: form.suggestions,
    };

    match storage::submit_feedback(&state.db, input).await {
        Ok(_) => Redirect::to(&format!(
            "/?notice={}",
            urlencoded("Thank you for your feedback!")
        ))
        .into_response(),
        Err(crate::errors::AquaError::Validation(msg)) => {
            Redirect::to(&format!("/?error={}", urlencoded(&msg))).into_response()
        }
        Err(e) => {
            // Persistence detail is not leaked to the submitter
            tracing::error!(error = %e, "Error submitting feedback");
            Redirect::to(&format!(
                "/?error={}",
                urlencoded("Error submitting feedback. Please try again.")
            ))
            .into_response()
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

async fn register_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<NoticeQuery>,
) -> Response {
    if auth::require_user(&state.db, &headers).await.is_ok() {
        return Redirect::to("/admin").into_response();
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Register - AquaVoice</title>
    <style>{css}</style>
</head>
<body>
    <h1>Register</h1>
    {notices}
    <form method="POST" action="/register">
        <label>
            Username:
            <input type="text" name="username" required autofocus>
        </label>
        <label>
            Email:
            <input type="email" name="email" required>
        </label>
        <label>
            Password:
            <input type="password" name="password" required>
        </label>
        <label>
            Confirm password:
            <input type="password" name="confirm_password" required>
        </label>
        <button type="submit">Register</button>
    </form>
    <p><a href="/login">Already have an account? Log in</a></p>
</body>
</html>"#,
        css = PAGE_CSS,
        notices = notice_html(&q),
    );

    Html(html).into_response()
}

#[derive(Debug, Deserialize)]
struct RegisterForm {
    username: String,
    email: String,
    password: String,
    confirm_password: String,
}

async fn register_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Response {
    if auth::require_user(&state.db, &headers).await.is_ok() {
        return Redirect::to("/admin").into_response();
    }

    match storage::register_user(
        &state.db,
        &form.username,
        &form.email,
        &form.password,
        &form.confirm_password,
    )
    .await
    {
        Ok(user) => {
            tracing::info!(username = %user.username, "New account registered");
            Redirect::to(&format!(
                "/login?notice={}",
                urlencoded("Registration successful! Please log in.")
            ))
            .into_response()
        }
        Err(crate::errors::AquaError::Validation(msg)) => {
            Redirect::to(&format!("/register?error={}", urlencoded(&msg))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Registration error");
            Redirect::to(&format!(
                "/register?error={}",
                urlencoded("An error occurred. Please try again.")
            ))
            .into_response()
        }
    }
}

// ============================================================================
// Login / logout / profile
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginQuery {
    error: Option<String>,
    notice: Option<String>,
    next: Option<String>,
}

async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LoginQuery>,
) -> Response {
    if auth::require_user(&state.db, &headers).await.is_ok() {
        return Redirect::to("/admin").into_response();
    }

    let notices = notice_html(&NoticeQuery {
        notice: q.notice,
        error: q.error,
    });
    let next = q.next.unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Login - AquaVoice</title>
    <style>{css}</style>
</head>
<body>
    <h1>Login</h1>
    {notices}
    <form method="POST" action="/login">
        <input type="hidden" name="next" value="{next}">
        <label>
            Username:
            <input type="text" name="username" required autofocus>
        </label>
        <label>
            Password:
            <input type="password" name="password" required>
        </label>
        <label>
            <input type="checkbox" name="remember" value="on" style="width: auto;"> Remember me
        </label>
        <button type="submit">Login</button>
    </form>
    <p><a href="/register">Need an account? Register</a></p>
</body>
</html>"#,
        css = PAGE_CSS,
        notices = notices,
        next = html_escape(&next),
    );

    Html(html).into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    remember: Option<String>,
    ajax: Option<String>,
    next: Option<String>,
}

fn is_ajax(headers: &HeaderMap, form_flag: Option<&str>) -> bool {
    let header_flag = headers
        .get("x-requested-with")
        .and_then(|h| h.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false);
    header_flag || form_flag == Some("true")
}

async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let ajax = is_ajax(&headers, form.ajax.as_deref());

    if auth::require_user(&state.db, &headers).await.is_ok() {
        if ajax {
            return Json(json!({
                "success": true,
                "message": "Already logged in",
                "redirect": "/admin",
            }))
            .into_response();
        }
        return Redirect::to("/admin").into_response();
    }

    let user = match storage::verify_user_password(&state.db, &form.username, &form.password).await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            if ajax {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "success": false,
                        "message": "Invalid username or password.",
                    })),
                )
                    .into_response();
            }
            return Redirect::to(&format!(
                "/login?error={}",
                urlencoded("Invalid username or password.")
            ))
            .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Login error");
            return Redirect::to(&format!(
                "/login?error={}",
                urlencoded("An error occurred. Please try again.")
            ))
            .into_response();
        }
    };

    let remember = form.remember.is_some();
    let ttl = if remember {
        state.settings.session.remember_ttl_secs
    } else {
        state.settings.session.ttl_secs
    };

    let session = match storage::create_session(&state.db, user.id, ttl, remember).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create session");
            return Redirect::to(&format!(
                "/login?error={}",
                urlencoded("An error occurred. Please try again.")
            ))
            .into_response();
        }
    };

    if let Err(e) = storage::update_last_login(&state.db, user.id).await {
        tracing::warn!(error = %e, "Failed to update last login");
    }

    // Set cookie
    let cookie = SessionCookie::new(session.session_id);
    let cookie_header = cookie.to_cookie_header(&state.settings, ttl);

    tracing::info!(username = %user.username, "User logged in");

    let redirect_url = form
        .next
        .filter(|n| n.starts_with('/'))
        .unwrap_or_else(|| "/admin".to_string());

    if ajax {
        return Response::builder()
            .status(StatusCode::OK)
            .header(axum::http::header::SET_COOKIE, cookie_header)
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "success": true,
                    "message": format!("Welcome back, {}!", user.username),
                    "redirect": redirect_url,
                })
                .to_string(),
            ))
            .unwrap()
            .into_response();
    }

    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(axum::http::header::SET_COOKIE, cookie_header)
        .header(axum::http::header::LOCATION, redirect_url)
        .body(Body::empty())
        .unwrap()
        .into_response()
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(cookie) = SessionCookie::from_headers(&headers) {
        let _ = storage::delete_session(&state.db, &cookie.session_id).await;
    }

    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(
            axum::http::header::SET_COOKIE,
            SessionCookie::delete_cookie_header(),
        )
        .header(
            axum::http::header::LOCATION,
            format!(
                "/login?notice={}",
                urlencoded("You have been logged out.")
            ),
        )
        .body(Body::empty())
        .unwrap()
        .into_response()
}

async fn profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match auth::require_user(&state.db, &headers).await {
        Ok(u) => u,
        Err(rejection) => return page_guard_redirect(rejection, "/profile"),
    };

    let last_login = user
        .last_login
        .map(format_timestamp)
        .unwrap_or_else(|| "never".to_string());

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Profile - AquaVoice</title>
    <style>{css}</style>
</head>
<body>
    <h1>Profile</h1>
    <nav><a href="/admin">Dashboard</a><a href="/logout">Logout</a></nav>
    <table>
        <tr><th>Username</th><td>{username}</td></tr>
        <tr><th>Email</th><td>{email}</td></tr>
        <tr><th>Admin</th><td>{is_admin}</td></tr>
        <tr><th>Member since</th><td>{created}</td></tr>
        <tr><th>Last login</th><td>{last_login}</td></tr>
    </table>
</body>
</html>"#,
        css = PAGE_CSS,
        username = html_escape(&user.username),
        email = html_escape(&user.email),
        is_admin = if user.is_admin { "yes" } else { "no" },
        created = format_timestamp(user.created_at),
        last_login = last_login,
    );

    Html(html).into_response()
}

// ============================================================================
// Admin pages
// ============================================================================

async fn admin_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match auth::require_admin(&state.db, &headers).await {
        Ok(u) => u,
        Err(rejection) => return page_guard_redirect(rejection, "/admin"),
    };

    let (feedbacks, stats, users) = match (
        storage::list_feedback(&state.db).await,
        storage::feedback_stats(&state.db).await,
        storage::list_users(&state.db).await,
    ) {
        (Ok(f), Ok(s), Ok(u)) => (f, s, u),
        _ => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let station_names: std::collections::HashMap<i32, String> = stats
        .stations
        .iter()
        .map(|s| (s.station_id, s.name.clone()))
        .collect();

    let feedback_rows: String = feedbacks
        .iter()
        .map(|f| {
            let station = station_names
                .get(&f.station_id)
                .map(|n| html_escape(n))
                .unwrap_or_else(|| f.station_id.to_string());
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                station,
                html_escape(&f.customer_name),
                f.rating,
                html_escape(&f.feedback_text),
                f.status,
                format_timestamp(f.created_at),
            )
        })
        .collect();

    let station_rows: String = stats
        .stations
        .iter()
        .map(|s| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{:.1}</td></tr>",
                html_escape(&s.name),
                s.count,
                s.avg_rating,
            )
        })
        .collect();

    let user_rows: String = users
        .iter()
        .map(|u| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&u.username),
                html_escape(&u.email),
                if u.is_admin { "admin" } else { "user" },
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Admin - AquaVoice</title>
    <style>{css}</style>
</head>
<body>
    <h1>Admin dashboard</h1>
    <nav><a href="/">Public form</a><a href="/admin/users">Users</a><a href="/profile">{username}</a><a href="/logout">Logout</a></nav>
    <p>Total feedback: <strong>{total}</strong> &middot; Overall rating: <strong>{avg:.1}</strong></p>
    <h2>Ratings by station</h2>
    <table>
        <tr><th>Station</th><th>Count</th><th>Average</th></tr>
        {station_rows}
    </table>
    <h2>Feedback</h2>
    <table>
        <tr><th>Station</th><th>Customer</th><th>Rating</th><th>Feedback</th><th>Status</th><th>Submitted</th></tr>
        {feedback_rows}
    </table>
</body>
</html>"#,
        css = PAGE_CSS,
        username = html_escape(&user.username),
        total = stats.total,
        avg = stats.avg_rating,
        station_rows = station_rows,
        feedback_rows = feedback_rows,
    );

    Html(html).into_response()
}

async fn admin_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = auth::require_admin(&state.db, &headers).await {
        return page_guard_redirect(rejection, "/admin/users");
    }

    let users = match storage::list_users(&state.db).await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list users");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let rows: String = users
        .iter()
        .map(|u| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                u.id,
                html_escape(&u.username),
                html_escape(&u.email),
                if u.is_admin { "admin" } else { "user" },
                u.last_login
                    .map(format_timestamp)
                    .unwrap_or_else(|| "never".to_string()),
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Users - AquaVoice</title>
    <style>{css}</style>
</head>
<body>
    <h1>Users</h1>
    <nav><a href="/admin">Dashboard</a><a href="/logout">Logout</a></nav>
    <table>
        <tr><th>Id</th><th>Username</th><th>Email</th><th>Role</th><th>Last login</th></tr>
        {rows}
    </table>
</body>
</html>"#,
        css = PAGE_CSS,
        rows = rows,
    );

    Html(html).into_response()
}

// ============================================================================
// Admin JSON endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_feedback_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<StatusBody>,
) -> Response {
    if let Err(rejection) = auth::require_admin(&state.db, &headers).await {
        return api_guard_response(rejection);
    }

    match storage::update_feedback_status(&state.db, id, &body.status).await {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(crate::errors::AquaError::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false})),
        )
            .into_response(),
        Err(crate::errors::AquaError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, feedback_id = id, "Status update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false})),
            )
                .into_response()
        }
    }
}

async fn delete_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    if let Err(rejection) = auth::require_admin(&state.db, &headers).await {
        return api_guard_response(rejection);
    }

    match storage::delete_feedback(&state.db, id).await {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(crate::errors::AquaError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, feedback_id = id, "Feedback delete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false})),
            )
                .into_response()
        }
    }
}

async fn toggle_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let acting = match auth::require_admin(&state.db, &headers).await {
        Ok(u) => u,
        Err(rejection) => return api_guard_response(rejection),
    };

    match storage::toggle_admin(&state.db, id, acting.id).await {
        Ok(is_admin) => Json(json!({"success": true, "is_admin": is_admin})).into_response(),
        Err(crate::errors::AquaError::Forbidden(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": msg})),
        )
            .into_response(),
        Err(crate::errors::AquaError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, user_id = id, "Toggle admin failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false})),
            )
                .into_response()
        }
    }
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let acting = match auth::require_admin(&state.db, &headers).await {
        Ok(u) => u,
        Err(rejection) => return api_guard_response(rejection),
    };

    match storage::delete_user(&state.db, id, acting.id).await {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(crate::errors::AquaError::Forbidden(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": msg})),
        )
            .into_response(),
        Err(crate::errors::AquaError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, user_id = id, "User delete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false})),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn urlencoded(s: &str) -> String {
    serde_urlencoded::to_string([("", s)])
        .unwrap_or_default()
        .trim_start_matches('=')
        .to_string()
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
