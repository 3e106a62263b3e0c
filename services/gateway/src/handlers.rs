use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{json, Value};
use std::sync::Arc;
use time::Duration;
use tracing::error;

use fingertrust_engine::{
    session, AcceptKind, Classification, Decision, EngineError, Fingerprint, NewAccount,
};

use crate::state::AppState;

fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((session::SESSION_COOKIE, token.to_owned()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(session::SESSION_MAX_AGE_DAYS))
        .build()
}

fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((session::SESSION_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/api")
        .max_age(Duration::ZERO)
        .build()
}

/// Pull the incoming fingerprint out of a request body. `None` covers both
/// a missing field and a non-numeric-array shape.
fn fingerprint_field(body: &Value) -> Option<Fingerprint> {
    body.get("fingerprint")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn unauthorized(payload: Value) -> Response {
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

/// Map engine errors onto the HTTP taxonomy. Upstream detail is logged
/// here and never echoed back to the caller.
fn error_response(context: &'static str, err: EngineError) -> Response {
    match err {
        EngineError::Validation(msg) => bad_request(&msg),
        EngineError::Credentials => unauthorized(json!({"error": "Invalid email or password"})),
        EngineError::InvalidSession => {
            unauthorized(json!({"error": "Invalid or expired session"}))
        }
        EngineError::DuplicateEmail { .. } => bad_request("User already exists"),
        EngineError::Classifier(detail) => {
            error!(context, detail = %detail, "classifier failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "ML verification failed"})),
            )
                .into_response()
        }
        EngineError::Store(detail) => {
            error!(context, detail = %detail, "account store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
        EngineError::Serialization(e) => {
            error!(context, detail = %e, "serialization failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

fn accept_message(kind: AcceptKind) -> &'static str {
    match kind {
        AcceptKind::ExactMatch => "User authenticated (exact match)",
        AcceptKind::LegitimateChange => "User authenticated (legit change replaced)",
        AcceptKind::NewDeviceAppended => "User authenticated (new device appended)",
        AcceptKind::FallbackAppend => "User authenticated (fallback append)",
    }
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<Value>,
) -> Response {
    let email = body.get("email").and_then(Value::as_str);
    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);

    let (Some(email), Some(username), Some(password)) = (email, username, password) else {
        return bad_request("email, username, password and fingerprint required");
    };
    if body.get("fingerprint").is_none() {
        return bad_request("email, username, password and fingerprint required");
    }
    let Some(fingerprint) = fingerprint_field(&body) else {
        return bad_request("fingerprint must be an array");
    };

    let new_account = NewAccount {
        email: email.to_string(),
        username: username.to_string(),
        password_hash: password.to_string(),
    };

    match state.engine.signup(new_account, fingerprint).await {
        Ok(account) => {
            let jar = jar.add(session_cookie(
                &account.session_token,
                state.config.cookie_secure,
            ));
            (
                StatusCode::OK,
                jar,
                Json(json!({"message": "User created", "redirectTo": "/home"})),
            )
                .into_response()
        }
        Err(err) => error_response("signup", err),
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<Value>,
) -> Response {
    let button_clicked = body
        .get("buttonClicked")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let cookie_token = jar
        .get(session::SESSION_COOKIE)
        .map(|c| c.value().to_owned());

    // A session cookie with no explicit login action means auto-auth.
    if let Some(token) = cookie_token.filter(|_| !button_clicked) {
        return auto_login(state, jar, &body, &token).await;
    }

    let email = body.get("email").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    let fingerprint = fingerprint_field(&body);

    let (Some(email), Some(password), Some(fingerprint)) = (email, password, fingerprint) else {
        return bad_request("Email, password and fingerprint required");
    };

    match state.engine.manual_login(email, password, &fingerprint).await {
        Ok(Decision::Accept {
            session_token,
            kind,
            verdict,
        }) => {
            let jar = jar.add(session_cookie(&session_token, state.config.cookie_secure));
            let mut payload = json!({
                "message": accept_message(kind),
                "redirectTo": "/home"
            });
            // The verdict is surfaced when the accept came from an append
            // path, so the caller can see what the classifier thought.
            if !matches!(kind, AcceptKind::LegitimateChange | AcceptKind::ExactMatch) {
                if let Some(v) = verdict {
                    payload["mlResult"] = json!(v);
                }
            }
            (StatusCode::OK, jar, Json(payload)).into_response()
        }
        Ok(Decision::Deny { reason, verdict }) => {
            let mut payload = json!({"error": "Authentication rejected", "reason": reason.as_str()});
            if let Some(v) = verdict {
                payload["mlResult"] = json!(v);
            }
            unauthorized(payload)
        }
        Err(err) => error_response("manual-login", err),
    }
}

async fn auto_login(
    state: Arc<AppState>,
    jar: CookieJar,
    body: &Value,
    token: &str,
) -> Response {
    let Some(fingerprint) = fingerprint_field(body) else {
        return bad_request("Fingerprint required for auto-auth");
    };

    match state.engine.auto_login(token, &fingerprint).await {
        Ok(Decision::Accept { session_token, .. }) => {
            let jar = jar.add(session_cookie(&session_token, state.config.cookie_secure));
            (
                StatusCode::OK,
                jar,
                Json(json!({
                    "autoLogin": true,
                    "message": "Auto-login successful",
                    "redirectTo": "/home"
                })),
            )
                .into_response()
        }
        Ok(Decision::Deny { reason, verdict }) => {
            let mut payload = json!({"autoLogin": false, "message": reason.as_str()});
            if let Some(v) = verdict {
                payload["mlResult"] = json!(v);
            }
            unauthorized(payload)
        }
        Err(err) => error_response("auto-login", err),
    }
}

pub async fn verify_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<Value>,
) -> Response {
    let Some(token) = jar
        .get(session::SESSION_COOKIE)
        .map(|c| c.value().to_owned())
    else {
        return unauthorized(json!({"error": "No session"}));
    };
    let Some(fingerprint) = fingerprint_field(&body) else {
        return bad_request("Fingerprint required");
    };

    match state.engine.verify_session(&token, &fingerprint).await {
        Ok(outcome) => {
            if !outcome.authenticated {
                return (
                    StatusCode::OK,
                    Json(json!({
                        "authenticated": false,
                        "reason": "SessionStealer detected",
                        "mlResult": outcome.verdict
                    })),
                )
                    .into_response();
            }

            let payload = json!({"authenticated": true, "mlResult": &outcome.verdict});
            if outcome.verdict.classification == Classification::LegitimateChange {
                let jar = jar.add(session_cookie(
                    &outcome.session_token,
                    state.config.cookie_secure,
                ));
                (StatusCode::OK, jar, Json(payload)).into_response()
            } else {
                (StatusCode::OK, Json(payload)).into_response()
            }
        }
        Err(err) => error_response("verify-session", err),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let jar = jar.add(clear_session_cookie(state.config.cookie_secure));
    (
        StatusCode::OK,
        jar,
        Json(json!({"message": "Logged out successfully", "redirectTo": "/login"})),
    )
        .into_response()
}
