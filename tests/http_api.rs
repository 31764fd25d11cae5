use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use brightminds::{
    api,
    credentials::{
        memory::{MemoryOwnership, MemoryStore},
        CredentialManager,
    },
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct App {
    router: Router,
    student: Uuid,
    other_student: Uuid,
}

async fn app() -> App {
    let store = Arc::new(MemoryStore::new());
    let ownership = Arc::new(MemoryOwnership::new());
    let student = store.add_student("ABC123", "Ada Lovelace").await;
    let other_student = store.add_student("DEF456", "Alan Turing").await;
    store.add_room(student, "Room 4B").await;
    let teacher = ownership.add_caller("auth0|teacher-1").await;
    ownership.grant(teacher, student).await;

    let manager = Arc::new(CredentialManager::new(store, ownership));
    App {
        router: api::router(manager),
        student,
        other_student,
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

fn token_of(body: &Value) -> String {
    body["sessionToken"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn lookup_reports_pin_status() -> Result<()> {
    let App {
        router, student, ..
    } = app().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/lookup",
        Some(json!({"studentPublicId": " abc123 "})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["studentId"], student.to_string());
    assert_eq!(body["fullName"], "Ada Lovelace");
    assert_eq!(body["roomName"], "Room 4B");
    assert_eq!(body["pinStatus"], "NOT_SET");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/lookup",
        Some(json!({"studentPublicId": "NOPE99"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/lookup",
        Some(json!({})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    Ok(())
}

#[tokio::test]
async fn set_pin_login_and_session_flow() -> Result<()> {
    let App { router, .. } = app().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/set-pin",
        Some(json!({"studentPublicId": "ABC123", "pin": "12345"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/login",
        Some(json!({"studentPublicId": "ABC123", "pin": "314159"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "PIN_NOT_SET");

    for blank in ["", "      "] {
        for path in ["/api/student-auth/set-pin", "/api/student-auth/login"] {
            let (status, body) = send(
                &router,
                Method::POST,
                path,
                Some(json!({"studentPublicId": "ABC123", "pin": blank})),
                None,
            )
            .await?;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "INVALID_FORMAT");
        }
    }

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/login",
        Some(json!({"studentPublicId": "ABC123"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/set-pin",
        Some(json!({"studentPublicId": "ABC123", "pin": "314159"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let t1 = token_of(&body);
    assert_eq!(t1.len(), 64);
    assert!(body["expiresAt"].is_string());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/set-pin",
        Some(json!({"studentPublicId": "ABC123", "pin": "000000"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_SET");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/login",
        Some(json!({"studentPublicId": "ABC123", "pin": "999999"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INCORRECT_PIN");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/login",
        Some(json!({"studentPublicId": "abc123", "pin": "314159"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let t2 = token_of(&body);
    assert_ne!(t1, t2);

    for token in [&t1, &t2] {
        let (status, body) = send(
            &router,
            Method::GET,
            "/api/student-auth/session",
            None,
            Some(token),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["student"]["name"], "Ada Lovelace");
        assert_eq!(body["student"]["studentPublicId"], "ABC123");
        assert_eq!(body["rooms"][0]["name"], "Room 4B");
    }
    Ok(())
}

#[tokio::test]
async fn session_requires_a_known_bearer_token() -> Result<()> {
    let App { router, .. } = app().await;

    let (status, body) =
        send(&router, Method::GET, "/api/student-auth/session", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/student-auth/session",
        None,
        Some("deadbeef"),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SESSION");
    Ok(())
}

#[tokio::test]
async fn reset_pin_enforces_caller_and_ownership() -> Result<()> {
    let App {
        router,
        student,
        other_student,
    } = app().await;

    let (_, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/set-pin",
        Some(json!({"studentPublicId": "ABC123", "pin": "314159"})),
        None,
    )
    .await?;
    let token = token_of(&body);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/students/reset-pin",
        Some(json!({"studentId": student.to_string()})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/students/reset-pin?auth0_user_id=auth0%7Cstranger",
        Some(json!({"studentId": student.to_string()})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/students/reset-pin?auth0_user_id=auth0%7Cstranger",
        Some(json!({"studentId": "not-a-uuid"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/students/reset-pin?auth0_user_id=auth0%7Cteacher-1",
        Some(json!({"studentId": "not-a-uuid"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FIELD");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/students/reset-pin?auth0_user_id=auth0%7Cteacher-1",
        Some(json!({"studentId": other_student.to_string()})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    for _ in 0..2 {
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/students/reset-pin?auth0_user_id=auth0%7Cteacher-1",
            Some(json!({"studentId": student.to_string()})),
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/student-auth/session",
        None,
        Some(&token),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SESSION");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/lookup",
        Some(json!({"studentPublicId": "ABC123"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pinStatus"], "RESET_REQUIRED");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/student-auth/login",
        Some(json!({"studentPublicId": "ABC123", "pin": "314159"})),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "RESET_REQUIRED");
    Ok(())
}

#[tokio::test]
async fn health_and_request_id() -> Result<()> {
    let App { router, .. } = app().await;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-app"));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-42")
    );

    let (status, body) = send(&router, Method::OPTIONS, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let App { router, .. } = app().await;

    let (status, body) = send(&router, Method::GET, "/api-docs/openapi.json", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/student-auth/login"].is_object());
    Ok(())
}
