//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    Form, Json,
};
use serde::Deserialize;

use stock_core::{handle, ApiResponse, ErrorCode, ServiceStatus, StockEngine};

use crate::AppState;

/// Form body: `payload=<json ApiPayload>`
#[derive(Debug, Deserialize)]
pub struct ExecForm {
    pub payload: Option<String>,
}

/// Health probe
pub async fn status() -> Json<ServiceStatus> {
    Json(ServiceStatus::up())
}

/// Run an action sent as a url-encoded form
pub async fn exec_form(
    State(state): State<Arc<AppState>>,
    form: Result<Form<ExecForm>, FormRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let payload = match form {
        Ok(Form(form)) => form.payload.filter(|p| !p.trim().is_empty()),
        Err(rejection) => {
            tracing::warn!(%rejection, "unreadable form body");
            None
        }
    };
    match payload {
        Some(raw) => run(state, move |engine| handle(engine, &raw)).await,
        None => protocol_error("invalid request".to_string()),
    }
}

/// Run an action sent as a JSON body
///
/// The body is decoded by the action protocol itself so that malformed
/// JSON is answered with an error descriptor like any other failure.
pub async fn exec_json(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    match String::from_utf8(body.to_vec()) {
        Ok(raw) => run(state, move |engine| handle(engine, &raw)).await,
        Err(e) => {
            tracing::warn!(error = %e, "request body is not UTF-8");
            protocol_error(format!("invalid payload: {}", e))
        }
    }
}

fn protocol_error(error: String) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::OK,
        Json(ApiResponse::Error {
            error,
            code: Some(ErrorCode::Protocol),
        }),
    )
}

/// Engine calls block on the request gate, so they run off the async workers.
async fn run<F>(state: Arc<AppState>, job: F) -> (StatusCode, Json<ApiResponse>)
where
    F: FnOnce(&StockEngine) -> ApiResponse + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || job(&state.engine)).await;
    match joined {
        Ok(response) => (status_for(&response), Json(response)),
        Err(e) => {
            tracing::error!("request task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::Error {
                    error: "internal error".to_string(),
                    code: Some(ErrorCode::Storage),
                }),
            )
        }
    }
}

fn status_for(response: &ApiResponse) -> StatusCode {
    match response {
        ApiResponse::Error {
            code: Some(ErrorCode::Timeout),
            ..
        } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use axum::Router;
    use serde_json::{json, Value};
    use std::time::Duration;
    use stock_core::{MemorySheetStore, StockEngine};
    use tower::ServiceExt;

    fn router() -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::in_memory());
        (Arc::clone(&state), create_router(state))
    }

    fn form_request(uri: &str, payload: &Value) -> Request<Body> {
        let body = format!("payload={}", urlencoding::encode(&payload.to_string()));
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn status_probe() {
        let (_, app) = router();
        let (status, body) = send(app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn add_then_get_over_form() {
        let (_, app) = router();
        let add = json!({
            "action": "addItem",
            "data": {"id": "nike-air-42-preto", "marca": "Nike", "modelo": "Air", "tamanho": "42", "cor": "Preto", "quantidade": 3}
        });
        let (status, body) = send(app.clone(), form_request("/exec", &add)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "nike-air-42-preto");
        assert_eq!(body[0]["quantidade"], 3);

        let (_, body) = send(app, form_request("/", &json!({"action": "getItems"}))).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn json_endpoint_accepts_payload() {
        let (_, app) = router();
        let req = Request::post("/api")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"getItems"}"#))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn errors_are_descriptors() {
        let (_, app) = router();
        let (status, body) = send(
            app.clone(),
            form_request("/exec", &json!({"action": "explode"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "protocol");
        assert!(body["error"].as_str().unwrap().contains("explode"));

        let (_, body) = send(
            app,
            form_request("/exec", &json!({"action": "addItem", "data": {"marca": " "}})),
        )
        .await;
        assert_eq!(body["code"], "validation");
    }

    #[tokio::test]
    async fn missing_payload_is_invalid_request() {
        let (_, app) = router();
        let req = Request::post("/exec")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("other=1"))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "invalid request");
    }

    #[tokio::test]
    async fn malformed_json_body_is_descriptor() {
        let (_, app) = router();
        for body in [r#"{not json"#, r#"{"action": 5}"#, ""] {
            let req = Request::post("/api")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            let (status, value) = send(app.clone(), req).await;
            assert_eq!(status, StatusCode::OK, "body {body:?}");
            assert_eq!(value["code"], "protocol", "body {body:?}");
            assert!(value["error"].is_string());
        }
    }

    #[tokio::test]
    async fn json_body_without_content_type_is_accepted() {
        let (_, app) = router();
        let req = Request::post("/api")
            .body(Body::from(r#"{"action":"getItems"}"#))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn unreadable_form_is_invalid_request() {
        let (_, app) = router();
        let req = Request::post("/exec")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("payload"))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "invalid request");
        assert_eq!(body["code"], "protocol");
    }

    #[tokio::test]
    async fn gate_timeout_maps_to_503() {
        let engine =
            StockEngine::new(MemorySheetStore::new()).with_lock_timeout(Duration::from_millis(20));
        let state = Arc::new(AppState::new(engine));
        let app = create_router(Arc::clone(&state));

        let _held = state.engine.gate().acquire(Duration::from_millis(10)).unwrap();
        let (status, body) = send(app, form_request("/exec", &json!({"action": "getItems"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "timeout");
    }
}
