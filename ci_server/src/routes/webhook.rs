//! GitHub webhook handler — hands each delivery to the orchestrator.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::models::build::BuildSummary;
use crate::routes::CiRouterState;
use crate::services::orchestrator::{WebhookDelivery, WebhookOutcome};

const EVENT_HEADER: &str = "x-github-event";
const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn health() -> &'static str {
    "CI server running"
}

pub async fn webhook_handler(
    State(state): State<CiRouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event_type = header(&headers, EVENT_HEADER);
    crate::metrics::webhook_received(event_type.unwrap_or("unknown"));

    let delivery = WebhookDelivery {
        event_type,
        signature: header(&headers, SIGNATURE_HEADER),
        body: &body,
    };

    let outcome = state.orchestrator.handle(delivery).await;
    tracing::debug!(stage = outcome.stage().as_str(), "Webhook handled");
    match outcome {
        WebhookOutcome::Rejected => StatusCode::UNAUTHORIZED.into_response(),
        WebhookOutcome::Ignored(reason) => {
            (StatusCode::OK, format!("Ignored: {reason}")).into_response()
        }
        WebhookOutcome::Built(report) => {
            let status = if report.persisted {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(BuildSummary::from(&report.record))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};

    use crate::routes::test_support::{send, test_app};
    use crate::testing::{sign, PUSH_PAYLOAD};

    const SECRET: &str = "it-is-a-secret";

    fn push(uri: &str, body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("x-github-event", "push")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("x-hub-signature-256", signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn get_reports_liveness() {
        let app = test_app(None);
        let (response, body) = send(
            &app.router,
            Request::get("/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body, "CI server running");
    }

    #[tokio::test]
    async fn unsigned_delivery_is_unauthorized_when_secret_is_set() {
        let app = test_app(Some(SECRET));
        let (response, _) = send(&app.router, push("/webhook/github", PUSH_PAYLOAD, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(app.ledger.list_summaries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signed_push_returns_build_summary() {
        let app = test_app(Some(SECRET));
        let signature = sign(SECRET, PUSH_PAYLOAD.as_bytes());

        let (response, body) = send(&app.router, push("/", PUSH_PAYLOAD, Some(&signature))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let summary: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(summary["repository"], "a/b");
        assert_eq!(summary["commit"], "deadbeef");
        // The freshly cloned workspace has no build wrapper.
        assert_eq!(summary["status"], "failure");
        let id = summary["id"].as_str().unwrap();
        assert_eq!(summary["url"], format!("/builds/{id}"));
    }

    #[tokio::test]
    async fn ping_event_is_ignored() {
        let app = test_app(None);
        let request = Request::post("/webhook/github")
            .header("x-github-event", "ping")
            .body(Body::from("{}"))
            .unwrap();

        let (response, body) = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body, "Ignored: unsupported event type 'ping'");
    }
}
