//! REST API for recorded builds.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use crate::models::build::{BuildRecord, BuildSummary};
use crate::routes::CiRouterState;

/// Every recorded build, most recent first.
pub async fn list_builds_handler(
    State(state): State<CiRouterState>,
) -> Result<Json<Vec<BuildSummary>>, StatusCode> {
    state.ledger.list_summaries().await.map(Json).map_err(|e| {
        tracing::error!("List builds error: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub async fn get_build_handler(
    State(state): State<CiRouterState>,
    Path(build_id): Path<String>,
) -> Result<Json<BuildRecord>, StatusCode> {
    match state.ledger.get_by_id(&build_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(build_id, "Get build error: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};

    use crate::models::build::{BuildRecord, BuildStatus};
    use crate::routes::test_support::{send, test_app};

    fn record(id: &str, hour: u32) -> BuildRecord {
        BuildRecord {
            id: id.to_string(),
            repository: "a/b".to_string(),
            commit: Some("deadbeef".to_string()),
            branch: "main".to_string(),
            build_date: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            build_success: true,
            tests_success: true,
            status: BuildStatus::Success,
            logs: "$ git -C /tmp/ci/x fetch\n".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_builds_newest_first() {
        let app = test_app(None);
        app.ledger.append("a/b", &record("older", 8)).await.unwrap();
        app.ledger.append("a/b", &record("newer", 9)).await.unwrap();

        let (response, body) = send(
            &app.router,
            Request::get("/builds").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let summaries: serde_json::Value = serde_json::from_str(&body).unwrap();
        let ids: Vec<&str> = summaries
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["newer", "older"]);
        assert_eq!(summaries[0]["url"], "/builds/newer");
        assert!(summaries[0].get("logs").is_none());
    }

    #[tokio::test]
    async fn fetches_a_build_by_id() {
        let app = test_app(None);
        app.ledger.append("a/b", &record("b-1", 8)).await.unwrap();

        let (response, body) = send(
            &app.router,
            Request::get("/builds/b-1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: BuildRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(fetched, record("b-1", 8));

        let (response, _) = send(
            &app.router,
            Request::get("/builds/missing").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
