use actix_web::{web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use crate::core::{RebalanceError, Rebalancer};
use crate::models::{ErrorResponse, HealthResponse, RebalanceConfig, RebalanceRequest, RebalanceResponse};

/// Application state shared across all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Defaults that request overrides are applied to
    pub config: RebalanceConfig,
}

/// Configure all rebalancing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/rebalance", web::post().to(rebalance));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Rebalance endpoint
///
/// POST /api/v1/rebalance
///
/// Request body:
/// ```json
/// {
///   "precincts": [{"id": "101", "latitude": 39.7, "longitude": -104.9, "voterCount": 1200}],
///   "locations": [{"id": "Lowry", "latitude": 39.70, "longitude": -104.88, "protected": false}],
///   "config": {"targetTolerance": 0.2}
/// }
/// ```
async fn rebalance(
    state: web::Data<AppState>,
    req: web::Json<RebalanceRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for rebalance request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let request = req.into_inner();
    let config = match &request.config {
        Some(overrides) => overrides.apply(state.config),
        None => state.config,
    };
    let run_id = Uuid::new_v4();

    tracing::info!(
        "Run {}: rebalancing {} precincts across {} locations",
        run_id,
        request.precincts.len(),
        request.locations.len()
    );

    // The round loop is CPU-bound; keep it off the async workers
    let result = web::block(move || {
        Rebalancer::from_records(request.precincts, request.locations, config).map(Rebalancer::run)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => {
            tracing::info!(
                "Run {}: {:?} after {} rounds with {} moves",
                run_id,
                outcome.status,
                outcome.rounds,
                outcome.moves.len()
            );
            HttpResponse::Ok().json(RebalanceResponse::from_outcome(run_id, outcome))
        }
        Ok(Err(e)) => {
            tracing::info!("Run {}: rejected: {}", run_id, e);
            let error = match &e {
                RebalanceError::InvalidInput(_) => "Invalid input",
                RebalanceError::ConfigurationInconsistency(_) => "Invalid configuration",
            };
            HttpResponse::BadRequest().json(ErrorResponse {
                error: error.to_string(),
                message: e.to_string(),
                status_code: 400,
            })
        }
        Err(e) => {
            tracing::error!("Run {}: rebalancing task failed: {}", run_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Rebalancing failed".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn app_state() -> AppState {
        AppState {
            config: RebalanceConfig {
                rural_precinct_threshold: None,
                ..Default::default()
            },
        }
    }

    macro_rules! service {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(app_state()))
                    .configure(crate::routes::configure_routes),
            )
            .await
        };
    }

    fn crowded_body() -> Value {
        let mut precincts: Vec<Value> = (0..6)
            .map(|i| {
                json!({
                    "id": format!("C{}", i),
                    "latitude": 39.70 + (i as f64) * 0.001,
                    "longitude": -104.90,
                    "voterCount": 400
                })
            })
            .collect();
        precincts.push(json!({"id": "E0", "latitude": 39.70, "longitude": -104.84, "voterCount": 200}));

        json!({
            "precincts": precincts,
            "locations": [
                {"id": "Central", "latitude": 39.70, "longitude": -104.90, "address": "1 Main St"},
                {"id": "East", "latitude": 39.70, "longitude": -104.85}
            ]
        })
    }

    #[actix_web::test]
    async fn test_health() {
        let app = service!();
        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn test_rebalance_converges() {
        let app = service!();
        let req = test::TestRequest::post()
            .uri("/api/v1/rebalance")
            .set_json(crowded_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "converged");
        assert_eq!(body["targetVoters"], 1300.0);
        assert_eq!(body["moves"], 2);
        assert_eq!(body["moveLog"][0]["fromLocation"], "Central");
        assert_eq!(body["moveLog"][0]["toLocation"], "East");
        assert_eq!(body["locations"][0]["address"], "1 Main St");
        assert_eq!(body["precincts"].as_array().map(Vec::len), Some(7));
        assert!(body["runId"].is_string());
    }

    #[actix_web::test]
    async fn test_rebalance_rejects_empty_tables() {
        let app = service!();
        let req = test::TestRequest::post()
            .uri("/api/v1/rebalance")
            .set_json(json!({"precincts": [], "locations": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Validation failed");
    }

    #[actix_web::test]
    async fn test_rebalance_rejects_bad_coordinates() {
        let app = service!();
        let mut body = crowded_body();
        body["locations"][1]["latitude"] = json!(123.0);

        let req = test::TestRequest::post()
            .uri("/api/v1/rebalance")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid input");
    }

    #[actix_web::test]
    async fn test_rebalance_rejects_inconsistent_overrides() {
        let app = service!();
        let mut body = crowded_body();
        body["config"] = json!({"relaxedCeilingMultiplier": 0.5});

        let req = test::TestRequest::post()
            .uri("/api/v1/rebalance")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid configuration");
    }
}
