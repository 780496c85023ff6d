use axum::{Json, Router, routing::post};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::data::{Plan, SeatingInput};
use crate::solver;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(flatten)]
    input: SeatingInput,
    /// Date driving the weekly rotation; defaults to today.
    #[serde(default)]
    as_of: Option<NaiveDate>,
}

async fn generate_handler(
    Json(request): Json<GenerateRequest>,
) -> Result<Json<Plan>, (axum::http::StatusCode, String)> {
    let as_of = request.as_of.unwrap_or_else(|| Local::now().date_naive());
    match solver::generate(&request.input, as_of) {
        Ok(plan) => Ok(Json(plan)),
        Err(e) => Err((axum::http::StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub fn router() -> Router {
    Router::new().route("/v1/seating/generate", post(generate_handler))
}

pub async fn run_server() {
    let app = router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
