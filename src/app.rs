use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, shirts, users};

/// Version segments mounted under `/api/`. Both serve the same routes.
pub const API_VERSIONS: [&str; 2] = ["v1", "v2"];

fn versioned_api() -> Router<AppState> {
    Router::new().merge(users::router()).merge(shirts::router())
}

pub fn build_app(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.media.root);
    let media_url = state.config.media.url.trim_end_matches('/').to_string();

    let mut api = Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }));
    for version in API_VERSIONS {
        api = api.nest(&format!("/api/{}", version), versioned_api());
    }

    let app = api.with_state(state);
    let app = if media_url.is_empty() {
        app.fallback_service(media)
    } else {
        app.nest_service(&media_url, media)
    };

    app.layer(CorsLayer::permissive()).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!(
                    "http_request",
                    %method,
                    uri = %uri,
                    status = tracing::field::Empty
                )
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 _latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, "response");
                    } else {
                        tracing::info!(%status, "response");
                    }
                },
            ),
    )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
