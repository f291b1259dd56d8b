use std::net::SocketAddr;

use axum::{http::HeaderValue, routing::get, Json, Router};
use serde::Serialize;
use time::OffsetDateTime;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{attendance, auth, equipment, members, memberships, payments, plans, state::AppState, trainers};

#[derive(Serialize)]
struct Health {
    status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct Banner {
    service: &'static str,
    version: &'static str,
    endpoints: [&'static str; 10],
}

async fn banner() -> Json<Banner> {
    Json(Banner {
        service: "gymdesk",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: [
            "/auth",
            "/api/members",
            "/api/trainers",
            "/api/memberships",
            "/api/payments",
            "/api/attendance",
            "/api/equipment",
            "/api/workout-plans",
            "/api/diet-plans",
            "/health",
        ],
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if allowed.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .merge(auth::router())
        .merge(members::router())
        .merge(trainers::router())
        .merge(memberships::router())
        .merge(payments::router())
        .merge(attendance::router())
        .merge(equipment::router())
        .merge(plans::router())
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn send(req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        for uri in [
            "/api/members",
            "/api/trainers",
            "/api/attendance/current",
            "/api/equipment",
            "/api/payments",
            "/api/workout-plans",
            "/auth/me",
        ] {
            let (status, body) = send(Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Missing Authorization header", "{uri}");
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let req = Request::post("/api/attendance/check-in")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn refresh_token_cannot_call_api() {
        let state = AppState::fake();
        let keys = crate::auth::jwt::JwtKeys::from_config(&state.config.jwt);
        let token = keys
            .sign_refresh(uuid::Uuid::new_v4(), crate::auth::Role::Admin, "a@gym.test")
            .unwrap();
        let req = Request::get("/api/equipment")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn cors_accepts_origin_list() {
        let _ = cors_layer(&["http://localhost:3000".into()]);
        let _ = cors_layer(&[]);
    }
}
