//! HTTP exposition and process plumbing for the `sim-exporter` binary.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use sim_exporter_core::{LoadError, PrometheusRegistry, SimError};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Exit status of the process, by failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    Invalid = 2,
    Undecodable = 3,
    Internal = 4,
}

impl ExitStatus {
    /// Classify an error that reached `main`.
    pub fn of(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(load) = cause.downcast_ref::<LoadError>() {
                return match load {
                    LoadError::Validation(_) => Self::Invalid,
                    LoadError::Decode { .. } => Self::Undecodable,
                    LoadError::Io { .. } => Self::Failure,
                };
            }
            if let Some(SimError::Internal { .. }) = cause.downcast_ref::<SimError>() {
                return Self::Internal;
            }
        }
        Self::Failure
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Clone)]
struct AppState {
    registry: Arc<PrometheusRegistry>,
    path: Arc<str>,
}

/// Routes: `/` landing page, `path` text exposition, `/health`.
pub fn router(registry: Arc<PrometheusRegistry>, path: &str) -> Router {
    let state = AppState {
        registry,
        path: Arc::from(path),
    };
    Router::new()
        .route("/", get(index_handler))
        .route(path, get(metrics_handler))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Simulated Exporter</title></head>\n<body>\n<h1>Simulated Exporter</h1>\n<p><a href=\"{0}\">{0}</a></p>\n</body>\n</html>\n",
        state.path
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.registry.gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Cannot encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Serve `app` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Exporter listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(err) => {
            error!(error = %err, "Cannot install Ctrl-C handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_exporter_core::error::{Finding, FindingKind, GenerateError, ValidationError};

    #[test]
    fn test_exit_status_classification() {
        let invalid = anyhow::Error::new(LoadError::Validation(ValidationError {
            findings: vec![Finding::new(FindingKind::MissingVersion, "missing version")],
        }));
        assert_eq!(ExitStatus::of(&invalid), ExitStatus::Invalid);

        let undecodable = anyhow::Error::new(LoadError::Decode {
            origin: "x.yaml".into(),
            message: "bad".into(),
        })
        .context("check x.yaml");
        assert_eq!(ExitStatus::of(&undecodable).code(), 3);

        let internal = anyhow::Error::new(SimError::Internal {
            metric: "temp".into(),
            source: GenerateError::UnknownFunction("cos".into()).into(),
        });
        assert_eq!(ExitStatus::of(&internal), ExitStatus::Internal);

        assert_eq!(ExitStatus::of(&anyhow::anyhow!("boom")), ExitStatus::Failure);
    }
}
