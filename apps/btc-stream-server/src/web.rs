use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Info {
    pub status: String,
    pub version: String,
    pub hostname: String,
}

pub async fn liveness() -> Json<Info> {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();

    Json(Info {
        status: "OK".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        hostname,
    })
}

pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_reports_identity() {
        let Json(info) = liveness().await;
        assert_eq!(info.status, "OK");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.hostname.is_empty());
    }

    #[tokio::test]
    async fn readiness_is_ok() {
        assert_eq!(readiness().await, StatusCode::OK);
    }
}
