use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// JSON body that may be left out entirely.
///
/// An empty (or all-whitespace) body yields `None`. A body that is present but
/// does not deserialize is rejected with a 400 instead of falling back to defaults.
pub struct OptionalJson<T>(pub Option<T>);

impl<T: Default> OptionalJson<T> {
    pub fn or_default(self) -> T {
        self.0.unwrap_or_default()
    }
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }
        serde_json::from_slice(&bytes)
            .map(|value| OptionalJson(Some(value)))
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Deserialize, Default, Debug, PartialEq)]
    struct DryRunBody {
        #[serde(default)]
        dry_run: bool,
    }

    async fn extract(body: &'static str) -> Result<OptionalJson<DryRunBody>, AppError> {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        OptionalJson::<DryRunBody>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_empty_body_is_none() {
        assert!(extract("").await.unwrap().0.is_none());
        assert!(extract("  \n").await.unwrap().0.is_none());
    }

    #[tokio::test]
    async fn test_present_body_is_parsed() {
        let parsed = extract(r#"{"dry_run": true}"#).await.unwrap().or_default();
        assert!(parsed.dry_run);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let err = extract(r#"{"dry_run": tru"#).await.err().unwrap();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("Invalid JSON body")));

        let err = extract(r#"{"dry_run": "yes"}"#).await.err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
