//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs, helpers to extract and
//! validate JSON bodies in handlers, and shared pagination parameters.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// Unknown enum values fail here, before anything reaches a state machine.
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Query parameters for paginated list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// Maximum number of items to return (default: 100, max: 1000).
    pub limit: Option<usize>,
    /// Number of items to skip (default: 0).
    pub offset: Option<usize>,
}

impl PaginationParams {
    const DEFAULT_LIMIT: usize = 100;
    const MAX_LIMIT: usize = 1000;

    fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }

    fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Apply the window to an already ordered list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.effective_offset())
            .take(self.effective_limit())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    impl Validate for Named {
        fn validate(&self) -> Result<(), String> {
            if self.name.trim().is_empty() {
                return Err("name must not be empty".to_string());
            }
            Ok(())
        }
    }

    async fn parse(body: &'static str) -> Result<Json<Named>, JsonRejection> {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        Json::<Named>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let err = extract_json(parse("{not json").await).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn failed_business_rule_is_validation_error() {
        let err = extract_validated_json(parse(r#"{"name": "  "}"#).await).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("name")));
    }

    #[tokio::test]
    async fn valid_body_passes() {
        let named = extract_validated_json(parse(r#"{"name": "credit-scoring"}"#).await).unwrap();
        assert_eq!(named.name, "credit-scoring");
    }

    #[test]
    fn pagination_defaults_and_caps() {
        let items: Vec<u32> = (0..2000).collect();
        assert_eq!(PaginationParams::default().apply(items.clone()).len(), 100);
        let wide = PaginationParams {
            limit: Some(5000),
            offset: None,
        };
        assert_eq!(wide.apply(items.clone()).len(), 1000);
        let tail = PaginationParams {
            limit: Some(10),
            offset: Some(1995),
        };
        assert_eq!(tail.apply(items), vec![1995, 1996, 1997, 1998, 1999]);
    }
}
