//! Request extractors that reject with [`ApiError`] bodies.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};

use crate::error::ApiError;

/// `Json<T>` whose rejection is an `INVALID_FIELD_VALUE` [`ApiError`].
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::NewProject;
    use axum::body::Body;
    use axum::http::{StatusCode, header};

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/projects")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_well_formed_body() {
        let req = json_request(r#"{"name":"Alpha"}"#);
        let ApiJson(input) = ApiJson::<NewProject>::from_request(req, &()).await.unwrap();
        assert_eq!(input.name, "Alpha");
        assert!(input.description.is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_field_value() {
        let req = json_request(r#"{"name":"#);
        let err = ApiJson::<NewProject>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.field.as_deref(), Some("body"));
        assert!(err.details.is_some());
    }

    #[tokio::test]
    async fn missing_field_is_invalid_field_value() {
        let req = json_request(r#"{"description":"x"}"#);
        let err = ApiJson::<NewProject>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
        assert!(err.details.unwrap().contains("name"));
    }

    #[tokio::test]
    async fn missing_content_type_is_invalid_field_value() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/projects")
            .body(Body::from(r#"{"name":"Alpha"}"#))
            .unwrap();
        let err = ApiJson::<NewProject>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
    }
}
