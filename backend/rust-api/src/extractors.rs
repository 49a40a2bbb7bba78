use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

/// JSON extractor that never rejects.
///
/// A missing, malformed or mistyped body yields `T::default()`, so callers
/// that send garbage get an empty result instead of a 4xx.
pub struct LenientJson<T>(pub T);

impl<T, S> FromRequest<S> for LenientJson<T>
where
    T: DeserializeOwned + Default + 'static,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(LenientJson(value)),
            Err(rejection) => {
                tracing::warn!("Ignoring unreadable JSON request body: {}", rejection);
                Ok(LenientJson(T::default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Payload {
        #[serde(default)]
        ids: Vec<String>,
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_body_is_decoded() {
        let LenientJson(payload) =
            LenientJson::<Payload>::from_request(request(r#"{"ids":["a"]}"#), &())
                .await
                .unwrap();
        assert_eq!(payload.ids, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn malformed_body_falls_back_to_default() {
        let LenientJson(payload) = LenientJson::<Payload>::from_request(request("{not json"), &())
            .await
            .unwrap();
        assert_eq!(payload, Payload::default());
    }
}
