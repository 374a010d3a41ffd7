//! Maps raw resource API responses onto [`ApiError`].

use super::error::{ApiError, ProviderErrorDetail};
use crate::oauth::ProviderResponse;
use serde::Deserialize;
use serde_json::Value;

const INSUFFICIENT_SCOPE: &str = "insufficient_scope";

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ProviderErrorDetail>,
}

/// Parses the `errors` array of a Fitbit error body. Anything that does not
/// match the structured shape yields an empty list.
pub(crate) fn parse_error_details(body: &str) -> Vec<ProviderErrorDetail> {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.errors)
        .unwrap_or_default()
}

/// 2xx bodies must be JSON. A 4xx whose error types are all
/// `insufficient_scope` is a scope failure; every other non-2xx is a
/// provider failure.
pub(crate) fn classify(path: &str, response: ProviderResponse) -> Result<Value, ApiError> {
    let status = response.status;

    if (200..300).contains(&status) {
        return serde_json::from_str(&response.body).map_err(|e| ApiError::Transport {
            path: path.to_string(),
            reason: format!("unparseable response body: {e}"),
        });
    }

    let errors = parse_error_details(&response.body);
    let scope_only = (400..500).contains(&status)
        && !errors.is_empty()
        && errors.iter().all(|e| e.error_type == INSUFFICIENT_SCOPE);

    if scope_only {
        Err(ApiError::Scope {
            path: path.to_string(),
            status,
            errors,
        })
    } else {
        Err(ApiError::Provider {
            path: path.to_string(),
            status,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ProviderResponse {
        ProviderResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_success_returns_json() {
        let value = classify("/p", response(200, r#"{"summary":{"steps":9000}}"#)).unwrap();
        assert_eq!(value["summary"]["steps"], 9000);
    }

    #[test]
    fn test_success_with_garbage_body_is_transport() {
        let err = classify("/p", response(200, "<html>oops</html>")).unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn test_single_insufficient_scope_is_scope() {
        let err = classify(
            "/user/-/badges.json",
            response(403, r#"{"errors":[{"errorType":"insufficient_scope"}]}"#),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Scope { status: 403, .. }));
    }

    #[test]
    fn test_repeated_insufficient_scope_is_scope() {
        let body = r#"{"errors":[
            {"errorType":"insufficient_scope","message":"activity"},
            {"errorType":"insufficient_scope","message":"social"}
        ]}"#;
        let err = classify("/p", response(403, body)).unwrap_err();
        assert_eq!(err.kind(), "scope");
    }

    #[test]
    fn test_mixed_error_types_is_provider() {
        let body = r#"{"errors":[
            {"errorType":"insufficient_scope"},
            {"errorType":"insufficient_permissions"}
        ]}"#;
        let err = classify("/p", response(403, body)).unwrap_err();
        match err {
            ApiError::Provider { status, errors, .. } => {
                assert_eq!(status, 403);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unstructured_4xx_is_provider() {
        let err = classify("/p", response(429, "Too Many Requests")).unwrap_err();
        assert!(matches!(err, ApiError::Provider { status: 429, ref errors, .. } if errors.is_empty()));
    }

    #[test]
    fn test_server_error_is_provider() {
        let err = classify(
            "/p",
            response(500, r#"{"errors":[{"errorType":"insufficient_scope"}]}"#),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "provider");
    }

    #[test]
    fn test_parse_error_details_ignores_other_shapes() {
        assert!(parse_error_details(r#"{"success":false}"#).is_empty());
        assert!(parse_error_details("not json").is_empty());
        assert_eq!(
            parse_error_details(r#"{"errors":[{"errorType":"validation"}]}"#).len(),
            1
        );
    }
}
