//! Request/response bodies for the student auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub student_public_id: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    pub student_public_id: Option<String>,
    pub pin: Option<String>,
}

impl fmt::Debug for PinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinRequest")
            .field("student_public_id", &self.student_public_id)
            .field("pin", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for SessionTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenResponse")
            .field("session_token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPinRequest {
    pub student_id: Option<String>,
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct ResetPinQuery {
    /// Identity provider user id of the teacher or admin making the request.
    pub auth0_user_id: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn pin_request_debug_redacts_pin() {
        let request = PinRequest {
            student_public_id: Some("ABC123".to_string()),
            pin: Some("314159".to_string()),
        };
        let rendered = format!("{request:?}");
        assert!(rendered.contains("ABC123"));
        assert!(!rendered.contains("314159"));
    }

    #[test]
    fn pin_request_reads_camel_case() -> Result<()> {
        let request: PinRequest =
            serde_json::from_str(r#"{"studentPublicId":"abc123","pin":"000000"}"#)?;
        assert_eq!(request.student_public_id.as_deref(), Some("abc123"));
        assert_eq!(request.pin.as_deref(), Some("000000"));
        Ok(())
    }

    #[test]
    fn session_token_response_writes_camel_case() -> Result<()> {
        let response = SessionTokenResponse {
            session_token: "abc".to_string(),
            expires_at: Utc::now(),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("sessionToken").is_some());
        assert!(value.get("expiresAt").is_some());
        assert!(!format!("{response:?}").contains("abc"));
        Ok(())
    }
}
