use thiserror::Error;

/// Broad failure classes; the HTTP layer maps each one to a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    Authentication,
    Authorization,
    Internal,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} is malformed")]
    InvalidField(&'static str),
    #[error("pin must be exactly 6 digits")]
    InvalidFormat,
    #[error("student not found")]
    NotFound,
    #[error("PIN already set, use login instead")]
    AlreadySet,
    #[error("PIN not set, use set-pin first")]
    PinNotSet,
    #[error("PIN reset required, set a new PIN")]
    ResetRequired,
    #[error("incorrect PIN")]
    IncorrectPin,
    #[error("invalid session")]
    InvalidSession,
    #[error("session expired")]
    SessionExpired,
    #[error("authentication required")]
    Unauthenticated,
    #[error("not allowed to manage this student")]
    Forbidden,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl CredentialError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::InvalidField(_) | Self::InvalidFormat => {
                ErrorKind::Validation
            }
            Self::NotFound => ErrorKind::NotFound,
            Self::AlreadySet | Self::PinNotSet | Self::ResetRequired => ErrorKind::StateConflict,
            Self::IncorrectPin
            | Self::InvalidSession
            | Self::SessionExpired
            | Self::Unauthenticated => ErrorKind::Authentication,
            Self::Forbidden => ErrorKind::Authorization,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable identifier returned to clients next to the message.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidField(_) => "INVALID_FIELD",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadySet => "ALREADY_SET",
            Self::PinNotSet => "PIN_NOT_SET",
            Self::ResetRequired => "RESET_REQUIRED",
            Self::IncorrectPin => "INCORRECT_PIN",
            Self::InvalidSession => "INVALID_SESSION",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_conflicts_share_a_kind() {
        for err in [
            CredentialError::AlreadySet,
            CredentialError::PinNotSet,
            CredentialError::ResetRequired,
        ] {
            assert_eq!(err.kind(), ErrorKind::StateConflict);
        }
    }

    #[test]
    fn internal_message_hides_cause() {
        let err = CredentialError::from(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code(), "INTERNAL");
    }

    #[test]
    fn field_errors_name_the_field() {
        let err = CredentialError::MissingField("studentPublicId");
        assert_eq!(err.to_string(), "studentPublicId is required");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
