use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_api_shared::{AuthError, MessageRes};
use clinic_core::ClinicError;
use clinic_files::FilesError;

/// An HTTP error with a JSON `{ "message": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Logs the cause and hides it from the client.
    fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("request failed: {}", cause);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MessageRes::new(self.message))).into_response()
    }
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        let status = match &err {
            ClinicError::NotFound { .. } => StatusCode::NOT_FOUND,
            ClinicError::Conflict(_) => StatusCode::CONFLICT,
            ClinicError::InvalidInput(_)
            | ClinicError::Uuid(_)
            | ClinicError::Text(_)
            | ClinicError::Money(_) => StatusCode::BAD_REQUEST,
            ClinicError::Files(files) => return ApiError::from_files_ref(files, &err),
            _ => return ApiError::internal(&err),
        };
        tracing::warn!("rejected request: {}", err);
        ApiError::new(status, err.to_string())
    }
}

impl ApiError {
    fn from_files_ref(files: &FilesError, err: &ClinicError) -> Self {
        match files {
            FilesError::EmptyUpload => ApiError::bad_request(files.to_string()),
            _ => ApiError::internal(err),
        }
    }
}

impl From<FilesError> for ApiError {
    fn from(err: FilesError) -> Self {
        ApiError::from(ClinicError::from(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::bad_request(format!("invalid upload: {}", err.body_text()))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(ClinicError::NotFound {
            label: "Patient",
            id: "abc".into(),
        });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict = ApiError::from(ClinicError::Conflict("bed B-1 is Occupied".into()));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.message(), "bed B-1 is Occupied");

        let empty = ApiError::from(FilesError::EmptyUpload);
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let unauthorized = ApiError::from(AuthError::Invalid);
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_server_errors_are_opaque() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/clinic_data");
        let err = ApiError::from(ClinicError::FileWrite(io));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal server error");
    }
}
