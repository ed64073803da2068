use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors returned by the HTTP side of the broker.
#[derive(Debug)]
pub enum ApiError {
    /// 503 - The socket limit is reached.
    TooManyConnections,
    /// 503 - The server is shutting down and accepts no new sockets.
    ShuttingDown,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::TooManyConnections => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::TooManyConnections => "too_many_connections",
            ApiError::ShuttingDown => "shutting_down",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::TooManyConnections => {
                "Maximum number of connections reached. Try again shortly.".to_string()
            }
            ApiError::ShuttingDown => "Server is shutting down.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}
