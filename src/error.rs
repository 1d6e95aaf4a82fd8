use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::Debug;

#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        push_channel_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            102 => (StatusCode::NOT_FOUND, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(_: T) -> Error {
    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn push_channel_error<T: Debug>(_: T) -> Error {
    Error {
        code: 3,
        message: "push channel error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

pub fn query_failure_error<T: Debug>(_: T) -> Error {
    Error {
        code: 6,
        message: "spatial query failure".into(),
    }
}

pub fn invalid_transition_error() -> Error {
    Error {
        code: 100,
        message: "invalid transition".into(),
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

pub fn ride_not_found_error() -> Error {
    Error {
        code: 102,
        message: "ride not found".into(),
    }
}

pub fn ride_not_available_error() -> Error {
    Error {
        code: 103,
        message: "ride is no longer available".into(),
    }
}

pub fn ride_already_completed_error() -> Error {
    Error {
        code: 104,
        message: "ride is already completed".into(),
    }
}

pub fn ride_already_cancelled_error() -> Error {
    Error {
        code: 105,
        message: "ride is already cancelled".into(),
    }
}

pub fn driver_offline_error() -> Error {
    Error {
        code: 106,
        message: "driver is not online".into(),
    }
}

pub fn driver_too_far_error(distance_meters: f64, max_distance_meters: f64) -> Error {
    Error {
        code: 107,
        message: format!(
            "driver is too far from pickup ({:.0}m > {:.0}m)",
            distance_meters, max_distance_meters
        ),
    }
}
