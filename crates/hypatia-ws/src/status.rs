//! HTTP status determination.

use crate::response::WsResponse;
use hypatia_core::ServiceErrorCategory;
use http::StatusCode;

/// Chooses the HTTP status for a response.
pub trait HttpStatusCodeDeterminer: Send + Sync {
    /// Returns the status for `response`. Must be a pure function of the
    /// response's status override and errors.
    fn determine_code(&self, response: &WsResponse) -> StatusCode;
}

/// The standard status rules.
///
/// The first matching rule wins:
///
/// 1. the status set on the response;
/// 2. the status set on the response's errors;
/// 3. by error category, in priority order:
///    `Unexpected` ⇒ 500, `Http` ⇒ that error's numeric code,
///    `Security` ⇒ 401, `Client` ⇒ 400, `Logic` ⇒ 409;
/// 4. 200.
///
/// Priority is independent of the order errors were recorded. An `Http`
/// error whose code is not a valid status yields 500.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStatusDeterminer;

impl HttpStatusCodeDeterminer for DefaultStatusDeterminer {
    fn determine_code(&self, response: &WsResponse) -> StatusCode {
        if let Some(status) = response.http_status() {
            return status;
        }

        let errors = response.errors();
        if let Some(status) = errors.http_status() {
            return status;
        }

        for category in ServiceErrorCategory::all() {
            let Some(error) = errors.first_of(*category) else {
                continue;
            };

            return match category {
                ServiceErrorCategory::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
                ServiceErrorCategory::Http => http_error_status(error.code()),
                ServiceErrorCategory::Security => StatusCode::UNAUTHORIZED,
                ServiceErrorCategory::Client => StatusCode::BAD_REQUEST,
                ServiceErrorCategory::Logic => StatusCode::CONFLICT,
            };
        }

        StatusCode::OK
    }
}

fn http_error_status(code: &str) -> StatusCode {
    code.trim()
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or_else(|| {
            tracing::warn!(
                target: "hypatia::ws::status",
                code,
                "HTTP error code is not a valid status, using 500"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
