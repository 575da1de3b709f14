pub mod download;
pub mod health;
pub mod items;

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use copypasta_types::{ApiResponse, BulkOutcome};
use serde::Serialize;

use crate::error::ServiceError;

/// Map a service error onto its HTTP status and JSON envelope
pub fn error_response(err: &ServiceError) -> HttpResponse {
    let body: ApiResponse<()> = err.to_response();
    match err {
        ServiceError::Validation(_) => HttpResponse::BadRequest().json(body),
        ServiceError::TooLarge(_) => HttpResponse::PayloadTooLarge().json(body),
        ServiceError::NotFound(_) => HttpResponse::NotFound().json(body),
        ServiceError::Storage(_) => HttpResponse::InternalServerError().json(body),
        ServiceError::PartialFailure { .. } => HttpResponse::Ok().json(body),
    }
}

/// `200` with `{ success: true, data }`, or the mapped error
pub fn respond<T: Serialize>(result: Result<T, ServiceError>) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(ApiResponse::ok(data)),
        Err(e) => error_response(&e),
    }
}

/// Bulk removals always answer 200; a partial failure carries the counts
/// alongside `success: false`.
pub fn bulk_response(result: Result<BulkOutcome, ServiceError>) -> HttpResponse {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => return error_response(&e),
    };

    if outcome.is_complete() {
        return HttpResponse::Ok().json(ApiResponse::ok(outcome));
    }

    let err = ServiceError::PartialFailure {
        attempted: outcome.removed + outcome.failed,
        failed: outcome.failed,
    };
    let mut body: ApiResponse<BulkOutcome> = err.to_response();
    body.data = Some(outcome);
    HttpResponse::Ok().json(body)
}

/// JSON extractor config: body limit sized for the largest accepted
/// content once encoded, and malformed bodies reported in the standard
/// envelope. Content-size limits are enforced after decoding.
pub fn json_config(max_upload_bytes: u64) -> web::JsonConfig {
    // Escaped text can double in size (`"` -> `\"`), base64 grows by 4/3;
    // leave headroom for the other fields
    let limit = max_upload_bytes.saturating_mul(2).saturating_add(64 * 1024) as usize;

    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            let service_err = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    ServiceError::TooLarge(err.to_string())
                }
                _ => ServiceError::validation(format!("Invalid request body: {}", err)),
            };
            let response = error_response(&service_err);
            actix_web::error::InternalError::from_response(err, response).into()
        })
}
