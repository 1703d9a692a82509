//! Domain verification endpoints for the admin side.

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

use crate::domains::{DomainDirectory, DomainVerifier, VerificationPoller, VerifyOutcome};
use crate::errors::BrandlinkError;
use crate::storage::Storage;

/// `POST /domains/{id}/verify` - admin "validate now".
///
/// Runs a check immediately and pushes the next automatic poll out by a
/// full interval; an in-flight automatic check is left to finish.
async fn trigger_verify(
    path: web::Path<i64>,
    verifier: web::Data<Arc<DomainVerifier>>,
    poller: web::Data<Arc<VerificationPoller>>,
) -> impl Responder {
    let domain_id = path.into_inner();

    match verifier.check_now(domain_id).await {
        Ok(outcome) => {
            match outcome {
                VerifyOutcome::Verified | VerifyOutcome::AlreadyVerified => {
                    poller.untrack(domain_id)
                }
                _ => poller.reset_timer(domain_id),
            }
            HttpResponse::Ok().json(json!({
                "outcome": outcome.kind(),
                "reason": outcome.reason(),
            }))
        }
        Err(BrandlinkError::NotFound(msg)) => {
            HttpResponse::NotFound().json(json!({ "error": msg }))
        }
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": e.to_string() })),
    }
}

/// `GET /domains/{id}/status` - verification state, last check result,
/// and diagnostic DNS records.
async fn domain_status(
    path: web::Path<i64>,
    storage: web::Data<Arc<dyn Storage>>,
    directory: web::Data<Arc<DomainDirectory>>,
    verifier: web::Data<Arc<DomainVerifier>>,
    poller: web::Data<Arc<VerificationPoller>>,
) -> impl Responder {
    let domain_id = path.into_inner();

    let domain = match storage.get_domain(domain_id).await {
        Ok(Some(domain)) => domain,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({ "error": "domain not found" }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }));
        }
    };

    let last_check = verifier.last_status(domain_id).map(|s| {
        json!({
            "outcome": s.outcome,
            "reason": s.reason,
            "checked_at": s.checked_at.to_rfc3339(),
        })
    });

    HttpResponse::Ok().json(json!({
        "id": domain.id,
        "hostname": domain.hostname,
        "verified": domain.verified,
        "verified_at": domain.verified_at.map(|t| t.to_rfc3339()),
        "is_default": domain.is_default,
        "is_active": domain.is_active,
        "expected_txt": domain.expected_txt_value(),
        "polling": poller.is_tracked(domain_id),
        "last_check": last_check,
        "dns": directory.diagnostics(domain_id),
    }))
}

pub fn domain_routes() -> actix_web::Scope {
    web::scope("/domains")
        .route("/{id}/verify", web::post().to(trigger_verify))
        .route("/{id}/status", web::get().to(domain_status))
}
