//! Redirect endpoint: the hot path.
//!
//! Builds a `RequestContext` from the inbound request, asks the resolver
//! for an outcome, maps it to a status code, and hands the click to the
//! recorder without waiting on it.

use std::borrow::Cow;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::Utc;
use tracing::trace;

use crate::analytics::ClickRecorder;
use crate::routing::{Outcome, RequestContext, Resolver};
use crate::services::geoip::GeoIpProvider;
use crate::utils::ip::{extract_client_ip, is_private_or_local};
use crate::utils::{is_valid_short_code, normalize_hostname};

pub struct RedirectService {}

impl RedirectService {
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        resolver: web::Data<Arc<Resolver>>,
        recorder: web::Data<Arc<ClickRecorder>>,
        geoip: web::Data<GeoIpProvider>,
    ) -> impl Responder {
        let code = path.into_inner();

        if !is_valid_short_code(&code) {
            trace!("Invalid short code rejected: {}", &code);
            return Self::not_found_response();
        }

        let hostname = normalize_hostname(req.connection_info().host());
        let ip = extract_client_ip(&req);

        let mut ctx = RequestContext::new(Utc::now()).with_user_agent(
            req.headers()
                .get("user-agent")
                .and_then(|h| h.to_str().ok())
                .map(String::from),
        );
        ctx.ip = ip;
        ctx.referer = req
            .headers()
            .get("referer")
            .and_then(|h| h.to_str().ok())
            .map(String::from);
        ctx.password_attempt = req
            .uri()
            .query()
            .and_then(|q| extract_query_param(q, "password"))
            .map(Cow::into_owned);

        // Country feeds rule matching, so it is resolved inline; the
        // MaxMind reader is an in-memory lookup and private IPs are
        // skipped outright
        if let Some(ip) = ip {
            if !is_private_or_local(&ip) {
                ctx.country = geoip.lookup(ip).await.and_then(|g| g.country);
            }
        }

        match resolver.resolve(&hostname, &code, &ctx).await {
            Outcome::Redirect {
                destination,
                link_id,
            } => {
                recorder.record(link_id, &ctx, &destination);
                HttpResponse::build(StatusCode::TEMPORARY_REDIRECT)
                    .insert_header(("Location", destination))
                    .finish()
            }
            Outcome::DomainRejected => Self::plain_response(StatusCode::FORBIDDEN, "Forbidden"),
            Outcome::NotFound => Self::not_found_response(),
            Outcome::Inactive | Outcome::Expired => {
                Self::plain_response(StatusCode::GONE, "Gone")
            }
            Outcome::PasswordRequired => {
                Self::plain_response(StatusCode::UNAUTHORIZED, "Password Required")
            }
            Outcome::TemporaryError => Self::plain_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Temporarily Unavailable",
            ),
        }
    }

    #[inline]
    fn not_found_response() -> HttpResponse {
        HttpResponse::build(StatusCode::NOT_FOUND)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .insert_header(("Cache-Control", "public, max-age=60"))
            .body("Not Found")
    }

    #[inline]
    fn plain_response(status: StatusCode, body: &'static str) -> HttpResponse {
        HttpResponse::build(status)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .body(body)
    }
}

/// Extract one query parameter value; zero-allocation when unencoded.
fn extract_query_param<'a>(query: &'a str, key: &str) -> Option<Cow<'a, str>> {
    for part in query.split('&') {
        if let Some(value) = part.strip_prefix(key).and_then(|s| s.strip_prefix('=')) {
            return Some(Cow::Borrowed(value));
        }
    }
    None
}

pub fn redirect_routes() -> actix_web::Scope {
    web::scope("")
        .route("/{code}", web::get().to(RedirectService::handle_redirect))
        .route("/{code}", web::head().to(RedirectService::handle_redirect))
}
