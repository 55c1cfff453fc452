use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::warn;
use ntex::http::StatusCode;
use ntex::{web, Middleware, Service, ServiceCtx};
use serde::Serialize;

use crate::registry::ClientRegistry;

/// Admission middleware: one token-bucket check per client before any
/// downstream work.
///
/// Construct it with the [`ClientRegistry`] it gates on and `wrap` it around
/// an app or scope. Requests whose client address cannot be derived are
/// refused outright; requests from clients with an empty bucket are answered
/// with `429`. The downstream service never sees a rejected request.
pub struct IpGate {
    registry: Arc<ClientRegistry>,
}

impl IpGate {
    /// Gate requests against `registry`.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Middleware<S> for IpGate {
    type Service = IpGateService<S>;

    fn create(&self, service: S) -> Self::Service {
        IpGateService {
            service,
            registry: Arc::clone(&self.registry),
        }
    }
}

pub struct IpGateService<S> {
    service: S,
    registry: Arc<ClientRegistry>,
}

impl<S, Err> Service<web::WebRequest<Err>> for IpGateService<S>
where
    S: Service<web::WebRequest<Err>, Response = web::WebResponse, Error = web::Error> + 'static,
    Err: web::ErrorRenderer,
{
    type Response = web::WebResponse;
    type Error = web::Error;

    async fn call(
        &self,
        req: web::WebRequest<Err>,
        ctx: ServiceCtx<'_, Self>,
    ) -> Result<Self::Response, Self::Error> {
        let addr = match client_ip(&req) {
            Some(addr) => addr,
            None => {
                warn!("refusing request for {}: no client address", req.path());
                return Ok(req.into_response(GateError::UnknownPeer.to_response()));
            }
        };

        let limiter = self.registry.get_or_create(addr);
        let allowed = limiter.lock().allow();
        if !allowed {
            warn!("rate limit exceeded for {} on {}", addr, req.path());
            return Ok(req.into_response(GateError::RateLimited.to_response()));
        }

        ctx.call(&self.service, req).await
    }
}

/// Why the gate refused to forward a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// No client address could be derived from the request.
    UnknownPeer,
    /// The client's bucket holds no whole token.
    RateLimited,
}

#[derive(Serialize)]
struct RejectionBody {
    code: u16,
    message: &'static str,
}

impl GateError {
    fn status(&self) -> StatusCode {
        match self {
            GateError::UnknownPeer => StatusCode::BAD_REQUEST,
            GateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            GateError::UnknownPeer => "client address unknown",
            GateError::RateLimited => "rate limit exceeded",
        }
    }

    fn to_response(self) -> web::HttpResponse {
        let status = self.status();
        let body = serde_json::to_string(&RejectionBody {
            code: status.as_u16(),
            message: self.message(),
        })
        .unwrap_or_else(|_| r#"{"code":500,"message":"unrenderable rejection"}"#.to_string());

        web::HttpResponse::build(status)
            .set_header("content-type", "application/json")
            .body(body)
    }
}

impl std::fmt::Display for GateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl web::error::WebResponseError for GateError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        self.to_response()
    }
}

/// Derive the client key for a request: proxy headers first, then the
/// transport peer address.
fn client_ip<Err>(req: &web::WebRequest<Err>) -> Option<IpAddr> {
    if let Some(ip) = forwarded_ip(req.headers()) {
        return Some(ip);
    }
    peer_ip(req.connection_info().remote())
}

/// First parseable address supplied by a fronting proxy, if any.
fn forwarded_ip(headers: &ntex::http::HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(list) = forwarded.to_str() {
            if let Some(first) = list.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    None
}

/// Host portion of a `host:port` peer address; anything else fails.
fn peer_ip(addr: Option<&str>) -> Option<IpAddr> {
    addr?.parse::<SocketAddr>().ok().map(|peer| peer.ip())
}
