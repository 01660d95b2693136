//! HTTP surface: routes inbound requests to the SDS rewriter, the
//! MIME/XOP rewriter, the health/check probes, or transparent
//! passthrough.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::requester::warn_if_base_url_leaked;
use crate::router::{self, REAL_IP_HEADER};
use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(3);

const HOP_BY_HOP: &[&str] = &["connection", "content-length", "transfer-encoding", "date", "mimetype"];

/// Build the full `axum::Router` for the proxy.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/connector.sds", get(sds_handler))
        .route("/favicon.ico", get(favicon_handler))
        .route("/health", get(health_handler))
        .route("/check", get(check_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

fn real_ip(headers: &HeaderMap) -> Option<&str> {
    headers.get(REAL_IP_HEADER)?.to_str().ok()
}

fn host(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn error_response(err: &docscan_common::ProxyError) -> Response {
    let status = match err {
        docscan_common::ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        docscan_common::ProxyError::Routing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        docscan_common::ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        docscan_common::ProxyError::Scan(_) => StatusCode::BAD_GATEWAY,
        docscan_common::ProxyError::Parse(_) => StatusCode::BAD_GATEWAY,
        docscan_common::ProxyError::PolicyViolation => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(error = %err, "request failed");
    (status, err.to_string()).into_response()
}

fn forward_headers(headers: &HeaderMap) -> reqwest::header::HeaderMap {
    let mut out = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        if let Ok(name) = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()) {
            if let Ok(value) = reqwest::header::HeaderValue::from_bytes(value.as_bytes()) {
                out.append(name, value);
            }
        }
    }
    out
}

/// Copy upstream response headers into an axum response, dropping
/// headers whose value must be rebuilt to match a (possibly rewritten)
/// body.
fn upstream_headers_to_axum(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
            out.append(
                axum::http::HeaderName::from_bytes(name.as_str().as_bytes()).expect("valid header name"),
                value,
            );
        }
    }
    out
}

async fn sds_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match sds_inner(&state, &headers).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

async fn sds_inner(state: &AppState, headers: &HeaderMap) -> Result<Response, docscan_common::ProxyError> {
    let real_ip = real_ip(headers).unwrap_or("");
    let inbound_host = host(headers);
    let profile = router::resolve(&state.profiles, real_ip, inbound_host)?;

    let upstream = state
        .requester
        .forward(profile, reqwest::Method::GET, "/connector.sds", &forward_headers(headers), Bytes::new())
        .await?;

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let body = upstream
        .bytes()
        .await
        .map_err(|e| docscan_common::ProxyError::Upstream(e.to_string()))?;

    warn_if_base_url_leaked(profile, &body);

    let rewritten = docscan_rewriter::rewrite_endpoints(&body, inbound_host, profile.proxy_all_services);

    let response = (
        StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        upstream_headers_to_axum(&upstream_headers),
        rewritten,
    )
        .into_response();
    Ok(response)
}

async fn favicon_handler() -> Response {
    (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "image/x-icon")], Vec::<u8>::new()).into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.scanner.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "scanner health probe failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn check_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut all_ok = true;
    for (name, profile) in &state.profiles {
        let headers = reqwest::header::HeaderMap::new();
        let outcome = tokio::time::timeout(
            CHECK_TIMEOUT,
            state
                .requester
                .forward(profile, reqwest::Method::GET, "/connector.sds", &headers, Bytes::new()),
        )
        .await;

        let ok = matches!(outcome, Ok(Ok(response)) if response.status().is_success());
        if !ok {
            tracing::warn!(profile = %name, "upstream check failed");
            all_ok = false;
        }
    }

    if all_ok {
        StatusCode::OK.into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn fallback_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match fallback_inner(&state, method, uri, headers, body).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

async fn fallback_inner(
    state: &AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, docscan_common::ProxyError> {
    let real_ip = real_ip(&headers).unwrap_or("").to_string();
    let inbound_host = host(&headers).to_string();
    let profile = router::resolve(&state.profiles, &real_ip, &inbound_host)?.clone();

    let path_and_query = uri.path_and_query().map_or(uri.path(), |p| p.as_str());
    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|e| docscan_common::ProxyError::Upstream(e.to_string()))?;

    if path_and_query.contains("PHRService") {
        return phr_service(state, &profile, reqwest_method, path_and_query, &headers, body).await;
    }

    passthrough(state, &profile, reqwest_method, path_and_query, &headers, body).await
}

async fn phr_service(
    state: &AppState,
    profile: &docscan_common::UpstreamProfile,
    method: reqwest::Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, docscan_common::ProxyError> {
    let upstream = state
        .requester
        .forward(profile, method, path_and_query, &forward_headers(headers), body)
        .await?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let upstream_headers = upstream.headers().clone();
    let upstream_body = upstream
        .bytes()
        .await
        .map_err(|e| docscan_common::ProxyError::Upstream(e.to_string()))?;

    warn_if_base_url_leaked(profile, &upstream_body);

    let policy = if state.policy.remove_malicious {
        docscan_rewriter::MutationPolicy::Remove
    } else {
        docscan_rewriter::MutationPolicy::Replace
    };

    let rewritten = docscan_rewriter::rewrite_response(
        &content_type,
        &upstream_body,
        state.scanner.as_ref(),
        &state.replacements,
        policy,
        state.policy.all_png_malicious,
        state.policy.all_pdf_malicious,
    )
    .await?;

    let final_body = rewritten.unwrap_or_else(|| upstream_body.to_vec());
    let mut response_headers = upstream_headers_to_axum(&upstream_headers);
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response_headers.insert(axum::http::header::CONTENT_TYPE, value);
    }

    let response = (
        StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        response_headers,
        final_body,
    )
        .into_response();
    Ok(response)
}

async fn passthrough(
    state: &AppState,
    profile: &docscan_common::UpstreamProfile,
    method: reqwest::Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, docscan_common::ProxyError> {
    let upstream = state
        .requester
        .forward(profile, method, path_and_query, &forward_headers(headers), body)
        .await?;

    let status = upstream.status();
    let response_headers = upstream_headers_to_axum(upstream.headers());
    let stream = upstream.bytes_stream();

    let mut response = Response::new(Body::wrap_stream(stream));
    *response.status_mut() = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    *response.headers_mut() = response_headers;
    Ok(response)
}
