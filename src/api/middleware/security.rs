use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn security_headers(req: Request, next: Next) -> Response {
    // Reject TRACE and TRACK methods (proxy disclosure)
    let method = req.method();
    if method == "TRACE" || method == "TRACK" {
        return (StatusCode::METHOD_NOT_ALLOWED, Body::empty()).into_response();
    }

    let is_docs = req.uri().path().starts_with("/swagger-ui");
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Pages carry inline styles and post only to this origin. Swagger UI
    // ships its own scripts and keeps its default policy.
    if !is_docs {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static(
                "default-src 'none'; style-src 'unsafe-inline'; form-action 'self'; frame-ancestors 'none'",
            ),
        );
    }

    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("no-referrer"),
    );

    // Prevent MIME sniffing
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );

    // Suppress fingerprinting
    headers.insert(
        header::SERVER,
        header::HeaderValue::from_static("rust-pdf-cleaner"),
    );

    // Cleaned documents must never be cached by intermediaries
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
    }

    if !headers.contains_key(header::PRAGMA) {
        headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
    }

    response
}
