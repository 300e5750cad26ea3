use axum::{
    extract::Request,
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::Response,
};

/// Adds browser-page headers to every response of a non-`POST` request.
///
/// - Referrer-Policy: strict-origin-when-cross-origin
/// - Content-Language: en
///
/// Webhook (`POST`) responses are machine-read and left untouched.
pub async fn page_headers(request: Request, next: Next) -> Response {
    let is_page = request.method() != Method::POST;
    let mut response = next.run(request).await;

    if is_page {
        let headers = response.headers_mut();
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(header::CONTENT_LANGUAGE, HeaderValue::from_static("en"));
    }

    response
}
