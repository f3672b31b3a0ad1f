use axum::{
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Screens incoming requests before routing.
///
/// Rejects path traversal in the URI (400) and POST/PUT bodies whose declared
/// length exceeds `max_body` (413); logs suspicious user agents.
pub async fn screen_request_middleware(State(max_body): State<usize>, req: Request, next: Next) -> Response {
    if contains_path_traversal(req.uri().path()) {
        return AppError::BadRequest("Path traversal detected in request".into()).into_response();
    }

    if let Some(ua) = req.headers().get("user-agent").and_then(|v| v.to_str().ok()) {
        if is_suspicious_user_agent(ua) {
            tracing::warn!("Suspicious user agent detected: {}", sanitize_for_logging(ua));
        }
    }

    if matches!(req.method(), &Method::POST | &Method::PUT) {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok());
        if let Some(length) = declared {
            if length > max_body {
                return AppError::PayloadTooLarge(format!(
                    "Request body exceeds maximum size of {} bytes",
                    max_body
                ))
                .into_response();
            }
        }
    }

    next.run(req).await
}

fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("\\.\\") || path.contains("....") {
        return true;
    }

    // Single and double URL-encoded dot/slash sequences, plus encoded NUL.
    const ENCODED: &[&str] = &[
        "%2e%2e", "%252e%252e", "%2e/", "%252e%2f", "/%2e", "%2f%2e", "%2e\\", "%2e%5c", "%5c%2e", "%5c%5c", "%00",
    ];
    if ENCODED.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ua_lower.contains("scanner")
        || (ua_lower.contains("crawler") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot"))
        || ["nikto", "sqlmap", "havij", "acunetix"].iter().any(|t| ua_lower.contains(t))
}

/// Lower-cased extension of `file_name` (with the leading dot) if it is in `allowed`.
///
/// Names carrying path separators or NUL are refused outright.
pub fn allowed_extension(file_name: &str, allowed: &[String]) -> Option<String> {
    if file_name.contains(['/', '\\', '\0']) || contains_path_traversal(file_name) {
        return None;
    }
    let dot = file_name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    let ext = file_name[dot..].to_lowercase();
    allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)).then_some(ext)
}

/// Strips control characters, caps the length and escapes quotes for log output.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}
