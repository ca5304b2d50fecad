use axum::http::HeaderMap;

pub const ANONYMOUS: &str = "anonymous";

// Who is calling: first X-Forwarded-For hop, else X-Real-Ip, else anonymous
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = header_str(headers, "x-real-ip")
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded.or(real_ip).unwrap_or(ANONYMOUS).to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
