//! multipart/mixed framing for progress-streaming bundle responses.

/// Fixed boundary used by the bundle endpoint.
pub const BOUNDARY: &str = "3beqjf3apnqeu3h5jqorms4i";

/// `Content-Type` header value announcing the boundary.
pub fn content_type() -> String {
    format!("multipart/mixed; boundary=\"{BOUNDARY}\"")
}

/// One part: boundary line, headers, blank line, body.
pub fn part(headers: &[(&str, String)], body: &str) -> String {
    let mut out = format!("\r\n--{BOUNDARY}\r\n");
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

/// JSON progress part.
pub fn progress_part(done: usize, total: usize) -> String {
    part(
        &[("Content-Type", "application/json".to_string())],
        &format!("{{\"done\":{done},\"total\":{total}}}"),
    )
}

/// Final part carrying the bundle and its delta headers.
pub fn bundle_part(code: &str, files_changed: usize, delta_id: &str) -> String {
    part(
        &[
            ("X-Metro-Files-Changed-Count", files_changed.to_string()),
            ("X-Metro-Delta-ID", delta_id.to_string()),
            (
                "Content-Type",
                "application/javascript; charset=UTF-8".to_string(),
            ),
        ],
        code,
    )
}

/// Closing delimiter; every multipart body ends with this.
pub fn terminator() -> String {
    format!("\r\n--{BOUNDARY}--\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_value() {
        assert_eq!(BOUNDARY, "3beqjf3apnqeu3h5jqorms4i");
        assert_eq!(
            content_type(),
            "multipart/mixed; boundary=\"3beqjf3apnqeu3h5jqorms4i\""
        );
    }

    #[test]
    fn test_progress_part_format() {
        let part = progress_part(3, 10);
        assert!(part.starts_with("\r\n--3beqjf3apnqeu3h5jqorms4i\r\n"));
        assert!(part.contains("Content-Type: application/json\r\n\r\n"));
        assert!(part.ends_with("{\"done\":3,\"total\":10}"));
    }

    #[test]
    fn test_bundle_part_headers() {
        let part = bundle_part("__d(...)", 4, "a3");
        assert!(part.contains("X-Metro-Files-Changed-Count: 4\r\n"));
        assert!(part.contains("X-Metro-Delta-ID: a3\r\n"));
        assert!(part.contains("Content-Type: application/javascript; charset=UTF-8\r\n\r\n__d(...)"));
    }

    #[test]
    fn test_terminator() {
        assert_eq!(terminator(), "\r\n--3beqjf3apnqeu3h5jqorms4i--\r\n");
    }

    #[test]
    fn test_assembled_body_ends_with_terminator() {
        let body = format!(
            "{}{}{}",
            progress_part(1, 1),
            bundle_part("code", 1, "1"),
            terminator()
        );
        assert!(body.ends_with("\r\n--3beqjf3apnqeu3h5jqorms4i--\r\n"));
    }
}
