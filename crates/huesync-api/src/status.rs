// Error-code table shared by both protocols.
//
// A response is only treated as a rejection when its status (or the status
// mapped from a legacy error type) appears here. Anything else, including
// unexpected 2xx/3xx codes, is passed through.

/// HTTP statuses the bridge uses to reject a request, with a short reason.
pub const ERROR_CODES: &[(u16, &str)] = &[
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (409, "Conflict"),
    (429, "Too Many Requests"),
    (500, "Internal Server Error"),
    (503, "Service Unavailable"),
    (507, "Insufficient Storage"),
];

/// Look up the reason for a status in the error-code table.
pub fn error_reason(status: u16) -> Option<&'static str> {
    ERROR_CODES
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, reason)| *reason)
}

/// Whether `status` is a rejection per the error-code table.
pub fn is_error_status(status: u16) -> bool {
    error_reason(status).is_some()
}

/// Map a legacy error `type` onto its HTTP-equivalent status.
pub fn legacy_error_status(kind: u16) -> Option<u16> {
    match kind {
        1 => Some(401),
        2 | 5 | 6 | 7 => Some(400),
        3 => Some(404),
        4 => Some(405),
        201 => Some(403),
        901 => Some(500),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_contains_rate_limit() {
        assert_eq!(error_reason(429), Some("Too Many Requests"));
        assert!(is_error_status(507));
    }

    #[test]
    fn success_codes_are_not_errors() {
        assert!(!is_error_status(200));
        assert!(!is_error_status(207));
        assert!(!is_error_status(418));
    }

    #[test]
    fn legacy_kinds_map_into_table() {
        for kind in [1, 2, 3, 4, 5, 6, 7, 201, 901] {
            let status = legacy_error_status(kind).unwrap_or_default();
            assert!(is_error_status(status), "kind {kind} mapped to {status}");
        }
        assert_eq!(legacy_error_status(999), None);
    }
}
