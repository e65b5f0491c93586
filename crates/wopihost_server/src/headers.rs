//! WOPI header names.
//!
//! All names are lowercase so they can be used with
//! [`HeaderName::from_static`](axum::http::HeaderName::from_static).

use axum::http::HeaderValue;

pub(crate) const OVERRIDE: &str = "x-wopi-override";
pub(crate) const LOCK: &str = "x-wopi-lock";
pub(crate) const OLD_LOCK: &str = "x-wopi-oldlock";
pub(crate) const ITEM_VERSION: &str = "x-wopi-itemversion";
pub(crate) const LOCK_FAILURE_REASON: &str = "x-wopi-lockfailurereason";

pub(crate) const SUGGESTED_TARGET: &str = "x-wopi-suggestedtarget";
pub(crate) const RELATIVE_TARGET: &str = "x-wopi-relativetarget";
pub(crate) const OVERWRITE_RELATIVE_TARGET: &str = "x-wopi-overwriterelativetarget";
pub(crate) const VALID_RELATIVE_TARGET: &str = "x-wopi-validrelativetarget";
pub(crate) const REQUESTED_NAME: &str = "x-wopi-requestedname";
pub(crate) const INVALID_FILE_NAME_ERROR: &str = "x-wopi-invalidfilenameerror";

pub(crate) const SIZE: &str = "x-wopi-size";
pub(crate) const MAX_EXPECTED_SIZE: &str = "x-wopi-maxexpectedsize";
pub(crate) const EDITORS: &str = "x-wopi-editors";
pub(crate) const URL_TYPE: &str = "x-wopi-urltype";

pub(crate) const PROOF: &str = "x-wopi-proof";
pub(crate) const PROOF_OLD: &str = "x-wopi-proofold";
pub(crate) const TIMESTAMP: &str = "x-wopi-timestamp";

pub(crate) const SERVER_VERSION: &str = "x-wopi-serverversion";

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// Encodes header text. File names travel as raw UTF-8, which HTTP carries
/// as opaque octets; only control characters are refused.
pub(crate) fn value(text: &str) -> Option<HeaderValue> {
    HeaderValue::from_bytes(text.as_bytes()).ok()
}

/// Decodes header text written by [`value`] or by a client.
pub(crate) fn text(value: &HeaderValue) -> Option<&str> {
    std::str::from_utf8(value.as_bytes()).ok()
}

/// Builds an attachment `Content-Disposition` for `filename`.
///
/// Names outside printable ASCII get an ASCII `filename` fallback plus an
/// RFC 5987 `filename*` parameter carrying the exact name.
pub(crate) fn attachment_disposition(filename: &str) -> String {
    let is_plain = filename
        .chars()
        .all(|c| c.is_ascii_graphic() || c == ' ');
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if is_plain {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_keep_simple_disposition() {
        assert_eq!(
            attachment_disposition("report.docx"),
            "attachment; filename=\"report.docx\""
        );
        assert_eq!(
            attachment_disposition("say \"hi\".txt"),
            "attachment; filename=\"say _hi_.txt\""
        );
    }

    #[test]
    fn non_ascii_names_get_extended_parameter() {
        assert_eq!(
            attachment_disposition("résumé.docx"),
            "attachment; filename=\"r_sum_.docx\"; filename*=UTF-8''r%C3%A9sum%C3%A9.docx"
        );
    }

    #[test]
    fn utf8_text_survives_header_encoding() {
        let encoded = value("résumé (1).docx").unwrap();
        assert_eq!(text(&encoded), Some("résumé (1).docx"));
        assert!(value("line\nbreak").is_none());
    }
}
