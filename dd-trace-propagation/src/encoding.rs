// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Header value encodings shared by the format codecs.

use dd_trace::dd_debug;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// `application/x-www-form-urlencoded` leaves `*-._` untouched
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Form encodes a UTF-8 value, spaces become `+`.
pub fn encode(value: &str) -> String {
    // a literal '%' is escaped as "%25", so every "%20" left is a space
    utf8_percent_encode(value, FORM_ENCODE_SET)
        .to_string()
        .replace("%20", "+")
}

/// Percent encodes a baggage value, spaces become `%20`.
pub fn encode_baggage(value: &str) -> String {
    encode(value).replace('+', "%20")
}

/// Decodes a form encoded value.
///
/// Malformed escapes or bytes that are not UTF-8 leave the value untouched.
pub fn decode(value: &str) -> String {
    if !has_valid_escapes(value) {
        dd_debug!("Failed to decode header value {value}: malformed escape sequence");
        return value.to_string();
    }

    let value_with_spaces = value.replace('+', " ");
    match percent_decode_str(&value_with_spaces).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            dd_debug!("Failed to decode header value {value}: {e}");
            value.to_string()
        }
    }
}

fn has_valid_escapes(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escaped = bytes.get(i + 1..i + 3);
            if !escaped.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// First entry of a comma separated header, trimmed.
///
/// Values without a comma are returned unchanged.
pub fn first_header_value(value: Option<&str>) -> Option<&str> {
    let value = value?;
    match value.split_once(',') {
        Some((first, _)) => Some(first.trim()),
        None => Some(value),
    }
}
