//! Webhook payload handling.
//!
//! The verifier posts a small HTTP request whose last line is a JSON object
//! carrying a boolean `success`. Anything unparseable counts as a failure.

use serde_json::Value;

/// Reply sent to every callback regardless of its content.
pub const ACKNOWLEDGEMENT: &[u8] = b"HTTP/1.0 200 Ok\r\n\r\n";

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Extract the `success` flag from a raw callback payload.
///
/// Chunked bodies are decoded first; otherwise the last line of the payload
/// is taken as the JSON document.
pub fn parse_success(data: &[u8]) -> bool {
    if let Some((headers, body)) = split_request(data)
        && is_chunked(&headers)
    {
        return decode_chunked(body)
            .map(|decoded| success_flag(&String::from_utf8_lossy(&decoded)))
            .unwrap_or(false);
    }

    let text = String::from_utf8_lossy(data);
    let Some(last_line) = text.split("\r\n").last() else {
        return false;
    };
    success_flag(last_line)
}

/// Whether `data` holds a full HTTP request: headers plus either a body of
/// the announced `Content-Length` (none announced means no body) or a chunked
/// body up to its terminal chunk.
pub fn is_complete(data: &[u8]) -> bool {
    let Some((headers, body)) = split_request(data) else {
        return false;
    };

    if is_chunked(&headers) {
        return decode_chunked(body).is_some();
    }
    let expected = header_value(&headers, "content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= expected
}

fn success_flag(document: &str) -> bool {
    serde_json::from_str::<Value>(document.trim())
        .ok()
        .and_then(|value| value.get("success").and_then(Value::as_bool))
        .unwrap_or(false)
}

fn split_request(data: &[u8]) -> Option<(String, &[u8])> {
    let header_end = find(data, HEADER_TERMINATOR)?;
    let headers = String::from_utf8_lossy(&data[..header_end]).into_owned();
    Some((headers, &data[header_end + HEADER_TERMINATOR.len()..]))
}

fn is_chunked(headers: &str) -> bool {
    header_value(headers, "transfer-encoding")
        .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"))
}

/// Decode a chunked body. `None` until the terminal zero-size chunk and its
/// closing blank line have arrived.
fn decode_chunked(mut body: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::new();
    loop {
        let line_end = find(body, LINE_TERMINATOR)?;
        let size_line = String::from_utf8_lossy(&body[..line_end]);
        let size_field = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16).ok()?;
        body = &body[line_end + LINE_TERMINATOR.len()..];

        if size == 0 {
            // Trailers, if any, end with an empty line.
            return (find(body, LINE_TERMINATOR) == Some(0)
                || find(body, HEADER_TERMINATOR).is_some())
            .then_some(decoded);
        }

        let chunk_end = size.checked_add(LINE_TERMINATOR.len())?;
        if body.len() < chunk_end {
            return None;
        }
        decoded.extend_from_slice(&body[..size]);
        body = &body[chunk_end..];
    }
}

fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|window| window == needle)
}

fn header_value<'a>(headers: &'a str, wanted: &str) -> Option<&'a str> {
    headers.split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case(wanted)
            .then(|| value.trim())
    })
}
