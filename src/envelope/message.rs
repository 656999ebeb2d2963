use base64::{Engine as _, engine::general_purpose::STANDARD};
use mailparse::{MailAddr, addrparse, parse_headers};

use super::error::EnvelopeError;
use super::headers::Headers;

/// Header fields never written to the wire.
const HIDDEN: &[&str] = &["Bcc"];

pub(crate) struct Message {
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Parses `raw` when it starts with an RFC 5322 header block terminated by
/// an empty line. `Ok(None)` means there is no such block.
pub(crate) fn parse(raw: &[u8]) -> Result<Option<Message>, EnvelopeError> {
    if !has_header_block(raw) {
        return Ok(None);
    }
    let (fields, offset) = parse_headers(raw).map_err(EnvelopeError::parse)?;
    let mut headers = Headers::new();
    for field in &fields {
        headers.append(&field.get_key(), unfold(field.get_value_raw()));
    }
    let body = raw.get(offset..).unwrap_or_default().to_vec();
    Ok(Some(Message { headers, body }))
}

/// Minimal message for raw text piped without headers.
pub(crate) fn synthesize(sender: Option<&str>, recipients: &[String], body: &[u8]) -> Message {
    let mut headers = Headers::new();
    if let Some(sender) = sender {
        headers.set("From", sender);
    }
    headers.set("To", recipients.join(", "));
    Message {
        headers,
        body: body.to_vec(),
    }
}

fn has_header_block(raw: &[u8]) -> bool {
    let mut seen_field = false;
    for line in raw.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return seen_field;
        }
        if matches!(line[0], b' ' | b'\t') {
            if !seen_field {
                return false;
            }
            continue;
        }
        let Some(colon) = line.iter().position(|b| *b == b':') else {
            return false;
        };
        let name = &line[..colon];
        if name.is_empty() || !name.iter().all(|b| (33..=126).contains(b)) {
            return false;
        }
        seen_field = true;
    }
    false
}

fn unfold(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bare addresses listed in one header value, group members included.
pub(crate) fn addresses(field: &str, value: &str) -> Result<Vec<String>, EnvelopeError> {
    let list = addrparse(value).map_err(|err| EnvelopeError::address_list(field, err))?;
    let mut out = Vec::new();
    for entry in list.iter() {
        match entry {
            MailAddr::Single(info) => out.extend(bare(&info.addr)),
            MailAddr::Group(group) => out.extend(group.addrs.iter().filter_map(|i| bare(&i.addr))),
        }
    }
    Ok(out)
}

// addrparse keeps the separator that follows a group's closing ';' on the
// next mailbox.
fn bare(addr: &str) -> Option<String> {
    let addr = addr
        .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
        .trim_end();
    (!addr.is_empty()).then(|| addr.to_string())
}

/// RFC 2047 base64 encoded-word.
pub(crate) fn encode_subject(subject: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
}

/// Headers in key order, an empty line, then the body, always ending with
/// CRLF.
pub(crate) fn render(headers: &Headers, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 512);
    for (key, values) in headers.iter() {
        if HIDDEN.iter().any(|hidden| hidden.eq_ignore_ascii_case(key)) {
            continue;
        }
        for value in values {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    if !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
    out
}
