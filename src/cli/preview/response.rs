//! HTTP response handlers.

use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::Path,
};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::{self, types};

/// Respond with a file from the mirror.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    // Range requests (video/audio seeking)
    if let Some(range) = range_header(&request) {
        let size = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        if let Some(range) = parse_range(&range, size) {
            return respond_range(request, path, content_type, range, size);
        }
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Stream `start..=end` of the file as 206 Partial Content.
fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    (start, end): (u64, u64),
    size: u64,
) -> Result<()> {
    let length = end - start + 1;
    let mut file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(start))?;

    let response = Response::new(
        StatusCode(206),
        vec![
            header("Content-Type", content_type)?,
            header("Content-Range", format!("bytes {start}-{end}/{size}"))?,
            header("Accept-Ranges", "bytes")?,
        ],
        file.take(length),
        usize::try_from(length).ok(),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Parse a `bytes=start-end` header value into an inclusive range.
///
/// Returns `None` for anything unsatisfiable, which falls back to the
/// whole file.
fn parse_range(value: &str, size: u64) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    let last = size.checked_sub(1)?;

    let (start, end) = match (start.is_empty(), end.is_empty()) {
        // "-500": the last 500 bytes
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            (size.saturating_sub(suffix), last)
        }
        // "500-": from byte 500 to the end
        (false, true) => (start.parse().ok()?, last),
        (false, false) => {
            let end: u64 = end.parse().ok()?;
            (start.parse().ok()?, end.min(last))
        }
        (true, true) => return None,
    };

    (start <= end).then_some((start, end))
}

fn range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("range"))
        .map(|h| h.value.to_string())
}

/// Respond with the mirrored `404.html`, or a plain message without one.
pub fn respond_not_found(request: Request, root: &Path) -> Result<()> {
    let custom = root.join("404.html");
    let has_custom = custom.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if has_custom && let Ok(body) = fs::read(&custom) {
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &'static str, value: impl AsRef<[u8]>) -> Result<Header> {
    Header::from_bytes(key, value.as_ref()).map_err(|()| anyhow!("invalid `{key}` header"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-499", 1000), Some((0, 499)));
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
        assert_eq!(parse_range("bytes=-100", 1000), Some((900, 999)));
        assert_eq!(parse_range("bytes=900-5000", 1000), Some((900, 999)));
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(parse_range("bytes=0-10", 0), None);
        assert_eq!(parse_range("bytes=600-500", 1000), None);
        assert_eq!(parse_range("bytes=2000-", 1000), None);
        assert_eq!(parse_range("bytes=-", 1000), None);
        assert_eq!(parse_range("items=0-1", 1000), None);
    }

    #[test]
    fn test_header() {
        let h = header("Content-Range", "bytes 0-1/2").unwrap();
        assert_eq!(h.value.as_str(), "bytes 0-1/2");
    }
}
