//! Response header helpers for the curl transport.

/// Status code from an `HTTP/x.y NNN reason` line.
pub(super) fn parse_status_line(line: &str) -> Option<u32> {
    let mut words = line.split_whitespace();
    let version = words.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    words.next()?.parse().ok()
}

/// Status code and `Content-Length` of the last response in `lines`.
/// Lines before the last status line belong to redirects and are ignored.
pub(super) fn parse_response_head(lines: &[String]) -> (Option<u32>, Option<u64>) {
    let mut code = None;
    let mut content_length = None;
    for line in lines {
        let line = line.trim();
        if let Some(c) = parse_status_line(line) {
            code = Some(c);
            content_length = None;
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<u64>().ok();
            }
        }
    }
    (code, content_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn status_line_variants() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 200"), Some(200));
        assert_eq!(parse_status_line("Content-Length: 5"), None);
        assert_eq!(parse_status_line("HTTP/1.1 abc"), None);
    }

    #[test]
    fn last_response_wins_after_redirect() {
        let head = parse_response_head(&lines(&[
            "HTTP/1.1 302 Found",
            "Content-Length: 17",
            "Location: /other",
            "",
            "HTTP/1.1 206 Partial Content",
            "content-length: 1000",
        ]));
        assert_eq!(head, (Some(206), Some(1000)));
    }

    #[test]
    fn missing_content_length() {
        let head = parse_response_head(&lines(&["HTTP/1.1 200 OK", "Server: x"]));
        assert_eq!(head, (Some(200), None));
    }
}
