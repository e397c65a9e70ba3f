//! Intent parsers.
//!
//! # Responsibilities
//! - Extract the requested exit from a header
//! - Extract an absolute target URL (and optional exit segment) from the path
//!
//! # Design Decisions
//! - Parsers never overwrite a field another parser already claimed
//! - Precedence between parsers comes only from their order in the pipeline
//! - Any `Fn(&mut RequestContext) -> Result<(), ParseError>` is a parser

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::intent::context::RequestContext;

/// Failure to make sense of a request's intent. Maps to 400.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("header '{header}' does not contain valid text")]
    InvalidHeader { header: String },

    #[error("{0}")]
    Rejected(String),
}

/// A step of the intent pipeline.
pub trait IntentParser: Send + Sync {
    fn parse(&self, ctx: &mut RequestContext<'_>) -> Result<(), ParseError>;
}

impl<F> IntentParser for F
where
    F: Fn(&mut RequestContext<'_>) -> Result<(), ParseError> + Send + Sync,
{
    fn parse(&self, ctx: &mut RequestContext<'_>) -> Result<(), ParseError> {
        self(ctx)
    }
}

/// Reads the exit name from a request header.
#[derive(Debug, Clone)]
pub struct HeaderExitParser {
    header: HeaderName,
}

impl HeaderExitParser {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl IntentParser for HeaderExitParser {
    fn parse(&self, ctx: &mut RequestContext<'_>) -> Result<(), ParseError> {
        if ctx.parsed_exit.is_some() {
            return Ok(());
        }

        let Some(value) = ctx.original.headers().get(&self.header) else {
            return Ok(());
        };

        let value = value.to_str().map_err(|_| ParseError::InvalidHeader {
            header: self.header.to_string(),
        })?;

        let exit = value.trim();
        if exit.is_empty() {
            return Ok(());
        }

        tracing::debug!(exit = %exit, header = %self.header, "Exit taken from header");
        ctx.parsed_exit = Some(exit.to_string());
        Ok(())
    }
}

/// Finds an absolute URL embedded at the end of the path.
///
/// `/kr/http://example.com/a?x=1` yields target `http://example.com/a?x=1`
/// and exit `kr` (unless an exit was already claimed).
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIntentParser;

impl IntentParser for PathIntentParser {
    fn parse(&self, ctx: &mut RequestContext<'_>) -> Result<(), ParseError> {
        if ctx.parsed_target.is_some() || ctx.remaining_path.is_empty() {
            return Ok(());
        }

        let query = ctx.original.uri().query();

        for i in 0..ctx.remaining_path.len() {
            let mut candidate = ctx.remaining_path[i..].join("/");
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                candidate.push('?');
                candidate.push_str(query);
            }

            let Some(target) = parse_absolute(&candidate) else {
                continue;
            };

            let mut control: Vec<String> = ctx.remaining_path.drain(..i).collect();
            if ctx.parsed_exit.is_none() && !control.is_empty() {
                ctx.parsed_exit = Some(control.remove(0));
            }
            ctx.remaining_path = control;

            tracing::debug!(
                exit = ?ctx.parsed_exit,
                target = %target,
                remaining = ?ctx.remaining_path,
                "Path intent parsed"
            );
            ctx.parsed_target = Some(target);
            return Ok(());
        }

        Ok(())
    }
}

/// Parse `candidate` as a URL with a scheme and a non-empty host.
fn parse_absolute(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate).ok()?;
    match url.host_str() {
        Some(host) if !host.is_empty() && !url.scheme().is_empty() => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_path_parser_escaped_target() {
        let req = request("/kr/http%3A%2F%2Fexample.com%2Fpath");
        let mut ctx = RequestContext::new(&req);

        PathIntentParser.parse(&mut ctx).unwrap();

        assert_eq!(ctx.parsed_target.unwrap().as_str(), "http://example.com/path");
        assert_eq!(ctx.parsed_exit.as_deref(), Some("kr"));
        assert!(ctx.remaining_path.is_empty());
    }

    #[test]
    fn test_path_parser_target_without_exit() {
        let req = request("/http://example.com/path?x=1");
        let mut ctx = RequestContext::new(&req);

        PathIntentParser.parse(&mut ctx).unwrap();

        assert_eq!(ctx.parsed_target.unwrap().as_str(), "http://example.com/path?x=1");
        assert!(ctx.parsed_exit.is_none());
        assert!(ctx.remaining_path.is_empty());
    }

    #[test]
    fn test_path_parser_exit_and_remaining() {
        let req = request("/test/extra/http://example.com/path");
        let mut ctx = RequestContext::new(&req);

        PathIntentParser.parse(&mut ctx).unwrap();

        assert_eq!(ctx.parsed_exit.as_deref(), Some("test"));
        assert_eq!(ctx.remaining_path, vec!["extra"]);
        assert_eq!(ctx.parsed_target.unwrap().as_str(), "http://example.com/path");
    }

    #[test]
    fn test_path_parser_keeps_existing_exit() {
        let req = request("/foo/bar/http://example.com");
        let mut ctx = RequestContext::new(&req);
        ctx.parsed_exit = Some("pre".into());

        PathIntentParser.parse(&mut ctx).unwrap();

        assert_eq!(ctx.parsed_exit.as_deref(), Some("pre"));
        assert_eq!(ctx.remaining_path, vec!["foo", "bar"]);
        assert_eq!(ctx.parsed_target.unwrap().host_str(), Some("example.com"));
    }

    #[test]
    fn test_path_parser_no_match_leaves_context() {
        let req = request("/no/target/here");
        let mut ctx = RequestContext::new(&req);

        PathIntentParser.parse(&mut ctx).unwrap();

        assert!(ctx.parsed_target.is_none());
        assert!(ctx.parsed_exit.is_none());
        assert_eq!(ctx.remaining_path, vec!["no", "target", "here"]);
    }

    #[test]
    fn test_path_parser_requires_host() {
        let req = request("/mailto:someone/x");
        let mut ctx = RequestContext::new(&req);

        PathIntentParser.parse(&mut ctx).unwrap();

        assert!(ctx.parsed_target.is_none());
    }

    #[test]
    fn test_path_parser_skips_when_target_set() {
        let req = request("/kr/http://example.com");
        let mut ctx = RequestContext::new(&req);
        ctx.parsed_target = Some(Url::parse("https://preset.example").unwrap());

        PathIntentParser.parse(&mut ctx).unwrap();

        assert_eq!(ctx.parsed_target.unwrap().host_str(), Some("preset.example"));
        assert!(ctx.parsed_exit.is_none());
        assert_eq!(ctx.remaining_path.len(), 4);
    }

    #[test]
    fn test_header_parser_sets_exit() {
        let req = Request::builder()
            .uri("/")
            .header("x-exit", "  my-exit \t")
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::new(&req);

        HeaderExitParser::new(HeaderName::from_static("x-exit"))
            .parse(&mut ctx)
            .unwrap();

        assert_eq!(ctx.parsed_exit.as_deref(), Some("my-exit"));
    }

    #[test]
    fn test_header_parser_ignores_blank_value() {
        let req = Request::builder()
            .uri("/")
            .header("x-exit", "   ")
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::new(&req);

        HeaderExitParser::new(HeaderName::from_static("x-exit"))
            .parse(&mut ctx)
            .unwrap();

        assert!(ctx.parsed_exit.is_none());
    }

    #[test]
    fn test_header_parser_keeps_existing_exit() {
        let req = Request::builder()
            .uri("/")
            .header("x-exit", "new")
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::new(&req);
        ctx.parsed_exit = Some("existing".into());

        HeaderExitParser::new(HeaderName::from_static("x-exit"))
            .parse(&mut ctx)
            .unwrap();

        assert_eq!(ctx.parsed_exit.as_deref(), Some("existing"));
    }

    #[test]
    fn test_header_parser_rejects_opaque_bytes() {
        let value = axum::http::HeaderValue::from_bytes(b"caf\xe9").unwrap();
        let req = Request::builder()
            .uri("/")
            .header("x-exit", value)
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::new(&req);

        let err = HeaderExitParser::new(HeaderName::from_static("x-exit"))
            .parse(&mut ctx)
            .unwrap_err();

        assert!(matches!(err, ParseError::InvalidHeader { .. }));
    }
}
