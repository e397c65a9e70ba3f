//! Ordered execution of intent parsers.

use axum::body::Body;
use axum::http::header::InvalidHeaderName;
use axum::http::{HeaderName, Request};

use crate::config::IntentConfig;
use crate::intent::context::RequestContext;
use crate::intent::parser::{HeaderExitParser, IntentParser, ParseError, PathIntentParser};

/// A chain of parsers run in the order they were supplied.
pub struct IntentPipeline {
    parsers: Vec<Box<dyn IntentParser>>,
}

impl IntentPipeline {
    pub fn new(parsers: Vec<Box<dyn IntentParser>>) -> Self {
        Self { parsers }
    }

    /// Build the standard header + path pipeline from configuration.
    pub fn from_config(config: &IntentConfig) -> Result<Self, InvalidHeaderName> {
        let mut parsers: Vec<Box<dyn IntentParser>> = vec![Box::new(PathIntentParser)];

        if !config.exit_header.is_empty() {
            let header = HeaderName::from_bytes(config.exit_header.as_bytes())?;
            let header_parser = Box::new(HeaderExitParser::new(header));
            if config.header_precedence {
                parsers.insert(0, header_parser);
            } else {
                parsers.push(header_parser);
            }
        }

        Ok(Self::new(parsers))
    }

    /// Run every parser over a fresh context. The first error aborts the chain.
    pub fn parse<'a>(&self, req: &'a Request<Body>) -> Result<RequestContext<'a>, ParseError> {
        let mut ctx = RequestContext::new(req);

        tracing::trace!(
            method = %req.method(),
            path = %req.uri().path(),
            segments = ?ctx.remaining_path,
            "Parsing request intent"
        );

        for parser in &self.parsers {
            parser.parse(&mut ctx)?;
        }

        tracing::debug!(
            exit = ?ctx.parsed_exit,
            target = ?ctx.parsed_target.as_ref().map(|u| u.as_str()),
            remaining = ?ctx.remaining_path,
            "Request intent parsed"
        );

        Ok(ctx)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl std::fmt::Debug for IntentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentPipeline")
            .field("parsers", &self.parsers.len())
            .finish()
    }
}
