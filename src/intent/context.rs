//! Per-request parsing state.

use axum::body::Body;
use axum::http::Request;
use percent_encoding::percent_decode_str;
use url::Url;

/// State threaded through the intent parsers for one request.
///
/// Created per request, mutated by successive parsers, discarded after
/// dispatch. A `None` field means no parser has claimed it yet.
#[derive(Debug)]
pub struct RequestContext<'a> {
    /// The inbound request, read-only.
    pub original: &'a Request<Body>,

    /// Absolute URL the request should be forwarded to.
    pub parsed_target: Option<Url>,

    /// Exit explicitly requested by the caller.
    pub parsed_exit: Option<String>,

    /// Path segments not consumed by any parser.
    pub remaining_path: Vec<String>,
}

impl<'a> RequestContext<'a> {
    pub fn new(original: &'a Request<Body>) -> Self {
        Self {
            original,
            parsed_target: None,
            parsed_exit: None,
            remaining_path: split_path(&decode_path(original.uri().path())),
        }
    }

    /// Detach the parse results from the borrowed request.
    pub fn into_intent(self) -> Intent {
        Intent {
            target: self.parsed_target,
            exit: self.parsed_exit,
            remaining_path: self.remaining_path,
        }
    }
}

/// The (target, exit) pair extracted from a request, plus leftovers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intent {
    pub target: Option<Url>,
    pub exit: Option<String>,
    pub remaining_path: Vec<String>,
}

/// Percent-decode a request path, so an escaped target such as
/// `http%3A%2F%2Fexample.com` splits like its plain form.
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Split a URL path into segments.
///
/// One leading and one trailing slash are stripped; inner empty segments
/// (from `//`) are kept so targets like `http://host` can be rejoined.
pub fn split_path(path: &str) -> Vec<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/').map(str::to_string).collect()
}
