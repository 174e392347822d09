//! Bundled web UI.
//!
//! The files under `static/` are compiled into the binary and served with
//! plain file-server rules: directories serve their `index.html` or a
//! listing, `index.html` itself redirects to its directory, and a directory
//! requested without a trailing slash redirects to the slash form.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt::Write as _;

use axum::body::Body;
use axum::http::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, LOCATION};
use axum::http::{Method, StatusCode, Uri};
use axum::response::Response;
use mime_guess::mime;

use super::text_response;

// ============================================================================
// Asset Table
// ============================================================================

/// A file compiled into the binary.
#[derive(Debug)]
pub struct Asset {
    /// Path relative to the site root, without a leading slash.
    pub path: &'static str,
    /// File contents.
    pub body: &'static [u8],
}

/// Every bundled file.
static ASSETS: &[Asset] = &[
    Asset {
        path: "index.html",
        body: include_bytes!("../../static/index.html"),
    },
    Asset {
        path: "css/style.css",
        body: include_bytes!("../../static/css/style.css"),
    },
    Asset {
        path: "js/main.js",
        body: include_bytes!("../../static/js/main.js"),
    },
    Asset {
        path: "js/mpd-client.js",
        body: include_bytes!("../../static/js/mpd-client.js"),
    },
    Asset {
        path: "js/component/Favicon.js",
        body: include_bytes!("../../static/js/component/Favicon.js"),
    },
    Asset {
        path: "js/component/MediaSession.js",
        body: include_bytes!("../../static/js/component/MediaSession.js"),
    },
    Asset {
        path: "js/component/PlayerPanel.js",
        body: include_bytes!("../../static/js/component/PlayerPanel.js"),
    },
    Asset {
        path: "js/component/QueuePanel.js",
        body: include_bytes!("../../static/js/component/QueuePanel.js"),
    },
    Asset {
        path: "favicon.svg",
        body: include_bytes!("../../static/favicon.svg"),
    },
];

/// Looks up a bundled file by its root-relative path.
#[must_use]
pub fn find(path: &str) -> Option<&'static Asset> {
    ASSETS.iter().find(|asset| asset.path == path)
}

/// Returns `true` if any bundled file lives under `dir` (which ends in `/` or is empty).
fn is_dir(dir: &str) -> bool {
    ASSETS.iter().any(|asset| asset.path.starts_with(dir))
}

/// Lists the direct children of `dir`; subdirectories end in `/`.
fn children(dir: &str) -> BTreeSet<&'static str> {
    ASSETS
        .iter()
        .filter_map(|asset| asset.path.strip_prefix(dir))
        .map(|rest| match rest.find('/') {
            Some(slash) => &rest[..=slash],
            None => rest,
        })
        .collect()
}

// ============================================================================
// Serving
// ============================================================================

/// Router fallback: every path that is not `/ws`.
pub async fn handler(method: Method, uri: Uri) -> Response {
    serve(&method, uri.path())
}

/// Serves `path` from the bundled files.
pub fn serve(method: &Method, path: &str) -> Response {
    let head = match *method {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed\n");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }
    };

    let Some(relative) = path.strip_prefix('/') else {
        return text_response(StatusCode::BAD_REQUEST, "Bad request path\n");
    };

    // `/index.html` and `/dir/index.html` are only reachable via their directory.
    if relative == "index.html" || relative.ends_with("/index.html") {
        return redirect(&path[..path.len() - "index.html".len()]);
    }

    if relative.is_empty() || relative.ends_with('/') {
        let index = format!("{relative}index.html");
        if let Some(asset) = find(&index) {
            return file_response(asset, head);
        }
        if is_dir(relative) {
            return listing_response(relative, head);
        }
        return not_found();
    }

    if let Some(asset) = find(relative) {
        return file_response(asset, head);
    }
    if is_dir(&format!("{relative}/")) {
        return redirect(&format!("{path}/"));
    }
    not_found()
}

/// Builds a `200 OK` for a bundled file.
fn file_response(asset: &'static Asset, head: bool) -> Response {
    let guess = mime_guess::from_path(asset.path).first_or_octet_stream();
    let content_type = if guess.type_() == mime::TEXT || guess.subtype() == mime::JAVASCRIPT {
        format!("{}; charset=utf-8", guess.essence_str())
    } else {
        guess.essence_str().to_string()
    };

    let body = if head {
        Body::empty()
    } else {
        Body::from(asset.body)
    };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(asset.body.len()));
    response
}

/// Builds an HTML listing of a bundled directory.
fn listing_response(dir: &str, head: bool) -> Response {
    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for name in children(dir) {
        let _ = writeln!(html, "<a href=\"{name}\">{name}</a>");
    }
    html.push_str("</pre>\n");

    let length = html.len();
    let body = if head { Body::empty() } else { Body::from(html) };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// Builds a `301 Moved Permanently` to `location`.
fn redirect(location: &str) -> Response {
    let mut response = text_response(StatusCode::MOVED_PERMANENTLY, "Moved Permanently\n");
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

fn not_found() -> Response {
    text_response(StatusCode::NOT_FOUND, "404 page not found\n")
}

// ============================================================================
// Tests
// ============================================================================
