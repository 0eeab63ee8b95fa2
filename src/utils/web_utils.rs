#![forbid(unsafe_code)]

use path_absolutize::Absolutize;
use std::ops::Deref;
use std::path::Path;

use log::{trace, LevelFilter};
use poem::Request;

// ***************************************************************************
// GENERAL PUBLIC FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_absolute_path:
// ---------------------------------------------------------------------------
/** Replace tilde (~) and environment variable values in a path name and
 * then construct the absolute path name.  Unlike canonicalize, absolutize
 * does not require that the file exists, which lets configuration paths be
 * normalized before any files are created.
 */
pub fn get_absolute_path(path: &str) -> String {
    // Replace ~ and environment variable values if possible.
    // On error, return the string version of the original path.
    let s = match shellexpand::full(path) {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };

    // Convert to absolute path if necessary.
    // Return original input on error.
    let p = Path::new(s.deref());
    let p1 = match p.absolutize() {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };
    let p2 = match p1.to_str() {
        Some(x) => x,
        None => return path.to_owned(),
    };

    p2.to_owned()
}

// ---------------------------------------------------------------------------
// trace_request:
// ---------------------------------------------------------------------------
// Dump ingress request information to the log.
pub fn trace_request(http_req: &Request) {
    // Check that trace logging is in effect before paying for formatting.
    let level = log::max_level();
    if level < LevelFilter::Trace {
        return;
    }

    // Write the single log record.
    trace!("{}", format_request(http_req));
}

// ***************************************************************************
// PRIVATE FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// format_request:
// ---------------------------------------------------------------------------
/** Render the ingress request as an indented block, one line per header
 * value so repeated headers are listed in full.  Diagnostic output only;
 * never affects the response.
 */
fn format_request(http_req: &Request) -> String {
    // Accumulate the output.
    let mut s = "\nIngress Request:\n".to_string();

    // Restate the request line.
    s += format!("  URI:       {}\n", http_req.uri()).as_str();
    s += format!("  Scheme:    {}\n", http_req.scheme()).as_str();
    s += format!("  Protocol:  {:?}\n", http_req.version()).as_str();
    s += format!("  Server:    {}\n", http_req.local_addr()).as_str();

    // Accumulate the headers.
    s += "  Headers:\n";
    for (name, value) in http_req.headers() {
        s += format!("    {}: {}\n", name, value.to_str().unwrap_or("<binary>")).as_str();
    }

    s
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::http::HeaderValue;

    #[test]
    fn relative_paths_become_absolute() {
        let p = get_absolute_path("hello.toml");
        assert!(p.starts_with('/'));
        assert!(p.ends_with("hello.toml"));
    }

    #[test]
    fn formats_request_with_no_headers() {
        let req = Request::builder().finish();
        let s = format_request(&req);
        assert!(s.contains("Ingress Request:"));
        assert!(s.contains("Headers:"));
    }

    #[test]
    fn formats_every_value_of_repeated_headers() {
        let mut req = Request::builder().finish();
        req.headers_mut().insert("x-one", HeaderValue::from_static("a"));
        req.headers_mut().append("x-many", HeaderValue::from_static("b"));
        req.headers_mut().append("x-many", HeaderValue::from_static("c"));
        let s = format_request(&req);
        assert!(s.contains("x-one: a"));
        assert!(s.contains("x-many: b"));
        assert!(s.contains("x-many: c"));
    }
}
