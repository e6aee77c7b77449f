//! Outbound link normalization and filtering.

use url::Url;

/// Extensions of files that are never content pages.
const DENIED_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".zip", ".exe"];
/// Path fragments of pages that are never content (search results, auth, shop).
const DENIED_PATHS: &[&str] = &["/search", "/login", "/logout", "/cart", "/checkout", "/account"];

/// Resolve `href` against the page it was found on and drop the fragment.
///
/// Returns `None` for anything that doesn't resolve to a URL.
pub fn normalize(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url)
}

/// Non-content URLs: anything that isn't HTTP(S) (`javascript:`, `mailto:`,
/// `tel:`, ...), binary or media files, and search/account/shop pages.
pub fn is_denied(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return true;
    }
    let lower = url.as_str().to_lowercase();
    DENIED_EXTENSIONS.iter().chain(DENIED_PATHS).any(|needle| lower.contains(needle))
}

/// Whether the URL's host falls under `domain` (substring match, so
/// `bmw.de` covers `www.bmw.de` and `configure.bmw.de`).
pub fn in_domain(url: &Url, domain: &str) -> bool {
    url.host_str().is_some_and(|host| host.contains(domain))
}
