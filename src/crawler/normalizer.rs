//! Link canonicalization and same-domain scoping
//!
//! Turns the raw `href` values of a page into the set of absolute URLs the
//! traversal may visit next.

use std::collections::{BTreeSet, HashSet};
use url::Url;

/// Binary and media extensions that are never crawled, matched anywhere in the href
pub const BLOCKED_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".png", ".mp4", ".wmv", ".gif", ".jpeg"];

/// Substrings of session-bound account flows
pub const AUTH_SUBSTRINGS: &[&str] = &["login", "register", "account", "password"];

/// Schemes of links that trigger an action instead of loading a page
pub const ACTION_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

/// Resolve, filter and deduplicate `hrefs` found on `base`
///
/// See [`scope_and_dedup_with_known`]; no URL is treated as previously known.
pub fn scope_and_dedup<I, S>(base: &Url, hrefs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    scope_and_dedup_with_known(base, hrefs, &HashSet::new())
}

/// Resolve, filter and deduplicate `hrefs` found on `base`
///
/// # Arguments
///
/// * `base` - URL of the page the links were found on
/// * `hrefs` - raw `href` attribute values
/// * `known` - URLs already seen by the traversal
///
/// # Returns
///
/// Absolute URLs on exactly the same host (and explicit port) as `base`, rewritten
/// to the scheme of `base`, without media
/// files, account pages or action links, in lexicographic order. A URL with a
/// fragment is reduced to its fragment-free form, which is only added when
/// neither the batch nor `known` already contains it.
pub fn scope_and_dedup_with_known<I, S>(
    base: &Url,
    hrefs: I,
    known: &HashSet<String>,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut urls = BTreeSet::new();
    let mut fragment_variants = Vec::new();

    for href in hrefs {
        let Some(resolved) = resolve_href(base, href.as_ref()) else {
            continue;
        };

        if resolved.fragment().is_some() {
            fragment_variants.push(resolved);
        } else {
            urls.insert(resolved.to_string());
        }
    }

    for mut url in fragment_variants {
        url.set_fragment(None);
        let stripped = url.to_string();
        if !urls.contains(&stripped) && !known.contains(&stripped) {
            urls.insert(stripped);
        }
    }

    urls
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ACTION_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
        || BLOCKED_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        || AUTH_SUBSTRINGS.iter().any(|word| lower.contains(word))
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    let same_site = matches!(resolved.scheme(), "http" | "https")
        && resolved.host_str() == base.host_str()
        && resolved.port() == base.port();
    if !same_site {
        return None;
    }

    // http and https links to one host name the same page
    if resolved.scheme() != base.scheme() {
        resolved.set_scheme(base.scheme()).ok()?;
    }
    Some(resolved)
}
