//! Filesystem-safe names for entities, domains and pages
//!
//! Every file the crawler writes is named by a slug: a lowercase, ASCII-only,
//! hyphen-separated string. Entity folders use `slug(name)-slug(city)`, domain
//! folders use the slug of the host (plus port), and page files use the slug of
//! the URL's path, params, query and fragment.

use url::Url;

/// Maximum length of a page slug, well below common filename limits
pub const MAX_PAGE_SLUG_LEN: usize = 100;

/// File stem used for the site root
pub const HOME_PAGE_STEM: &str = "1-home";

/// File stem of the frontier record inside a domain folder
pub const FRONTIER_STEM: &str = "0-url-list";

/// Convert arbitrary text into a slug.
///
/// Common Latin letters with diacritics are transliterated, every other run of
/// non-alphanumeric characters becomes a single hyphen, and leading/trailing
/// hyphens are removed.
///
/// # Examples
///
/// ```
/// assert_eq!(apocrawl::slug::slugify("Löwen-Apotheke & Co."), "loewen-apotheke-co");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        let mapped: Option<&str> = match c {
            'ä' | 'Ä' => Some("ae"),
            'ö' | 'Ö' => Some("oe"),
            'ü' | 'Ü' => Some("ue"),
            'ß' => Some("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Å' => Some("a"),
            'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => Some("e"),
            'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => Some("i"),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' => Some("o"),
            'ù' | 'ú' | 'û' | 'Ù' | 'Ú' | 'Û' => Some("u"),
            'ç' | 'Ç' => Some("c"),
            'ñ' | 'Ñ' => Some("n"),
            _ => None,
        };

        match mapped {
            Some(replacement) => {
                push_segment(&mut slug, &mut pending_hyphen, replacement);
            }
            None if c.is_ascii_alphanumeric() => {
                let lower = c.to_ascii_lowercase();
                push_segment(&mut slug, &mut pending_hyphen, lower.encode_utf8(&mut [0; 4]));
            }
            None => pending_hyphen = true,
        }
    }

    slug
}

fn push_segment(slug: &mut String, pending_hyphen: &mut bool, segment: &str) {
    if *pending_hyphen && !slug.is_empty() {
        slug.push('-');
    }
    *pending_hyphen = false;
    slug.push_str(segment);
}

/// Slug identifying an entity: `slug(name)-slug(city)`
pub fn entity_slug(name: &str, city: &str) -> String {
    format!("{}-{}", slugify(name), slugify(city))
}

/// Slug of a URL's host, including a non-default port
pub fn domain_slug(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => slugify(&format!("{}:{}", host, port)),
        None => slugify(host),
    }
}

/// File stem for a page inside its domain folder.
///
/// The bare root (no query) maps to [`HOME_PAGE_STEM`]. Anything else is the
/// slug of `path-params-query-fragment`, cut to [`MAX_PAGE_SLUG_LEN`].
pub fn page_slug(url: &Url) -> String {
    let path = url.path();
    if (path.is_empty() || path == "/") && url.query().is_none() {
        return HOME_PAGE_STEM.to_string();
    }

    // `url` keeps matrix params inside the path, so the params slot stays empty
    let raw = format!(
        "{}--{}-{}",
        path,
        url.query().unwrap_or_default(),
        url.fragment().unwrap_or_default()
    );

    let mut slug: String = slugify(&raw).chars().take(MAX_PAGE_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        HOME_PAGE_STEM.to_string()
    } else if slug == FRONTIER_STEM {
        format!("{}-page", slug)
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Pharmacy"), "acme-pharmacy");
        assert_eq!(slugify("  --Hello,   World!--  "), "hello-world");
        assert_eq!(slugify("Straße 12"), "strasse-12");
        assert_eq!(slugify("Apotheke am Münster"), "apotheke-am-muenster");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_entity_slug() {
        assert_eq!(
            entity_slug("Acme Pharmacy", "Springfield"),
            "acme-pharmacy-springfield"
        );
    }

    #[test]
    fn test_domain_slug() {
        assert_eq!(domain_slug(&url("https://www.acme-pharmacy.com/x")), "www-acme-pharmacy-com");
        assert_eq!(domain_slug(&url("http://127.0.0.1:8080/")), "127-0-0-1-8080");
    }

    #[test]
    fn test_page_slug_root_uses_home() {
        assert_eq!(page_slug(&url("https://acme.com")), HOME_PAGE_STEM);
        assert_eq!(page_slug(&url("https://acme.com/")), HOME_PAGE_STEM);
    }

    #[test]
    fn test_page_slug_with_path_and_query() {
        assert_eq!(page_slug(&url("https://acme.com/about")), "about");
        assert_eq!(page_slug(&url("https://acme.com/team/staff/")), "team-staff");
        assert_eq!(page_slug(&url("https://acme.com/?page=2")), "page-2");
        assert_eq!(page_slug(&url("https://acme.com/news?id=7")), "news-id-7");
    }

    #[test]
    fn test_page_slug_truncates_long_paths() {
        let long = format!("https://acme.com/{}", "segment/".repeat(40));
        let slug = page_slug(&url(&long));
        assert!(slug.len() <= MAX_PAGE_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_page_slug_never_shadows_frontier_file() {
        assert_eq!(page_slug(&url("https://acme.com/0-url-list")), "0-url-list-page");
    }
}
