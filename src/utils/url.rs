//! URL utilities for consistent handling of scraped image URLs

use url::Url;

const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];

/// Normalize a scraped URL to an absolute https form
///
/// Rules applied uniformly across every extraction strategy:
/// - `//host/x.jpg` becomes `https://host/x.jpg`
/// - `/x.jpg` is prefixed with the site origin
/// - anything already starting with `http` is left unchanged
///
/// Returns `None` for values that cannot be absolutized (no scheme, not
/// root-relative).
pub fn normalize_image_url(raw: &str, site_origin: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if trimmed.starts_with('/') {
        return Some(format!(
            "{}{}",
            site_origin.trim_end_matches('/'),
            trimmed
        ));
    }
    if trimmed.starts_with("http") {
        return Some(trimmed.to_string());
    }
    None
}

/// Whether a URL plausibly points at an image file
pub fn looks_like_image_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    // Query strings after the extension are common on CDN links
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext) || lower.contains(&format!("{ext}?")))
}

/// Validate an externally supplied proxy target
///
/// The protocol allow-list is the only control here; there is no host
/// allow-list (see DESIGN.md).
pub fn validate_proxy_target(raw: &str) -> Result<Url, String> {
    let parsed = Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!("unsupported URL scheme: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://cl.fichapublica.com";

    #[test]
    fn protocol_relative_urls_get_https() {
        assert_eq!(
            normalize_image_url("//host/x.jpg", ORIGIN).as_deref(),
            Some("https://host/x.jpg")
        );
    }

    #[test]
    fn root_relative_urls_get_origin() {
        assert_eq!(
            normalize_image_url("/x.jpg", ORIGIN).as_deref(),
            Some("https://cl.fichapublica.com/x.jpg")
        );
    }

    #[test]
    fn absolute_urls_are_unchanged() {
        assert_eq!(
            normalize_image_url("https://host/x.jpg", ORIGIN).as_deref(),
            Some("https://host/x.jpg")
        );
    }

    #[test]
    fn bare_paths_are_rejected() {
        assert_eq!(normalize_image_url("x.jpg", ORIGIN), None);
        assert_eq!(normalize_image_url("", ORIGIN), None);
    }

    #[test]
    fn image_extension_detection() {
        assert!(looks_like_image_url("https://h/a.JPG"));
        assert!(looks_like_image_url("https://h/a.jpeg?width=600"));
        assert!(!looks_like_image_url("https://h/a.html"));
    }

    #[test]
    fn proxy_target_scheme_allow_list() {
        assert!(validate_proxy_target("https://host/a.png").is_ok());
        assert!(validate_proxy_target("http://host/a.png").is_ok());
        assert!(validate_proxy_target("ftp://host/a.png").is_err());
        assert!(validate_proxy_target("file:///etc/passwd").is_err());
        assert!(validate_proxy_target("not a url").is_err());
    }
}
