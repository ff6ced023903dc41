/// Normalize an incomplete URL by adding a missing protocol and handling
/// common shorthand
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    // Already has a protocol
    if trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("file://")
        || trimmed.starts_with("data:")
        || trimmed.starts_with("about:")
        || trimmed.starts_with("chrome://")
        || trimmed.starts_with("chrome-extension://")
    {
        return trimmed.to_string();
    }

    // Relative paths pass through untouched
    if trimmed.starts_with('/') || trimmed.starts_with("./") || trimmed.starts_with("../") {
        return trimmed.to_string();
    }

    // Local development servers speak plain http
    if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        return format!("http://{}", trimmed);
    }

    // Looks like a domain
    if trimmed.contains('.') {
        return format!("https://{}", trimmed);
    }

    // Single word: assume a .com domain ("google" -> "https://www.google.com")
    format!("https://www.{}.com", trimmed)
}
