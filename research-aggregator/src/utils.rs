/// Text normalization for content pulled off feeds and APIs
pub mod text {
    use scraper::{Html, Selector};

    /// Visible text of an HTML fragment, entities decoded.
    pub fn strip_html(html: &str) -> String {
        if !html.contains('<') && !html.contains('&') {
            return html.to_string();
        }
        let fragment = Html::parse_fragment(html);
        fragment.root_element().text().collect::<Vec<_>>().join(" ")
    }

    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// HTML-stripped, whitespace-collapsed text.
    pub fn clean(html: &str) -> String {
        collapse_whitespace(&strip_html(html))
    }

    /// Truncates on a character boundary.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => text[..idx].to_string(),
            None => text.to_string(),
        }
    }

    /// `src` of the first `<img>` in an HTML fragment.
    pub fn first_image_src(html: &str) -> Option<String> {
        if !html.contains("<img") {
            return None;
        }
        let selector = Selector::parse("img[src]").ok()?;
        let fragment = Html::parse_fragment(html);
        fragment
            .select(&selector)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| super::url::is_http_url(src))
            .map(str::to_string)
    }

    pub fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
        haystack.to_lowercase().contains(needle_lower)
    }
}

pub mod url {
    use url::Url;

    pub fn is_http_url(url_str: &str) -> bool {
        Url::parse(url_str)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false)
    }

    pub fn extract_host(url_str: &str) -> Option<String> {
        Url::parse(url_str)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

pub mod time {
    use std::time::Duration;

    /// `H:MM:SS` for an hour or longer, `M:SS` otherwise.
    pub fn format_duration(duration: Duration) -> String {
        let total = duration.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }
}
