use regex::Regex;
use std::sync::LazyLock;

static REPO_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<h[12][^>]*>.*?href="/([^"/?#\s]+/[^"/?#\s]+)""#).expect("invalid regex"));

static DESCRIPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<p[^>]*>(.*?)</p>").expect("invalid regex"));

static LANGUAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"itemprop="programmingLanguage"[^>]*>([^<]*)<"#).expect("invalid regex"));

static STARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<a[^>]*href="/[^"]+/stargazers"[^>]*>(.*?)</a>"#).expect("invalid regex"));

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("invalid regex"));

/// One entry of a trending page, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    /// The `owner/name` path as it appears in the page.
    pub identity: String,
    pub description: Option<String>,
    pub language: Option<String>,

    /// The star count as rendered, such as `1,234` or `1.2k`.
    pub star_text: String,
}

/// Turns a listing page into raw entries.
pub trait ListingParser: Send + Sync + core::fmt::Debug {
    fn parse(&self, html: &str) -> Vec<RawListing>;
}

/// Parser for GitHub's trending page markup.
///
/// Entries are `<article>` blocks; the repository link is the first link inside the heading,
/// the description is the first paragraph, and the star count is the text of the link to
/// the stargazers page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlListingParser;

impl ListingParser for HtmlListingParser {
    fn parse(&self, html: &str) -> Vec<RawListing> {
        html.split("<article")
            .skip(1)
            .filter_map(|chunk| {
                let article = chunk.split("</article>").next().unwrap_or(chunk);
                parse_article(article)
            })
            .collect()
    }
}

fn parse_article(article: &str) -> Option<RawListing> {
    let identity = REPO_LINK_REGEX.captures(article)?.get(1)?.as_str().to_string();

    let description = DESCRIPTION_REGEX
        .captures(article)
        .and_then(|c| c.get(1))
        .map(|m| text_content(m.as_str()))
        .filter(|s| !s.is_empty());

    let language = LANGUAGE_REGEX
        .captures(article)
        .and_then(|c| c.get(1))
        .map(|m| text_content(m.as_str()))
        .filter(|s| !s.is_empty());

    let star_text = STARS_REGEX
        .captures(article)
        .and_then(|c| c.get(1))
        .map(|m| text_content(m.as_str()))
        .unwrap_or_default();

    Some(RawListing {
        identity,
        description,
        language,
        star_text,
    })
}

/// Strip tags, decode the common entities, and collapse whitespace.
fn text_content(fragment: &str) -> String {
    let stripped = TAG_REGEX.replace_all(fragment, " ");
    let decoded = stripped
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
