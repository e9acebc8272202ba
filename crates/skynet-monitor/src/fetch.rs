//! Outbound content fetching: generic pages, GitHub repos, and deep blog crawls.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{MonitorError, Result};
use crate::types::ResourceType;
use crate::validation::validate_url;

const USER_AGENT: &str = "skynet-monitor/0.2";
const MAX_ARTICLES: usize = 10;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent(USER_AGENT)
        .build()
        .expect("reqwest client builder")
}

/// The GitHub REST API gets its own shorter-timeout client — 20s, matching
/// every other non-page outbound call in this crate (see `notify::send_slack_webhook`).
fn github_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(20))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent(USER_AGENT)
        .build()
        .expect("reqwest client builder")
}

/// Fetch `url` and dispatch to the right fetcher for `resource_type`.
pub async fn fetch_resource(url: &str, resource_type: ResourceType) -> Result<String> {
    validate_url(url).map_err(MonitorError::UnsafeUrl)?;

    if resource_type == ResourceType::Repo && url.contains("github.com") {
        return fetch_github_repo(url).await;
    }
    if resource_type == ResourceType::Blog {
        return fetch_blog_deep(url).await;
    }
    fetch_page(url).await
}

async fn fetch_page(url: &str) -> Result<String> {
    let resp = client().get(url).send().await.map_err(|e| MonitorError::Fetch(e.to_string()))?;
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    let body = resp.text().await.map_err(|e| MonitorError::Fetch(e.to_string()))?;

    Ok(if content_type.contains("html") {
        html_to_markdown(&body)
    } else {
        body
    })
}

fn html_to_markdown(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100)
}

/// Crawl a blog's index page, then follow up to [`MAX_ARTICLES`] article links
/// found on the same registrable domain and concatenate everything.
async fn fetch_blog_deep(url: &str) -> Result<String> {
    let index_md = fetch_page(url).await?;
    let article_urls = extract_article_links(url, &index_md);

    if article_urls.is_empty() {
        info!(%url, "no article links found on blog index");
        return Ok(index_md);
    }

    let mut parts = vec![format!("# Blog Index: {url}\n\n{index_md}\n\n---\n")];
    for article_url in article_urls.iter().take(MAX_ARTICLES) {
        match fetch_page(article_url).await {
            Ok(md) if !md.trim().is_empty() => {
                parts.push(format!("\n# Article: {article_url}\n\n{}\n\n---\n", md.trim()));
            }
            Ok(_) => {}
            Err(e) => warn!(url = %article_url, "failed to crawl article: {e}"),
        }
    }
    Ok(parts.join("\n"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)]+)\)").unwrap())
}

fn skip_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)/(tag|category|page|author|feed|wp-|legal|contact|faq|about|pricing|solution|clients|testimonial|video|industries|case-stud|fr/|de/|es/|it/|pt/)",
        )
        .unwrap()
    })
}

fn registrable_domain(url: &str) -> Option<String> {
    let without_scheme = url.split("://").nth(1)?;
    let host = without_scheme.split('/').next()?.split(':').next()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Extract candidate article links: same domain, hyphenated slug, a long
/// enough anchor text, and not matching a navigational-subpath deny-list.
fn extract_article_links(base_url: &str, index_markdown: &str) -> Vec<String> {
    let Some(base_domain) = registrable_domain(base_url) else {
        return Vec::new();
    };
    let base_trimmed = base_url.trim_end_matches('/');

    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    for caps in link_re().captures_iter(index_markdown) {
        let title = caps[1].trim();
        let href = caps[2].trim_end_matches('/');

        if !seen.insert(href.to_string()) {
            continue;
        }
        if href == base_trimmed {
            continue;
        }
        let Some(link_domain) = registrable_domain(href) else {
            continue;
        };
        if link_domain != base_domain {
            continue;
        }
        let path = href.split("://").nth(1).and_then(|r| r.find('/').map(|i| &r[i..])).unwrap_or("");
        if skip_path_re().is_match(path) {
            continue;
        }
        if title.len() < 20 {
            continue;
        }
        let slug = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        if !slug.contains('-') {
            continue;
        }
        urls.push(href.to_string());
    }
    urls
}

/// Fetch repo metadata, up to 5 recent releases, and up to 10 recent commits
/// via the GitHub REST API, formatted as a fixed markdown template.
async fn fetch_github_repo(url: &str) -> Result<String> {
    let path = url.split("github.com/").nth(1).unwrap_or("").trim_end_matches('/');
    let mut segments = path.split('/');
    let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
        return Err(MonitorError::Fetch(format!("not a github repo URL: {url}")));
    };

    let client = github_client();
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        "application/vnd.github.v3+json".parse().unwrap(),
    );
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        if let Ok(value) = format!("token {token}").parse() {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }

    let info_resp = client
        .get(format!("https://api.github.com/repos/{owner}/{repo}"))
        .headers(headers.clone())
        .send()
        .await
        .map_err(|e| MonitorError::Fetch(e.to_string()))?;

    if !info_resp.status().is_success() {
        return Ok(format!("# {owner}/{repo}\n\nFailed to fetch (HTTP {}).", info_resp.status()));
    }
    let info: serde_json::Value = info_resp.json().await.map_err(|e| MonitorError::Fetch(e.to_string()))?;

    let mut lines = vec![
        format!("# {}", info["full_name"].as_str().unwrap_or(&format!("{owner}/{repo}"))),
        String::new(),
        format!("**Description:** {}", info["description"].as_str().unwrap_or("N/A")),
        format!("**Stars:** {}", info["stargazers_count"].as_u64().unwrap_or(0)),
        format!("**Forks:** {}", info["forks_count"].as_u64().unwrap_or(0)),
        format!("**Language:** {}", info["language"].as_str().unwrap_or("N/A")),
        format!("**License:** {}", info["license"]["spdx_id"].as_str().unwrap_or("N/A")),
        format!("**Last pushed:** {}", info["pushed_at"].as_str().unwrap_or("N/A")),
        format!("**Open issues:** {}", info["open_issues_count"].as_u64().unwrap_or(0)),
        String::new(),
    ];

    if let Ok(resp) = client
        .get(format!("https://api.github.com/repos/{owner}/{repo}/releases"))
        .query(&[("per_page", "5")])
        .headers(headers.clone())
        .send()
        .await
    {
        if resp.status().is_success() {
            if let Ok(releases) = resp.json::<Vec<serde_json::Value>>().await {
                if releases.is_empty() {
                    lines.push("## Releases\nNo releases found (may use tags only).".to_string());
                } else {
                    lines.push("## Recent Releases".to_string());
                    for r in &releases {
                        let tag = r["tag_name"].as_str().unwrap_or("");
                        let name = r["name"].as_str().unwrap_or(tag);
                        let date = r["published_at"].as_str().unwrap_or("").get(..10).unwrap_or("");
                        let body = r["body"].as_str().unwrap_or("");
                        let body = body.get(..body.len().min(500)).unwrap_or(body);
                        lines.push(format!("\n### {name} ({date})"));
                        if !body.is_empty() {
                            lines.push(body.to_string());
                        }
                    }
                }
            }
        }
    }

    if let Ok(resp) = client
        .get(format!("https://api.github.com/repos/{owner}/{repo}/commits"))
        .query(&[("per_page", "10")])
        .headers(headers)
        .send()
        .await
    {
        if resp.status().is_success() {
            if let Ok(commits) = resp.json::<Vec<serde_json::Value>>().await {
                if !commits.is_empty() {
                    lines.push("\n## Recent Commits".to_string());
                    for c in &commits {
                        let sha = c["sha"].as_str().unwrap_or("").get(..7).unwrap_or("");
                        let msg = c["commit"]["message"].as_str().unwrap_or("").lines().next().unwrap_or("");
                        let date = c["commit"]["author"]["date"].as_str().unwrap_or("").get(..10).unwrap_or("");
                        lines.push(format!("- `{sha}` ({date}) {msg}"));
                    }
                }
            }
        }
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_converts_to_readable_text() {
        let html = "<html><body><h1>Hello</h1><p>World</p></body></html>";
        let text = html_to_markdown(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
    }

    #[test]
    fn extracts_same_domain_article_links() {
        let index = "[A Long Enough Article Title](https://blog.example.com/posts/my-article-title) \
                     [Short](https://blog.example.com/posts/x) \
                     [Pricing Page With Words](https://blog.example.com/pricing/enterprise-plan) \
                     [External Long Enough Title](https://other.com/posts/something-else)";
        let links = extract_article_links("https://blog.example.com", index);
        assert_eq!(links, vec!["https://blog.example.com/posts/my-article-title"]);
    }

    #[test]
    fn registrable_domain_strips_www() {
        assert_eq!(registrable_domain("https://www.example.com/path").as_deref(), Some("example.com"));
        assert_eq!(registrable_domain("https://example.com").as_deref(), Some("example.com"));
    }
}
