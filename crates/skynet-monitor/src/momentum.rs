//! Simple regex-based activity scoring for an entity's momentum in reports.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{MomentumMetrics, ReleaseInfo, ResourceType};

fn stars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*Stars:\*\*\s*([\d,]+)").unwrap())
}

fn release_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"###\s+(.+?)\s+\((\d{4}-\d{2}-\d{2})\)").unwrap())
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(20\d{2}[-/]\d{1,2}[-/]\d{1,2})\b").unwrap())
}

fn long_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+20\d{2}\b",
        )
        .unwrap()
    })
}

/// One resource's contribution to an entity's momentum: latest snapshot
/// content, its resource type, and the most recent digest summary (used for
/// blog publication-date extraction).
pub struct ResourceSignal<'a> {
    pub resource_type: ResourceType,
    pub content: &'a str,
    pub digest_summary: &'a str,
}

pub fn compute(signals: &[ResourceSignal]) -> MomentumMetrics {
    let mut metrics = MomentumMetrics::default();
    let mut blog_dates = Vec::new();

    for signal in signals {
        if signal.content.trim().is_empty() {
            continue;
        }
        match signal.resource_type {
            ResourceType::Repo => {
                if let Some(caps) = stars_re().captures(signal.content) {
                    if let Ok(stars) = caps[1].replace(',', "").parse::<u64>() {
                        metrics.github_stars += stars;
                    }
                }
                metrics.recent_commits += signal.content.matches("- `").count() as u64;
                for caps in release_re().captures_iter(signal.content) {
                    metrics.releases.push(ReleaseInfo { name: caps[1].to_string(), date: caps[2].to_string() });
                }
            }
            ResourceType::Blog => {
                for caps in iso_date_re().captures_iter(signal.digest_summary) {
                    blog_dates.push(caps[1].to_string());
                }
                for m in long_date_re().find_iter(signal.digest_summary) {
                    blog_dates.push(m.as_str().to_string());
                }
            }
            _ => {}
        }
    }

    let mut score: u32 = 0;
    if metrics.github_stars > 1000 {
        score += 20;
    } else if metrics.github_stars > 100 {
        score += 10;
    }
    if metrics.recent_commits >= 10 {
        score += 25;
    } else if metrics.recent_commits >= 5 {
        score += 15;
    }
    if metrics.releases.len() >= 3 {
        score += 25;
    } else if !metrics.releases.is_empty() {
        score += 15;
    }
    if !blog_dates.is_empty() {
        score += 20;
    }
    if metrics.releases.iter().any(|r| r.date.starts_with("2026")) {
        score += 10;
    }

    blog_dates.truncate(5);
    metrics.blog_dates = blog_dates;
    metrics.score = score.min(100);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_active_repo_highly() {
        let content = "**Stars:** 5,000\n- `a1b2c3d` (2026-01-01) fix\n- `e4f5g6h` (2026-01-02) feat\n\
                        ### v1.2.0 (2026-01-03)\n### v1.1.0 (2026-01-01)\n### v1.0.0 (2025-12-01)";
        let signals = [ResourceSignal { resource_type: ResourceType::Repo, content, digest_summary: "" }];
        let metrics = compute(&signals);
        assert_eq!(metrics.github_stars, 5000);
        assert!(metrics.score >= 60);
    }

    #[test]
    fn quiet_resource_scores_zero() {
        let signals = [ResourceSignal { resource_type: ResourceType::Blog, content: "nothing here", digest_summary: "" }];
        assert_eq!(compute(&signals).score, 0);
    }
}
