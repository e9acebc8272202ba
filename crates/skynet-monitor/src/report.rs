//! Market-intelligence report synthesis over a scope of entities/resources.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::delegate::MonitorDelegate;
use crate::digest;
use crate::entity;
use crate::error::Result;
use crate::momentum::{self, ResourceSignal};
use crate::resource;
use crate::snapshot;
use crate::topic;
use crate::types::{MonitorEntity, ResourceType};

const MAX_DATA_CHARS: usize = 80_000;
const EXCERPT_LADDER: [usize; 4] = [1200, 800, 500, 300];
const PREVIOUS_REPORT_CHARS: usize = 3000;

fn clip_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Filesystem-safe slug for a topic/report name: lowercased, spaces to underscores.
pub fn report_slug(topic_display: &str) -> String {
    topic_display.to_lowercase().replace(' ', "_")
}

fn resource_block(name: &str, resource_type: &str, url: &str, content: &str, digest_summary: Option<&str>, excerpt_limit: usize) -> String {
    match digest_summary {
        Some(summary) if !summary.is_empty() => format!(
            "### {name} ({resource_type}) — {url}\n**AI Summary:** {summary}\n\n**Raw excerpt:**\n{}\n",
            clip_chars(content, excerpt_limit)
        ),
        _ => format!("### {name} ({resource_type}) — {url}\n{}\n", clip_chars(content, excerpt_limit)),
    }
}

struct EntityBlockSource {
    entity: MonitorEntity,
    resources: Vec<(String, ResourceType, String, String, Option<String>)>, // name, type, url, content, digest
}

fn build_sections(sources: &[EntityBlockSource], excerpt_limit: usize) -> String {
    let mut sections = Vec::new();
    for src in sources {
        let mut header = format!("## {}", src.entity.name);
        if !src.entity.url.is_empty() {
            header.push_str(&format!(" ({})", src.entity.url));
        }
        let body: Vec<String> = src
            .resources
            .iter()
            .map(|(name, rtype, url, content, digest_summary)| {
                resource_block(name, rtype.as_str(), url, content, digest_summary.as_deref(), excerpt_limit)
            })
            .collect();
        sections.push(format!("{header}\n{}", body.join("\n")));
    }
    sections.join("\n---\n")
}

fn report_prompt(topic_display: &str, entity_count: usize, momentum_section: &str, all_data: &str, change_tracking: &str) -> String {
    format!(
        "You are a market intelligence analyst. Below is scraped content from {entity_count} \
         companies in the '{topic_display}' space — their websites, blogs, pricing pages, and \
         GitHub repositories.\n\n\
         Write a comprehensive market intelligence report in markdown. Include:\n\n\
         1. **Executive Summary** — 3-5 bullet points of the most important findings\n\
         2. **Key Highlights & Recent News** — for each notable blog post, release, or \
         announcement, write a short paragraph (2-3 sentences) explaining what was published, \
         the key insight, and why it matters competitively. Group by company. Include source \
         URLs as markdown links. If a previous report is provided below, prefix genuinely new \
         findings with **[NEW]**.\n\
         3. **Momentum & Activity Rankings** — rank ALL companies by activity level using the \
         momentum scores provided below, as a table with columns: Company, Score, GitHub Stars, \
         Recent Releases, Blog Activity, Verdict.\n\
         4. **Pricing Landscape** — a markdown table comparing pricing models, tiers, free \
         plans. Link each company name to their pricing page URL.\n\
         5. **Company Profiles** — for each company, 2-4 sentences covering what they do, \
         recent activity, pricing model, and anything notable. Link the company name to their \
         main website.\n\
         6. **Open Source Landscape** — compare GitHub repos by stars, commit activity, release \
         cadence, language, and license.\n\
         7. **Competitive Gap Analysis** — compare capabilities across the major competitor \
         categories represented above.\n\
         8. **Market Observations** — trends, patterns, competitive dynamics.\n\
         9. **Action Items & Product Opportunities** — 5-10 specific, concrete recommendations, \
         sorted by priority (High, then Medium, then Low).\n\n\
         Every fact must link back to its source URL from the raw data. Be specific: extract \
         actual facts, numbers, dates, product names. Skip companies whose content is empty or \
         just a 404 page. Write in a professional but concise style.\n\n\
         --- MOMENTUM SCORES ---\n\n{momentum_section}\n\n\
         --- RAW DATA ---\n\n{all_data}{change_tracking}"
    )
}

/// Assemble a market-intelligence report over `topic_name` (or every topic if
/// `None`), call the Agent to write it up, and persist it to
/// `<reports_dir>/<slug>.md`.
pub async fn generate_report(
    conn: &Connection,
    delegate: &Arc<dyn MonitorDelegate>,
    reports_dir: &std::path::Path,
    topic_name: Option<&str>,
) -> Result<String> {
    let (topic_id, topic_display) = match topic_name {
        Some(name) => match topic::get_by_name(conn, name)? {
            Some(t) => (Some(t.id), t.name),
            None => return Ok(format!("Topic '{name}' not found.")),
        },
        None => {
            let topics = topic::list(conn)?;
            let display = if topics.is_empty() { "All Topics".to_string() } else { topics.iter().map(|t| t.name.clone()).collect::<Vec<_>>().join(", ") };
            (None, display)
        }
    };

    let entities = entity::list(conn, topic_id)?;
    let entity_map: HashMap<i64, MonitorEntity> = entities.into_iter().map(|e| (e.id, e)).collect();
    let resources = resource::list(conn, topic_id, None, true)?;
    if resources.is_empty() {
        return Ok("No resources to report on.".to_string());
    }

    let digest_by_resource = digest::latest_by_resource(conn, topic_id)?;

    let mut by_entity: HashMap<i64, Vec<(String, ResourceType, String, String, Option<String>)>> = HashMap::new();
    for res in &resources {
        let Some(snap) = snapshot::latest(conn, res.id)? else { continue };
        if snap.content_markdown.trim().is_empty() {
            continue;
        }
        let digest_summary = digest_by_resource.get(&res.id).cloned();
        by_entity.entry(res.entity_id).or_default().push((
            res.name.clone(),
            res.resource_type,
            res.url.clone(),
            snap.content_markdown,
            digest_summary,
        ));
    }

    let mut sorted_eids: Vec<i64> = by_entity.keys().copied().collect();
    sorted_eids.sort_by_key(|id| entity_map.get(id).map(|e| e.name.clone()).unwrap_or_default());

    let sources: Vec<EntityBlockSource> = sorted_eids
        .iter()
        .filter_map(|eid| entity_map.get(eid).map(|e| EntityBlockSource { entity: e.clone(), resources: by_entity[eid].clone() }))
        .collect();

    let mut all_data = build_sections(&sources, usize::MAX);
    if all_data.len() > MAX_DATA_CHARS {
        for &limit in &EXCERPT_LADDER {
            all_data = build_sections(&sources, limit);
            if all_data.len() <= MAX_DATA_CHARS {
                break;
            }
        }
    }

    let mut momentum_lines = Vec::new();
    for src in &sources {
        let signals: Vec<ResourceSignal> = src
            .resources
            .iter()
            .map(|(_, rtype, _, content, digest_summary)| ResourceSignal {
                resource_type: *rtype,
                content,
                digest_summary: digest_summary.as_deref().unwrap_or(""),
            })
            .collect();
        let metrics = momentum::compute(&signals);
        let label = if metrics.score >= 60 { "High" } else if metrics.score >= 30 { "Medium" } else { "Low" };
        let mut parts = vec![format!("**{}**: {label} ({}/100)", src.entity.name, metrics.score)];
        if metrics.github_stars > 0 {
            parts.push(format!("{} stars", metrics.github_stars));
        }
        if metrics.recent_commits > 0 {
            parts.push(format!("{} recent commits", metrics.recent_commits));
        }
        if let Some(latest) = metrics.releases.first() {
            parts.push(format!("latest release: {} ({})", latest.name, latest.date));
        }
        momentum_lines.push(parts.join(" | "));
    }
    let momentum_section = momentum_lines.join("\n");

    let slug = report_slug(&topic_display);
    let report_path = reports_dir.join(format!("{slug}.md"));
    let previous_report = std::fs::read_to_string(&report_path).ok();
    let change_tracking = match &previous_report {
        Some(prev) if prev.len() > 500 => format!(
            "\n\n--- PREVIOUS REPORT (for change tracking) ---\n\
             Compare against this previous report. In section 2, clearly mark NEW findings that \
             were NOT in the previous report with a '[NEW]' prefix.\n\n\
             {}\n[... previous report truncated ...]\n",
            clip_chars(prev, PREVIOUS_REPORT_CHARS)
        ),
        _ => String::new(),
    };

    let prompt = report_prompt(&topic_display, sources.len(), &momentum_section, &all_data, &change_tracking);

    let report = match delegate.ask_agent("monitor:report", &prompt).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(topic = %topic_display, "report generation failed: {e}");
            return Ok("Report generation failed. Check logs.".to_string());
        }
    };

    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    match std::fs::write(&report_path, &report) {
        Ok(()) => info!(path = %report_path.display(), chars = report.len(), "saved report"),
        Err(e) => warn!(path = %report_path.display(), "failed to save report: {e}"),
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_normalizes_topic_name() {
        assert_eq!(report_slug("Logistics Tech"), "logistics_tech");
    }

    #[test]
    fn resource_block_includes_digest_when_present() {
        let block = resource_block("Blog", "blog", "https://x.com", "content here", Some("a summary"), 100);
        assert!(block.contains("**AI Summary:** a summary"));
        assert!(block.contains("content here"));
    }

    #[test]
    fn resource_block_without_digest_is_raw() {
        let block = resource_block("Repo", "repo", "https://x.com", "content here", None, 100);
        assert!(!block.contains("AI Summary"));
    }
}
