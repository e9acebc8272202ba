//! Per-resource fetch/diff/snapshot cycle and change summarization.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use sha2::{Digest as _, Sha256};
use tracing::{info, warn};

use crate::delegate::MonitorDelegate;
use crate::digest;
use crate::entity;
use crate::error::Result;
use crate::fetch;
use crate::resource;
use crate::snapshot;
use crate::types::{ChangeType, MonitorDigest, MonitorResource};

pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct CheckOutcome {
    pub resource_id: i64,
    pub snapshot_id: i64,
    pub is_baseline: bool,
    pub has_changes: bool,
}

/// Fetch a resource, diff it against the latest snapshot, and write a new
/// snapshot unconditionally. Fetch failures are logged and skipped — no
/// snapshot is written.
pub async fn check_resource(conn: &Connection, resource: &MonitorResource) -> Result<Option<CheckOutcome>> {
    let markdown = match fetch::fetch_resource(&resource.url, resource.resource_type).await {
        Ok(md) => md,
        Err(e) => {
            warn!(resource_id = resource.id, url = %resource.url, "fetch failed: {e}");
            return Ok(None);
        }
    };

    let content_hash = compute_content_hash(&markdown);
    let previous = snapshot::latest(conn, resource.id)?;
    let is_baseline = previous.is_none();
    let has_changes = previous.as_ref().is_some_and(|p| p.content_hash != content_hash);

    let snap = snapshot::insert(conn, resource.id, &content_hash, &markdown, has_changes)?;
    resource::mark_checked(conn, resource.id, &Utc::now().to_rfc3339(), has_changes)?;

    Ok(Some(CheckOutcome { resource_id: resource.id, snapshot_id: snap.id, is_baseline, has_changes }))
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_summary_json(raw: &str) -> Option<(String, Option<String>)> {
    let cleaned = strip_code_fence(raw);
    let value: serde_json::Value = serde_json::from_str(cleaned).ok()?;
    let summary = value.get("summary")?.as_str()?.to_string();
    let change_type = value.get("change_type").and_then(|v| v.as_str()).map(str::to_string);
    Some((summary, change_type))
}

fn clip_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

fn baseline_prompt(content_markdown: &str, resource_name: &str, resource_type: &str, entity_name: &str) -> String {
    format!(
        "You are analyzing a scraped {resource_type} page for '{entity_name}' ({resource_name}).\n\n\
         Extract the most important SPECIFIC facts from this content:\n\
         - Recent blog post titles with dates\n\
         - Product announcements and feature launches\n\
         - Pricing details (exact numbers, tiers, free plans)\n\
         - Job openings or hiring signals\n\
         - Partnerships, funding, acquisitions\n\n\
         Write 2-4 sentences with concrete details — names, dates, numbers. \
         Do NOT describe what the page is. Only state actual facts found in the content.\n\n\
         Respond with ONLY valid JSON, no markdown fences:\n\
         {{\"summary\": \"...\"}}\n\n\
         --- CONTENT ---\n{}",
        clip_chars(content_markdown, 8000)
    )
}

fn change_prompt(resource_name: &str, resource_type: &str, previous_markdown: &str, new_markdown: &str) -> String {
    format!(
        "Compare the OLD and NEW versions of the page '{resource_name}' (type: {resource_type}). \
         Summarize what changed in 1-2 sentences.\n\n\
         Classify the change_type as ONE of: new_post, price_change, new_release, new_job, new_deal, \
         content_update, new_feature.\n\n\
         Respond with ONLY valid JSON, no markdown fences:\n\
         {{\"summary\": \"...\", \"change_type\": \"...\"}}\n\n\
         --- OLD ---\n{}\n\n--- NEW ---\n{}",
        clip_chars(previous_markdown, 3000),
        clip_chars(new_markdown, 3000),
    )
}

/// Run a monitor sweep over every enabled resource in scope, summarizing any
/// change through the Agent and recording a digest. Baseline checks (first
/// snapshot ever) don't produce a digest here — see [`run_baseline_digests`].
pub async fn run_check(
    conn: &Connection,
    delegate: &Arc<dyn MonitorDelegate>,
    resources: &[MonitorResource],
) -> Result<Vec<MonitorDigest>> {
    let mut digests = Vec::new();

    for resource in resources {
        let Some(outcome) = check_resource(conn, resource).await? else { continue };
        if outcome.is_baseline || !outcome.has_changes {
            continue;
        }

        let snaps = snapshot::recent(conn, resource.id, 2)?;
        if snaps.len() < 2 {
            continue;
        }
        let (new_snap, prev_snap) = (&snaps[0], &snaps[1]);

        let prompt = change_prompt(&resource.name, resource.resource_type.as_str(), &prev_snap.content_markdown, &new_snap.content_markdown);
        let response = match delegate.ask_agent("monitor:summarize", &prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!(resource_id = resource.id, "change summarization failed: {e}");
                continue;
            }
        };
        let Some((summary, change_type)) = parse_summary_json(&response) else {
            warn!(resource_id = resource.id, "could not parse change summary JSON");
            continue;
        };
        let change_type = change_type.and_then(|s| s.parse().ok()).unwrap_or(ChangeType::ContentUpdate);

        let d = digest::insert(conn, resource.topic_id, resource.entity_id, resource.id, outcome.snapshot_id, &summary, change_type)?;
        info!(resource_id = resource.id, change_type = change_type.as_str(), "recorded digest");
        digests.push(d);
    }

    Ok(digests)
}

/// For every latest snapshot that has no digest yet, ask the Agent to
/// summarize its baseline state and record a `baseline` digest.
pub async fn run_baseline_digests(
    conn: &Connection,
    delegate: &Arc<dyn MonitorDelegate>,
    resources: &[MonitorResource],
) -> Result<Vec<MonitorDigest>> {
    let mut digests = Vec::new();

    for resource in resources {
        let Some(latest) = snapshot::latest(conn, resource.id)? else { continue };
        if digest::exists_for_snapshot(conn, latest.id)? {
            continue;
        }
        let entity_name = entity::get(conn, resource.entity_id)?.map(|e| e.name).unwrap_or_else(|| "Unknown".to_string());

        let (summary, change_type) = if latest.content_markdown.trim().is_empty() {
            ("Page returned empty content.".to_string(), ChangeType::Baseline)
        } else {
            let prompt = baseline_prompt(&latest.content_markdown, &resource.name, resource.resource_type.as_str(), &entity_name);
            match delegate.ask_agent("monitor:baseline", &prompt).await {
                Ok(response) => match parse_summary_json(&response) {
                    Some((summary, _)) => (summary, ChangeType::Baseline),
                    None => {
                        warn!(resource_id = resource.id, "could not parse baseline summary JSON");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(resource_id = resource.id, "baseline summarization failed: {e}");
                    continue;
                }
            }
        };

        let d = digest::insert(conn, resource.topic_id, resource.entity_id, resource.id, latest.id, &summary, change_type)?;
        digests.push(d);
    }

    Ok(digests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(compute_content_hash("hello"), compute_content_hash("hello"));
        assert_ne!(compute_content_hash("hello"), compute_content_hash("world"));
    }

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(strip_code_fence(raw), "{\"summary\": \"ok\"}");
    }

    #[test]
    fn parses_summary_with_change_type() {
        let raw = "{\"summary\": \"price dropped\", \"change_type\": \"price_change\"}";
        let (summary, change_type) = parse_summary_json(raw).unwrap();
        assert_eq!(summary, "price dropped");
        assert_eq!(change_type.as_deref(), Some("price_change"));
    }
}
