//! Post-sweep subscriber notification: Slack via direct webhook POST,
//! Telegram surfaced to the delegate for delivery.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::delegate::MonitorDelegate;
use crate::error::Result;
use crate::subscriber;
use crate::types::{ChannelType, MonitorDigest};

fn format_digest_message(digests: &[&MonitorDigest], run_label: &str) -> String {
    if digests.is_empty() {
        return format!("\u{1F50D} {run_label}: No changes detected.");
    }
    let mut lines = vec![format!("\u{1F50D} {run_label}: {} change(s) found\n", digests.len())];
    for d in digests {
        lines.push(format!("{} <b>{}</b>: {}", d.change_type.icon(), d.resource_id, d.summary));
    }
    lines.join("\n")
}

async fn send_slack_webhook(webhook_url: &str, message: &str) {
    let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build();
    let Ok(client) = client else { return };
    if let Err(e) = client.post(webhook_url).json(&serde_json::json!({ "text": message })).send().await {
        warn!("slack webhook post failed: {e}");
    }
}

/// Group `digests` by topic, load each topic's enabled subscribers, and
/// deliver a formatted notification: Slack subscribers get a direct webhook
/// POST, Telegram subscribers go through `delegate.deliver_telegram`.
pub async fn notify_subscribers(
    conn: &rusqlite::Connection,
    delegate: &Arc<dyn MonitorDelegate>,
    digests: &[MonitorDigest],
    run_label: &str,
) -> Result<()> {
    if digests.is_empty() {
        return Ok(());
    }

    let mut by_topic: HashMap<i64, Vec<&MonitorDigest>> = HashMap::new();
    for d in digests {
        by_topic.entry(d.topic_id).or_default().push(d);
    }

    for (topic_id, topic_digests) in by_topic {
        let entity_ids: Vec<i64> = topic_digests.iter().map(|d| d.entity_id).collect();
        let resource_ids: Vec<i64> = topic_digests.iter().map(|d| d.resource_id).collect();
        let subscribers = subscriber::enabled_for_topic(conn, topic_id, &entity_ids, &resource_ids)?;
        if subscribers.is_empty() {
            continue;
        }

        let message = format_digest_message(&topic_digests, run_label);

        for sub in &subscribers {
            match sub.channel_type {
                ChannelType::Slack => {
                    let webhook_url = sub.channel_config.get("webhook_url").and_then(|v| v.as_str()).unwrap_or("");
                    if webhook_url.is_empty() {
                        continue;
                    }
                    send_slack_webhook(webhook_url, &message).await;
                    info!(subscriber_id = sub.id, "sent slack notification");
                }
                ChannelType::Telegram => {
                    delegate.deliver_telegram(&sub.channel_config, &message).await;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeType;

    fn digest(topic_id: i64, summary: &str) -> MonitorDigest {
        MonitorDigest {
            id: 1,
            topic_id,
            entity_id: 1,
            resource_id: 1,
            snapshot_id: 1,
            summary: summary.to_string(),
            change_type: ChangeType::NewPost,
            created_at: "now".to_string(),
        }
    }

    #[test]
    fn empty_digests_say_no_changes() {
        let msg = format_digest_message(&[], "Check");
        assert!(msg.contains("No changes detected"));
    }

    #[test]
    fn formats_digest_count_and_summary() {
        let d = digest(1, "price dropped 10%");
        let msg = format_digest_message(&[&d], "Sweep");
        assert!(msg.contains("1 change(s) found"));
        assert!(msg.contains("price dropped 10%"));
    }
}
