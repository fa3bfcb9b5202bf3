//! Outbound match-result notifications.
//!
//! One HTTP POST per finished match to a configured webhook, carrying the
//! result, stage time, and the running win/loss tally, with the window
//! screenshot attached when capture succeeded. Failures are logged and
//! swallowed; notification must never abort a run.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

/// Bound on how long a notification may hold up the worker thread.
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct StageReport {
    pub victory: bool,
    pub stage_seconds: u64,
    pub wins: u32,
    pub losses: u32,
    pub mode: String,
    pub location: String,
    pub act: String,
}

/// Formats elapsed stage time as "3m 42s" (or "42s" under a minute).
pub fn format_stage_time(seconds: u64) -> String {
    let minutes = seconds / 60;
    let rest = seconds % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, rest)
    } else {
        format!("{}s", rest)
    }
}

fn build_embed(report: &StageReport, with_screenshot: bool) -> serde_json::Value {
    let total = report.wins + report.losses;
    let win_rate = if total > 0 {
        (report.wins as f64 / total as f64 * 100.0).round() as u32
    } else {
        0
    };

    let (title, color) = if report.victory {
        ("Victory!", 0x4ADE80)
    } else {
        ("Defeat!", 0xEF4444)
    };

    let mut embed = serde_json::json!({
        "title": title,
        "description": format!("**{}** - {} ({})", report.mode, report.location, report.act),
        "color": color,
        "fields": [
            {"name": "Stage Time", "value": format_stage_time(report.stage_seconds), "inline": true},
            {"name": "Wins", "value": report.wins.to_string(), "inline": true},
            {"name": "Losses", "value": report.losses.to_string(), "inline": true},
            {"name": "Win Rate", "value": format!("{}%", win_rate), "inline": true}
        ],
        "footer": {"text": "paradox-macro"}
    });
    if with_screenshot {
        embed["image"] = serde_json::json!({"url": "attachment://screenshot.png"});
    }
    serde_json::json!({ "embeds": [embed] })
}

pub struct Notifier {
    client: reqwest::blocking::Client,
}

impl Notifier {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self { client }
    }

    /// Posts the report. A blank URL disables notification entirely.
    pub fn send(&self, webhook_url: &str, report: &StageReport, screenshot_png: Option<Vec<u8>>) {
        if webhook_url.is_empty() {
            return;
        }

        let result = match screenshot_png {
            Some(png) => {
                let payload = build_embed(report, true);
                let form = Form::new()
                    .text("payload_json", payload.to_string())
                    .part(
                        "files[0]",
                        Part::bytes(png)
                            .file_name("screenshot.png")
                            .mime_str("image/png")
                            .expect("static mime type"),
                    );
                self.client.post(webhook_url).multipart(form).send()
            }
            None => {
                let payload = build_embed(report, false);
                self.client.post(webhook_url).json(&payload).send()
            }
        };

        match result {
            Ok(response) if response.status().is_success() => {
                log::info!("Webhook sent: {}", if report.victory { "victory" } else { "defeat" });
            }
            Ok(response) => {
                log::warn!("Webhook rejected: HTTP {}", response.status());
            }
            Err(e) => {
                log::warn!("Webhook error: {}", e);
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> StageReport {
        StageReport {
            victory: true,
            stage_seconds: 222,
            wins: 3,
            losses: 1,
            mode: "Story".into(),
            location: "Leaf Village".into(),
            act: "Act 1".into(),
        }
    }

    #[test]
    fn stage_time_formatting() {
        assert_eq!(format_stage_time(42), "42s");
        assert_eq!(format_stage_time(60), "1m 0s");
        assert_eq!(format_stage_time(222), "3m 42s");
    }

    #[test]
    fn embed_carries_result_and_tally() {
        let embed = build_embed(&report(), false);
        let first = &embed["embeds"][0];
        assert_eq!(first["title"], "Victory!");
        assert_eq!(first["color"], 0x4ADE80);
        assert_eq!(first["fields"][0]["value"], "3m 42s");
        assert_eq!(first["fields"][3]["value"], "75%");
        assert!(first.get("image").is_none());
    }

    #[test]
    fn screenshot_adds_attachment_reference() {
        let embed = build_embed(&report(), true);
        assert_eq!(
            embed["embeds"][0]["image"]["url"],
            "attachment://screenshot.png"
        );
    }

    #[test]
    fn defeat_uses_the_red_color() {
        let mut r = report();
        r.victory = false;
        let embed = build_embed(&r, false);
        assert_eq!(embed["embeds"][0]["title"], "Defeat!");
        assert_eq!(embed["embeds"][0]["color"], 0xEF4444);
    }

    #[test]
    fn zero_games_has_zero_win_rate() {
        let mut r = report();
        r.wins = 0;
        r.losses = 0;
        let embed = build_embed(&r, false);
        assert_eq!(embed["embeds"][0]["fields"][3]["value"], "0%");
    }
}
