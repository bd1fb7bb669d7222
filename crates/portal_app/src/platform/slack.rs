//! Forwards warnings and errors to a Slack channel.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use simplelog::{Config, SharedLogger};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub token: String,
    /// Messages go to `#<service_name>`.
    pub service_name: String,
}

impl SlackSettings {
    pub fn channel(&self) -> String {
        format!("#{}", self.service_name)
    }
}

/// Text posted for one record: emoji, bold level, then the message.
pub fn format_message(level: Level, target: &str, message: &str) -> String {
    let emoji = if level == Level::Warn { "⚠️" } else { "🔴" };
    format!("{emoji} *{level}*: {target} - {message}")
}

/// `SharedLogger` posting `Warn` and above from a background thread.
///
/// Delivery failures are dropped; logging never blocks on the network.
pub struct SlackLogger {
    tx: Sender<String>,
    config: Config,
}

impl SlackLogger {
    pub fn new(settings: SlackSettings) -> std::io::Result<Box<Self>> {
        let (tx, rx) = mpsc::channel::<String>();
        let channel = settings.channel();
        let token = settings.token;

        thread::Builder::new()
            .name("slack-log".to_string())
            .spawn(move || {
                let client = match reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                {
                    Ok(client) => client,
                    Err(err) => {
                        eprintln!("Warning: Slack logging disabled: {err}");
                        return;
                    }
                };
                for text in rx {
                    let _ = client
                        .post(POST_MESSAGE_URL)
                        .bearer_auth(&token)
                        .json(&json!({ "channel": channel, "text": text }))
                        .send();
                }
            })?;

        Ok(Box::new(Self {
            tx,
            config: super::logging::build_config(),
        }))
    }
}

impl Log for SlackLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let text = format_message(record.level(), record.target(), &record.args().to_string());
            let _ = self.tx.send(text);
        }
    }

    fn flush(&self) {}
}

impl SharedLogger for SlackLogger {
    fn level(&self) -> LevelFilter {
        LevelFilter::Warn
    }

    fn config(&self) -> Option<&Config> {
        Some(&self.config)
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_and_errors_get_distinct_prefixes() {
        assert_eq!(
            format_message(Level::Warn, "source_watcher", "Folder exists"),
            "⚠️ *WARN*: source_watcher - Folder exists"
        );
        assert!(format_message(Level::Error, "t", "boom").starts_with("🔴 *ERROR*"));
    }

    #[test]
    fn channel_is_derived_from_service_name() {
        let settings = SlackSettings {
            token: "xoxb".to_string(),
            service_name: "owncloud-folder-service".to_string(),
        };
        assert_eq!(settings.channel(), "#owncloud-folder-service");
    }
}
