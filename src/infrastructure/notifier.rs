use chrono::Utc;
use chrono_tz::Tz;
use teloxide::prelude::*;

use crate::{
    config::NotifierConfig,
    domain::{ReportEvent, ReportKind},
};

/// One-way sink for pipeline events.
pub trait Reporter: Send + Sync {
    fn report(&self, event: ReportEvent);
}

/// Logs every event and mirrors success/error events to a Telegram chat
/// when one is configured.
pub struct Notifier {
    telegram: Option<TelegramSink>,
    timezone: Tz,
}

struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl Notifier {
    pub fn new(config: &NotifierConfig) -> Self {
        let telegram = match (&config.telegram_bot_token, config.chat_id) {
            (Some(token), Some(chat_id)) if chat_id != 0 => Some(TelegramSink {
                bot: Bot::new(token),
                chat_id: ChatId(chat_id),
            }),
            _ => None,
        };
        let timezone = config.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                target: "report",
                timezone = %config.timezone,
                "unknown timezone; using UTC"
            );
            chrono_tz::UTC
        });
        Self { telegram, timezone }
    }

    pub fn is_mirroring(&self) -> bool {
        self.telegram.is_some()
    }

    fn format_message(&self, event: &ReportEvent) -> String {
        let now = Utc::now().with_timezone(&self.timezone);
        format_event(event, &now.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

impl Reporter for Notifier {
    fn report(&self, event: ReportEvent) {
        match event.kind {
            ReportKind::Error => tracing::warn!(target: "report", kind = %event.kind, "{}", event.message),
            _ => tracing::info!(target: "report", kind = %event.kind, "{}", event.message),
        }

        if event.kind == ReportKind::Info {
            return;
        }
        let Some(sink) = &self.telegram else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let bot = sink.bot.clone();
        let chat_id = sink.chat_id;
        let text = self.format_message(&event);
        runtime.spawn(async move {
            if let Err(err) = bot.send_message(chat_id, text).await {
                tracing::warn!(
                    target: "report",
                    error = %err,
                    chat_id = chat_id.0,
                    "failed to send notification"
                );
            }
        });
    }
}

fn format_event(event: &ReportEvent, timestamp: &str) -> String {
    let title = match event.kind {
        ReportKind::Success => "Filter success",
        ReportKind::Error => "Filter error",
        ReportKind::Info => "Filter info",
    };
    format!("{title} [{timestamp}]\n{}", event.message)
}
