//! Shared helpers handed to every module

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::time::Duration;

static DURATION_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*([dhms])").expect("duration pattern is valid"));

/// Utility bag injected into modules alongside the transport and store
#[derive(Debug, Clone)]
pub struct Utils {
    prefix: String,
    started_at: DateTime<Utc>,
}

impl Utils {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            started_at: Utc::now(),
        }
    }

    /// Command sentinel currently in effect
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }

    pub fn escape_html(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                _ => out.push(c),
            }
        }
        out
    }

    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} B", bytes)
        } else {
            format!("{:.1} {}", size, UNITS[unit])
        }
    }

    /// `3725s` -> `1h 2m 5s`
    pub fn format_duration(duration: Duration) -> String {
        let total = duration.as_secs();
        let (days, hours, minutes, seconds) =
            (total / 86_400, (total % 86_400) / 3600, (total % 3600) / 60, total % 60);

        let mut parts = Vec::new();
        if days > 0 {
            parts.push(format!("{}d", days));
        }
        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 || parts.is_empty() {
            parts.push(format!("{}s", seconds));
        }
        parts.join(" ")
    }

    pub fn format_timestamp(ts: DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    /// Parse `1h30m`, `2d`, `45s`. Anything else yields `None`.
    pub fn parse_duration(text: &str) -> Option<Duration> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if !DURATION_PART.replace_all(&text, "").trim().is_empty() {
            return None;
        }

        let mut total = 0u64;
        for caps in DURATION_PART.captures_iter(&text) {
            let value: u64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = match caps.get(2)?.as_str() {
                "d" => 86_400,
                "h" => 3600,
                "m" => 60,
                _ => 1,
            };
            total = total.checked_add(value.checked_mul(unit)?)?;
        }
        Some(Duration::from_secs(total))
    }

    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(Utils::escape_html("<b>&\"</b>"), "&lt;b&gt;&amp;&quot;&lt;/b&gt;");
    }

    #[test]
    fn formats_sizes_and_durations() {
        assert_eq!(Utils::format_bytes(512), "512 B");
        assert_eq!(Utils::format_bytes(1536), "1.5 KB");
        assert_eq!(Utils::format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(Utils::format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(Utils::parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(Utils::parse_duration("2d"), Some(Duration::from_secs(172_800)));
        assert_eq!(Utils::parse_duration("soon"), None);
        assert_eq!(Utils::parse_duration("5x"), None);
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(Utils::generate_id(), Utils::generate_id());
    }
}
