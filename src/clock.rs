use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// `DD/MM/YY HH:MM`
const STAMP_FORMAT: &str = "%d/%m/%y %H:%M";

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Resolve a configured timezone, falling back to local time on parse errors
pub fn resolve_timestamp_timezone(tz_name: Option<&str>) -> Option<Tz> {
    let name = tz_name?.trim();
    if name.is_empty() {
        return None;
    }
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            tracing::warn!(
                "Invalid timestamp timezone '{}', falling back to local time",
                name
            );
            None
        }
    }
}

/// Renders the short date stamp burned into strips and animations
#[derive(Clone)]
pub struct TimestampFormatter {
    timezone: Option<Tz>,
    clock: Arc<dyn Clock>,
}

impl TimestampFormatter {
    pub fn new(tz_name: Option<&str>, clock: Arc<dyn Clock>) -> Self {
        Self {
            timezone: resolve_timestamp_timezone(tz_name),
            clock,
        }
    }

    pub fn system(tz_name: Option<&str>) -> Self {
        Self::new(tz_name, Arc::new(SystemClock))
    }

    pub fn format_at(&self, at: DateTime<Utc>) -> String {
        match self.timezone {
            Some(tz) => at.with_timezone(&tz).format(STAMP_FORMAT).to_string(),
            None => at.with_timezone(&Local).format(STAMP_FORMAT).to_string(),
        }
    }

    /// Stamp for the current clock reading
    pub fn now_text(&self) -> String {
        self.format_at(self.clock.now())
    }
}

impl std::fmt::Debug for TimestampFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampFormatter")
            .field("timezone", &self.timezone)
            .finish()
    }
}
