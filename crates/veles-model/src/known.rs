//! Codecs for well-known value types with a fixed XML shape.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeDelta};
use veles_xml::{NodeId, XmlDocument};

use crate::{FxHashMap, Guid, ModelError, Result, Value};

/// Fixed conversion between a value type and XML.
///
/// The default element shape is the value's text. Codecs with a richer shape
/// override [`KnownType::write_element`] and [`KnownType::read_element`].
pub trait KnownType: Send + Sync {
    /// Type name this codec handles.
    fn type_name(&self) -> &str;

    /// Render the value as text.
    fn to_text(&self, value: &Value, format: Option<&str>) -> Result<String>;

    /// Parse the value from text.
    fn from_text(&self, text: &str, format: Option<&str>) -> Result<Value>;

    /// Fill `element` with the value.
    fn write_element(
        &self,
        value: &Value,
        doc: &mut XmlDocument,
        element: NodeId,
        format: Option<&str>,
    ) -> Result<()> {
        let text = self.to_text(value, format)?;
        doc.add_text(element, text);
        Ok(())
    }

    /// Read the value from `element`.
    fn read_element(&self, doc: &XmlDocument, element: NodeId, format: Option<&str>) -> Result<Value> {
        self.from_text(doc.text(element).trim(), format)
    }
}

fn unexpected(expected: &str, value: &Value) -> ModelError {
    ModelError::UnexpectedValue {
        expected: expected.to_string(),
        actual: value.type_name().unwrap_or_else(|| "null".to_string()),
    }
}

fn parse_error(text: &str, type_name: &str) -> ModelError {
    ModelError::Parse {
        text: text.to_string(),
        type_name: type_name.to_string(),
    }
}

/// `Guid` as hyphenated lower-case hex.
#[derive(Debug, Default)]
pub struct GuidCodec;

impl KnownType for GuidCodec {
    fn type_name(&self) -> &str {
        "Guid"
    }

    fn to_text(&self, value: &Value, _format: Option<&str>) -> Result<String> {
        match value {
            Value::Guid(g) => Ok(g.to_string()),
            other => Err(unexpected("Guid", other)),
        }
    }

    fn from_text(&self, text: &str, _format: Option<&str>) -> Result<Value> {
        text.parse::<Guid>().map(Value::Guid)
    }
}

/// `DateTime` as RFC 3339, or with a strftime format string.
///
/// Parsing accepts RFC 3339, the format string, and a naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp (taken as UTC).
#[derive(Debug, Default)]
pub struct DateTimeCodec;

impl KnownType for DateTimeCodec {
    fn type_name(&self) -> &str {
        "DateTime"
    }

    fn to_text(&self, value: &Value, format: Option<&str>) -> Result<String> {
        match value {
            Value::DateTime(dt) => Ok(match format {
                Some(fmt) => dt.format(fmt).to_string(),
                None => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            }),
            other => Err(unexpected("DateTime", other)),
        }
    }

    fn from_text(&self, text: &str, format: Option<&str>) -> Result<Value> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(Value::DateTime(dt));
        }
        if let Some(fmt) = format {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Ok(Value::DateTime(dt));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return Ok(Value::DateTime(naive.and_utc().fixed_offset()));
            }
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Value::DateTime(naive.and_utc().fixed_offset()))
            .map_err(|_| parse_error(text, "DateTime"))
    }
}

/// `TimeSpan` as `[-][d.]hh:mm:ss[.fffffff]`.
#[derive(Debug, Default)]
pub struct TimeSpanCodec;

/// Ticks (100 ns units) per second.
const TICKS_PER_SECOND: i64 = 10_000_000;

impl TimeSpanCodec {
    /// Format a duration in `[-][d.]hh:mm:ss[.fffffff]` form.
    pub fn format(span: &TimeDelta) -> String {
        let negative = *span < TimeDelta::zero();
        let abs = if negative { -*span } else { *span };

        let total_seconds = abs.num_seconds();
        let ticks = (abs - TimeDelta::seconds(total_seconds))
            .num_nanoseconds()
            .unwrap_or(0)
            / 100;

        let days = total_seconds / 86_400;
        let hours = (total_seconds / 3_600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        if days > 0 {
            out.push_str(&format!("{}.", days));
        }
        out.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
        if ticks > 0 {
            out.push_str(&format!(".{:07}", ticks));
        }
        out
    }

    /// Parse a duration in `[-][d.]hh:mm:ss[.fffffff]` form.
    pub fn parse(text: &str) -> Option<TimeDelta> {
        let text = text.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut parts = body.split(':');
        let (head, minutes, tail) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let (days, hours) = match head.split_once('.') {
            Some((d, h)) => (d.parse::<i64>().ok()?, h.parse::<i64>().ok()?),
            None => (0, head.parse::<i64>().ok()?),
        };
        let minutes = minutes.parse::<i64>().ok()?;
        let (seconds, ticks) = match tail.split_once('.') {
            Some((s, f)) => {
                if f.is_empty() || f.len() > 7 || !f.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let scaled = format!("{:0<7}", f);
                (s.parse::<i64>().ok()?, scaled.parse::<i64>().ok()?)
            }
            None => (tail.parse::<i64>().ok()?, 0),
        };
        if hours > 23 || minutes > 59 || seconds > 59 || days < 0 {
            return None;
        }

        let total = TimeDelta::try_days(days)?
            + TimeDelta::hours(hours)
            + TimeDelta::minutes(minutes)
            + TimeDelta::seconds(seconds)
            + TimeDelta::nanoseconds(ticks * (1_000_000_000 / TICKS_PER_SECOND));
        Some(if negative { -total } else { total })
    }
}

impl KnownType for TimeSpanCodec {
    fn type_name(&self) -> &str {
        "TimeSpan"
    }

    fn to_text(&self, value: &Value, _format: Option<&str>) -> Result<String> {
        match value {
            Value::TimeSpan(span) => Ok(Self::format(span)),
            other => Err(unexpected("TimeSpan", other)),
        }
    }

    fn from_text(&self, text: &str, _format: Option<&str>) -> Result<Value> {
        Self::parse(text)
            .map(Value::TimeSpan)
            .ok_or_else(|| parse_error(text, "TimeSpan"))
    }
}

/// Table of known-type codecs by type name.
#[derive(Clone)]
pub struct KnownTypes {
    codecs: FxHashMap<String, Arc<dyn KnownType>>,
}

impl KnownTypes {
    /// Create a table with the built-in codecs.
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.register(Arc::new(GuidCodec));
        table.register(Arc::new(DateTimeCodec));
        table.register(Arc::new(TimeSpanCodec));
        table
    }

    /// Create a table without codecs.
    pub fn empty() -> Self {
        Self {
            codecs: FxHashMap::default(),
        }
    }

    /// Register a codec, replacing any existing codec for the same type.
    pub fn register(&mut self, codec: Arc<dyn KnownType>) {
        self.codecs.insert(codec.type_name().to_string(), codec);
    }

    /// Look up the codec for a type.
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn KnownType>> {
        self.codecs.get(type_name).cloned()
    }

    /// Check whether a codec exists for a type.
    pub fn contains(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }
}

impl Default for KnownTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KnownTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

/// Parse a `DateTime` from RFC 3339 or naive ISO 8601 text.
pub fn parse_date_time(text: &str) -> Result<DateTime<FixedOffset>> {
    match DateTimeCodec.from_text(text, None)? {
        Value::DateTime(dt) => Ok(dt),
        other => Err(unexpected("DateTime", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_codec() {
        let guid = Guid::new_random();
        let text = GuidCodec.to_text(&Value::Guid(guid), None).unwrap();
        assert_eq!(GuidCodec.from_text(&text, None).unwrap(), Value::Guid(guid));
        assert!(GuidCodec.to_text(&Value::Int32(1), None).is_err());
    }

    #[test]
    fn test_date_time_rfc3339() {
        let dt = parse_date_time("2024-03-01T12:30:00+02:00").unwrap();
        let text = DateTimeCodec.to_text(&Value::DateTime(dt), None).unwrap();
        assert_eq!(text, "2024-03-01T12:30:00+02:00");
    }

    #[test]
    fn test_date_time_format() {
        let dt = parse_date_time("2024-03-01T00:00:00Z").unwrap();
        let text = DateTimeCodec
            .to_text(&Value::DateTime(dt), Some("%Y/%m/%d %H:%M"))
            .unwrap();
        assert_eq!(text, "2024/03/01 00:00");
        let back = DateTimeCodec.from_text(&text, Some("%Y/%m/%d %H:%M")).unwrap();
        assert_eq!(back, Value::DateTime(dt));
    }

    #[test]
    fn test_date_time_naive() {
        let value = DateTimeCodec.from_text("2024-03-01T08:00:00", None).unwrap();
        assert_eq!(value, Value::DateTime(parse_date_time("2024-03-01T08:00:00Z").unwrap()));
    }

    #[test]
    fn test_time_span_format() {
        let span = TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::milliseconds(500);
        assert_eq!(TimeSpanCodec::format(&span), "1.02:00:00.5000000");
        assert_eq!(TimeSpanCodec::format(&TimeDelta::minutes(-90)), "-01:30:00");
        assert_eq!(TimeSpanCodec::format(&TimeDelta::zero()), "00:00:00");
    }

    #[test]
    fn test_time_span_parse() {
        let span = TimeSpanCodec::parse("1.02:00:00.5").unwrap();
        assert_eq!(span, TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::milliseconds(500));
        assert_eq!(TimeSpanCodec::parse("-01:30:00"), Some(TimeDelta::minutes(-90)));
        assert!(TimeSpanCodec::parse("25:00:00").is_none());
        assert!(TimeSpanCodec::parse("garbage").is_none());
    }

    #[test]
    fn test_registry_table() {
        let table = KnownTypes::new();
        assert!(table.contains("Guid"));
        assert!(table.contains("TimeSpan"));
        assert!(!table.contains("Person"));
    }
}
