//! Job payload inspection.
//!
//! Payloads are opaque JSON strings; the core reads only two fields. The
//! `enqueued_at` timestamp (integer seconds) drives orphan detection, and a
//! missing or unparseable timestamp is treated as time zero so such jobs
//! become immediately eligible for recovery rather than lingering claimed
//! forever. The optional `jid` identifier serves the inspector's point
//! lookup.

use serde_json::Value;

/// Extracts the enqueue timestamp (seconds) from a raw payload.
///
/// Accepts integer or float seconds; anything absent or unparseable maps
/// to 0, the maximally old timestamp.
pub fn parse_enqueued_at(payload: &str) -> i64 {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|value| timestamp_field(&value))
        .unwrap_or(0)
}

/// Extracts the job identifier from a raw payload, if present.
pub fn parse_jid(payload: &str) -> Option<String> {
    serde_json::from_str::<Value>(payload)
        .ok()?
        .get("jid")?
        .as_str()
        .map(str::to_string)
}

fn timestamp_field(value: &Value) -> Option<i64> {
    let field = value.get("enqueued_at")?;
    field
        .as_i64()
        .or_else(|| field.as_f64().map(|secs| secs as i64))
}

/// One in-flight job as surfaced by the working-queue inspector.
#[derive(Debug, Clone)]
pub struct JobRecord {
    queue: String,
    raw: String,
    payload: Value,
}

impl JobRecord {
    /// Wraps a raw working-list entry. An unparseable payload is kept
    /// verbatim in `raw` with a null parsed value.
    pub fn new(raw: String, queue: impl Into<String>) -> Self {
        let payload = serde_json::from_str(&raw).unwrap_or(Value::Null);
        Self {
            queue: queue.into(),
            raw,
            payload,
        }
    }

    /// Display name of the queue this job was claimed from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The raw serialized payload as stored.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed payload, or `Value::Null` if it was not valid JSON.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The job identifier, if the payload carries one.
    pub fn jid(&self) -> Option<&str> {
        self.payload.get("jid")?.as_str()
    }

    /// The enqueue timestamp in seconds; 0 when absent or unparseable.
    pub fn enqueued_at(&self) -> i64 {
        timestamp_field(&self.payload).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enqueued_at_integer() {
        assert_eq!(parse_enqueued_at(r#"{"enqueued_at":1722470400}"#), 1722470400);
    }

    #[test]
    fn test_parse_enqueued_at_float_truncates() {
        assert_eq!(
            parse_enqueued_at(r#"{"enqueued_at":1722470400.75}"#),
            1722470400
        );
    }

    #[test]
    fn test_parse_enqueued_at_missing_is_zero() {
        assert_eq!(parse_enqueued_at(r#"{"class":"MailWorker"}"#), 0);
    }

    #[test]
    fn test_parse_enqueued_at_garbage_is_zero() {
        assert_eq!(parse_enqueued_at("not json at all"), 0);
        assert_eq!(parse_enqueued_at(r#"{"enqueued_at":"soon"}"#), 0);
    }

    #[test]
    fn test_parse_jid() {
        assert_eq!(
            parse_jid(r#"{"jid":"b4a577edbccf1d805744efa9"}"#).as_deref(),
            Some("b4a577edbccf1d805744efa9")
        );
        assert!(parse_jid(r#"{"class":"MailWorker"}"#).is_none());
        assert!(parse_jid("garbage").is_none());
    }

    #[test]
    fn test_job_record_accessors() {
        let raw = r#"{"jid":"abc123","enqueued_at":1000,"args":[1,2]}"#.to_string();
        let record = JobRecord::new(raw.clone(), "mailer");

        assert_eq!(record.queue(), "mailer");
        assert_eq!(record.raw(), raw);
        assert_eq!(record.jid(), Some("abc123"));
        assert_eq!(record.enqueued_at(), 1000);
        assert_eq!(record.payload()["args"][0], 1);
    }

    #[test]
    fn test_job_record_unparseable_payload() {
        let record = JobRecord::new("<<binary>>".to_string(), "mailer");

        assert_eq!(record.raw(), "<<binary>>");
        assert!(record.payload().is_null());
        assert!(record.jid().is_none());
        assert_eq!(record.enqueued_at(), 0);
    }
}
