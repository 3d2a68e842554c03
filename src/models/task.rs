use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// One entry of a user's to-do list.
///
/// `title` holds either plaintext or an `IV_HEX:CIPHERTEXT_HEX` envelope.
/// `plain_title` is the plaintext shadow written whenever `title` is encrypted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub completed: bool,
    #[serde(default = "Utc::now", deserialize_with = "lenient_created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub estimated_time: u32,   // minutes
    #[serde(default, deserialize_with = "lenient_due_date")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), title)
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            plain_title: None,
            completed: false,
            created_at: Utc::now(),
            estimated_time: 0,
            due_date: None,
        }
    }

    /// Non-sensitive title used when the real one cannot be recovered.
    pub fn placeholder_title(&self) -> String {
        if self.id.trim().is_empty() {
            "Task unknown".to_string()
        } else {
            format!("Task {}", self.id)
        }
    }

    /// Shadow copy, if present and non-empty.
    pub fn shadow(&self) -> Option<&str> {
        self.plain_title.as_deref().filter(|s| !s.is_empty())
    }

    /// Set both `title` and `plain_title` to the same plaintext.
    pub fn set_recovered_title(&mut self, title: String) {
        self.plain_title = Some(title.clone());
        self.title = title;
    }
}

// Accepts RFC 3339, naive ISO date-times, plain dates and millisecond epochs.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn lenient_created_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp).unwrap_or_else(Utc::now))
}

fn lenient_due_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

fn lenient_minutes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let minutes = match value {
        // Whole-valued floats such as 30.0 count; fractions do not
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    Ok(minutes.clamp(0, u32::MAX as i64) as u32)
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        _ => false,
    })
}
