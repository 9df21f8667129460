use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::sleep::SleepQuality;

/// How the dream felt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "😊")]
    Happy,
    #[serde(rename = "😌")]
    Peaceful,
    #[serde(rename = "🤩")]
    Excited,
    #[serde(rename = "😐")]
    Neutral,
    #[serde(rename = "😕")]
    Confused,
    #[serde(rename = "😢")]
    Sad,
    #[serde(rename = "😨")]
    Scared,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Happy,
        Mood::Peaceful,
        Mood::Excited,
        Mood::Neutral,
        Mood::Confused,
        Mood::Sad,
        Mood::Scared,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Peaceful => "😌",
            Mood::Excited => "🤩",
            Mood::Neutral => "😐",
            Mood::Confused => "😕",
            Mood::Sad => "😢",
            Mood::Scared => "😨",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Peaceful => "peaceful",
            Mood::Excited => "excited",
            Mood::Neutral => "neutral",
            Mood::Confused => "confused",
            Mood::Sad => "sad",
            Mood::Scared => "scared",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

/// Accepts either the emoji or the lowercase name.
impl FromStr for Mood {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Mood::ALL
            .into_iter()
            .find(|m| m.emoji() == s || m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "mood".into(),
                message: format!(
                    "'{s}' is not one of happy, peaceful, excited, neutral, confused, sad, scared"
                ),
            })
    }
}

/// Split a comma-separated tag list, trimming each tag and dropping empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(())
}

/// A dream journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub title: String,
    pub description: String,
    pub mood: Mood,
    pub sleep_quality: SleepQuality,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn from_draft(id: String, draft: &EntryDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            mood: draft.mood,
            sleep_quality: draft.sleep_quality,
            tags: normalize_tags(&draft.tags),
            created_at: now,
            updated_at: now,
        }
    }

    /// Document body for a remote store, which keys documents by id itself.
    pub fn to_document(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(fields) = &mut value {
            fields.remove("id");
        }
        value
    }

    /// Rebuild an entry from a remote document body.
    pub fn from_document(id: &str, data: &Value) -> Result<Self, serde_json::Error> {
        let mut fields = match data {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        fields.insert("id".into(), Value::String(id.to_string()));
        serde_json::from_value(Value::Object(fields))
    }
}

/// User-supplied fields for a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub title: String,
    pub description: String,
    pub mood: Mood,
    pub sleep_quality: SleepQuality,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EntryDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        mood: Mood,
        sleep_quality: SleepQuality,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            mood,
            sleep_quality,
            tags: Vec::new(),
        }
    }

    /// Set tags from a comma-separated string.
    pub fn with_tags(mut self, raw: &str) -> Self {
        self.tags = parse_tags(raw);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)
    }
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_quality: Option<SleepQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.mood.is_none()
            && self.sleep_quality.is_none()
            && self.tags.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(description) = &self.description {
            require_text("description", description)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, entry: &mut JournalEntry, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            entry.title = title.clone();
        }
        if let Some(description) = &self.description {
            entry.description = description.clone();
        }
        if let Some(mood) = self.mood {
            entry.mood = mood;
        }
        if let Some(quality) = self.sleep_quality {
            entry.sleep_quality = quality;
        }
        if let Some(tags) = &self.tags {
            entry.tags = normalize_tags(tags);
        }
        entry.updated_at = now;
    }

    /// Changed fields plus `updatedAt`, as a partial document.
    pub fn to_fields(&self, now: DateTime<Utc>) -> Value {
        let normalized = EntryPatch {
            tags: self.tags.as_ref().map(normalize_tags),
            ..self.clone()
        };
        let mut value = serde_json::to_value(&normalized).unwrap_or(Value::Null);
        if let Value::Object(fields) = &mut value {
            if let Ok(at) = serde_json::to_value(now) {
                fields.insert("updatedAt".into(), at);
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 7, 0, 0).unwrap()
    }

    #[test]
    fn tags_are_trimmed_and_empties_dropped() {
        assert_eq!(parse_tags("a, ,b"), vec!["a", "b"]);
        assert_eq!(parse_tags(""), Vec::<String>::new());
        assert_eq!(parse_tags(" flying ,, lucid "), vec!["flying", "lucid"]);
    }

    #[test]
    fn mood_parses_emoji_or_name() {
        assert_eq!("😨".parse::<Mood>().unwrap(), Mood::Scared);
        assert_eq!("Peaceful".parse::<Mood>().unwrap(), Mood::Peaceful);
        assert!("grumpy".parse::<Mood>().is_err());
    }

    #[test]
    fn mood_serializes_as_emoji() {
        assert_eq!(serde_json::to_string(&Mood::Excited).unwrap(), "\"🤩\"");
    }

    #[test]
    fn blank_title_or_description_is_rejected() {
        let draft = EntryDraft::new("  ", "flew over the sea", Mood::Happy, SleepQuality::Good);
        assert_eq!(
            draft.validate(),
            Err(ValidationError::EmptyField { field: "title" })
        );

        let draft = EntryDraft::new("Flying", "\n", Mood::Happy, SleepQuality::Good);
        assert_eq!(
            draft.validate(),
            Err(ValidationError::EmptyField { field: "description" })
        );
    }

    #[test]
    fn document_round_trip_keeps_fields() {
        let draft = EntryDraft::new("Flying", "over the sea", Mood::Happy, SleepQuality::Good)
            .with_tags("sky, sea");
        let entry = JournalEntry::from_draft("abc".into(), &draft, now());

        let doc = entry.to_document();
        assert!(doc.get("id").is_none());
        assert_eq!(doc["sleepQuality"], "Good");

        let back = JournalEntry::from_document("abc", &doc).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn patch_applies_only_given_fields() {
        let draft = EntryDraft::new("Flying", "over the sea", Mood::Happy, SleepQuality::Good);
        let mut entry = JournalEntry::from_draft("1".into(), &draft, now());
        let later = now() + chrono::Duration::hours(1);

        let patch = EntryPatch {
            mood: Some(Mood::Sad),
            tags: Some(vec![" rain ".into(), "".into()]),
            ..Default::default()
        };
        patch.apply_to(&mut entry, later);

        assert_eq!(entry.title, "Flying");
        assert_eq!(entry.mood, Mood::Sad);
        assert_eq!(entry.tags, vec!["rain"]);
        assert_eq!(entry.updated_at, later);
        assert_eq!(entry.created_at, now());
    }

    #[test]
    fn patch_fields_include_updated_at() {
        let patch = EntryPatch {
            title: Some("Falling".into()),
            ..Default::default()
        };
        let fields = patch.to_fields(now());
        assert_eq!(fields["title"], "Falling");
        assert!(fields.get("mood").is_none());
        assert!(fields.get("updatedAt").is_some());
    }
}
