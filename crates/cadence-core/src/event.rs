// Event domain types
//
// These types represent the Event entity, its recurrence rule and the
// occurrence windows a series occupies. Used by both API and storage crates.

use chrono::{DateTime, Days, FixedOffset, Months, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Recurrence frequency of a series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Move `from` forward by `steps` calendar intervals.
    ///
    /// Month and year steps clamp to the last valid day of the target month
    /// (Jan 31 + 1 month = Feb 28/29). Returns `None` on calendar overflow.
    pub fn advance(
        &self,
        from: DateTime<FixedOffset>,
        steps: u32,
    ) -> Option<DateTime<FixedOffset>> {
        match self {
            Frequency::Daily => from.checked_add_days(Days::new(u64::from(steps))),
            Frequency::Weekly => from.checked_add_days(Days::new(u64::from(steps) * 7)),
            Frequency::Monthly => from.checked_add_months(Months::new(steps)),
            Frequency::Yearly => from.checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown frequency name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown frequency: {0}")]
pub struct UnknownFrequency(pub String);

impl FromStr for Frequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFrequency(s.to_string()))
    }
}

/// Recurrence rule: repeat every `frequency` until `repeat_until` (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub repeat_until: DateTime<FixedOffset>,
}

/// One `(start, end)` instance of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceWindow {
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
}

impl OccurrenceWindow {
    pub fn new(starts_at: DateTime<FixedOffset>, ends_at: DateTime<FixedOffset>) -> Self {
        Self { starts_at, ends_at }
    }

    /// Boundary-inclusive conflict test against a stored `[starts_at, ends_at]`.
    ///
    /// Touching boundaries count as a conflict: an event ending at 10:00
    /// conflicts with a candidate starting at 10:00.
    pub fn conflicts_with(
        &self,
        starts_at: DateTime<FixedOffset>,
        ends_at: DateTime<FixedOffset>,
    ) -> bool {
        starts_at <= self.ends_at && ends_at >= self.starts_at
    }
}

/// Anything that describes where a series sits on the timeline.
///
/// Implemented by stored events and by not-yet-persisted drafts so the
/// occurrence generator and overlap checks work on either.
pub trait Schedule {
    fn window(&self) -> OccurrenceWindow;
    fn recurrence(&self) -> Option<Recurrence>;
}

fn recurrence_of(
    recurrent: bool,
    frequency: Option<Frequency>,
    repeat_until: Option<DateTime<FixedOffset>>,
) -> Option<Recurrence> {
    match (recurrent, frequency, repeat_until) {
        (true, Some(frequency), Some(repeat_until)) => Some(Recurrence {
            frequency,
            repeat_until,
        }),
        _ => None,
    }
}

/// Semantically validated event definition, as submitted by a client.
///
/// `frequency` and `repeat_until` are only meaningful when `recurrent` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
    pub recurrent: bool,
    pub frequency: Option<Frequency>,
    pub repeat_until: Option<DateTime<FixedOffset>>,
}

impl EventDraft {
    /// Create a non-recurrent draft
    pub fn new(
        title: impl Into<String>,
        starts_at: DateTime<FixedOffset>,
        ends_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            starts_at,
            ends_at,
            recurrent: false,
            frequency: None,
            repeat_until: None,
        }
    }

    /// Make the draft recurrent
    pub fn repeating(mut self, frequency: Frequency, repeat_until: DateTime<FixedOffset>) -> Self {
        self.recurrent = true;
        self.frequency = Some(frequency);
        self.repeat_until = Some(repeat_until);
        self
    }
}

impl Schedule for EventDraft {
    fn window(&self) -> OccurrenceWindow {
        OccurrenceWindow::new(self.starts_at, self.ends_at)
    }

    fn recurrence(&self) -> Option<Recurrence> {
        recurrence_of(self.recurrent, self.frequency, self.repeat_until)
    }
}

/// Event record to be inserted by a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub draft: EventDraft,
    pub parent_id: Option<Uuid>,
}

impl NewEvent {
    pub fn standalone(draft: EventDraft) -> Self {
        Self {
            draft,
            parent_id: None,
        }
    }
}

/// Stored calendar event. A `parent_id` marks a generated child occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "atom")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub starts_at: DateTime<FixedOffset>,
    #[serde(with = "atom")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub ends_at: DateTime<FixedOffset>,
    pub recurrent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(
        default,
        with = "atom::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub repeat_until: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Copy of this event with every client-editable field replaced by `draft`.
    /// Identity, series linkage and bookkeeping timestamps are kept.
    pub fn apply(&self, draft: EventDraft) -> Event {
        Event {
            title: draft.title,
            description: draft.description,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            recurrent: draft.recurrent,
            frequency: draft.frequency,
            repeat_until: draft.repeat_until,
            ..self.clone()
        }
    }

    pub fn draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            recurrent: self.recurrent,
            frequency: self.frequency,
            repeat_until: self.repeat_until,
        }
    }

    /// Child occurrence of this event at `window`, carrying the recurrence fields.
    pub fn child_at(&self, window: OccurrenceWindow) -> NewEvent {
        NewEvent {
            draft: EventDraft {
                starts_at: window.starts_at,
                ends_at: window.ends_at,
                ..self.draft()
            },
            parent_id: Some(self.id),
        }
    }
}

impl Schedule for Event {
    fn window(&self) -> OccurrenceWindow {
        OccurrenceWindow::new(self.starts_at, self.ends_at)
    }

    fn recurrence(&self) -> Option<Recurrence> {
        recurrence_of(self.recurrent, self.frequency, self.repeat_until)
    }
}

/// Serde helpers rendering timestamps as `YYYY-MM-DDTHH:MM:SS±HH:MM`
/// in the offset they carry.
pub mod atom {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<FixedOffset>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, FixedOffset};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<FixedOffset>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
