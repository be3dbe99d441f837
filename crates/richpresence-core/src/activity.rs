//! Presence activity payload and its validating builder.
//!
//! An [`Activity`] can only be obtained through [`ActivityBuilder`], so every
//! activity handed to the client already satisfies the peer's structural
//! limits. Each setter checks its own field immediately; the
//! buttons / party-or-secrets exclusion is checked when the second
//! conflicting field is set and once more in [`ActivityBuilder::build`].
//!
//! ```rust
//! use richpresence_core::{ActivityBuilder, ActivityType};
//!
//! let activity = ActivityBuilder::new()
//!     .kind(ActivityType::Playing)
//!     .details("Ranked match")?
//!     .state("In queue")?
//!     .button("Watch", "https://example.com/stream")?
//!     .build()?;
//! assert_eq!(activity.details(), Some("Ranked match"));
//! # Ok::<(), richpresence_core::ValidationError>(())
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Maximum length of free-text fields (details, state, image tooltips).
pub const MAX_TEXT_LENGTH: usize = 128;

/// Maximum number of buttons on one activity.
pub const MAX_BUTTONS: usize = 2;

/// Maximum length of a button label.
pub const MAX_BUTTON_LABEL_LENGTH: usize = 32;

/// Maximum length of a button URL.
pub const MAX_BUTTON_URL_LENGTH: usize = 512;

/// Result type for activity validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A structural constraint violated while building an activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A text field exceeds its length limit (counted in characters).
    #[error("{field} is {length} characters long (max: {max})")]
    TooLong {
        field: &'static str,
        length: usize,
        max: usize,
    },

    /// More buttons than the peer accepts.
    #[error("too many buttons (max: {max})")]
    TooManyButtons { max: usize },

    /// Button URL does not parse as an absolute URL.
    #[error("button url is not a valid absolute URL: {url}")]
    InvalidButtonUrl { url: String },

    /// Both timestamps are set and `end` precedes `start`.
    #[error("end timestamp {end} precedes start timestamp {start}")]
    EndBeforeStart { start: u64, end: u64 },

    /// A timestamp before 1970-01-01.
    #[error("timestamp {millis}ms is before the unix epoch")]
    BeforeEpoch { millis: i64 },

    /// Party current size is larger than its maximum.
    #[error("party size {current} exceeds party max {max}")]
    PartyOverflow { current: u32, max: u32 },

    /// Buttons are silently dropped by the peer when party or secrets are
    /// present, so the combination is refused up front.
    #[error("buttons cannot be combined with party or secrets")]
    ButtonsWithPartyOrSecrets,
}

/// Kind of activity, serialized as its numeric protocol value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActivityType {
    /// "Playing {name}"
    #[default]
    Playing,
    /// "Streaming {details}"
    Streaming,
    /// "Listening to {name}"
    Listening,
    /// "Watching {name}"
    Watching,
    /// "Competing in {name}"
    Competing,
}

impl From<ActivityType> for u8 {
    fn from(kind: ActivityType) -> Self {
        match kind {
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Competing => 5,
        }
    }
}

impl TryFrom<u8> for ActivityType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Playing),
            1 => Ok(Self::Streaming),
            2 => Ok(Self::Listening),
            3 => Ok(Self::Watching),
            5 => Ok(Self::Competing),
            other => Err(format!("unknown activity type: {other}")),
        }
    }
}

/// Start/end of the activity in milliseconds since the unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

/// Image keys and their hover tooltips.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// Party information. `size` is `[current, max]` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>,
}

/// Secrets used for join / spectate / match invites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
}

impl Secrets {
    fn is_empty(&self) -> bool {
        self.join.is_none() && self.spectate.is_none() && self.match_secret.is_none()
    }
}

/// A clickable link shown under the presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub url: String,
}

/// A validated, immutable presence payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    kind: ActivityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamps: Option<Timestamps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<Assets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    party: Option<Party>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secrets: Option<Secrets>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buttons: Vec<Button>,
    instance: bool,
}

impl Activity {
    fn empty() -> Self {
        Self {
            kind: ActivityType::default(),
            details: None,
            state: None,
            timestamps: None,
            assets: None,
            party: None,
            secrets: None,
            buttons: Vec::new(),
            instance: false,
        }
    }

    pub fn kind(&self) -> ActivityType {
        self.kind
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn timestamps(&self) -> Option<&Timestamps> {
        self.timestamps.as_ref()
    }

    pub fn assets(&self) -> Option<&Assets> {
        self.assets.as_ref()
    }

    pub fn party(&self) -> Option<&Party> {
        self.party.as_ref()
    }

    pub fn secrets(&self) -> Option<&Secrets> {
        self.secrets.as_ref()
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn is_instance(&self) -> bool {
        self.instance
    }

    /// Re-checks every constraint, including the cross-field ones.
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(ref details) = self.details {
            check_length("details", details, MAX_TEXT_LENGTH)?;
        }
        if let Some(ref state) = self.state {
            check_length("state", state, MAX_TEXT_LENGTH)?;
        }
        if let Some(ref assets) = self.assets {
            if let Some(ref text) = assets.large_text {
                check_length("large_text", text, MAX_TEXT_LENGTH)?;
            }
            if let Some(ref text) = assets.small_text {
                check_length("small_text", text, MAX_TEXT_LENGTH)?;
            }
        }
        if let Some(Timestamps {
            start: Some(start),
            end: Some(end),
        }) = self.timestamps
            && end < start
        {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        if let Some([current, max]) = self.party.as_ref().and_then(|p| p.size)
            && current > max
        {
            return Err(ValidationError::PartyOverflow { current, max });
        }
        if self.buttons.len() > MAX_BUTTONS {
            return Err(ValidationError::TooManyButtons { max: MAX_BUTTONS });
        }
        for button in &self.buttons {
            check_button(&button.label, &button.url)?;
        }
        if !self.buttons.is_empty() && self.has_party_or_secrets() {
            return Err(ValidationError::ButtonsWithPartyOrSecrets);
        }
        Ok(())
    }

    fn has_party_or_secrets(&self) -> bool {
        self.party.is_some() || self.secrets.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Incremental, fail-fast builder for [`Activity`].
#[derive(Debug, Clone)]
pub struct ActivityBuilder {
    activity: Activity,
}

impl Default for ActivityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityBuilder {
    pub fn new() -> Self {
        Self {
            activity: Activity::empty(),
        }
    }

    pub fn kind(mut self, kind: ActivityType) -> Self {
        self.activity.kind = kind;
        self
    }

    /// First line under the application name.
    pub fn details(mut self, details: impl Into<String>) -> ValidationResult<Self> {
        let details = details.into();
        check_length("details", &details, MAX_TEXT_LENGTH)?;
        self.activity.details = Some(details);
        Ok(self)
    }

    /// Second line under the application name.
    pub fn state(mut self, state: impl Into<String>) -> ValidationResult<Self> {
        let state = state.into();
        check_length("state", &state, MAX_TEXT_LENGTH)?;
        self.activity.state = Some(state);
        Ok(self)
    }

    pub fn start_time(self, start: DateTime<Utc>) -> ValidationResult<Self> {
        self.start_millis(epoch_millis(start)?)
    }

    pub fn end_time(self, end: DateTime<Utc>) -> ValidationResult<Self> {
        self.end_millis(epoch_millis(end)?)
    }

    pub fn start_millis(mut self, start: u64) -> ValidationResult<Self> {
        let timestamps = self.activity.timestamps.get_or_insert_with(Timestamps::default);
        if let Some(end) = timestamps.end
            && end < start
        {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        timestamps.start = Some(start);
        Ok(self)
    }

    pub fn end_millis(mut self, end: u64) -> ValidationResult<Self> {
        let timestamps = self.activity.timestamps.get_or_insert_with(Timestamps::default);
        if let Some(start) = timestamps.start
            && end < start
        {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        timestamps.end = Some(end);
        Ok(self)
    }

    pub fn large_image(mut self, key: impl Into<String>) -> Self {
        self.assets().large_image = Some(key.into());
        self
    }

    /// Tooltip for the large image.
    pub fn large_text(mut self, text: impl Into<String>) -> ValidationResult<Self> {
        let text = text.into();
        check_length("large_text", &text, MAX_TEXT_LENGTH)?;
        self.assets().large_text = Some(text);
        Ok(self)
    }

    pub fn small_image(mut self, key: impl Into<String>) -> Self {
        self.assets().small_image = Some(key.into());
        self
    }

    /// Tooltip for the small image.
    pub fn small_text(mut self, text: impl Into<String>) -> ValidationResult<Self> {
        let text = text.into();
        check_length("small_text", &text, MAX_TEXT_LENGTH)?;
        self.assets().small_text = Some(text);
        Ok(self)
    }

    pub fn party(
        mut self,
        id: impl Into<String>,
        current: u32,
        max: u32,
    ) -> ValidationResult<Self> {
        if current > max {
            return Err(ValidationError::PartyOverflow { current, max });
        }
        self.reject_if_buttons()?;
        self.activity.party = Some(Party {
            id: Some(id.into()),
            size: Some([current, max]),
        });
        Ok(self)
    }

    pub fn join_secret(mut self, secret: impl Into<String>) -> ValidationResult<Self> {
        self.reject_if_buttons()?;
        self.secrets().join = Some(secret.into());
        Ok(self)
    }

    pub fn spectate_secret(mut self, secret: impl Into<String>) -> ValidationResult<Self> {
        self.reject_if_buttons()?;
        self.secrets().spectate = Some(secret.into());
        Ok(self)
    }

    pub fn match_secret(mut self, secret: impl Into<String>) -> ValidationResult<Self> {
        self.reject_if_buttons()?;
        self.secrets().match_secret = Some(secret.into());
        Ok(self)
    }

    /// Appends a button. At most [`MAX_BUTTONS`], and never together with
    /// a party or secrets.
    pub fn button(
        mut self,
        label: impl Into<String>,
        url: impl Into<String>,
    ) -> ValidationResult<Self> {
        let (label, url) = (label.into(), url.into());
        if self.activity.buttons.len() >= MAX_BUTTONS {
            return Err(ValidationError::TooManyButtons { max: MAX_BUTTONS });
        }
        check_button(&label, &url)?;
        if self.activity.has_party_or_secrets() {
            return Err(ValidationError::ButtonsWithPartyOrSecrets);
        }
        self.activity.buttons.push(Button { label, url });
        Ok(self)
    }

    pub fn instance(mut self, instance: bool) -> Self {
        self.activity.instance = instance;
        self
    }

    /// Runs the full validation pass and hands out the finished activity.
    pub fn build(self) -> ValidationResult<Activity> {
        self.activity.validate()?;
        Ok(self.activity)
    }

    fn assets(&mut self) -> &mut Assets {
        self.activity.assets.get_or_insert_with(Assets::default)
    }

    fn secrets(&mut self) -> &mut Secrets {
        self.activity.secrets.get_or_insert_with(Secrets::default)
    }

    fn reject_if_buttons(&self) -> ValidationResult<()> {
        if self.activity.buttons.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ButtonsWithPartyOrSecrets)
        }
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> ValidationResult<()> {
    let length = value.chars().count();
    if length > max {
        return Err(ValidationError::TooLong { field, length, max });
    }
    Ok(())
}

fn check_button(label: &str, url: &str) -> ValidationResult<()> {
    check_length("button label", label, MAX_BUTTON_LABEL_LENGTH)?;
    check_length("button url", url, MAX_BUTTON_URL_LENGTH)?;
    if Url::parse(url).is_err() {
        return Err(ValidationError::InvalidButtonUrl {
            url: url.to_string(),
        });
    }
    Ok(())
}

fn epoch_millis(at: DateTime<Utc>) -> ValidationResult<u64> {
    let millis = at.timestamp_millis();
    u64::try_from(millis).map_err(|_| ValidationError::BeforeEpoch { millis })
}
