//! Payload types carried inside frames.

use richpresence_core::Activity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PROTOCOL_VERSION;

/// First frame sent after the socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}

impl Handshake {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            client_id: client_id.into(),
        }
    }
}

/// RPC command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Server-initiated event delivery.
    Dispatch,
    Authorize,
    Authenticate,
    GetGuild,
    GetGuilds,
    GetChannel,
    GetChannels,
    Subscribe,
    Unsubscribe,
    SetUserVoiceSettings,
    SelectVoiceChannel,
    GetSelectedVoiceChannel,
    SelectTextChannel,
    GetVoiceSettings,
    SetVoiceSettings,
    SetCertifiedDevices,
    SetActivity,
    SendActivityJoinInvite,
    SendActivityJoinRequest,
    CloseActivityRequest,
    /// Any command this client does not know by name.
    #[serde(other)]
    Unknown,
}

/// RPC event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    Ready,
    Error,
    GuildStatus,
    GuildCreate,
    ChannelCreate,
    VoiceChannelSelect,
    VoiceStateCreate,
    VoiceStateUpdate,
    VoiceStateDelete,
    VoiceSettingsUpdate,
    VoiceConnectionStatus,
    SpeakingStart,
    SpeakingStop,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    NotificationCreate,
    ActivityJoin,
    ActivitySpectate,
    ActivityJoinRequest,
    /// Any event this client does not know by name.
    #[serde(other)]
    Unknown,
}

/// Outgoing command frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub cmd: Command,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evt: Option<Event>,
    pub nonce: String,
}

/// Incoming FRAME payload: a command reply or a dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RpcMessage {
    #[serde(default)]
    pub cmd: Option<Command>,
    #[serde(default)]
    pub evt: Option<Event>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub args: Value,
}

impl RpcMessage {
    /// `DISPATCH` of the `READY` event.
    pub fn is_ready(&self) -> bool {
        self.evt == Some(Event::Ready)
            && matches!(self.cmd, None | Some(Command::Dispatch))
    }

    pub fn is_error(&self) -> bool {
        self.evt == Some(Event::Error)
    }

    /// Error details when this is an `ERROR` event.
    pub fn error(&self) -> Option<ErrorData> {
        if !self.is_error() {
            return None;
        }
        Some(ErrorData::deserialize(&self.data).unwrap_or_else(|_| ErrorData {
            code: 0,
            message: self.data.to_string(),
        }))
    }
}

/// Data of the `READY` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadyData {
    #[serde(default)]
    pub v: u32,
    #[serde(default)]
    pub config: ServerConfig,
    #[serde(default)]
    pub user: Option<User>,
}

/// Peer environment reported in `READY`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub cdn_host: Option<String>,
    pub api_endpoint: Option<String>,
    pub environment: Option<String>,
}

/// The user logged into the peer application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub discriminator: Option<String>,
    pub global_name: Option<String>,
    pub avatar: Option<String>,
    pub bot: bool,
    pub premium_type: Option<u8>,
}

/// Data of the `ERROR` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Payload of a CLOSE frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloseData {
    pub code: i64,
    pub message: String,
}

/// Arguments of `SET_ACTIVITY`. No activity clears the presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetActivityArgs {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

impl SetActivityArgs {
    pub fn set(pid: u32, activity: Activity) -> Self {
        Self {
            pid,
            activity: Some(activity),
        }
    }

    pub fn clear(pid: u32) -> Self {
        Self {
            pid,
            activity: None,
        }
    }
}

/// Arguments of `AUTHORIZE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeArgs {
    pub client_id: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_token: Option<String>,
}

/// Reply to `AUTHORIZE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeData {
    pub code: String,
}

/// Arguments of `AUTHENTICATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateArgs {
    pub access_token: String,
}

/// Reply to `AUTHENTICATE`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticateData {
    pub application: Value,
    pub user: User,
    pub scopes: Vec<String>,
    pub expires: Option<String>,
}
