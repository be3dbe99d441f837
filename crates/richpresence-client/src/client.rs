//! The public client.

use richpresence_core::Activity;
use richpresence_protocol::{
    AuthenticateArgs, AuthenticateData, AuthorizeData, Command, Event, ProtocolError, ReadyData,
    SetActivityArgs, User,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthorizeOptions, TokenExchange};
use crate::config::ClientConfig;
use crate::connector::{Connector, EndpointOpener, SystemOpener};
use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::error::{ClientError, ClientResult};
use crate::state::{ConnectionState, StateHandle, Transition};
use crate::subscription::Subscription;

/// A rich presence IPC client.
///
/// One client owns at most one connection. After [`RpcClient::destroy`]
/// (or a peer close) it can log in again.
pub struct RpcClient {
    config: ClientConfig,
    client_id: String,
    state: StateHandle,
    handle: Option<DispatcherHandle>,
    task: Option<JoinHandle<()>>,
    ready: Option<ReadyData>,
    authenticated: Option<AuthenticateData>,
    access_token: Option<String>,
}

impl RpcClient {
    /// Creates a client with default settings.
    pub fn new(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self::with_config(ClientConfig::default().with_client_id(client_id.clone()), client_id)
    }

    /// Creates a client from configuration; `client_id` must be set.
    pub fn from_config(config: ClientConfig) -> ClientResult<Self> {
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ClientError::Config("client_id is not set".to_string()))?;
        Ok(Self::with_config(config, client_id))
    }

    fn with_config(config: ClientConfig, client_id: String) -> Self {
        Self {
            config,
            client_id,
            state: StateHandle::new(),
            handle: None,
            task: None,
            ready: None,
            authenticated: None,
            access_token: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Watches connection state changes, including peer-initiated closes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Data from the last `READY`.
    pub fn ready_data(&self) -> Option<&ReadyData> {
        self.ready.as_ref()
    }

    /// The authenticated user, falling back to the one reported in `READY`.
    pub fn user(&self) -> Option<&User> {
        self.authenticated
            .as_ref()
            .map(|auth| &auth.user)
            .or_else(|| self.ready.as_ref().and_then(|ready| ready.user.as_ref()))
    }

    /// Application info returned by `AUTHENTICATE`.
    pub fn application(&self) -> Option<&Value> {
        self.authenticated.as_ref().map(|auth| &auth.application)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Connects to the local peer and waits for `READY`.
    pub async fn login(&mut self) -> ClientResult<ReadyData> {
        self.login_with(&SystemOpener).await
    }

    /// Like [`RpcClient::login`], opening endpoints through `opener`.
    pub async fn login_with<O: EndpointOpener>(&mut self, opener: &O) -> ClientResult<ReadyData> {
        self.state.advance(Transition::Connect)?;
        self.reap().await;

        let connector = Connector::new(opener)
            .with_endpoints(self.config.endpoint_count())
            .with_attempt_timeout(self.config.connect_timeout());
        let connected = match connector.connect().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(error = %e, "could not reach the presence peer");
                self.state.advance(Transition::ConnectFailed)?;
                return Err(e);
            }
        };
        self.state.advance(Transition::Established)?;

        let (reader, writer) = tokio::io::split(connected.stream);
        let mut dispatcher = Dispatcher::new(
            writer,
            self.state.clone(),
            self.config.keepalive_interval(),
        );
        let ready = dispatcher.await_ready();
        if let Err(e) = dispatcher.send_handshake(&self.client_id).await {
            dispatcher.shutdown(&e.to_string()).await;
            return Err(e);
        }
        let (handle, task) = dispatcher.spawn(reader);
        self.handle = Some(handle.clone());
        self.task = Some(task);

        match tokio::time::timeout(self.config.ready_timeout(), ready).await {
            Ok(Ok(Ok(data))) => {
                info!(index = connected.index, client_id = %self.client_id, "logged in");
                self.ready = Some(data.clone());
                Ok(data)
            }
            Ok(Ok(Err(e))) => {
                self.reap().await;
                Err(e)
            }
            Ok(Err(_)) => {
                self.reap().await;
                Err(ClientError::closed("connection task stopped"))
            }
            Err(_) => {
                handle.close().await;
                self.reap().await;
                Err(ClientError::Timeout("waiting for READY".to_string()))
            }
        }
    }

    /// Connects, then authorizes and authenticates with `scopes`.
    ///
    /// With `options.access_token` set the consent prompt is skipped.
    pub async fn login_with_scopes(
        &mut self,
        options: AuthorizeOptions,
        exchange: &impl TokenExchange,
    ) -> ClientResult<AuthenticateData> {
        self.login().await?;
        self.authorize_and_authenticate(options, exchange).await
    }

    async fn authorize_and_authenticate(
        &mut self,
        options: AuthorizeOptions,
        exchange: &impl TokenExchange,
    ) -> ClientResult<AuthenticateData> {
        let access_token = match options.access_token.clone() {
            Some(token) => token,
            None => {
                let code = self.authorize(&options).await?;
                exchange.exchange_code(&code).await?
            }
        };
        self.authenticate(access_token).await
    }

    /// Sends `AUTHORIZE` and returns the OAuth2 code.
    pub async fn authorize(&self, options: &AuthorizeOptions) -> ClientResult<String> {
        let data: AuthorizeData = self
            .request_as(Command::Authorize, options.to_args(&self.client_id))
            .await?;
        Ok(data.code)
    }

    /// Sends `AUTHENTICATE` and records the user and application.
    pub async fn authenticate(
        &mut self,
        access_token: impl Into<String>,
    ) -> ClientResult<AuthenticateData> {
        let access_token = access_token.into();
        let data: AuthenticateData = self
            .request_as(
                Command::Authenticate,
                AuthenticateArgs {
                    access_token: access_token.clone(),
                },
            )
            .await?;
        info!(user = %data.user.username, scopes = ?data.scopes, "authenticated");
        self.access_token = Some(access_token);
        self.authenticated = Some(data.clone());
        Ok(data)
    }

    /// Sends an arbitrary command and returns the reply's `data`.
    pub async fn request(&self, command: Command, args: Value) -> ClientResult<Value> {
        self.dispatcher()?.request(command, args, None).await
    }

    async fn request_as<A, T>(&self, command: Command, args: A) -> ClientResult<T>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let args = serde_json::to_value(args).map_err(ProtocolError::from)?;
        let data = self.request(command, args).await?;
        serde_json::from_value(data).map_err(|e| ProtocolError::from(e).into())
    }

    fn dispatcher(&self) -> ClientResult<&DispatcherHandle> {
        self.handle.as_ref().ok_or(ClientError::NotReady {
            state: self.state.get(),
        })
    }

    /// Publishes `activity` for this process.
    pub async fn set_activity(&self, activity: Activity) -> ClientResult<Value> {
        activity.validate()?;
        let args = SetActivityArgs::set(std::process::id(), activity);
        self.request_as(Command::SetActivity, args).await
    }

    /// Removes this process's activity.
    pub async fn clear_activity(&self) -> ClientResult<Value> {
        self.request_as(Command::SetActivity, SetActivityArgs::clear(std::process::id()))
            .await
    }

    pub async fn get_guild(&self, guild_id: &str) -> ClientResult<Value> {
        self.request(Command::GetGuild, json!({ "guild_id": guild_id }))
            .await
    }

    pub async fn get_guilds(&self) -> ClientResult<Vec<Value>> {
        let data = self.request(Command::GetGuilds, json!({})).await?;
        Ok(list_field(data, "guilds"))
    }

    pub async fn get_channel(&self, channel_id: &str) -> ClientResult<Value> {
        self.request(Command::GetChannel, json!({ "channel_id": channel_id }))
            .await
    }

    /// Channels of one guild, or of every guild when `guild_id` is `None`.
    pub async fn get_channels(&self, guild_id: Option<&str>) -> ClientResult<Vec<Value>> {
        let args = match guild_id {
            Some(id) => json!({ "guild_id": id }),
            None => json!({}),
        };
        let data = self.request(Command::GetChannels, args).await?;
        Ok(list_field(data, "channels"))
    }

    /// Joins a voice channel, or leaves voice with `None`.
    pub async fn select_voice_channel(
        &self,
        channel_id: Option<&str>,
        force: bool,
    ) -> ClientResult<Value> {
        self.request(
            Command::SelectVoiceChannel,
            json!({ "channel_id": channel_id, "force": force }),
        )
        .await
    }

    pub async fn select_text_channel(&self, channel_id: Option<&str>) -> ClientResult<Value> {
        self.request(
            Command::SelectTextChannel,
            json!({ "channel_id": channel_id }),
        )
        .await
    }

    pub async fn get_voice_settings(&self) -> ClientResult<Value> {
        self.request(Command::GetVoiceSettings, json!({})).await
    }

    pub async fn set_voice_settings(&self, settings: Value) -> ClientResult<Value> {
        self.request(Command::SetVoiceSettings, settings).await
    }

    /// Accepts a user's ask-to-join request.
    pub async fn send_join_invite(&self, user_id: &str) -> ClientResult<Value> {
        self.request(
            Command::SendActivityJoinInvite,
            json!({ "user_id": user_id }),
        )
        .await
    }

    /// Asks to join a user's party.
    pub async fn send_join_request(&self, user_id: &str) -> ClientResult<Value> {
        self.request(
            Command::SendActivityJoinRequest,
            json!({ "user_id": user_id }),
        )
        .await
    }

    /// Rejects a user's ask-to-join request.
    pub async fn close_join_request(&self, user_id: &str) -> ClientResult<Value> {
        self.request(Command::CloseActivityRequest, json!({ "user_id": user_id }))
            .await
    }

    /// Subscribes to `event` on the peer.
    ///
    /// The listener is registered before `SUBSCRIBE` is sent so no event
    /// dispatched right after the reply is missed.
    pub async fn subscribe(&self, event: Event, args: Value) -> ClientResult<Subscription> {
        let handle = self.dispatcher()?;
        let (id, events) = handle.add_subscriber(event).await?;
        let subscription = Subscription::new(id, event, args.clone(), true, events, handle.clone());
        handle
            .request(Command::Subscribe, normalize_args(args), Some(event))
            .await?;
        debug!(%id, ?event, "subscribed");
        Ok(subscription)
    }

    /// Listens for `event` locally without telling the peer.
    pub async fn listen(&self, event: Event) -> ClientResult<Subscription> {
        let handle = self.dispatcher()?;
        let (id, events) = handle.add_subscriber(event).await?;
        Ok(Subscription::new(
            id,
            event,
            Value::Null,
            false,
            events,
            handle.clone(),
        ))
    }

    /// Clears presence, waits the grace period, then closes the connection.
    pub async fn destroy(&mut self) -> ClientResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        if self.state.get().is_ready() {
            let clear = SetActivityArgs::clear(std::process::id());
            let args = serde_json::to_value(clear).map_err(ProtocolError::from)?;
            match tokio::time::timeout(
                self.config.ready_timeout(),
                handle.request(Command::SetActivity, args, None),
            )
            .await
            {
                Ok(Ok(_)) => debug!("presence cleared"),
                Ok(Err(e)) => warn!(error = %e, "failed to clear presence"),
                Err(_) => warn!("timed out clearing presence"),
            }
            tokio::time::sleep(self.config.shutdown_grace()).await;
        }

        handle.close().await;
        self.reap().await;
        info!("client destroyed");
        Ok(())
    }

    /// Waits for a finished connection task and forgets session data.
    async fn reap(&mut self) {
        self.handle = None;
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "connection task failed");
        }
        self.ready = None;
        self.authenticated = None;
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn normalize_args(args: Value) -> Value {
    if args.is_null() { json!({}) } else { args }
}

fn list_field(mut data: Value, field: &str) -> Vec<Value> {
    match data.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
