use std::collections::{HashMap, HashSet};

use log::*;
use tokio::sync::oneshot;
use tokio::sync::{mpsc, mpsc::UnboundedReceiver, mpsc::UnboundedSender};
use url::*;

pub use crate::common::*;
use crate::core::{self, Core, Event, Request, SlotId};
use crate::error::*;
use crate::options::cancel::CancelMode;
use crate::serializer::SerializerType;
use crate::streaming::{
    CalleeChannel, CallerChannel, Invocation, Outcome, Rpc, StreamRequest,
};

const DEFAULT_AGENT_STR: &str = concat!("wamp_core-", env!("CARGO_PKG_VERSION"));

/// The callee side of a dispatched plain call: recv the `Invocation`, answer
/// through the paired `CallCompletion` once the user's handler resolves.
pub type CallCompletion = oneshot::Sender<Outcome>;

/// Options one can set when connecting to a WAMP server
pub struct ClientConfig {
    /// Replaces the default user agent string
    agent: String,
    /// A set of all the roles the client will support
    roles: HashSet<ClientRole>,
    /// A priority list of which serializer to use when talking to the server
    serializers: Vec<SerializerType>,

    authextra: WampDict,
    /// Sets the maximum message to be sent over the transport
    max_msg_size: u32,
    /// When using a secure transport, this option disables certificate validation
    ssl_verify: bool,
    /// Additional WebSocket headers on establish connection
    websocket_headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    /// Creates a client config with reasonnable defaults
    ///
    /// Roles :
    /// - [ClientRole::Caller](enum.ClientRole.html#variant.Caller)
    /// - [ClientRole::Callee](enum.ClientRole.html#variant.Callee)
    /// - [ClientRole::Publisher](enum.ClientRole.html#variant.Publisher)
    /// - [ClientRole::Subscriber](enum.ClientRole.html#variant.Subscriber)
    ///
    /// Serializers :
    /// 1. [SerializerType::Json](enum.SerializerType.html#variant.Json)
    /// 2. [SerializerType::MsgPack](enum.SerializerType.html#variant.MsgPack)
    fn default() -> Self {
        ClientConfig {
            agent: String::from(DEFAULT_AGENT_STR),
            roles: [
                ClientRole::Caller,
                ClientRole::Callee,
                ClientRole::Publisher,
                ClientRole::Subscriber,
            ]
            .iter()
            .cloned()
            .collect(),
            serializers: vec![SerializerType::Json, SerializerType::MsgPack, SerializerType::Cbor],
            max_msg_size: 0,
            ssl_verify: true,
            websocket_headers: HashMap::new(),
            authextra: WampDict::new(),
        }
    }
}

impl ClientConfig {
    /// Replaces the default user agent string. Set to a zero length string to disable
    pub fn set_agent<T: AsRef<str>>(mut self, agent: T) -> Self {
        self.agent = String::from(agent.as_ref());
        self
    }
    /// Returns the currently set agent string
    pub fn get_agent(&self) -> &str {
        &self.agent
    }

    /// Sets the `HELLO.Details.authextra` dict sent when joining a realm
    pub fn set_authextra(mut self, authextra: WampDict) -> Self {
        self.authextra = authextra;
        self
    }

    /// Sets the maximum payload size which can be sent over the transport
    /// Set to 0 to use default
    pub fn set_max_msg_size(mut self, msg_size: u32) -> Self {
        self.max_msg_size = msg_size;
        self
    }
    /// Returns the maximum message size for the transport
    pub fn get_max_msg_size(&self) -> Option<u32> {
        if self.max_msg_size == 0 {
            None
        } else {
            Some(self.max_msg_size)
        }
    }

    /// Sets the serializers that will be used in order of preference (serializers[0] will be attempted first)
    pub fn set_serializers(mut self, serializers: Vec<SerializerType>) -> Self {
        self.serializers = serializers;
        self
    }
    /// Returns the priority list of serializers
    pub fn get_serializers(&self) -> &Vec<SerializerType> {
        &self.serializers
    }

    /// Sets the roles that are intended to be used by the client
    pub fn set_roles(mut self, roles: Vec<ClientRole>) -> Self {
        self.roles.drain();
        for role in roles {
            self.roles.insert(role);
        }
        self
    }

    /// Enables (default) or disables TLS certificate validation
    pub fn set_ssl_verify(mut self, val: bool) -> Self {
        self.ssl_verify = val;
        self
    }
    /// Returns whether certificate validation is enabled
    pub fn get_ssl_verify(&self) -> bool {
        self.ssl_verify
    }

    pub fn add_websocket_header(mut self, key: String, val: String) -> Self {
        self.websocket_headers.insert(key, val);
        self
    }
    pub fn get_websocket_headers(&self) -> &HashMap<String, String> {
        &self.websocket_headers
    }
}

/// All the states a client can be in
pub enum ClientState {
    /// The event loop hasnt been spawned yet
    NoEventLoop,
    /// Currently running and connected to a server
    Running,
    /// Disconnected from a server
    Disconnected(Result<(), WampError>),
}

/// Allows interaction as a client with a WAMP server.
///
/// `Client::connect` returns this handle alongside the event loop future; the
/// caller is responsible for spawning that future (this core has no runtime
/// of its own to spawn onto).
pub struct Client {
    config: ClientConfig,
    core_res: UnboundedReceiver<Result<(), WampError>>,
    core_status: ClientState,
    server_roles: HashSet<String>,
    session_id: Option<WampId>,
    ctl_channel: UnboundedSender<Request>,
}

impl Client {
    /// Connects to a WAMP server using the specified protocol
    ///
    /// __Note__
    ///
    /// On success, this function returns :
    /// -  Client : Used to interact with the server
    /// -  Main event loop Future : __This MUST be spawned by the caller__ (e.g using tokio::spawn())
    ///
    /// To customize parmeters used for the connection, see the [ClientConfig](struct.ClientConfig.html) struct
    pub async fn connect<T: AsRef<str>>(
        uri: T,
        cfg: Option<ClientConfig>,
    ) -> Result<(Client, impl std::future::Future<Output = Result<(), WampError>>), WampError> {
        let uri = match Url::parse(uri.as_ref()) {
            Ok(u) => u,
            Err(e) => return Err(WampError::InvalidUri(e)),
        };

        let config = cfg.unwrap_or_default();

        let (ctl_channel, ctl_receiver) = mpsc::unbounded_channel();
        let (core_res_w, core_res) = mpsc::unbounded_channel();

        let ctl_sender = ctl_channel.clone();
        let conn = Core::connect(&uri, &config, (ctl_sender, ctl_receiver), core_res_w).await?;

        Ok((
            Client {
                config,
                server_roles: HashSet::new(),
                session_id: None,
                ctl_channel,
                core_res,
                core_status: ClientState::NoEventLoop,
            },
            conn.event_loop(),
        ))
    }

    /// Attempts to join a realm and start a session with the server.
    async fn inner_join_realm(
        &mut self,
        realm: String,
        authentication_methods: Vec<AuthenticationMethod>,
        authentication_id: Option<String>,
        on_challenge_handler: Option<core::ChallengeHandler>,
    ) -> Result<(), WampError> {
        if let ClientState::NoEventLoop = self.get_cur_status() {
            debug!("Called join_realm() before the event loop is ready... Waiting...");
            self.wait_for_status_change().await;
        }

        if !self.is_connected() {
            return Err(From::from(
                "The client is currently not connected".to_string(),
            ));
        }

        if self.session_id.is_some() {
            return Err(From::from(format!(
                "join_realm('{}') : Client already joined to a realm",
                realm
            )));
        }

        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Join {
            uri: realm,
            roles: self.config.roles.iter().cloned().collect(),
            agent_str: self.config.agent.clone(),
            authentication_methods,
            authentication_id,
            authextra: self.config.authextra.clone(),
            on_challenge_handler,
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        let (session_id, details) = match result.await {
            Ok(r) => r?,
            Err(e) => {
                return Err(From::from(format!(
                    "Core never returned a response : {}",
                    e
                )))
            }
        };

        self.server_roles.drain();
        if let Some(roles) = details.get("roles").and_then(Arg::as_dict) {
            for role in roles.keys() {
                self.server_roles.insert(role.clone());
            }
        }

        self.session_id = Some(session_id);
        debug!("Connected with session_id {} !", session_id);

        Ok(())
    }

    /// Attempts to join a realm and start a session with the server.
    ///
    /// * `realm` - A name of the WAMP realm
    pub async fn join_realm<T: Into<String>>(&mut self, realm: T) -> Result<(), WampError> {
        self.inner_join_realm(realm.into(), vec![], None, None).await
    }

    /// Attempts to join a realm and start a session with the server, answering
    /// any CHALLENGE with `on_challenge_handler`.
    ///
    /// * `realm` - A name of the WAMP realm
    /// * `authentication_methods` - A set of all the authentication methods the client will support
    /// * `authentication_id` - An authentication ID (e.g. username) the client wishes to authenticate as.
    ///   It is required for non-anonymous authentication methods.
    /// * `on_challenge_handler` - Synchronous handler called with `(authmethod, extra)`, returning the
    ///   signature/extra to answer the CHALLENGE with
    pub async fn join_realm_with_authentication<Realm, AuthenticationId, F>(
        &mut self,
        realm: Realm,
        authentication_methods: Vec<AuthenticationMethod>,
        authentication_id: AuthenticationId,
        on_challenge_handler: F,
    ) -> Result<(), WampError>
    where
        Realm: Into<String>,
        AuthenticationId: Into<String>,
        F: Fn(WampString, WampDict) -> AuthenticationChallengeResponse + Send + Sync + 'static,
    {
        self.inner_join_realm(
            realm.into(),
            authentication_methods,
            Some(authentication_id.into()),
            Some(Box::new(on_challenge_handler)),
        )
        .await
    }

    /// Leaves the current realm and terminates the session with the server
    pub async fn leave_realm(&mut self) -> Result<(), WampError> {
        if !self.is_connected() {
            return Err(From::from(
                "The client is currently not connected".to_string(),
            ));
        }

        if self.session_id.take().is_none() {
            return Ok(());
        }

        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Leave { res }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r?,
            Err(e) => {
                return Err(From::from(format!(
                    "Core never returned a response : {}",
                    e
                )))
            }
        };

        Ok(())
    }

    /// Subscribes to events for the specified topic, using the given match policy
    /// (`"exact"`, `"prefix"`, or `"wildcard"`).
    ///
    /// Returns the subscription id (shared by every local subscriber of the
    /// same topic/policy pair), a slot id (unique to this call, required to
    /// unsubscribe) and the receive end of a channel for events published on
    /// the topic.
    pub async fn subscribe<T: AsRef<str>>(
        &self,
        topic: T,
        policy: &str,
    ) -> Result<(WampId, SlotId, UnboundedReceiver<Event>), WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Subscribe {
            uri: topic.as_ref().to_string(),
            policy: policy.to_string(),
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Unsubscribes a single slot from a subscription. When it was the last
    /// local slot for that subscription, also tells the router to stop
    /// delivering events for it.
    pub async fn unsubscribe(&self, subscription_id: WampId, slot_id: SlotId) -> Result<(), WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Unsubscribe {
            subscription_id,
            slot_id,
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Publishes an event on a specific topic.
    ///
    /// Set `options["acknowledge"]` to request a publication id back; otherwise
    /// this resolves as soon as the event is written to the wire.
    pub async fn publish<T: AsRef<str>>(
        &self,
        topic: T,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    ) -> Result<Option<WampId>, WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Publish {
            uri: topic.as_ref().to_string(),
            options,
            arguments,
            arguments_kw,
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Registers a plain RPC endpoint. Each INVOCATION is delivered over the
    /// returned channel alongside a `CallCompletion` the caller answers with
    /// exactly once.
    pub async fn enroll<T: AsRef<str>>(
        &self,
        uri: T,
        options: WampDict,
    ) -> Result<(WampId, mpsc::UnboundedReceiver<(Invocation, CallCompletion)>), WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::EnrollProcedure {
            uri: uri.as_ref().to_string(),
            options,
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Registers a streaming RPC endpoint. Each new invocation is delivered as
    /// a [`CalleeChannel`] over the returned receiver.
    pub async fn enroll_stream<T: AsRef<str>>(
        &self,
        uri: T,
        options: WampDict,
        invitation_expected: bool,
    ) -> Result<(WampId, mpsc::UnboundedReceiver<CalleeChannel>), WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::EnrollStream {
            uri: uri.as_ref().to_string(),
            options,
            invitation_expected,
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Unregisters a previously enrolled procedure or stream
    pub async fn unregister(&self, registration_id: WampId) -> Result<(), WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Unregister { registration_id, res }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Calls a registered RPC endpoint on the server
    pub async fn call<T: AsRef<str>>(&self, procedure: T, rpc: Rpc) -> Result<Outcome, WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::Call {
            procedure: procedure.as_ref().to_string(),
            rpc,
            res,
        }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Cancels an in-flight call
    pub fn cancel_call(&self, request_id: WampId, mode: CancelMode) -> Result<(), WampError> {
        self.ctl_channel
            .send(Request::CancelCall { request_id, mode })
            .map_err(|_| WampError::ClientDied)
    }

    /// Opens a progressive (streaming) call, returning a [`CallerChannel`]
    /// used to send/receive chunks and cancel it.
    pub async fn open_stream(&self, request: StreamRequest) -> Result<CallerChannel, WampError> {
        let (res, result) = oneshot::channel();
        if let Err(e) = self.ctl_channel.send(Request::OpenStream { request, res }) {
            return Err(From::from(format!(
                "Core never received our request : {}",
                e
            )));
        }

        match result.await {
            Ok(r) => r,
            Err(e) => Err(From::from(format!(
                "Core never returned a response : {}",
                e
            ))),
        }
    }

    /// Returns the current client status
    pub fn get_cur_status(&mut self) -> &ClientState {
        let new_status = self.core_res.try_recv();
        match new_status {
            Ok(state) => self.set_next_status(state),
            Err(_) => &self.core_status,
        }
    }

    /// Returns whether we are connected to the server or not
    pub fn is_connected(&mut self) -> bool {
        matches!(self.get_cur_status(), ClientState::Running)
    }

    fn set_next_status(&mut self, new_status: Result<(), WampError>) -> &ClientState {
        if new_status.is_err() {
            self.core_status = ClientState::Disconnected(new_status);
            return &self.core_status;
        }

        match self.core_status {
            ClientState::NoEventLoop => {
                self.core_status = ClientState::Running;
            }
            ClientState::Running => {
                self.core_status = ClientState::Disconnected(new_status);
            }
            ClientState::Disconnected(_) => {
                panic!("Got new core status after already being disconnected");
            }
        }

        &self.core_status
    }

    // Waits until the event loop sends a status change event.
    async fn wait_for_status_change(&mut self) -> &ClientState {
        if let ClientState::Disconnected(ref _r) = self.core_status {
            return &self.core_status;
        }

        let new_status = match self.core_res.recv().await {
            Some(v) => v,
            None => {
                panic!("The event loop died without sending a new status");
            }
        };

        self.set_next_status(new_status)
    }

    /// Blocks the caller until the connection with the server is terminated
    pub async fn block_until_disconnect(&mut self) -> &ClientState {
        let mut cur_status = self.get_cur_status();
        loop {
            match cur_status {
                ClientState::Disconnected(_) => break,
                _ => {
                    cur_status = self.wait_for_status_change().await;
                }
            }
        }

        &self.core_status
    }

    /// Cleanly closes a connection with the server
    pub async fn disconnect(mut self) {
        if self.is_connected() {
            let _ = self.leave_realm().await;
            let _ = self.ctl_channel.send(Request::Shutdown);

            match self.core_res.recv().await {
                Some(Err(e)) => error!("Error while shutting down : {:?}", e),
                None => error!("Core never sent a status after shutting down..."),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_all_four_roles_and_preferred_serializers() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.roles.len(), 4);
        assert_eq!(cfg.get_serializers()[0], SerializerType::Json);
        assert!(cfg.get_ssl_verify());
        assert_eq!(cfg.get_max_msg_size(), None);
    }

    #[test]
    fn empty_agent_string_is_preserved_for_send_rs_to_suppress() {
        let cfg = ClientConfig::default().set_agent("");
        assert_eq!(cfg.get_agent(), "");
    }

    #[test]
    fn set_roles_replaces_rather_than_extends_the_default_set() {
        let cfg = ClientConfig::default().set_roles(vec![ClientRole::Caller]);
        assert_eq!(cfg.roles.len(), 1);
        assert!(cfg.roles.contains(&ClientRole::Caller));
    }

    #[test]
    fn max_msg_size_zero_means_unset() {
        let cfg = ClientConfig::default().set_max_msg_size(0);
        assert_eq!(cfg.get_max_msg_size(), None);
        let cfg = cfg.set_max_msg_size(4096);
        assert_eq!(cfg.get_max_msg_size(), Some(4096));
    }
}
