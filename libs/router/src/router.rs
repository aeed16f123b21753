//! # Router Actor
//!
//! ## Purpose
//!
//! A single task owns every piece of mutable routing state: the connection
//! map, the route table, and the subscription list. Everything reaches it
//! through two bounded channels: commands from [`RouterHandle`]s and link
//! events from adapters: so no lock ever guards routing state and the
//! dispatch path never blocks.
//!
//! ## Dispatch Policy
//!
//! - Broadcast frames fan out to every connection except the one they
//!   arrived on, plus matching local subscribers.
//! - Targeted frames resolve through the route table (0 is a wildcard in
//!   either position) to a deduplicated connection set; an unlearned target
//!   is a silent drop: the route may be observed later.
//! - Every valid inbound frame teaches the table where its source lives,
//!   overwriting any previous path.
//! - Messages with ids outside the dialect are forwarded raw but never
//!   delivered to local subscribers.
//!
//! Forwards and deliveries are `try_send` hand-offs: a saturated link or
//! consumer drops that one frame, never the router.

use std::collections::HashMap;

use mavswitch_codec::{encode, CodecError, Destination, Frame, MavVersion, Message};
use mavswitch_network::{Connection, ConnectionKey, LinkEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache;
use crate::error::RouterError;
use crate::routes::RouteTable;
use crate::subscription::{Delivery, Subscriber, Subscription, SubscriptionId, SubscriptionQuery};

/// Locally originated sequence numbers wrap modulo 255 (values 0..=254).
/// Most MAVLink stacks count modulo 256; peers that track sequence gaps
/// will see a skip at the wrap point, so check here first when chasing
/// interoperability reports.
pub const SEQUENCE_MODULUS: u8 = 255;

const COMMAND_QUEUE: usize = 256;
const LINK_QUEUE: usize = 1024;
const SUBSCRIBER_QUEUE: usize = 64;

/// Identity and addressing of one router instance.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Stable name; the subscription cache is keyed by it across restarts.
    pub name: String,
    pub system_id: u8,
    pub component_id: u8,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            name: "mavswitch".to_string(),
            system_id: 254,
            component_id: 190,
        }
    }
}

/// Commands a [`RouterHandle`] can issue.
enum RouterCommand<M: Message> {
    Send {
        message: M,
        version: MavVersion,
    },
    Subscribe {
        query: SubscriptionQuery,
        sender: mpsc::Sender<Delivery<M>>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Shutdown,
}

/// Cloneable front door to a running router.
#[derive(Debug)]
pub struct RouterHandle<M: Message> {
    commands: mpsc::Sender<RouterCommand<M>>,
}

impl<M: Message> Clone for RouterHandle<M> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<M: Message> RouterHandle<M> {
    /// Enqueue a locally originated message for dispatch at MAVLink 2.
    /// Returns immediately; a targeted message with no learned route is
    /// silently dropped by the router.
    pub async fn send(&self, message: M) -> Result<(), RouterError> {
        self.send_version(message, MavVersion::V2).await
    }

    /// Enqueue with an explicit protocol version.
    pub async fn send_version(
        &self,
        message: M,
        version: MavVersion,
    ) -> Result<(), RouterError> {
        let id = message.message_id();
        if M::crc_extra(id).is_none() {
            return Err(RouterError::ProtocolUndefined(id));
        }
        self.commands
            .send(RouterCommand::Send { message, version })
            .await
            .map_err(|_| RouterError::RouterClosed)
    }

    /// Register a query and receive matching traffic on a fresh channel.
    pub async fn subscribe(&self, query: SubscriptionQuery) -> Result<Subscriber<M>, RouterError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = self.subscribe_with(query, tx).await?;
        Ok(Subscriber::new(id, rx))
    }

    /// Register a query on a caller-provided channel. Re-subscribing with an
    /// identical query on the same channel replaces the old registration.
    pub async fn subscribe_with(
        &self,
        query: SubscriptionQuery,
        sender: mpsc::Sender<Delivery<M>>,
    ) -> Result<SubscriptionId, RouterError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(RouterCommand::Subscribe {
                query,
                sender,
                reply,
            })
            .await
            .map_err(|_| RouterError::RouterClosed)?;
        response.await.map_err(|_| RouterError::RouterClosed)
    }

    /// Remove one registration.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RouterError> {
        self.commands
            .send(RouterCommand::Unsubscribe { id })
            .await
            .map_err(|_| RouterError::RouterClosed)
    }

    /// Stop the router: adapters' write paths close and the route table is
    /// cleared. Cached subscriptions survive for the next router with the
    /// same name.
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        self.commands
            .send(RouterCommand::Shutdown)
            .await
            .map_err(|_| RouterError::RouterClosed)
    }
}

/// The router actor. Construct with [`Router::new`], hand the link sender to
/// adapters, then drive it with [`Router::run`].
pub struct Router<M: Message> {
    name: String,
    local_system: u8,
    local_component: u8,
    connections: HashMap<ConnectionKey, Connection>,
    routes: RouteTable,
    subscriptions: Vec<Subscription<M>>,
    next_sequence: u8,
    next_subscription: u64,
    commands: mpsc::Receiver<RouterCommand<M>>,
    links: mpsc::Receiver<LinkEvent<M>>,
    // Held so the link channel can never close underneath the select loop.
    _links_keepalive: mpsc::Sender<LinkEvent<M>>,
}

impl<M: Message> Router<M> {
    /// Build a router, restoring any subscriptions cached under
    /// `settings.name` earlier in this process's lifetime.
    pub fn new(
        settings: RouterSettings,
    ) -> (Self, RouterHandle<M>, mpsc::Sender<LinkEvent<M>>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (link_tx, link_rx) = mpsc::channel(LINK_QUEUE);

        let subscriptions = cache::restore::<M>(&settings.name);
        if !subscriptions.is_empty() {
            info!(
                router = %settings.name,
                restored = subscriptions.len(),
                "restored cached subscriptions"
            );
        }
        let next_subscription = subscriptions
            .iter()
            .map(|s| s.id.0 + 1)
            .max()
            .unwrap_or(0);

        let router = Self {
            name: settings.name,
            local_system: settings.system_id,
            local_component: settings.component_id,
            connections: HashMap::new(),
            routes: RouteTable::new(),
            subscriptions,
            next_sequence: 0,
            next_subscription,
            commands: command_rx,
            links: link_rx,
            _links_keepalive: link_tx.clone(),
        };
        (router, RouterHandle { commands: command_tx }, link_tx)
    }

    /// Process events until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(
            router = %self.name,
            system_id = self.local_system,
            component_id = self.local_component,
            "router running"
        );
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(RouterCommand::Send { message, version }) => {
                        self.send_local(message, version);
                    }
                    Some(RouterCommand::Subscribe { query, sender, reply }) => {
                        self.subscribe(query, sender, reply);
                    }
                    Some(RouterCommand::Unsubscribe { id }) => {
                        self.unsubscribe(id);
                    }
                    Some(RouterCommand::Shutdown) | None => break,
                },
                event = self.links.recv() => match event {
                    Some(event) => self.on_link_event(event),
                    None => break,
                },
            }
        }

        // Dropping the connection map closes every adapter write path; the
        // subscription cache intentionally outlives the router.
        self.connections.clear();
        self.routes.clear();
        info!(router = %self.name, "router stopped");
    }

    fn on_link_event(&mut self, event: LinkEvent<M>) {
        match event {
            LinkEvent::Connected(connection) => {
                info!(key = %connection.key(), "connection registered");
                self.connections
                    .insert(connection.key().clone(), connection);
            }
            LinkEvent::Disconnected(key) => {
                info!(%key, "connection removed");
                self.connections.remove(&key);
            }
            LinkEvent::Frame { key, frame } => self.dispatch(Some(&key), frame),
            LinkEvent::FrameError { key, error } => match error {
                CodecError::FailedCrc { .. } => warn!(%key, %error, "frame dropped"),
                _ => debug!(%key, %error, "frame dropped"),
            },
        }
    }

    /// Assign source ids and the next sequence number, pack, and route.
    fn send_local(&mut self, message: M, version: MavVersion) {
        let sequence = self.next_sequence;
        self.next_sequence = (self.next_sequence + 1) % SEQUENCE_MODULUS;

        match encode(message, version, sequence, self.local_system, self.local_component) {
            Ok(frame) => self.dispatch(None, frame),
            Err(error) => warn!(%error, "failed to pack outgoing message"),
        }
    }

    /// Route one frame: learn, forward, deliver. `source` is `None` for
    /// locally originated traffic.
    fn dispatch(&mut self, source: Option<&ConnectionKey>, frame: Frame<M>) {
        if let Some(source_key) = source {
            self.routes.learn(
                frame.source_system,
                frame.source_component,
                source_key.clone(),
            );
        }
        if frame.message.is_none() {
            debug!(
                id = frame.message_id,
                "message id unknown to dialect, forwarding raw"
            );
        }

        let destination = frame.destination();
        match destination {
            Destination::Broadcast => {
                for (key, connection) in &self.connections {
                    if Some(key) != source {
                        connection.forward(frame.raw.clone());
                    }
                }
            }
            targeted => {
                let keys = self.routes.resolve(targeted);
                if keys.is_empty() {
                    // Expected transient: the target may announce itself later.
                    debug!(?targeted, "no route for targeted frame, dropping");
                }
                for key in &keys {
                    if Some(key) == source {
                        continue;
                    }
                    if let Some(connection) = self.connections.get(key) {
                        connection.forward(frame.raw.clone());
                    }
                }
            }
        }

        self.deliver_to_subscribers(&frame);
    }

    fn deliver_to_subscribers(&mut self, frame: &Frame<M>) {
        // Frames the dialect cannot materialize are never delivered locally.
        let Some(message) = &frame.message else {
            return;
        };

        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| {
            if !sub.query.matches(frame) {
                return true;
            }
            let delivery = if sub.query.as_frame {
                Delivery::Frame(frame.clone())
            } else {
                Delivery::Message(message.clone())
            };
            match sub.sender.try_send(delivery) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscription = sub.id.0,
                        "subscriber queue full, dropping delivery"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    info!(subscription = sub.id.0, "consumer gone, unsubscribing");
                    false
                }
            }
        });
        if self.subscriptions.len() != before {
            cache::store(&self.name, &self.subscriptions);
        }
    }

    fn subscribe(
        &mut self,
        query: SubscriptionQuery,
        sender: mpsc::Sender<Delivery<M>>,
        reply: oneshot::Sender<SubscriptionId>,
    ) {
        // An identical query on the same channel replaces the old
        // registration.
        self.subscriptions
            .retain(|sub| !(sub.query == query && sub.sender.same_channel(&sender)));

        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        debug!(subscription = id.0, ?query, "subscription added");
        self.subscriptions.push(Subscription { id, query, sender });
        cache::store(&self.name, &self.subscriptions);

        if reply.send(id).is_err() {
            debug!(subscription = id.0, "subscriber vanished before reply");
        }
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        if self.subscriptions.len() != before {
            debug!(subscription = id.0, "subscription removed");
            cache::store(&self.name, &self.subscriptions);
        }
    }
}
