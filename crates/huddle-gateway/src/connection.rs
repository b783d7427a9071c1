use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::events::ServerEvent;

use crate::auth::Identity;
use crate::broker::{Broker, Delivery, OutboundFrame};
use crate::presence::PresenceRegistry;
use crate::rooms::{GENERAL_ROOM, GroupRouter};

/// Unknown top-level event type.
pub const CLOSE_UNKNOWN_EVENT: u16 = 4400;
/// Unauthenticated or inactive user at the handshake.
pub const CLOSE_POLICY_VIOLATION: u16 = 4403;
/// Outbound queue saturated beyond recovery.
pub const CLOSE_OVERLOADED: u16 = 1011;

/// Server pings every 30 seconds; a peer silent for 3 consecutive intervals
/// (~90s) is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_TICK_LIMIT: u8 = 3;

/// Frames queued beyond this are shed (TYPING) or fatal (everything else).
const OUTBOUND_QUEUE_LIMIT: usize = 256;

/// What the frame handler wants done with the connection afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// The frame carried an event type outside the protocol; close with 4400.
    CloseUnknownType,
}

/// Identity and addressing of one connection, handed to the frame handler.
#[derive(Debug, Clone)]
pub struct ConnectionCtx {
    pub user_id: i64,
    pub username: String,
    pub channel: String,
}

/// Seam between the transport and the chat state machine: the gateway owns
/// sockets and queues, the handler owns event semantics.
pub trait FrameHandler: Send + Sync + 'static {
    fn handle_frame(
        &self,
        ctx: &ConnectionCtx,
        text: &str,
    ) -> impl Future<Output = FrameOutcome> + Send;
}

/// Everything a live connection needs, wired once at startup.
pub struct Gateway<H> {
    pub broker: Arc<dyn Broker>,
    pub presence: PresenceRegistry,
    pub router: GroupRouter,
    pub db: Arc<Database>,
    pub handler: Arc<H>,
}

/// Close an upgraded socket that failed authentication. The WebSocket
/// handshake has already completed at this point, so the policy-violation
/// code goes out as a close frame.
pub async fn reject(mut socket: WebSocket, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: reason.into(),
        })))
        .await;
}

impl<H: FrameHandler> Gateway<H> {
    /// Serve a chat connection: bind presence, subscribe rooms, pump frames.
    pub async fn handle_chat_socket(&self, socket: WebSocket, identity: Identity) {
        let channel = format!("chat.{}", Uuid::new_v4());
        let rx = self.broker.register(&channel);

        // A fresh connection supersedes any previous one for this user.
        if let Some(stale) = self.presence.bind(identity.user_id, &channel) {
            if stale != channel {
                self.broker.close_channel(&stale, 1000, "superseded");
            }
        }

        let memberships = match self.db.list_collaborator_projects(identity.user_id) {
            Ok(memberships) => memberships,
            Err(e) => {
                warn!("membership lookup failed for {}: {e}", identity.user_id);
                Vec::new()
            }
        };
        self.router.subscribe_chat(&channel, &memberships);

        self.presence.set_online(identity.user_id);
        self.broker.group_send(
            GENERAL_ROOM,
            &OutboundFrame::event(&ServerEvent::SetOnline {
                user_id: identity.user_id,
            }),
        );

        info!(
            "{} ({}) connected to chat gateway",
            identity.username, identity.user_id
        );

        let ctx = ConnectionCtx {
            user_id: identity.user_id,
            username: identity.username.clone(),
            channel: channel.clone(),
        };
        run_connection_loop(socket, rx, ctx, Some(self.handler.clone()), self.broker.clone()).await;

        self.broker.remove_channel(&channel);
        if self.presence.release(identity.user_id, &channel) {
            self.presence.set_offline(identity.user_id);
            self.broker.group_send(
                GENERAL_ROOM,
                &OutboundFrame::event(&ServerEvent::SetOffline {
                    user_id: identity.user_id,
                }),
            );
        }

        info!(
            "{} ({}) disconnected from chat gateway",
            identity.username, identity.user_id
        );
    }

    /// Serve a kanban connection: delivery only, no presence binding and no
    /// inbound dispatch.
    pub async fn handle_kanban_socket(&self, socket: WebSocket, identity: Identity) {
        let channel = format!("kanban.{}", Uuid::new_v4());
        let rx = self.broker.register(&channel);

        let memberships = match self.db.list_collaborator_projects(identity.user_id) {
            Ok(memberships) => memberships,
            Err(e) => {
                warn!("membership lookup failed for {}: {e}", identity.user_id);
                Vec::new()
            }
        };
        self.router.subscribe_kanban(&channel, &memberships);

        info!(
            "{} ({}) connected to kanban gateway",
            identity.username, identity.user_id
        );

        let ctx = ConnectionCtx {
            user_id: identity.user_id,
            username: identity.username.clone(),
            channel: channel.clone(),
        };
        run_connection_loop(socket, rx, ctx, None::<Arc<H>>, self.broker.clone()).await;

        self.broker.remove_channel(&channel);
        info!(
            "{} ({}) disconnected from kanban gateway",
            identity.username, identity.user_id
        );
    }
}

/// Shared connection loop: one send task draining the delivery queue with a
/// heartbeat, one recv task feeding inbound frames to the handler. Either
/// side ending tears the other down; disconnect aborts in-flight work.
async fn run_connection_loop<H: FrameHandler>(
    socket: WebSocket,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    ctx: ConnectionCtx,
    handler: Option<Arc<H>>,
    broker: Arc<dyn Broker>,
) {
    let (mut sender, mut receiver) = socket.split();

    let activity = Arc::new(AtomicBool::new(true));
    let activity_recv = activity.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut idle_ticks: u8 = 0;

        loop {
            tokio::select! {
                item = rx.recv() => {
                    match item {
                        None => break,
                        Some(Delivery::Close(code, reason)) => {
                            let _ = sender
                                .send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
                                .await;
                            break;
                        }
                        Some(Delivery::Frame(frame)) => {
                            if rx.len() > OUTBOUND_QUEUE_LIMIT {
                                if frame.droppable {
                                    continue;
                                }
                                warn!("outbound queue saturated, dropping peer");
                                let _ = sender
                                    .send(Message::Close(Some(CloseFrame {
                                        code: CLOSE_OVERLOADED,
                                        reason: "outbound queue saturated".into(),
                                    })))
                                    .await;
                                break;
                            }
                            if sender.send(Message::Text(frame.text.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if activity.swap(false, Ordering::AcqRel) {
                        idle_ticks = 0;
                    } else {
                        idle_ticks += 1;
                        if idle_ticks >= IDLE_TICK_LIMIT {
                            warn!("peer idle past limit, dropping connection");
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_ctx = ctx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            activity_recv.store(true, Ordering::Release);
            match msg {
                Message::Text(text) => {
                    let Some(handler) = handler.as_ref() else {
                        trace!("ignoring inbound frame on delivery-only connection");
                        continue;
                    };
                    match handler.handle_frame(&recv_ctx, &text).await {
                        FrameOutcome::Continue => {}
                        FrameOutcome::CloseUnknownType => {
                            // The close delivery ends the send task, which
                            // tears down the whole connection.
                            broker.close_channel(
                                &recv_ctx.channel,
                                CLOSE_UNKNOWN_EVENT,
                                "unknown event type",
                            );
                        }
                    }
                }
                Message::Close(_) => break,
                // Ping/Pong already refreshed the activity flag.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}
