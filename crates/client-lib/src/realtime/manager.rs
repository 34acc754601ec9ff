// ============================================================================
// crates/client-lib/src/realtime/manager.rs
// ============================================================================

//! Realtime connection lifecycle.
//!
//! The manager owns a supervisor task that watches the auth snapshot
//! channel and keeps the websocket connection in sync with it: a
//! connection exists exactly while a signed-in user and an access token
//! are both present. Token rotation tears the connection down and
//! redials with the fresh token; signing out tears it down and clears
//! the update buffers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quickbite_common::{ClientFrame, OrderStatus, UserProfile};

use super::buffer::{UpdateBuffers, UpdateKind, UpdateRecord};
use super::transport::{FrameSink, FrameStream, RealtimeTransport};
use crate::auth::AuthSnapshot;
use crate::metrics::{REALTIME_CONNECTED, REALTIME_DISCONNECTED};

/// Outbound frames queued between an emit call and the supervisor
/// writing them to the socket.
const OUTBOUND_QUEUE: usize = 32;

/// Why a live connection stopped.
enum ConnectionExit {
    /// The auth snapshot changed in a way that invalidates the
    /// connection. The supervisor re-evaluates immediately.
    AuthChanged,
    /// The socket died on its own. The supervisor stays down until the
    /// next auth change rather than hot-looping against a dead server.
    StreamEnded,
    /// The auth channel sender is gone; the supervisor exits.
    ChannelClosed,
}

struct RealtimeShared {
    transport: Arc<dyn RealtimeTransport>,
    url: String,
    buffers: UpdateBuffers,
    outbound: parking_lot::Mutex<Option<mpsc::Sender<ClientFrame>>>,
    connected: AtomicBool,
    joined: parking_lot::Mutex<Vec<String>>,
}

/**
Supervises the websocket connection and buffers inbound events.

Consumers read buffered updates with [`RealtimeManager::updates`] and
acknowledge them with [`RealtimeManager::clear_update`]. Outbound emits
are fire-and-forget: the returned `bool` reports whether the connection
was open when the frame was queued, not whether the server received it.
*/
pub struct RealtimeManager {
    shared: Arc<RealtimeShared>,
    supervisor: JoinHandle<()>,
}

impl RealtimeManager {
    pub fn new(
        transport: Arc<dyn RealtimeTransport>,
        auth: watch::Receiver<AuthSnapshot>,
        url: String,
        buffer_capacity: usize,
    ) -> Self {
        let shared = Arc::new(RealtimeShared {
            transport,
            url,
            buffers: UpdateBuffers::new(buffer_capacity),
            outbound: parking_lot::Mutex::new(None),
            connected: AtomicBool::new(false),
            joined: parking_lot::Mutex::new(Vec::new()),
        });
        let supervisor = tokio::spawn(Arc::clone(&shared).supervise(auth));
        Self { shared, supervisor }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Channels joined on the current connection, in join order.
    #[must_use]
    pub fn joined_channels(&self) -> Vec<String> {
        self.shared.joined.lock().clone()
    }

    /// Oldest-first snapshot of one buffer.
    #[must_use]
    pub fn updates(&self, kind: UpdateKind) -> Vec<UpdateRecord> {
        self.shared.buffers.updates(kind)
    }

    #[must_use]
    pub fn update_count(&self, kind: UpdateKind) -> usize {
        self.shared.buffers.len(kind)
    }

    /// Removes one buffered record by id. Returns whether it was found.
    pub fn clear_update(&self, kind: UpdateKind, id: Uuid) -> bool {
        self.shared.buffers.clear_update(kind, id)
    }

    pub fn clear_all_updates(&self) {
        self.shared.buffers.clear_all();
    }

    /// Emits an order status change. Returns whether the connection was
    /// open when the frame was queued; delivery is not confirmed.
    pub fn send_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: Option<String>,
    ) -> bool {
        self.shared.emit(ClientFrame::OrderStatus {
            order_id: order_id.to_string(),
            status,
            reason,
        })
    }

    /// Emits a courier position. Same open-at-call-time semantics as
    /// [`RealtimeManager::send_order_status`].
    pub fn send_location_update(&self, order_id: &str, lat: f64, lng: f64) -> bool {
        self.shared.emit(ClientFrame::LocationUpdate {
            order_id: order_id.to_string(),
            lat,
            lng,
        })
    }
}

impl Drop for RealtimeManager {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

impl RealtimeShared {
    async fn supervise(self: Arc<Self>, mut rx: watch::Receiver<AuthSnapshot>) {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let generation = snapshot.generation;
            let (user, token) = match (snapshot.user, snapshot.access_token) {
                (Some(user), Some(token)) => (user, token),
                _ => {
                    if rx.changed().await.is_err() {
                        return;
                    }
                    continue;
                },
            };

            match self.transport.connect(&self.url, &token).await {
                Ok((sink, stream)) => {
                    match self.run_connection(user, generation, sink, stream, &mut rx).await {
                        ConnectionExit::AuthChanged => {},
                        ConnectionExit::StreamEnded => {
                            if rx.changed().await.is_err() {
                                return;
                            }
                        },
                        ConnectionExit::ChannelClosed => return,
                    }
                },
                Err(e) => {
                    warn!(error = %e, url = %self.url, "realtime connect failed");
                    if rx.changed().await.is_err() {
                        return;
                    }
                },
            }
        }
    }

    async fn run_connection(
        &self,
        user: UserProfile,
        generation: u64,
        mut sink: Box<dyn FrameSink>,
        mut stream: Box<dyn FrameStream>,
        rx: &mut watch::Receiver<AuthSnapshot>,
    ) -> ConnectionExit {
        let channels = match self.join_channels(&user, &mut sink).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "failed to join realtime channels");
                self.finish_connection(&mut sink).await;
                return ConnectionExit::StreamEnded;
            },
        };

        let (out_tx, mut out_rx) = mpsc::channel(OUTBOUND_QUEUE);
        *self.outbound.lock() = Some(out_tx);
        *self.joined.lock() = channels.clone();
        self.connected.store(true, Ordering::SeqCst);
        counter!(REALTIME_CONNECTED).increment(1);
        info!(user_id = %user.id, channels = ?channels, "realtime connected");

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        self.finish_connection(&mut sink).await;
                        return ConnectionExit::ChannelClosed;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    if !snapshot.is_authenticated() {
                        info!("signed out, closing realtime connection");
                        self.buffers.clear_all();
                        self.finish_connection(&mut sink).await;
                        return ConnectionExit::AuthChanged;
                    }
                    if snapshot.generation != generation {
                        info!("access token rotated, redialing realtime");
                        self.finish_connection(&mut sink).await;
                        return ConnectionExit::AuthChanged;
                    }
                    // Profile edits without a token rotation keep the
                    // connection as-is.
                },
                inbound = stream.next() => {
                    match inbound {
                        Some(Ok(frame)) => {
                            debug!(
                                event = frame.record_type(),
                                order_id = frame.order_id(),
                                "realtime event received"
                            );
                            self.buffers.push(frame);
                        },
                        Some(Err(e)) => {
                            warn!(error = %e, "realtime stream error");
                            self.finish_connection(&mut sink).await;
                            return ConnectionExit::StreamEnded;
                        },
                        None => {
                            info!("realtime connection closed by server");
                            self.finish_connection(&mut sink).await;
                            return ConnectionExit::StreamEnded;
                        },
                    }
                },
                outbound = out_rx.recv() => {
                    match outbound {
                        Some(frame) => {
                            if let Err(e) = sink.send(frame).await {
                                warn!(error = %e, "realtime send failed, dropping connection");
                                self.finish_connection(&mut sink).await;
                                return ConnectionExit::StreamEnded;
                            }
                        },
                        None => {
                            self.finish_connection(&mut sink).await;
                            return ConnectionExit::StreamEnded;
                        },
                    }
                },
            }
        }
    }

    /// Joins the channels the user's role entitles them to. `join:user`
    /// is unconditional; the restaurant channel additionally needs a
    /// restaurant id on the profile.
    async fn join_channels(
        &self,
        user: &UserProfile,
        sink: &mut Box<dyn FrameSink>,
    ) -> Result<Vec<String>, crate::error::AppError> {
        let mut channels = vec!["join:user".to_string()];
        sink.send(ClientFrame::JoinUser).await?;

        if user.role.is_restaurant_owner() {
            if let Some(restaurant_id) = &user.restaurant_id {
                sink.send(ClientFrame::JoinRestaurant {
                    restaurant_id: restaurant_id.clone(),
                })
                .await?;
                channels.push("join:restaurant".to_string());
            } else {
                warn!(user_id = %user.id, "restaurant owner without a restaurant id, skipping restaurant channel");
            }
        }

        if user.role.is_delivery_person() {
            sink.send(ClientFrame::JoinDelivery).await?;
            channels.push("join:delivery".to_string());
        }

        Ok(channels)
    }

    async fn finish_connection(&self, sink: &mut Box<dyn FrameSink>) {
        *self.outbound.lock() = None;
        self.joined.lock().clear();
        if self.connected.swap(false, Ordering::SeqCst) {
            counter!(REALTIME_DISCONNECTED).increment(1);
        }
        sink.close().await;
    }

    fn emit(&self, frame: ClientFrame) -> bool {
        let sender = self.outbound.lock().clone();
        match sender {
            Some(tx) => match tx.try_send(frame) {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "realtime emit dropped");
                    false
                },
            },
            None => false,
        }
    }
}
