//! Session actor: owns the ticket/message caches and processes commands
//! sequentially.
//!
//! The actor runs as one tokio task. Callers talk to it through
//! `SupportSessionHandle`, which sends `SessionCommand`s over an mpsc
//! channel. Lock-free reads go through `ArcSwap`. REST calls run in spawned
//! tasks and post their result back as a command, so a slow fetch never
//! blocks event handling.

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use helpdesk_protocol::{
    ClientEvent, Message, MessageQuery, Role, ServerEvent, Ticket, TicketStatus,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::reconcile::{transition, Effect, Input, Notification, RequestOp, SyncState};
use crate::rest::SupportApi;
use crate::session_command::{answer, Completion, SessionCommand};
use crate::ticket_store::{filter_tickets, TicketFilter};

const COMMAND_CAPACITY: usize = 256;
const NOTIFICATION_CAPACITY: usize = 64;

/// Read-only view of the caches, replaced after every change
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    pub revision: u64,
    pub tickets: Vec<Ticket>,
    pub open_ticket: Option<String>,
    pub messages: Vec<Message>,
    /// End-user messages in the open conversation not yet marked read
    pub unread_from_user: usize,
}

impl SyncSnapshot {
    fn capture(state: &SyncState, revision: u64) -> Self {
        Self {
            revision,
            tickets: state.tickets.tickets().to_vec(),
            open_ticket: state.open_ticket.clone(),
            messages: state.messages.messages().to_vec(),
            unread_from_user: state.messages.unread_count(Role::User),
        }
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == ticket_id)
    }

    pub fn total_unread(&self, role: Role) -> u64 {
        self.tickets
            .iter()
            .map(|t| u64::from(t.unread_messages.get(role)))
            .sum()
    }
}

/// Handle to a running session actor (cheap to Clone).
#[derive(Clone)]
pub struct SupportSessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot: Arc<ArcSwap<SyncSnapshot>>,
    notify_tx: broadcast::Sender<Notification>,
}

impl SupportSessionHandle {
    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.command_tx.send(cmd).await.map_err(|_| {
            warn!(
                component = "session_actor",
                event = "session.command.dropped",
                "Actor channel closed, command dropped"
            );
            SessionError::ActorClosed
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)?
    }

    /// Replace the ticket list from the server
    pub async fn load_tickets(&self) -> Result<(), SessionError> {
        self.request(|tx| SessionCommand::LoadTickets { reply: Some(tx) })
            .await
    }

    /// Make `ticket_id` the open ticket and load its messages
    pub async fn open_ticket(
        &self,
        ticket_id: impl Into<String>,
        query: MessageQuery,
    ) -> Result<(), SessionError> {
        let ticket_id = ticket_id.into();
        self.request(|tx| SessionCommand::OpenTicket {
            ticket_id,
            query,
            reply: Some(tx),
        })
        .await
    }

    pub async fn close_ticket(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::CloseTicket).await
    }

    /// Reply on the open ticket. The returned record is the server's
    /// confirmation; the message shows up in the open list once the channel
    /// echoes it back.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<Message, SessionError> {
        let text = text.into();
        self.request(|reply| SessionCommand::SendMessage { text, reply })
            .await
    }

    pub async fn update_status(
        &self,
        ticket_id: impl Into<String>,
        status: TicketStatus,
    ) -> Result<(), SessionError> {
        let ticket_id = ticket_id.into();
        self.request(|reply| SessionCommand::UpdateStatus {
            ticket_id,
            status,
            reply,
        })
        .await
    }

    /// Feed one inbound channel event (fire-and-forget)
    pub async fn dispatch(&self, event: ServerEvent) -> Result<(), SessionError> {
        self.send(SessionCommand::Dispatch { event }).await
    }

    /// Wait until every command sent before this one has been processed
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Flush { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Lock-free snapshot read.
    pub fn snapshot(&self) -> Arc<SyncSnapshot> {
        self.snapshot.load_full()
    }

    /// Tickets of the current snapshot passing `filter`
    pub fn filtered(&self, filter: &TicketFilter) -> Vec<Ticket> {
        let snapshot = self.snapshot();
        filter_tickets(&snapshot.tickets, filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }
}

/// The actor itself
pub struct SupportSession<A: SupportApi> {
    api: Arc<A>,
    state: SyncState,
    revision: u64,
    snapshot: Arc<ArcSwap<SyncSnapshot>>,
    outbound_tx: mpsc::Sender<ClientEvent>,
    notify_tx: broadcast::Sender<Notification>,
    /// Weak so the actor stops once every handle is dropped
    command_tx: mpsc::WeakSender<SessionCommand>,
}

impl<A: SupportApi> SupportSession<A> {
    /// Spawn the actor. `outbound_tx` receives frames to publish on the
    /// channel; `inbound_rx`, when given, is read alongside commands.
    pub fn spawn(
        api: A,
        outbound_tx: mpsc::Sender<ClientEvent>,
        inbound_rx: Option<mpsc::Receiver<ServerEvent>>,
    ) -> SupportSessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let snapshot = Arc::new(ArcSwap::from_pointee(SyncSnapshot::default()));

        let actor = SupportSession {
            api: Arc::new(api),
            state: SyncState::default(),
            revision: 0,
            snapshot: snapshot.clone(),
            outbound_tx,
            notify_tx: notify_tx.clone(),
            command_tx: command_tx.downgrade(),
        };
        tokio::spawn(actor.run(command_rx, inbound_rx));

        SupportSessionHandle {
            command_tx,
            snapshot,
            notify_tx,
        }
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SessionCommand>,
        mut inbound_rx: Option<mpsc::Receiver<ServerEvent>>,
    ) {
        info!(
            component = "session_actor",
            event = "session.started",
            "Support session started"
        );

        loop {
            let cmd = tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
                event = recv_inbound(&mut inbound_rx) => match event {
                    Some(event) => SessionCommand::Dispatch { event },
                    None => {
                        info!(
                            component = "session_actor",
                            event = "session.inbound.closed",
                            "Event channel closed, continuing with REST only"
                        );
                        inbound_rx = None;
                        continue;
                    }
                },
            };
            self.handle_command(cmd).await;
        }

        info!(
            component = "session_actor",
            event = "session.stopped",
            "Support session stopped"
        );
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::LoadTickets { reply } => {
                let api = Arc::clone(&self.api);
                self.spawn_request(async move {
                    match api.fetch_tickets().await {
                        Ok(tickets) => (Input::TicketsLoaded(tickets), answer(reply, Ok(()))),
                        Err(e) => (
                            Input::RequestFailed {
                                op: RequestOp::LoadTickets,
                                error: e.to_string(),
                            },
                            answer(reply, Err(e.into())),
                        ),
                    }
                });
            }

            SessionCommand::OpenTicket {
                ticket_id,
                query,
                reply,
            } => {
                self.apply(Input::TicketOpened {
                    ticket_id: ticket_id.clone(),
                })
                .await;
                let generation = self.state.load_generation;
                let api = Arc::clone(&self.api);
                self.spawn_request(async move {
                    match api.fetch_messages(&ticket_id, &query).await {
                        Ok(page) => (
                            Input::MessagesLoaded {
                                ticket_id: page.ticket_id,
                                generation,
                                messages: page.messages,
                            },
                            answer(reply, Ok(())),
                        ),
                        Err(e) => (
                            Input::RequestFailed {
                                op: RequestOp::LoadMessages,
                                error: e.to_string(),
                            },
                            answer(reply, Err(e.into())),
                        ),
                    }
                });
            }

            SessionCommand::SendMessage { text, reply } => {
                let Some(ticket_id) = self.state.open_ticket.clone() else {
                    let _ = reply.send(Err(SessionError::NoOpenTicket));
                    return;
                };
                let api = Arc::clone(&self.api);
                self.spawn_request(async move {
                    match api.reply(&ticket_id, &text).await {
                        Ok(confirmed) => {
                            let message =
                                confirmed.unwrap_or_else(|| Message::new(Role::Admin, text));
                            (
                                Input::MessageSent {
                                    ticket_id,
                                    message: message.clone(),
                                },
                                answer(Some(reply), Ok(message)),
                            )
                        }
                        Err(e) => (
                            Input::RequestFailed {
                                op: RequestOp::SendMessage,
                                error: e.to_string(),
                            },
                            answer(Some(reply), Err(e.into())),
                        ),
                    }
                });
            }

            SessionCommand::UpdateStatus {
                ticket_id,
                status,
                reply,
            } => {
                let api = Arc::clone(&self.api);
                self.spawn_request(async move {
                    match api.update_status(&ticket_id, status).await {
                        Ok(confirmed) => {
                            let (ticket_id, status) = match confirmed {
                                Some(ticket) => (ticket.id, ticket.status),
                                None => (ticket_id, status),
                            };
                            (
                                Input::StatusUpdated { ticket_id, status },
                                answer(Some(reply), Ok(())),
                            )
                        }
                        Err(e) => (
                            Input::RequestFailed {
                                op: RequestOp::UpdateStatus,
                                error: e.to_string(),
                            },
                            answer(Some(reply), Err(e.into())),
                        ),
                    }
                });
            }

            SessionCommand::CloseTicket => {
                self.apply(Input::TicketClosed).await;
            }

            SessionCommand::Dispatch { event } => {
                debug!(
                    component = "session_actor",
                    event = "session.inbound.event",
                    name = event.name(),
                    ticket_id = %event.ticket_id(),
                    "Inbound channel event"
                );
                self.apply(Input::Event(event)).await;
            }

            SessionCommand::RequestCompleted { input, done } => {
                self.apply(input).await;
                if let Some(done) = done {
                    done();
                }
            }

            SessionCommand::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }

    /// Run the reconciler and execute its effects
    async fn apply(&mut self, input: Input) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = transition(state, input);
        self.state = state;
        self.refresh_snapshot();

        for effect in effects {
            self.execute(effect).await;
        }
    }

    fn refresh_snapshot(&mut self) {
        self.revision += 1;
        self.snapshot
            .store(Arc::new(SyncSnapshot::capture(&self.state, self.revision)));
    }

    async fn execute(&self, effect: Effect) {
        match effect {
            Effect::Publish(event) => {
                let name = event.name();
                if self.outbound_tx.send(*event).await.is_err() {
                    warn!(
                        component = "session_actor",
                        event = "session.publish.channel_closed",
                        name,
                        "Outbound channel closed, event dropped"
                    );
                }
            }
            Effect::Notify(notification) => {
                match &notification {
                    Notification::Error { .. } => warn!(
                        component = "session_actor",
                        event = "session.notify.error",
                        notification = %notification,
                        "Request failed"
                    ),
                    _ => info!(
                        component = "session_actor",
                        event = "session.notify",
                        notification = %notification,
                        "Notification"
                    ),
                }
                // No subscribers is fine.
                let _ = self.notify_tx.send(notification);
            }
        }
    }

    /// Run a request off the actor and post its input back when it finishes
    fn spawn_request<F>(&self, request: F)
    where
        F: Future<Output = (Input, Option<Completion>)> + Send + 'static,
    {
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            let (input, done) = request.await;
            let Some(command_tx) = command_tx.upgrade() else {
                debug!(
                    component = "session_actor",
                    event = "session.request.orphaned",
                    "Session gone before request finished"
                );
                return;
            };
            let _ = command_tx
                .send(SessionCommand::RequestCompleted { input, done })
                .await;
        });
    }
}

async fn recv_inbound(rx: &mut Option<mpsc::Receiver<ServerEvent>>) -> Option<ServerEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
