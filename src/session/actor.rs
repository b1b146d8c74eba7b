//! The task that owns a session.
//!
//! Every state change happens here, one message at a time. Transport calls
//! run in spawned tasks and report back as [`Completion`]s tagged with the
//! link epoch, so results from a connection that has since been torn down
//! are recognised and dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, trace, warn};

use super::backoff::ReconnectBackoff;
use super::config::SessionConfig;
use super::events::{Event, EventBus};
use super::keepalive::{Keepalive, KeepaliveAction};
use super::state::{SessionSnapshot, SessionState, StateMachine};
use super::SubmitResult;
use crate::classifier::{status, ResponseClassifier};
use crate::encoder::{self, OutboundMessage};
use crate::error::{AppError, ErrorKind};
use crate::telemetry::counters;
use crate::throttle::ThrottleGate;
use crate::transport::{
    Ack, BindResponse, Connector, Delivery, DeliveryCommand, Link, LinkEvent, SubmitParams,
    SubmitResponse, TransportError,
};

pub(crate) type SubmitReply = oneshot::Sender<Result<SubmitResult, AppError>>;

/// Requests from [`Session`](super::Session) handles.
pub(crate) enum Command {
    Connect,
    Bind,
    Submit {
        message: OutboundMessage,
        reply: SubmitReply,
    },
    Stop {
        deadline: Duration,
        reply: oneshot::Sender<()>,
    },
}

/// Transport results posted back by spawned tasks.
enum Completion {
    Bind {
        epoch: u64,
        result: Result<BindResponse, TransportError>,
    },
    Submit {
        epoch: u64,
        id: u64,
        result: Result<SubmitResponse, TransportError>,
    },
    EnquireLink {
        epoch: u64,
        ping: u64,
        result: Result<u32, TransportError>,
    },
}

struct PendingSubmit {
    reply: SubmitReply,
    started: Instant,
}

pub(crate) struct SessionActor {
    config: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    throttle: Option<Arc<ThrottleGate>>,
    events: Arc<EventBus>,
    snapshot: watch::Sender<SessionSnapshot>,

    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,

    machine: StateMachine,
    keepalive: Keepalive,
    backoff: ReconnectBackoff,
    classifier: ResponseClassifier,

    link: Option<Arc<dyn Link>>,
    link_events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    /// Incremented every time a link is opened
    epoch: u64,

    pending: HashMap<u64, PendingSubmit>,
    next_submit: u64,

    stopped: bool,
    peer_system_id: Option<String>,
    peer_interface_version: Option<u8>,
}

impl SessionActor {
    pub(crate) fn new(
        config: Arc<SessionConfig>,
        connector: Arc<dyn Connector>,
        throttle: Option<Arc<ThrottleGate>>,
        events: Arc<EventBus>,
        snapshot: watch::Sender<SessionSnapshot>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let timeouts = config.timeouts;

        Self {
            keepalive: Keepalive::new(timeouts.activity, timeouts.enquire_link),
            backoff: ReconnectBackoff::new(timeouts.reconnect, timeouts.reconnect_long),
            classifier: ResponseClassifier::new(config.server_cooldown),
            config,
            connector,
            throttle,
            events,
            snapshot,
            commands,
            completions_tx,
            completions,
            machine: StateMachine::new(),
            link: None,
            link_events: None,
            epoch: 0,
            pending: HashMap::new(),
            next_submit: 1,
            stopped: false,
            peer_system_id: None,
            peer_interface_version: None,
        }
    }

    /// Run until stopped or every handle is dropped.
    pub(crate) async fn run(mut self) {
        debug!("session actor started");

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Stop { deadline, reply }) => {
                        self.stop(deadline).await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("all session handles dropped");
                        self.stop(Duration::from_secs(1)).await;
                        break;
                    }
                },
                event = next_link_event(&mut self.link_events) => self.handle_link_event(event),
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                _ = sleep_until_deadline(deadline) => self.handle_timers(Instant::now()),
            }

            self.publish_snapshot();
        }

        debug!("session actor exited");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect(),
            Command::Bind => self.start_bind(),
            Command::Submit { message, reply } => self.submit(message, reply),
            // Handled in run()
            Command::Stop { .. } => {}
        }
    }

    fn connect(&mut self) {
        if self.stopped {
            debug!("connect ignored, session stopped");
            return;
        }
        if self.machine.state() != SessionState::Idle {
            debug!(state = %self.machine.state(), "connect ignored");
            return;
        }
        self.open_link();
    }

    fn open_link(&mut self) {
        if let Err(e) = self.machine.transition(SessionState::Connecting) {
            warn!(error = %e, "cannot open link");
            return;
        }

        self.epoch += 1;
        info!(target_addr = %self.config.target, epoch = self.epoch, "connecting");
        self.emit(Event::Connecting {
            target: self.config.target.clone(),
        });

        let connection = self.connector.connect(&self.config.target);
        self.link = Some(connection.link);
        self.link_events = Some(connection.events);
    }

    fn start_bind(&mut self) {
        if self.machine.state() != SessionState::Connected {
            debug!(state = %self.machine.state(), "bind ignored");
            return;
        }
        let Some(link) = self.link.clone() else {
            return;
        };
        if let Err(e) = self.machine.transition(SessionState::Binding) {
            warn!(error = %e, "cannot bind");
            return;
        }

        info!(system_id = %self.config.bind.system_id, "binding as transceiver");
        self.emit(Event::Binding);

        let params = self.config.bind.clone();
        let epoch = self.epoch;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = link.bind(params).await;
            let _ = tx.send(Completion::Bind { epoch, result });
        });
    }

    fn submit(&mut self, message: OutboundMessage, reply: SubmitReply) {
        let params = match self.prepare_submit(&message) {
            Ok(params) => params,
            Err(e) => {
                debug!(kind = %e.kind, detail = %e.detail, "submit rejected");
                counters::submit(e.kind.as_str());
                let _ = reply.send(Err(e));
                return;
            }
        };

        let Some(link) = self.link.clone() else {
            let _ = reply.send(Err(AppError::unbound()));
            return;
        };

        let id = self.next_submit;
        self.next_submit += 1;
        self.pending.insert(
            id,
            PendingSubmit {
                reply,
                started: Instant::now(),
            },
        );

        trace!(id, destination = %params.destination_addr, "dispatching submit_sm");
        let epoch = self.epoch;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = link.submit(params).await;
            let _ = tx.send(Completion::Submit { epoch, id, result });
        });
    }

    /// Gate checks in order: bound, cool-down, validation, token, encode.
    fn prepare_submit(&mut self, message: &OutboundMessage) -> Result<SubmitParams, AppError> {
        if self.machine.state() != SessionState::Bound {
            return Err(AppError::unbound());
        }
        if self.classifier.is_throttled(Instant::now()) {
            return Err(AppError::server_throttle());
        }

        message.validate()?;

        if let Some(gate) = &self.throttle {
            if !gate.reserve() {
                return Err(AppError::client_throttle());
            }
        }

        encoder::encode(message, &self.config.submit)
    }

    // ------------------------------------------------------------------
    // Link events
    // ------------------------------------------------------------------

    fn handle_link_event(&mut self, event: LinkEvent) {
        trace!(?event, "link event");

        match event {
            LinkEvent::Connected => {
                if self.machine.state() != SessionState::Connecting {
                    debug!(state = %self.machine.state(), "unexpected connect event");
                    return;
                }
                if let Err(e) = self.machine.transition(SessionState::Connected) {
                    warn!(error = %e, "connect transition rejected");
                    return;
                }
                info!(target_addr = %self.config.target, "connected");
                self.emit(Event::Connected);
                self.start_bind();
            }
            LinkEvent::Closed => {
                warn!(state = %self.machine.state(), "connection closed");
                self.reconnect();
            }
            LinkEvent::Error(e) => {
                warn!(error = %e, state = %self.machine.state(), "transport error");
                self.emit_error(&AppError::unknown(e));
                self.reconnect();
            }
            LinkEvent::Deliver(delivery) => self.handle_delivery(delivery),
            LinkEvent::EnquireLink { sequence } => {
                trace!(sequence, "answering peer enquire_link");
                self.acknowledge(Ack::EnquireLink { sequence });
            }
        }
    }

    fn handle_delivery(&mut self, delivery: Delivery) {
        let command = match delivery.command {
            DeliveryCommand::DeliverSm => "deliver_sm",
            DeliveryCommand::DataSm => "data_sm",
        };
        debug!(
            command,
            sequence = delivery.sequence,
            source = %delivery.source_addr,
            receipt = delivery.receipted_message_id.as_deref().unwrap_or(""),
            "delivery received"
        );
        counters::delivery(command);

        self.acknowledge(Ack::Delivery {
            sequence: delivery.sequence,
            command: delivery.command,
            message_id: delivery.receipted_message_id.clone(),
        });

        if self.machine.state() == SessionState::Bound {
            self.keepalive.touch(Instant::now());
        }
        self.emit(Event::Message(delivery));
    }

    fn acknowledge(&self, ack: Ack) {
        let Some(link) = self.link.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = link.acknowledge(ack).await {
                debug!(error = %e, "acknowledge failed");
            }
        });
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Bind { epoch, result } => {
                if epoch != self.epoch || self.machine.state() != SessionState::Binding {
                    trace!(epoch, "stale bind response");
                    return;
                }
                self.on_bind_response(result);
            }
            Completion::Submit { epoch, id, result } => {
                let Some(pending) = self.pending.remove(&id) else {
                    trace!(id, "submit response for rejected call");
                    return;
                };
                if epoch != self.epoch {
                    let _ = pending.reply.send(Err(AppError::unknown("connection closed")));
                    return;
                }
                self.on_submit_response(pending, result);
            }
            Completion::EnquireLink { epoch, ping, result } => {
                if epoch != self.epoch {
                    return;
                }
                match result {
                    Ok(status) => {
                        if status != status::ESME_ROK {
                            debug!(status = status::name(status), "enquire_link_resp with error status");
                        }
                        if self.keepalive.on_response(ping, Instant::now()) {
                            let _ = self.machine.set_pinging(false);
                        }
                    }
                    // The close event that caused this drives the reconnect
                    Err(e) => debug!(ping, error = %e, "enquire_link failed"),
                }
            }
        }
    }

    fn on_bind_response(&mut self, result: Result<BindResponse, TransportError>) {
        match result {
            Ok(resp) if resp.status == status::ESME_ROK => {
                if let Err(e) = self.machine.transition(SessionState::Bound) {
                    warn!(error = %e, "bound transition rejected");
                    return;
                }
                self.backoff.reset();
                self.peer_system_id = resp.system_id;
                self.peer_interface_version = resp.sc_interface_version;
                self.keepalive.touch(Instant::now());

                info!(
                    peer = self.peer_system_id.as_deref().unwrap_or("-"),
                    interface_version = ?self.peer_interface_version,
                    "bound"
                );
                self.emit(Event::Bound {
                    peer_system_id: self.peer_system_id.clone(),
                    peer_interface_version: self.peer_interface_version,
                });
            }
            Ok(resp) => {
                let err = AppError::bind_failed(resp.status);
                warn!(status = status::name(resp.status), "bind rejected");
                self.emit_error(&err);
                self.reconnect();
            }
            Err(e) => {
                warn!(error = %e, "bind failed");
                self.emit_error(&AppError::unknown(format!("bind failed: {}", e)));
                self.reconnect();
            }
        }
    }

    fn on_submit_response(
        &mut self,
        pending: PendingSubmit,
        result: Result<SubmitResponse, TransportError>,
    ) {
        counters::submit_duration(pending.started.elapsed().as_secs_f64());

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                debug!(error = %e, "submit failed in transport");
                counters::submit(ErrorKind::Unknown.as_str());
                let err = AppError::unknown(e.to_string());
                self.emit_error(&err);
                let _ = pending.reply.send(Err(err));
                return;
            }
        };

        let now = Instant::now();

        match self.classifier.classify_at(resp.status, now) {
            None => {
                if self.machine.state() == SessionState::Bound {
                    self.keepalive.touch(now);
                }
                let message_id = resp.message_id.unwrap_or_default();
                debug!(message_id = %message_id, "submit accepted");
                counters::submit("ok");
                let _ = pending.reply.send(Ok(SubmitResult { message_id }));
            }
            Some(err) => {
                if err.kind == ErrorKind::ServerThrottle {
                    if let Err(e) = self.machine.set_throttled(true) {
                        debug!(error = %e, "throttle flag not set");
                    }
                }
                counters::submit(err.kind.as_str());
                self.emit_error(&err);
                let _ = pending.reply.send(Err(err));
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.backoff.deadline(),
            self.classifier.throttled_until(),
            self.keepalive.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn handle_timers(&mut self, now: Instant) {
        if self.backoff.fire(now) && !self.stopped && self.machine.state() == SessionState::Reconnecting
        {
            self.open_link();
        }

        if self.classifier.expire(now) {
            let _ = self.machine.set_throttled(false);
            self.emit(Event::ThrottleCleared);
        }

        match self.keepalive.poll(now) {
            KeepaliveAction::None => {}
            KeepaliveAction::SendPing(ping) => self.send_ping(ping),
            KeepaliveAction::TimedOut => {
                counters::enquire_link_timeout();
                self.emit_error(&AppError::unknown("enquire_link timed out"));
                self.reconnect();
            }
        }
    }

    fn send_ping(&mut self, ping: u64) {
        let Some(link) = self.link.clone() else {
            self.keepalive.cancel();
            return;
        };
        if let Err(e) = self.machine.set_pinging(true) {
            debug!(error = %e, "ping outside bound state");
            self.keepalive.cancel();
            return;
        }
        counters::enquire_link_sent();

        let epoch = self.epoch;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = link.enquire_link().await;
            let _ = tx.send(Completion::EnquireLink { epoch, ping, result });
        });
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Drop the current link and schedule a reconnect, unless stopped.
    fn reconnect(&mut self) {
        self.drop_link("connection closed");

        if self.stopped {
            return;
        }

        let state = self.machine.state();
        if state != SessionState::Reconnecting && state != SessionState::Idle {
            if let Err(e) = self.machine.transition(SessionState::Reconnecting) {
                warn!(error = %e, "reconnect transition rejected");
                return;
            }
        }

        if let Some(delay) = self.backoff.schedule(Instant::now()) {
            let attempt = self.backoff.failures();
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            self.emit(Event::Reconnecting { attempt, delay });
        }
    }

    /// Forget the link, reject in-flight submits and clear link-scoped timers.
    fn drop_link(&mut self, reason: &str) {
        self.link_events = None;
        self.keepalive.cancel();
        self.classifier.reset();

        if let Some(link) = self.link.take() {
            tokio::spawn(async move { link.close().await });
            self.emit(Event::Closed);
        }

        self.reject_pending(reason);
    }

    fn reject_pending(&mut self, reason: &str) {
        if self.pending.is_empty() {
            return;
        }
        debug!(count = self.pending.len(), reason, "rejecting pending submits");
        for (_, pending) in self.pending.drain() {
            counters::submit(ErrorKind::Unknown.as_str());
            let _ = pending.reply.send(Err(AppError::unknown(reason)));
        }
    }

    async fn stop(&mut self, deadline: Duration) {
        info!(state = %self.machine.state(), deadline_ms = deadline.as_millis() as u64, "stopping session");
        self.stopped = true;
        self.keepalive.cancel();
        self.backoff.cancel();
        self.classifier.reset();
        self.link_events = None;

        if let Some(link) = self.link.take() {
            let bound = self.machine.state() == SessionState::Bound;
            let teardown = {
                let link = link.clone();
                async move {
                    if bound {
                        if let Err(e) = link.unbind().await {
                            debug!(error = %e, "unbind failed");
                        }
                    }
                    link.close().await;
                }
            };

            if timeout(deadline, teardown).await.is_err() {
                warn!("teardown deadline elapsed, closing without unbind_resp");
                tokio::spawn(async move { link.close().await });
            }
            self.emit(Event::Closed);
        }

        self.reject_pending("session stopped");

        if let Err(e) = self.machine.transition(SessionState::Idle) {
            warn!(error = %e, "idle transition rejected");
        }
        self.emit(Event::Stopped);
        self.publish_snapshot();
        info!("session stopped");
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    fn emit(&self, event: Event) {
        counters::lifecycle(event.name());
        self.events.publish(event);
    }

    fn emit_error(&self, err: &AppError) {
        counters::session_error(err.kind.as_str());
        self.emit(Event::Error {
            kind: err.kind,
            status: err.status,
            detail: err.detail.clone(),
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            state: self.machine.state(),
            throttled: self.machine.is_throttled(),
            pinging: self.machine.is_pinging(),
            stopped: self.stopped,
            reconnect_attempts: self.backoff.failures(),
            peer_system_id: self.peer_system_id.clone(),
            peer_interface_version: self.peer_interface_version,
        });
    }
}

async fn next_link_event(events: &mut Option<mpsc::UnboundedReceiver<LinkEvent>>) -> LinkEvent {
    match events {
        Some(rx) => rx.recv().await.unwrap_or(LinkEvent::Closed),
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
