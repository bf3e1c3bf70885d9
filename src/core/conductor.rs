// author: kodeholic
// Conductor: 단일 협상 상태 머신 (owner 루프)
//
// 세 개의 독립 클록을 하나의 이벤트 채널로 직렬화한다:
//   - 시그널링 transport  → ConductorEvent::Transport
//   - 미디어 엔진 콜백    → ConductorEvent::Engine { session, .. }
//   - UI / 컨트롤 API     → ConductorEvent::Ui
//
// 모든 상태 전이는 handle() 안에서만 일어난다. 어떤 경로도 owner 루프를 블로킹하지 않는다.
//
// 에러 정책 (absorb):
//   Parse / ProtocolViolation → 로그 후 폐기, 상태 변화 없음
//   NegotiationFailure        → teardown + UI 알림
//   TransportFailure / Io     → teardown + sign out + UI 알림
//   InitializationFailure     → 세션이 없으므로 UI 알림만

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::config;
use crate::core::queue::{OutboundMessage, OutboundQueue};
use crate::core::state::{
    Negotiation, NegotiationMode, PeerId, Role, SessionPhase, SessionSnapshot, SessionState,
};
use crate::engine::{EngineAdapter, EngineEvent, MediaEngine, SessionHandle, TrackKind};
use crate::error::{ConductorError, ConductorResult};
use crate::protocol::{
    classify, decode, encode_with_transaction, DecodedMessage, Dispatch, EnvelopeKind,
    GenericEnvelope, IceCandidate, PendingKind, SdpType, SessionDescription, TransactionMap,
};
use crate::signaling::{Credentials, SignalingTransport, TransportEvent};
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::ui::{UiCommand, UiSurface, UiView};
use crate::utils::current_timestamp;

/// owner 루프로 들어오는 모든 입력
#[derive(Debug)]
pub enum ConductorEvent {
    Transport(TransportEvent),
    Engine { session: SessionHandle, event: EngineEvent },
    Ui(UiCommand),
    /// 트랜잭션 reaper 주기 알림
    ExpireTransactions,
    Shutdown,
}

pub struct Conductor {
    state:        SessionState,
    queue:        OutboundQueue,
    transactions: TransactionMap,
    engine:       EngineAdapter,
    transport:    Arc<dyn SignalingTransport>,
    ui:           Arc<dyn UiSurface>,
    trace_hub:    Arc<TraceHub>,
    credentials:  Credentials,
    signed_in:    bool,
    status_tx:    watch::Sender<SessionSnapshot>,
}

impl Conductor {
    pub fn new(
        engine:      Arc<dyn MediaEngine>,
        transport:   Arc<dyn SignalingTransport>,
        ui:          Arc<dyn UiSurface>,
        trace_hub:   Arc<TraceHub>,
        credentials: Credentials,
        events_tx:   mpsc::UnboundedSender<ConductorEvent>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            state:        SessionState::Idle,
            queue:        OutboundQueue::new(),
            transactions: TransactionMap::new(),
            engine:       EngineAdapter::new(engine, events_tx),
            transport,
            ui,
            trace_hub,
            credentials,
            signed_in:    false,
            status_tx,
        }
    }

    /// 컨트롤 API 용 상태 구독 (handle() 마다 갱신)
    pub fn subscribe_status(&self) -> watch::Receiver<SessionSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn pending_transactions(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let negotiation = self.state.negotiation();
        SessionSnapshot {
            phase:                self.state.phase(),
            peer:                 negotiation.map(|n| n.peer),
            role:                 negotiation.map(|n| n.role),
            mode:                 negotiation.map(|n| n.mode),
            loopback_pending:     negotiation.map(|n| n.loopback_pending).unwrap_or(false),
            signed_in:            self.signed_in,
            queue_len:            self.queue.len(),
            in_flight:            self.queue.is_in_flight(),
            pending_transactions: self.transactions.len(),
        }
    }

    /// owner 루프: 채널이 닫히거나 Shutdown 수신 시 종료
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ConductorEvent>) {
        info!("[conductor] owner loop started");
        self.publish_status();
        while let Some(event) = rx.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        info!("[conductor] owner loop stopped");
    }

    /// 이벤트 1건 처리. false 면 루프 종료
    pub fn handle(&mut self, event: ConductorEvent) -> bool {
        let result = match event {
            ConductorEvent::Transport(event)          => self.on_transport_event(event),
            ConductorEvent::Engine { session, event } => self.on_engine_event(session, event),
            ConductorEvent::Ui(command)               => self.on_ui_command(command),
            ConductorEvent::ExpireTransactions        => {
                self.expire_transactions(current_timestamp());
                Ok(())
            }
            ConductorEvent::Shutdown => {
                self.close();
                self.publish_status();
                return false;
            }
        };
        if let Err(e) = result {
            self.absorb(e);
        }
        self.publish_status();
        true
    }

    // ------------------------------------------------------------------------
    // [에러 정책]
    // ------------------------------------------------------------------------

    fn absorb(&mut self, err: ConductorError) {
        let peer = self.state.peer();
        if !err.is_terminal() {
            warn!("[conductor] {} (dropped)", err);
            self.trace(TraceDir::Sys, peer, "DROPPED", err.to_string());
            return;
        }

        match err {
            ConductorError::NegotiationFailure(_) => {
                warn!("[conductor] {}", err);
                self.teardown("negotiation failure");
                self.ui.message_box("Error", &err.to_string(), false);
                self.return_to_lobby();
            }
            ConductorError::TransportFailure(_) | ConductorError::IoError(_) => {
                warn!("[conductor] {}", err);
                self.teardown("transport failure");
                self.transport.sign_out();
                self.ui.message_box("Error", &err.to_string(), true);
            }
            ConductorError::InitializationFailure(_) => {
                warn!("[conductor] {}", err);
                self.ui.message_box("Error", "Failed to initialize PeerConnection", true);
            }
            ConductorError::Parse(_) | ConductorError::ProtocolViolation(_) => {}
        }
    }

    // ------------------------------------------------------------------------
    // [transport 이벤트]
    // ------------------------------------------------------------------------

    fn on_transport_event(&mut self, event: TransportEvent) -> ConductorResult<()> {
        match event {
            TransportEvent::SignedIn => {
                info!("[conductor] signed in to {}", self.transport.server());
                self.signed_in = true;
                self.trace(TraceDir::Sys, None, "SIGNED_IN", self.transport.server());
                self.ui.switch_to_peer_list(&self.transport.peers());
                Ok(())
            }
            TransportEvent::PeerConnected { id, name } => {
                debug!("[conductor] peer connected id={} name={}", id, name);
                self.refresh_peer_list();
                Ok(())
            }
            TransportEvent::PeerDisconnected(id) => {
                if self.state.peer() == Some(id) {
                    info!("[conductor] our peer {} disconnected", id);
                    self.teardown("peer disconnected");
                    self.return_to_lobby();
                } else {
                    self.refresh_peer_list();
                }
                Ok(())
            }
            TransportEvent::MessageFromPeer { peer, payload } => self.on_message_from_peer(peer, payload),
            TransportEvent::MessageSent { ok } => self.on_message_sent(ok),
            TransportEvent::Disconnected => {
                info!("[conductor] disconnected from {}", self.transport.server());
                self.signed_in = false;
                self.teardown("signaling disconnected");
                self.queue.clear();
                self.ui.switch_to_connect();
                Ok(())
            }
            TransportEvent::ServerConnectionFailure => {
                self.signed_in = false;
                self.teardown("server connection failure");
                let text = format!("Failed to connect to {}", self.transport.server());
                self.ui.message_box("Error", &text, true);
                Ok(())
            }
        }
    }

    fn on_message_sent(&mut self, ok: bool) -> ConductorResult<()> {
        self.queue.complete();
        if !ok {
            return Err(ConductorError::TransportFailure("transport reported send failure".to_string()));
        }
        self.pump_outbound()
    }

    // ------------------------------------------------------------------------
    // [수신 메시지]
    // ------------------------------------------------------------------------

    fn on_message_from_peer(&mut self, peer: PeerId, payload: Bytes) -> ConductorResult<()> {
        let message  = decode(&payload)?;
        let label    = message.label();
        let dispatch = classify(message)?;
        let opens    = dispatch.opens_session();
        trace!("[conductor] <<< {} from peer {}", label, peer);
        self.trace(TraceDir::In, Some(peer), &label, summarize(&dispatch));

        match dispatch {
            Dispatch::LoopbackOffer => {
                // 다른 피어의 루프백 요청이 진행 중 세션을 뺏지 못한다
                if !self.state.is_idle() {
                    self.ensure_bound_peer(peer)?;
                }
                self.start_loopback(peer)
            }
            Dispatch::Envelope(envelope) => {
                if envelope.kind.resolves_transaction() && !self.state.is_idle() {
                    self.ensure_bound_peer(peer)?;
                }
                self.on_envelope(peer, envelope)
            }
            Dispatch::PeerHangup { reason } => {
                if self.state.peer() == Some(peer) {
                    let reason = reason.unwrap_or_else(|| "remote hangup".to_string());
                    info!("[conductor] peer {} hung up: {}", peer, reason);
                    self.teardown("remote hangup");
                    self.return_to_lobby();
                } else {
                    debug!("[conductor] hangup from peer {} without session, ignored", peer);
                }
                Ok(())
            }
            Dispatch::EndOfCandidates => {
                if !self.state.is_idle() {
                    self.ensure_bound_peer(peer)?;
                }
                debug!("[conductor] peer {} finished gathering candidates", peer);
                Ok(())
            }
            Dispatch::Description { description, transaction } => {
                self.ensure_session(peer, opens)?;
                self.apply_remote_description(description)?;
                if let Some(token) = transaction {
                    self.resolve_transaction(EnvelopeKind::Event, Some(&token), Ok(()))?;
                }
                Ok(())
            }
            Dispatch::Candidate(candidate) => {
                self.ensure_session(peer, opens)?;
                self.apply_remote_candidate(candidate);
                Ok(())
            }
        }
    }

    /// 바인딩된 피어와 일치하는지 확인 (세션 없으면 통과 불가)
    fn ensure_bound_peer(&self, peer: PeerId) -> ConductorResult<()> {
        match self.state.peer() {
            Some(bound) if bound == peer => Ok(()),
            Some(bound) => Err(ConductorError::ProtocolViolation(format!(
                "message from peer {} while negotiating with peer {}", peer, bound
            ))),
            None => Err(ConductorError::ProtocolViolation(format!(
                "message from peer {} without a negotiation", peer
            ))),
        }
    }

    /// 세션이 있으면 피어 일치 확인, 없으면 (열 수 있는 메시지일 때) answerer 세션 생성
    fn ensure_session(&mut self, peer: PeerId, opens_session: bool) -> ConductorResult<()> {
        if self.state.is_idle() {
            if !opens_session {
                return Err(ConductorError::ProtocolViolation(format!(
                    "peer {} sent a message that cannot open a negotiation", peer
                )));
            }
            return self.open_session(peer, Role::Answerer, NegotiationMode::Normal);
        }
        self.ensure_bound_peer(peer)
    }

    fn apply_remote_description(&mut self, description: SessionDescription) -> ConductorResult<()> {
        let phase = self.state.phase();
        let n = match self.state.negotiation_mut() {
            Some(n) => n,
            None    => return Ok(()),
        };

        if n.is_loopback() {
            return Err(ConductorError::ProtocolViolation(
                "remote description during a loopback session".to_string(),
            ));
        }

        match (description.kind, n.role) {
            (SdpType::Offer, Role::Answerer) if phase == SessionPhase::Negotiating && !n.remote_description_set => {
                let handle = n.handle;
                n.remote_description_set = true;
                self.engine.set_remote_description(handle, description);
                self.engine.request_answer(handle);
                info!("[conductor] remote offer applied, answer requested (session {})", handle);
            }
            (SdpType::Answer, Role::Offerer) if phase == SessionPhase::Negotiating && n.local_description_set => {
                let handle = n.handle;
                n.remote_description_set = true;
                self.engine.set_remote_description(handle, description);
                if self.state.promote() {
                    info!("[conductor] remote answer applied, session {} active", handle);
                    self.trace(TraceDir::Sys, self.state.peer(), "ACTIVE", format!("session {}", handle));
                }
            }
            (kind, role) => {
                return Err(ConductorError::ProtocolViolation(format!(
                    "unexpected {} for {:?} in {} (local_set={}, remote_set={})",
                    kind, role, phase, n.local_description_set, n.remote_description_set
                )));
            }
        }
        Ok(())
    }

    /// trickle candidate 는 description 교환과 무관하게 즉시 엔진으로 전달
    fn apply_remote_candidate(&mut self, candidate: IceCandidate) {
        if let Some(handle) = self.state.handle() {
            debug!("[conductor] remote candidate mid={} -> session {}", candidate.sdp_mid, handle);
            self.engine.add_ice_candidate(handle, candidate);
        }
    }

    fn on_envelope(&mut self, peer: PeerId, envelope: GenericEnvelope) -> ConductorResult<()> {
        let token = envelope.transaction.as_deref();
        match &envelope.kind {
            EnvelopeKind::Ack => {
                // trickle 은 ack 가 최종 응답: 나머지는 수신 확인일 뿐
                let is_candidate = token
                    .and_then(|t| self.transactions.peek(t))
                    .map(|p| p.kind == PendingKind::Candidate)
                    .unwrap_or(false);
                if is_candidate {
                    self.resolve_transaction(EnvelopeKind::Ack, token, Ok(()))?;
                } else {
                    trace!("[conductor] ack from peer {} ({:?})", peer, token);
                }
                Ok(())
            }
            EnvelopeKind::Keepalive => {
                trace!("[conductor] keepalive from peer {}", peer);
                Ok(())
            }
            EnvelopeKind::Success => self.resolve_transaction(EnvelopeKind::Success, token, Ok(())),
            EnvelopeKind::Error => {
                let reason = envelope.error_reason();
                self.resolve_transaction(EnvelopeKind::Error, token, Err(reason))
            }
            EnvelopeKind::Event => {
                if token.is_some() {
                    self.resolve_transaction(EnvelopeKind::Event, token, Ok(()))
                } else {
                    debug!("[conductor] plugin event from peer {}: {:?}", peer, envelope.fields.get("plugindata"));
                    Ok(())
                }
            }
            EnvelopeKind::Webrtcup => {
                info!("[conductor] webrtcup: media path established with peer {}", peer);
                Ok(())
            }
            EnvelopeKind::Media => {
                info!(
                    "[conductor] media {:?} receiving={:?}",
                    envelope.fields.get("type"), envelope.fields.get("receiving")
                );
                Ok(())
            }
            EnvelopeKind::Slowlink => {
                warn!(
                    "[conductor] slowlink uplink={:?} lost={:?}",
                    envelope.fields.get("uplink"), envelope.fields.get("lost")
                );
                Ok(())
            }
            other => {
                debug!("[conductor] envelope {} from peer {} ignored", other, peer);
                Ok(())
            }
        }
    }

    fn resolve_transaction(
        &mut self,
        kind:    EnvelopeKind,
        token:   Option<&str>,
        outcome: Result<(), String>,
    ) -> ConductorResult<()> {
        let token = match token {
            Some(t) => t,
            None => {
                debug!("[conductor] {} without transaction, ignored", kind);
                return Ok(());
            }
        };

        let pending = match self.transactions.resolve(token) {
            Some(p) => p,
            None => {
                warn!("[conductor] unmatched transaction {} ({}), dropped", token, kind);
                self.trace(TraceDir::Sys, None, "UNMATCHED", format!("{} {}", kind, token));
                return Ok(());
            }
        };

        if self.state.handle() != Some(pending.session) {
            debug!("[conductor] {} for closed session {} (tx={}), ignored", kind, pending.session, token);
            return Ok(());
        }

        match outcome {
            Ok(()) => {
                debug!("[conductor] {} resolved by {} (tx={})", pending.kind, kind, token);
                Ok(())
            }
            Err(reason) if pending.kind.is_description() => Err(ConductorError::NegotiationFailure(
                format!("{} rejected by peer: {}", pending.kind, reason),
            )),
            Err(reason) => {
                warn!("[conductor] {} rejected by peer: {} (tx={})", pending.kind, reason, token);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // [세션 생성 / 루프백]
    // ------------------------------------------------------------------------

    fn open_session(&mut self, peer: PeerId, role: Role, mode: NegotiationMode) -> ConductorResult<()> {
        let handle = self.engine.create_session(mode)?;
        self.state = SessionState::Negotiating(Negotiation::new(peer, handle, role, mode));
        self.engine.add_local_tracks(handle);

        info!("[conductor] session {} opened with peer {} ({:?}, {:?})", handle, peer, role, mode);
        self.trace(TraceDir::Sys, Some(peer), "NEGOTIATING", format!("session {} {:?} {:?}", handle, role, mode));
        Ok(())
    }

    /// offer-loopback: 기존 세션을 DTLS 없는 루프백 세션으로 교체하고 offer 요청
    fn start_loopback(&mut self, peer: PeerId) -> ConductorResult<()> {
        self.teardown("loopback re-initialization");
        self.open_session(peer, Role::Offerer, NegotiationMode::Loopback)?;

        if let Some(n) = self.state.negotiation_mut() {
            n.loopback_pending = true;
            let handle = n.handle;
            self.engine.request_offer(handle);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // [엔진 이벤트]
    // ------------------------------------------------------------------------

    fn on_engine_event(&mut self, session: SessionHandle, event: EngineEvent) -> ConductorResult<()> {
        if self.state.handle() != Some(session) {
            debug!("[conductor] late {} for session {} discarded (current={:?})",
                event.label(), session, self.state.handle());
            return Ok(());
        }

        match event {
            EngineEvent::LocalDescription(description) => self.on_local_description(description),
            EngineEvent::LocalCandidate(candidate)     => self.on_local_candidate(candidate),
            EngineEvent::LocalTrackAdded(track) => {
                if track.kind == TrackKind::Video {
                    self.ui.start_local_renderer(&track);
                }
                if self.ui.current_view() != UiView::Streaming {
                    self.ui.switch_to_streaming();
                }
                Ok(())
            }
            EngineEvent::RemoteTrackAdded(track) => {
                if track.kind == TrackKind::Video {
                    self.ui.start_remote_renderer(&track);
                }
                Ok(())
            }
            EngineEvent::RemoteTrackRemoved(track) => {
                if track.kind == TrackKind::Video {
                    self.ui.stop_remote_renderer();
                }
                Ok(())
            }
            EngineEvent::Failed { op, reason } => {
                Err(ConductorError::NegotiationFailure(format!("{} failed: {}", op, reason)))
            }
        }
    }

    fn on_local_description(&mut self, description: SessionDescription) -> ConductorResult<()> {
        let phase = self.state.phase();
        let n = match self.state.negotiation_mut() {
            Some(n) => n,
            None    => return Ok(()),
        };

        let expected = match n.role {
            Role::Offerer  => SdpType::Offer,
            Role::Answerer => SdpType::Answer,
        };
        if phase != SessionPhase::Negotiating || n.local_description_set || description.kind != expected {
            return Err(ConductorError::ProtocolViolation(format!(
                "engine produced {} in {} for {:?} (local_set={})",
                description.kind, phase, n.role, n.local_description_set
            )));
        }

        let (peer, handle) = (n.peer, n.handle);
        n.local_description_set = true;
        self.engine.set_local_description(handle, description.clone());

        if n.is_loopback() {
            // 같은 SDP 를 answer 로 되돌려 자가 협상: 네트워크 왕복 없음
            n.remote_description_set = true;
            n.loopback_pending = false;
            self.engine.set_remote_description(handle, description.to_answer());
            self.trace(TraceDir::Sys, Some(peer), "LOOPBACK", format!("session {} echoed offer as answer", handle));
        } else {
            let kind = PendingKind::for_sdp(description.kind);
            self.send_message(peer, handle, DecodedMessage::Description(description), kind)?;
        }

        if self.state.promote() {
            info!("[conductor] session {} active with peer {}", handle, peer);
            self.trace(TraceDir::Sys, Some(peer), "ACTIVE", format!("session {}", handle));
        }
        Ok(())
    }

    fn on_local_candidate(&mut self, candidate: IceCandidate) -> ConductorResult<()> {
        let (peer, handle, loopback) = match self.state.negotiation() {
            Some(n) => (n.peer, n.handle, n.is_loopback()),
            None    => return Ok(()),
        };
        if loopback {
            self.engine.add_ice_candidate(handle, candidate);
            return Ok(());
        }
        self.send_message(peer, handle, DecodedMessage::Candidate(candidate), PendingKind::Candidate)
    }

    // ------------------------------------------------------------------------
    // [송신]
    // ------------------------------------------------------------------------

    fn send_message(
        &mut self,
        peer:    PeerId,
        handle:  SessionHandle,
        message: DecodedMessage,
        kind:    PendingKind,
    ) -> ConductorResult<()> {
        let token   = self.transactions.register(kind, handle);
        let payload = encode_with_transaction(&message, &token);
        let label   = message.label();

        trace!("[conductor] queue {} for peer {} (tx={})", label, peer, token);
        self.queue.enqueue(OutboundMessage { peer, payload, label, transaction: Some(token) });
        self.pump_outbound()
    }

    /// in-flight 가 없고 transport 가 준비됐을 때 1건 송신
    fn pump_outbound(&mut self) -> ConductorResult<()> {
        let ready = self.transport.is_connected() && !self.transport.is_sending();
        let message = match self.queue.drain_one(ready) {
            Some(m) => m,
            None    => return Ok(()),
        };

        debug!("[queue] >>> {} to peer {} ({} bytes, {} waiting)",
            message.label, message.peer, message.payload.len(), self.queue.len());
        self.trace(TraceDir::Out, Some(message.peer), &message.label,
            message.transaction.clone().unwrap_or_default());

        if !self.transport.send_to_peer(message.peer, message.payload.clone()) {
            self.queue.complete();
            return Err(ConductorError::TransportFailure(format!(
                "failed to send {} to peer {}", message.label, message.peer
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // [UI 명령]
    // ------------------------------------------------------------------------

    fn on_ui_command(&mut self, command: UiCommand) -> ConductorResult<()> {
        debug!("[conductor] ui command {:?}", command);
        match command {
            UiCommand::StartLogin => {
                if self.transport.is_connected() {
                    debug!("[conductor] already connected, login ignored");
                } else {
                    self.transport.connect(&self.credentials);
                }
                Ok(())
            }
            UiCommand::Disconnect => {
                if self.transport.is_connected() {
                    self.transport.sign_out();
                }
                Ok(())
            }
            UiCommand::ConnectToPeer(peer) => self.connect_to_peer(peer),
            UiCommand::DisconnectFromCurrentPeer => {
                if let Some(peer) = self.state.peer() {
                    if !self.transport.send_hang_up(peer) {
                        debug!("[conductor] hangup to peer {} not delivered", peer);
                    }
                    self.teardown("local hangup");
                }
                self.ui.switch_to_peer_list(&self.transport.peers());
                Ok(())
            }
            UiCommand::Close => {
                self.close();
                Ok(())
            }
        }
    }

    fn connect_to_peer(&mut self, peer: PeerId) -> ConductorResult<()> {
        if !self.state.is_idle() {
            warn!("[conductor] connect to peer {} rejected: session already in {}", peer, self.state.phase());
            self.ui.message_box("Error", "We only support connecting to one peer at a time", true);
            return Ok(());
        }

        self.open_session(peer, Role::Offerer, NegotiationMode::Normal)?;
        if let Some(handle) = self.state.handle() {
            self.engine.request_offer(handle);
        }
        Ok(())
    }

    /// sign out + 세션 종료
    pub fn close(&mut self) {
        info!("[conductor] closing");
        self.transport.sign_out();
        self.teardown("closed");
    }

    // ------------------------------------------------------------------------
    // [teardown / 만료]
    // ------------------------------------------------------------------------

    fn teardown(&mut self, reason: &str) {
        let n = match self.state.take() {
            Some(n) => n,
            None    => return,
        };

        self.engine.destroy_session(n.handle);
        let dropped_tx   = self.transactions.drop_session(n.handle);
        let dropped_msgs = self.queue.clear();
        self.ui.stop_local_renderer();
        self.ui.stop_remote_renderer();

        info!("[conductor] session {} with peer {} torn down ({}): {} queued message(s), {} transaction(s) dropped",
            n.handle, n.peer, reason, dropped_msgs, dropped_tx);
        self.trace(TraceDir::Sys, Some(n.peer), "TEARDOWN", reason.to_string());
    }

    /// now 기준 TRANSACTION_TIMEOUT_MS 이상 응답 없는 트랜잭션 폐기 (세션은 유지)
    pub fn expire_transactions(&mut self, now: u64) {
        let expired = self.transactions.expire(now, config::TRANSACTION_TIMEOUT_MS);
        for (token, pending) in &expired {
            warn!("[conductor] transaction {} ({}) expired without reply", token, pending.kind);
        }
        if !expired.is_empty() {
            self.trace(TraceDir::Sys, None, "EXPIRED", format!("{} transaction(s)", expired.len()));
        }
    }

    // ------------------------------------------------------------------------
    // [유틸]
    // ------------------------------------------------------------------------

    fn return_to_lobby(&self) {
        if self.transport.is_connected() {
            self.ui.switch_to_peer_list(&self.transport.peers());
        } else {
            self.ui.switch_to_connect();
        }
    }

    /// 피어 목록 화면일 때만 갱신
    fn refresh_peer_list(&self) {
        if self.ui.current_view() == UiView::PeerList {
            self.ui.switch_to_peer_list(&self.transport.peers());
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.snapshot());
    }

    fn trace(&self, dir: TraceDir, peer: Option<PeerId>, kind: &str, summary: impl Into<String>) {
        self.trace_hub.publish(TraceEvent::new(dir, peer.map(|p| p.0), kind, summary));
    }
}

fn summarize(dispatch: &Dispatch) -> String {
    match dispatch {
        Dispatch::LoopbackOffer                  => "loopback requested".to_string(),
        Dispatch::Description { description, .. } => format!("{} ({} bytes)", description.kind, description.sdp.len()),
        Dispatch::Candidate(c)                   => format!("mid={} {}", c.sdp_mid, c.candidate),
        Dispatch::EndOfCandidates                => "end of candidates".to_string(),
        Dispatch::PeerHangup { reason }          => reason.clone().unwrap_or_default(),
        Dispatch::Envelope(e)                    => format!("{} tx={}", e.kind, e.transaction.as_deref().unwrap_or("-")),
    }
}
