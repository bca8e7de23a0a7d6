use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use actix::{
    fut::wrap_future, Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Context, Handler,
    Running, StreamHandler, WrapFuture,
};
use actix_ws::{CloseCode, CloseReason, Message, ProtocolError, Session};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics::MetricsCtx;

use super::{
    match_actor::MatchActor,
    messages::{Connect, Disconnect, Resign, RevealComplete, SubmitAction, SyncState, VoteRematch},
    protocol::{ClientMessage, ErrorCode, ServerMessage},
};

/// WebSocket 연결 하나를 관리하는 Actor
pub struct ConnectionActor {
    pub ws_session: Session,            // 웹소켓 세션 제어
    pub match_addr: Addr<MatchActor>,   // 연결된 MatchActor 주소
    pub match_id: Uuid,
    pub player_id: Uuid,                // 이 연결의 플레이어 ID

    pub last_pong: Instant,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub cleanup_started: bool,          // 중복 정리를 방지하기 위한 플래그
    metrics: Arc<MetricsCtx>,
}

impl ConnectionActor {
    /// ConnectionActor의 새 인스턴스를 생성합니다.
    ///
    /// # Arguments
    ///
    /// * `session` - 이 액터가 관리할 웹소켓 세션 객체.
    /// * `match_addr` - 이 플레이어가 참여하는 매치를 관리하는 MatchActor의 주소.
    /// * `player_id` - 이 연결에 해당하는 플레이어의 고유 식별자.
    pub fn new(
        session: Session,
        match_addr: Addr<MatchActor>,
        match_id: Uuid,
        player_id: Uuid,
        heartbeat_interval: Duration,
        client_timeout: Duration,
        metrics: Arc<MetricsCtx>,
    ) -> Self {
        Self {
            ws_session: session,
            match_addr,
            match_id,
            player_id,
            last_pong: Instant::now(),
            heartbeat_interval,
            client_timeout,
            cleanup_started: false,
            metrics,
        }
    }

    fn start_heartbeat_check(&self, ctx: &mut Context<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx_inner| {
            if Instant::now().duration_since(act.last_pong) > act.client_timeout {
                warn!(
                    "Heartbeat timeout for player {} (match {}). Closing connection.",
                    act.player_id, act.match_id
                );
                let session_to_close = act.ws_session.clone();
                ctx_inner.spawn(wrap_future::<_, Self>(async move {
                    let _ = session_to_close
                        .close(Some(CloseReason::from(CloseCode::Policy)))
                        .await;
                }));
                ctx_inner.stop();
                return;
            }

            let mut session_clone = act.ws_session.clone();
            let player_id_log = act.player_id;
            ctx_inner.spawn(wrap_future::<_, Self>(async move {
                if let Err(e) = session_clone.ping(b"heartbeat").await {
                    error!("Failed to send ping to player {}: {:?}", player_id_log, e);
                }
            }));
        });
    }

    fn start_cleanup_task(&mut self) {
        if self.cleanup_started {
            return;
        }
        self.cleanup_started = true;

        let player_id = self.player_id;
        let ws_session_clone = self.ws_session.clone();

        tokio::spawn(async move {
            ws_session_clone.close(None).await.unwrap_or_else(|e| {
                debug!(
                    "WebSocket session for player {} was already closed: {:?}",
                    player_id, e
                );
            });
            info!("Session cleanup task completed: player={}", player_id);
        });
    }

    fn send_text(&self, text: String, ctx: &mut Context<Self>) {
        let mut session_clone = self.ws_session.clone();
        let player_id_log = self.player_id;
        ctx.spawn(wrap_future::<_, Self>(async move {
            if let Err(e) = session_clone.text(text).await {
                error!(
                    "ConnectionActor failed to send text to {}: {:?}",
                    player_id_log, e
                );
            }
        }));
    }

    fn send_error(&self, code: ErrorCode, message: String, ctx: &mut Context<Self>) {
        self.send_text(ServerMessage::Error { code, message }.to_json(), ctx);
    }

    fn forward(&mut self, message: ClientMessage, ctx: &mut Context<Self>) {
        let player_id = self.player_id;
        match message {
            ClientMessage::Action { payload } => {
                // 결과(action_result)는 MatchActor 가 직접 보낸다.
                self.match_addr.do_send(SubmitAction {
                    player_id,
                    request: payload,
                });
            }
            ClientMessage::RevealComplete => {
                self.match_addr.do_send(RevealComplete { player_id });
            }
            ClientMessage::Sync => {
                self.match_addr.do_send(SyncState { player_id });
            }
            ClientMessage::Resign => {
                let request = self.match_addr.send(Resign { player_id });
                ctx.spawn(request.into_actor(self).map(|result, act, ctx| {
                    if let Ok(Err(e)) = result {
                        act.send_error(ErrorCode::Rejected, e.to_string(), ctx);
                    }
                }));
            }
            ClientMessage::Rematch => {
                let request = self.match_addr.send(VoteRematch { player_id });
                ctx.spawn(request.into_actor(self).map(|result, act, ctx| match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => act.send_error(ErrorCode::Rejected, e.to_string(), ctx),
                    Err(e) => act.send_error(ErrorCode::InternalError, e.to_string(), ctx),
                }));
            }
        }
    }
}

impl Actor for ConnectionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        info!(
            "ConnectionActor started for player {} (match {})",
            self.player_id, self.match_id
        );
        self.metrics.ws_connected();
        self.start_heartbeat_check(ctx);

        // MatchActor 에게 자신을 등록
        let register = self.match_addr.send(Connect {
            player_id: self.player_id,
            addr: ctx.address().recipient(),
        });
        ctx.spawn(register.into_actor(self).map(|result, act, ctx| match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Player {} could not join match: {}", act.player_id, e);
                act.send_error(ErrorCode::NotParticipant, e.to_string(), ctx);
                ctx.stop();
            }
            Err(e) => {
                error!("MatchActor for {} is gone: {}", act.match_id, e);
                act.send_error(ErrorCode::MatchNotFound, e.to_string(), ctx);
                ctx.stop();
            }
        }));
    }

    fn stopping(&mut self, _ctx: &mut Context<Self>) -> Running {
        info!(
            "ConnectionActor stopping for player {} (match {})",
            self.player_id, self.match_id
        );
        self.match_addr.do_send(Disconnect {
            player_id: self.player_id,
        });
        self.start_cleanup_task();

        Running::Stop
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.metrics.ws_disconnected();
        info!("ConnectionActor stopped for player {}", self.player_id);
    }
}

impl StreamHandler<Result<Message, ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<Message, ProtocolError>, ctx: &mut Context<Self>) {
        match msg {
            Ok(Message::Ping(ping_msg)) => {
                let mut session_clone = self.ws_session.clone();
                let player_id_log = self.player_id;
                ctx.spawn(wrap_future::<_, Self>(async move {
                    if let Err(e) = session_clone.pong(&ping_msg).await {
                        error!("Failed to send Pong to player {}: {:?}", player_id_log, e);
                    }
                }));
            }
            Ok(Message::Pong(_)) => {
                self.last_pong = Instant::now(); // 클라이언트 활성 시간 갱신
            }
            Ok(Message::Close(reason)) => {
                info!(
                    "Player {} closed the connection. Reason: {:?}",
                    self.player_id, reason
                );
                ctx.stop();
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    debug!("Player {} sent {:?}", self.player_id, message);
                    self.forward(message, ctx);
                }
                Err(e) => {
                    warn!(
                        "Player {}: failed to parse client message '{}': {}",
                        self.player_id, text, e
                    );
                    self.metrics.invalid_payload();
                    self.send_error(
                        ErrorCode::InvalidMessageFormat,
                        format!("Invalid message format: {}", e),
                        ctx,
                    );
                }
            },
            Ok(Message::Binary(_)) => {
                warn!("Player {}: unexpected binary message", self.player_id);
            }
            Err(e) => {
                error!("Player {}: WebSocket error: {}", self.player_id, e);
                ctx.stop();
            }
            _ => {
                debug!("Player {}: unhandled message type", self.player_id);
            }
        }
    }

    fn finished(&mut self, ctx: &mut Context<Self>) {
        info!(
            "WebSocket stream for player {} finished. Stopping actor.",
            self.player_id
        );
        ctx.stop();
    }
}

// MatchActor 로부터 오는 ServerMessage 처리
impl Handler<ServerMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, ctx: &mut Context<Self>) {
        self.send_text(msg.to_json(), ctx);
    }
}
