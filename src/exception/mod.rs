use actix::MailboxError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use uuid::Uuid;

use crate::arcana::CardId;

// ===================================================================
// 1. 세분화된 에러 타입
// ===================================================================

/// 시스템 레벨의 에러 (I/O, 직렬화, 액터 메일박스 등)
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("System I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("System JSON processing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Actor mailbox error: {0}")]
    Mailbox(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 매치 수명주기와 관련된 에러
#[derive(Debug, Error, PartialEq, Clone)]
pub enum StateError {
    #[error("Match {0} does not exist")]
    MatchNotFound(Uuid),
    #[error("Player {0} is not seated in any match")]
    PlayerNotSeated(Uuid),
    #[error("Player {player_id} is not a participant of match {match_id}")]
    NotParticipant { match_id: Uuid, player_id: Uuid },
    #[error("Player {0} is already seated in another match")]
    AlreadySeated(Uuid),
    #[error("Match {0} is already finished")]
    MatchFinished(Uuid),
}

/// 클라이언트 연결 및 요청 형식과 관련된 에러
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConnectionError {
    #[error("Received invalid payload from client: {0}")]
    InvalidPayload(String),
    #[error("Invalid match request: {0}")]
    InvalidMatchRequest(String),
    #[error("WebSocket handshake failed: {0}")]
    HandshakeFailed(String),
}

/// 턴 엔진이 거부한 의도(intent). 상태 변화 없이 호출자에게 사유만 돌려준다.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ActionError {
    #[error("match is busy processing another action, retry")]
    Busy,
    #[error("a single action may not mix intents: {0}")]
    MixedIntent(String),
    #[error("action carries no intent")]
    EmptyIntent,
    #[error("player {0} is not part of this match")]
    NotParticipant(Uuid),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("the match is already finished")]
    MatchFinished,
    #[error("the match is still in progress")]
    MatchInProgress,
    #[error("arcana have not awakened yet")]
    ArcanaDormant,
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("that piece is {0} and cannot be captured")]
    Protected(&'static str),
    #[error("card instance {0} is not in your hand")]
    CardNotInHand(Uuid),
    #[error("card instance {0} was already used")]
    CardAlreadyUsed(Uuid),
    #[error("only one card may be used per turn")]
    CardLimitReached,
    #[error("drawing is on cooldown until ply {available_at}")]
    DrawCooldown { available_at: u32 },
    #[error("hand is full")]
    HandFull,
    #[error("{card} needs a target: {what}")]
    MissingTarget { card: CardId, what: &'static str },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("no revealed cards are waiting for a choice")]
    NoPendingSelection,
    #[error("waiting for the reveal to finish")]
    RevealPending,
    #[error("{0} had no effect")]
    NoEffect(CardId),
    #[error("cannot end the turn while in check")]
    InCheck,
}

impl ActionError {
    /// Errors a client may retry unchanged once the match settles.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Busy | ActionError::RevealPending)
    }
}

// ===================================================================
// 2. 최상위 GameError
// ===================================================================

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    System(#[from] SystemError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Gameplay(#[from] ActionError),
}

// ===================================================================
// 3. ResponseError를 구현하여 HTTP 응답으로 변환
// ===================================================================

impl ResponseError for GameError {
    fn status_code(&self) -> StatusCode {
        match self {
            GameError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GameError::State(StateError::MatchNotFound(_))
            | GameError::State(StateError::PlayerNotSeated(_)) => StatusCode::NOT_FOUND,
            GameError::State(StateError::NotParticipant { .. }) => StatusCode::FORBIDDEN,
            GameError::State(_) => StatusCode::CONFLICT,
            GameError::Connection(_) => StatusCode::BAD_REQUEST,
            GameError::Gameplay(ActionError::Busy) => StatusCode::CONFLICT,
            GameError::Gameplay(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_message = self.to_string();

        // 5xx 내부 사유는 클라이언트에 노출하지 않는다.
        let client_message = if status.is_server_error() {
            "An internal server error occurred.".to_string()
        } else {
            error_message.clone()
        };

        tracing::error!("Request failed: {}", error_message);

        HttpResponse::build(status).json(serde_json::json!({ "error": client_message }))
    }
}

// ===================================================================
// 4. From 변환
// ===================================================================

impl From<MailboxError> for GameError {
    fn from(e: MailboxError) -> Self {
        GameError::System(SystemError::Mailbox(e.to_string()))
    }
}

impl From<serde_json::Error> for GameError {
    fn from(e: serde_json::Error) -> Self {
        GameError::System(SystemError::Json(e))
    }
}

impl From<std::io::Error> for GameError {
    fn from(e: std::io::Error) -> Self {
        GameError::System(SystemError::Io(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_hidden_from_clients() {
        let err = GameError::System(SystemError::Internal("secret".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error: secret");
    }

    #[test]
    fn rejected_intents_map_to_bad_request() {
        let err: GameError = ActionError::NotYourTurn.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "it is not your turn");
    }

    #[test]
    fn only_transient_rejections_are_retryable() {
        assert!(ActionError::Busy.is_retryable());
        assert!(ActionError::RevealPending.is_retryable());
        assert!(!ActionError::IllegalMove("e2e5".into()).is_retryable());
    }

    #[test]
    fn protected_reason_names_the_protection() {
        assert!(ActionError::Protected("shielded")
            .to_string()
            .contains("shielded"));
    }
}
