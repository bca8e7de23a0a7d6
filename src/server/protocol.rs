use actix::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    exception::ActionError,
    game::{
        intent::ActionRequest, reveal::RevealResolution, visibility::ViewerState, ActionReport,
        MatchOutcome,
    },
    oracle::Color,
};

// --- Client to Server Messages ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// 한 번의 의도(이동, 드로우, 카드 사용, 공개 카드 선택)를 제출합니다.
    #[serde(rename = "action")]
    Action { payload: ActionRequest },

    /// 공개 애니메이션이 끝났음을 알립니다.
    #[serde(rename = "reveal_complete")]
    RevealComplete,

    /// 종료된 매치의 재대결에 투표합니다.
    #[serde(rename = "rematch")]
    Rematch,

    #[serde(rename = "resign")]
    Resign,

    /// 현재 상태를 다시 요청합니다.
    #[serde(rename = "sync")]
    Sync,
}

// --- Server to Client Messages ---

#[derive(Serialize, Message, Clone, Debug)]
#[rtype(result = "()")]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// 연결이 매치에 등록되었음을 알립니다.
    #[serde(rename = "connected")]
    Connected {
        match_id: Uuid,
        player_id: Uuid,
        color: Color,
    },

    /// 시청자 관점으로 정리된 매치 상태.
    #[serde(rename = "state")]
    State { state: Box<ViewerState> },

    /// 제출된 의도의 처리 결과. 요청한 플레이어에게만 전달됩니다.
    #[serde(rename = "action_result")]
    ActionResult {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        retryable: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<ActionReport>,
    },

    #[serde(rename = "reveal_resolved")]
    RevealResolved { resolution: RevealResolution },

    #[serde(rename = "match_over")]
    MatchOver { outcome: MatchOutcome },

    #[serde(rename = "rematch_started")]
    RematchStarted { color: Color },

    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "type": "error",
                "code": ErrorCode::InternalError,
                "message": e.to_string(),
            })
            .to_string()
        })
    }

    pub fn action_result(result: &Result<ActionReport, ActionError>) -> Self {
        match result {
            Ok(report) => ServerMessage::ActionResult {
                ok: true,
                reason: None,
                retryable: false,
                report: Some(report.clone()),
            },
            Err(e) => ServerMessage::ActionResult {
                ok: false,
                reason: Some(e.to_string()),
                retryable: e.is_retryable(),
                report: None,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidMessageFormat,
    MatchNotFound,
    NotParticipant,
    Rejected,
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_envelope() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"action","payload":{"move":{"from":"e2","to":"e4"},"actionId":"a-7"}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Action { payload } => {
                assert_eq!(payload.action_id.as_deref(), Some("a-7"));
                assert!(payload.move_to.is_some());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn parses_unit_messages() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"reveal_complete"}"#).unwrap();
        assert_eq!(msg, ClientMessage::RevealComplete);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"castle"}"#).is_err());
    }

    #[test]
    fn rejected_action_result_carries_reason() {
        let json = ServerMessage::action_result(&Err(ActionError::Busy)).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "action_result");
        assert_eq!(value["ok"], false);
        assert_eq!(value["retryable"], true);
    }
}
