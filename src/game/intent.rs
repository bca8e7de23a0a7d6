use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    arcana::CardId,
    exception::ActionError,
    oracle::{PieceKind, Square},
    validator::MoveRequest,
};

/// Raw action payload as submitted by a client. Exactly one intent field
/// may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub move_to: Option<MoveRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_card: Option<DrawCardPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_card: Option<UseCardPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_revealed_card: Option<SelectRevealedPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl ActionRequest {
    pub fn play(from: Square, to: Square) -> Self {
        Self {
            move_to: Some(MoveRequest {
                from,
                to,
                promotion: None,
            }),
            ..Default::default()
        }
    }

    pub fn draw() -> Self {
        Self {
            draw_card: Some(DrawCardPayload::default()),
            ..Default::default()
        }
    }

    pub fn use_card(instance_id: Uuid, target: TargetParams) -> Self {
        Self {
            use_card: Some(UseCardPayload {
                instance_id,
                target,
            }),
            ..Default::default()
        }
    }

    pub fn select(card: CardId) -> Self {
        Self {
            select_revealed_card: Some(SelectRevealedPayload { card }),
            ..Default::default()
        }
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawCardPayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCardPayload {
    pub instance_id: Uuid,
    #[serde(default)]
    pub target: TargetParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRevealedPayload {
    pub card: CardId,
}

/// Optional card targets. Which fields are required depends on the card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square: Option<Square>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Square>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_type: Option<PieceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_instance: Option<Uuid>,
}

impl TargetParams {
    pub fn square(square: Square) -> Self {
        Self {
            square: Some(square),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentKind {
    Move,
    DrawCard,
    UseCard,
    SelectRevealedCard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Move(MoveRequest),
    DrawCard,
    UseCard(UseCardPayload),
    SelectRevealedCard(SelectRevealedPayload),
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Move(_) => IntentKind::Move,
            Intent::DrawCard => IntentKind::DrawCard,
            Intent::UseCard(_) => IntentKind::UseCard,
            Intent::SelectRevealedCard(_) => IntentKind::SelectRevealedCard,
        }
    }
}

impl TryFrom<&ActionRequest> for Intent {
    type Error = ActionError;

    fn try_from(request: &ActionRequest) -> Result<Self, Self::Error> {
        let mut present = Vec::new();
        if request.move_to.is_some() {
            present.push("move");
        }
        if request.draw_card.is_some() {
            present.push("drawCard");
        }
        if request.use_card.is_some() {
            present.push("useCard");
        }
        if request.select_revealed_card.is_some() {
            present.push("selectRevealedCard");
        }
        if present.len() > 1 {
            return Err(ActionError::MixedIntent(present.join(", ")));
        }

        if let Some(mv) = request.move_to {
            Ok(Intent::Move(mv))
        } else if request.draw_card.is_some() {
            Ok(Intent::DrawCard)
        } else if let Some(payload) = &request.use_card {
            Ok(Intent::UseCard(payload.clone()))
        } else if let Some(payload) = &request.select_revealed_card {
            Ok(Intent::SelectRevealedCard(payload.clone()))
        } else {
            Err(ActionError::EmptyIntent)
        }
    }
}
