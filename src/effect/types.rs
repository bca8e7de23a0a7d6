use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{
    arcana::CardId,
    oracle::{Color, Piece, PieceKind, Square},
};

/// One value per color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorMap<T> {
    pub white: T,
    pub black: T,
}

impl<T> ColorMap<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Color, &T)> {
        [(Color::White, &self.white), (Color::Black, &self.black)].into_iter()
    }
}

impl<T> Index<Color> for ColorMap<T> {
    type Output = T;

    fn index(&self, color: Color) -> &Self::Output {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

impl<T> IndexMut<Color> for ColorMap<T> {
    fn index_mut(&mut self, color: Color) -> &mut Self::Output {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

/// Flags that live for a single turn and are wiped by the next decay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnFlags {
    pub phantom_step: bool,
    pub spectral_march: bool,
    pub pawn_rush: bool,
    pub sharpshooter: bool,
    pub temporal_echo: bool,
    pub en_passant_master: bool,
    pub poison_touch: bool,
    pub chain_lightning: bool,
    pub focus_fire: bool,
    pub double_strike: bool,
    pub berserker_rage: bool,
}

impl TurnFlags {
    pub fn any_movement(&self) -> bool {
        self.phantom_step
            || self.spectral_march
            || self.pawn_rush
            || self.sharpshooter
            || self.temporal_echo
            || self.en_passant_master
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "square", rename_all = "snake_case")]
pub enum ShieldCoverage {
    /// Protects the piece on this exact square.
    Square(Square),
    /// Protects whatever stands directly behind the pawn on this square.
    BehindPawn(Square),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shield {
    pub source: CardId,
    pub coverage: ShieldCoverage,
}

impl Shield {
    /// The square currently protected for a shield owned by `owner`.
    pub fn guarded_square(&self, owner: Color) -> Option<Square> {
        match self.coverage {
            ShieldCoverage::Square(sq) => Some(sq),
            ShieldCoverage::BehindPawn(pawn) => pawn.offset(0, -owner.forward()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedSquare {
    pub square: Square,
    pub owner: Color,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poison {
    pub square: Square,
    pub applied_by: Color,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mirror {
    pub square: Square,
    pub piece: Piece,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fortress {
    pub owner: Color,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blessing {
    pub owner: Color,
    pub squares: Vec<Square>,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindControl {
    pub square: Square,
    pub original: Color,
    pub turns_remaining: u32,
}

/// Move delta that `temporal_echo` lets its owner replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoPattern {
    pub owner: Color,
    pub file_delta: i8,
    pub rank_delta: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraMoveGrant {
    pub source: CardId,
    /// Set by `double_strike`: the follow-up must capture away from this square.
    pub capture_away_from: Option<Square>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivineWard {
    pub turns_remaining: Option<u32>,
}

/// Pieces each color has lost, fed by captures and effect kills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapturedPool {
    lost: ColorMap<Vec<PieceKind>>,
}

impl CapturedPool {
    pub fn push(&mut self, piece: Piece) {
        self.lost[piece.color].push(piece.kind);
    }

    pub fn lost(&self, color: Color) -> &[PieceKind] {
        &self.lost[color]
    }

    /// Removes one lost piece of `kind` for `color`, if any.
    pub fn take(&mut self, color: Color, kind: PieceKind) -> bool {
        match self.lost[color].iter().position(|&k| k == kind) {
            Some(index) => {
                self.lost[color].remove(index);
                true
            }
            None => false,
        }
    }
}
