//! Arcana Catalog: the closed set of special-rule cards, their static
//! definitions and the weighted draw used for every award.

pub mod instance;

use std::fmt;

use once_cell::sync::Lazy;
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use serde::{Deserialize, Serialize};

pub use instance::{CardInstance, Hand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardId {
    // protective
    ShieldPawn,
    PawnGuard,
    Sanctuary,
    IronFortress,
    BishopsBlessing,
    DivineIntervention,
    Cleanse,
    // offensive
    PoisonTouch,
    ChainLightning,
    FocusFire,
    DoubleStrike,
    BerserkerRage,
    CursedSquare,
    Plague,
    // movement
    PhantomStep,
    SpectralMarch,
    PawnRush,
    Sharpshooter,
    TemporalEcho,
    EnPassantMaster,
    FirstStrike,
    QueensGambit,
    // board editing
    Execution,
    PromotionRitual,
    Metamorphosis,
    MirrorImage,
    Necromancy,
    RoyalSwap,
    ChaosTheory,
    MindControl,
    CastleBreaker,
    TimeFreeze,
    Sacrifice,
    // information
    Vision,
    LineOfSight,
    Prophecy,
    FogOfWar,
    // meta
    TimeTravel,
    Fortune,
    ArcaneCycle,
    Divination,
}

impl CardId {
    pub const ALL: [CardId; 41] = [
        CardId::ShieldPawn,
        CardId::PawnGuard,
        CardId::Sanctuary,
        CardId::IronFortress,
        CardId::BishopsBlessing,
        CardId::DivineIntervention,
        CardId::Cleanse,
        CardId::PoisonTouch,
        CardId::ChainLightning,
        CardId::FocusFire,
        CardId::DoubleStrike,
        CardId::BerserkerRage,
        CardId::CursedSquare,
        CardId::Plague,
        CardId::PhantomStep,
        CardId::SpectralMarch,
        CardId::PawnRush,
        CardId::Sharpshooter,
        CardId::TemporalEcho,
        CardId::EnPassantMaster,
        CardId::FirstStrike,
        CardId::QueensGambit,
        CardId::Execution,
        CardId::PromotionRitual,
        CardId::Metamorphosis,
        CardId::MirrorImage,
        CardId::Necromancy,
        CardId::RoyalSwap,
        CardId::ChaosTheory,
        CardId::MindControl,
        CardId::CastleBreaker,
        CardId::TimeFreeze,
        CardId::Sacrifice,
        CardId::Vision,
        CardId::LineOfSight,
        CardId::Prophecy,
        CardId::FogOfWar,
        CardId::TimeTravel,
        CardId::Fortune,
        CardId::ArcaneCycle,
        CardId::Divination,
    ];

    pub fn definition(self) -> &'static CardDefinition {
        &CATALOG[self as usize]
    }

    pub fn ends_turn(self) -> bool {
        self.definition().ends_turn
    }

    pub fn as_str(self) -> &'static str {
        self.definition().key
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn weight(self) -> u32 {
        match self {
            Rarity::Common => 50,
            Rarity::Uncommon => 30,
            Rarity::Rare => 14,
            Rarity::Epic => 5,
            Rarity::Legendary => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectClass {
    Protective,
    Offensive,
    Movement,
    BoardEdit,
    Information,
    Meta,
}

/// Which target parameters a card needs before it can be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targeting {
    None,
    OwnPawn,
    OwnBishop,
    OwnPiece,
    EnemyPiece,
    AnySquare,
    EmptySquare,
    /// Own piece in `square`, empty adjacent square in `destination`.
    OwnPieceAndSquare,
    /// Own piece in `square`, new kind in `pieceType`.
    OwnPieceAndKind,
    /// Empty square in `square`, captured kind in `pieceType`.
    SquareAndKind,
    HandCard,
}

impl Targeting {
    pub fn needs_square(self) -> bool {
        !matches!(self, Targeting::None | Targeting::HandCard)
    }

    pub fn needs_destination(self) -> bool {
        matches!(self, Targeting::OwnPieceAndSquare)
    }

    pub fn needs_piece_type(self) -> bool {
        matches!(self, Targeting::OwnPieceAndKind | Targeting::SquareAndKind)
    }

    pub fn needs_card(self) -> bool {
        matches!(self, Targeting::HandCard)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDefinition {
    pub id: CardId,
    #[serde(skip)]
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub class: EffectClass,
    pub ends_turn: bool,
    pub targeting: Targeting,
}

static CATALOG: Lazy<Vec<CardDefinition>> = Lazy::new(|| CardId::ALL.iter().map(|&id| define(id)).collect());

static DRAW_WEIGHTS: Lazy<Vec<u32>> =
    Lazy::new(|| CATALOG.iter().map(|def| def.rarity.weight()).collect());

pub fn catalog() -> &'static [CardDefinition] {
    &CATALOG
}

/// Draws one catalog identity, weighted by rarity.
pub fn draw_random<R: Rng + ?Sized>(rng: &mut R) -> CardId {
    match WeightedIndex::new(DRAW_WEIGHTS.iter()) {
        Ok(dist) => CardId::ALL[dist.sample(rng)],
        // weights are static and non-zero
        Err(_) => CardId::ALL[rng.gen_range(0..CardId::ALL.len())],
    }
}

/// Draws `count` distinct catalog identities for a reveal-and-pick.
pub fn draw_distinct<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<CardId> {
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count.min(CardId::ALL.len()) {
        let card = draw_random(rng);
        if !picked.contains(&card) {
            picked.push(card);
        }
    }
    picked
}

fn define(id: CardId) -> CardDefinition {
    use EffectClass::*;
    use Rarity::*;

    let (key, name, description, rarity, class, ends_turn, targeting) = match id {
        CardId::ShieldPawn => (
            "shield_pawn",
            "Shield Pawn",
            "Shields one of your pawns until your opponent's reply ends.",
            Common,
            Protective,
            false,
            Targeting::OwnPawn,
        ),
        CardId::PawnGuard => (
            "pawn_guard",
            "Pawn Guard",
            "The piece standing behind the chosen pawn cannot be captured.",
            Common,
            Protective,
            false,
            Targeting::OwnPawn,
        ),
        CardId::Sanctuary => (
            "sanctuary",
            "Sanctuary",
            "No piece may be captured on the chosen square for 2 turns.",
            Uncommon,
            Protective,
            true,
            Targeting::AnySquare,
        ),
        CardId::IronFortress => (
            "iron_fortress",
            "Iron Fortress",
            "Your pawns cannot be captured for 2 turns.",
            Rare,
            Protective,
            true,
            Targeting::None,
        ),
        CardId::BishopsBlessing => (
            "bishops_blessing",
            "Bishop's Blessing",
            "Your pieces on the chosen bishop's diagonals are protected for 2 turns.",
            Uncommon,
            Protective,
            false,
            Targeting::OwnBishop,
        ),
        CardId::DivineIntervention => (
            "divine_intervention",
            "Divine Intervention",
            "The next checkmate against you is averted by a summoned defender.",
            Legendary,
            Protective,
            true,
            Targeting::None,
        ),
        CardId::Cleanse => (
            "cleanse",
            "Cleanse",
            "Removes poison from your pieces and curses laid by your opponent.",
            Common,
            Protective,
            false,
            Targeting::None,
        ),
        CardId::PoisonTouch => (
            "poison_touch",
            "Poison Touch",
            "Your next capture poisons an adjacent enemy piece for 3 turns.",
            Uncommon,
            Offensive,
            false,
            Targeting::None,
        ),
        CardId::ChainLightning => (
            "chain_lightning",
            "Chain Lightning",
            "Your next capture destroys one adjacent enemy piece.",
            Rare,
            Offensive,
            false,
            Targeting::None,
        ),
        CardId::FocusFire => (
            "focus_fire",
            "Focus Fire",
            "Your next capture draws a bonus card.",
            Common,
            Offensive,
            false,
            Targeting::None,
        ),
        CardId::DoubleStrike => (
            "double_strike",
            "Double Strike",
            "Your next capture grants a second capture away from the first.",
            Rare,
            Offensive,
            false,
            Targeting::None,
        ),
        CardId::BerserkerRage => (
            "berserker_rage",
            "Berserker Rage",
            "Your next capture grants an extra move.",
            Rare,
            Offensive,
            false,
            Targeting::None,
        ),
        CardId::CursedSquare => (
            "cursed_square",
            "Cursed Square",
            "An enemy piece ending its move on the chosen square is destroyed. Lasts 3 turns.",
            Uncommon,
            Offensive,
            true,
            Targeting::EmptySquare,
        ),
        CardId::Plague => (
            "plague",
            "Plague",
            "Poisons an enemy piece. It dies after 3 turns.",
            Rare,
            Offensive,
            true,
            Targeting::EnemyPiece,
        ),
        CardId::PhantomStep => (
            "phantom_step",
            "Phantom Step",
            "Any of your pieces except the king may move like a knight this turn.",
            Common,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::SpectralMarch => (
            "spectral_march",
            "Spectral March",
            "Rooks and queens may slide through one friendly piece this turn.",
            Uncommon,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::PawnRush => (
            "pawn_rush",
            "Pawn Rush",
            "Pawns may advance two squares from any rank this turn.",
            Common,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::Sharpshooter => (
            "sharpshooter",
            "Sharpshooter",
            "Bishops and queens may capture diagonally through other pieces this turn.",
            Rare,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::TemporalEcho => (
            "temporal_echo",
            "Temporal Echo",
            "Any of your pieces may repeat the last move's pattern this turn.",
            Uncommon,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::EnPassantMaster => (
            "en_passant_master",
            "En Passant Master",
            "Pawns may capture any enemy pawn beside them en passant this turn.",
            Common,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::FirstStrike => (
            "first_strike",
            "First Strike",
            "You may move twice this turn.",
            Epic,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::QueensGambit => (
            "queens_gambit",
            "Queen's Gambit",
            "Sacrifice your queen to move twice this turn.",
            Rare,
            Movement,
            false,
            Targeting::None,
        ),
        CardId::Execution => (
            "execution",
            "Execution",
            "Removes an enemy piece other than the king.",
            Epic,
            BoardEdit,
            true,
            Targeting::EnemyPiece,
        ),
        CardId::PromotionRitual => (
            "promotion_ritual",
            "Promotion Ritual",
            "Promotes one of your pawns to a queen where it stands.",
            Epic,
            BoardEdit,
            true,
            Targeting::OwnPawn,
        ),
        CardId::Metamorphosis => (
            "metamorphosis",
            "Metamorphosis",
            "Transforms one of your pieces into another kind.",
            Rare,
            BoardEdit,
            true,
            Targeting::OwnPieceAndKind,
        ),
        CardId::MirrorImage => (
            "mirror_image",
            "Mirror Image",
            "Creates a copy of your piece on an adjacent square for 3 turns.",
            Rare,
            BoardEdit,
            true,
            Targeting::OwnPieceAndSquare,
        ),
        CardId::Necromancy => (
            "necromancy",
            "Necromancy",
            "Returns one of your captured pieces to an empty square on your half.",
            Epic,
            BoardEdit,
            true,
            Targeting::SquareAndKind,
        ),
        CardId::RoyalSwap => (
            "royal_swap",
            "Royal Swap",
            "Your king and the chosen pawn trade places.",
            Uncommon,
            BoardEdit,
            true,
            Targeting::OwnPawn,
        ),
        CardId::ChaosTheory => (
            "chaos_theory",
            "Chaos Theory",
            "Up to three pieces per side are scattered to random squares.",
            Legendary,
            BoardEdit,
            true,
            Targeting::None,
        ),
        CardId::MindControl => (
            "mind_control",
            "Mind Control",
            "An enemy piece fights for you for 2 turns.",
            Epic,
            BoardEdit,
            true,
            Targeting::EnemyPiece,
        ),
        CardId::CastleBreaker => (
            "castle_breaker",
            "Castle Breaker",
            "Your opponent cannot castle for 3 turns.",
            Common,
            BoardEdit,
            false,
            Targeting::None,
        ),
        CardId::TimeFreeze => (
            "time_freeze",
            "Time Freeze",
            "Your opponent's next turn is skipped.",
            Legendary,
            BoardEdit,
            true,
            Targeting::None,
        ),
        CardId::Sacrifice => (
            "sacrifice",
            "Sacrifice",
            "Remove one of your pieces to draw two cards.",
            Common,
            Meta,
            false,
            Targeting::OwnPiece,
        ),
        CardId::Vision => (
            "vision",
            "Vision",
            "Reveals every move your opponent could make.",
            Common,
            Information,
            false,
            Targeting::None,
        ),
        CardId::LineOfSight => (
            "line_of_sight",
            "Line of Sight",
            "Reveals which of your pieces are under attack.",
            Common,
            Information,
            false,
            Targeting::None,
        ),
        CardId::Prophecy => (
            "prophecy",
            "Prophecy",
            "Reveals every capture your opponent could make.",
            Uncommon,
            Information,
            false,
            Targeting::None,
        ),
        CardId::FogOfWar => (
            "fog_of_war",
            "Fog of War",
            "Your moves are hidden from your opponent until your next turn.",
            Uncommon,
            Information,
            false,
            Targeting::None,
        ),
        CardId::TimeTravel => (
            "time_travel",
            "Time Travel",
            "Rewinds the board by two moves.",
            Legendary,
            Meta,
            true,
            Targeting::None,
        ),
        CardId::Fortune => (
            "fortune",
            "Fortune",
            "Draw two cards.",
            Uncommon,
            Meta,
            false,
            Targeting::None,
        ),
        CardId::ArcaneCycle => (
            "arcane_cycle",
            "Arcane Cycle",
            "Discard a card from your hand, then draw two.",
            Common,
            Meta,
            false,
            Targeting::HandCard,
        ),
        CardId::Divination => (
            "divination",
            "Divination",
            "Reveal three cards and keep one.",
            Uncommon,
            Meta,
            false,
            Targeting::None,
        ),
    };

    CardDefinition {
        id,
        key,
        name,
        description,
        rarity,
        class,
        ends_turn,
        targeting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn catalog_is_indexed_by_card_id() {
        for id in CardId::ALL {
            assert_eq!(id.definition().id, id);
        }
        assert_eq!(catalog().len(), 41);
    }

    #[test]
    fn keys_match_serde_names() {
        for id in CardId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
    }

    #[test]
    fn turn_ending_cards() {
        let ending: Vec<CardId> = CardId::ALL.into_iter().filter(|c| c.ends_turn()).collect();
        assert_eq!(ending.len(), 15);
        assert!(ending.contains(&CardId::TimeTravel));
        assert!(!ending.contains(&CardId::ShieldPawn));
    }

    #[test]
    fn legendary_cards_are_rare_draws() {
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<CardId> = (0..2000).map(|_| draw_random(&mut rng)).collect();
        let legendary = draws
            .iter()
            .filter(|c| c.definition().rarity == Rarity::Legendary)
            .count();
        let common = draws
            .iter()
            .filter(|c| c.definition().rarity == Rarity::Common)
            .count();
        assert!(legendary < common);
    }

    #[test]
    fn distinct_draws_do_not_repeat() {
        let mut rng = StdRng::seed_from_u64(11);
        let picks = draw_distinct(&mut rng, 3);
        assert_eq!(picks.len(), 3);
        assert_ne!(picks[0], picks[1]);
        assert_ne!(picks[1], picks[2]);
        assert_ne!(picks[0], picks[2]);
    }
}
