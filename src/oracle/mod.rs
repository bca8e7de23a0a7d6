//! Rule Oracle adapter.
//!
//! Wraps the `chess` crate behind the small surface the match engine needs:
//! legal move enumeration (optionally for a hypothetical side to move), move
//! application, terminal queries, FEN (de)serialization and validated board
//! editing. Every board mutation goes through [`Position`], so an edit that
//! would produce an impossible position is rejected as a whole.

use std::{fmt, str::FromStr};

use chess::{Board, BoardBuilder, BoardStatus, CastleRights, ChessMove, MoveGen};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("invalid FEN '{0}'")]
    InvalidFen(String),
    #[error("invalid square '{0}'")]
    InvalidSquare(String),
    #[error("invalid piece kind '{0}'")]
    InvalidPieceKind(String),
    #[error("move {0} is not legal in this position")]
    IllegalMove(String),
    #[error("edit would produce an invalid position")]
    InvalidPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub const BOTH: [Color; 2] = [Color::White, Color::Black];

    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Rank step a pawn of this color advances by.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    pub fn back_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    pub fn promotion_rank(self) -> u8 {
        self.opposite().back_rank()
    }

    /// Ranks belonging to this color's half of the board.
    pub fn owns_rank(self, rank: u8) -> bool {
        match self {
            Color::White => rank < 4,
            Color::Black => rank >= 4,
        }
    }

    fn to_chess(self) -> chess::Color {
        match self {
            Color::White => chess::Color::White,
            Color::Black => chess::Color::Black,
        }
    }

    fn from_chess(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        }
    }
}

impl std::ops::Not for Color {
    type Output = Color;

    fn not(self) -> Self::Output {
        self.opposite()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    /// Material value in pawns. The king is priced high enough to dominate any sum.
    pub fn value(self) -> i32 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight | PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 100,
        }
    }

    pub fn is_slider(self) -> bool {
        matches!(self, PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen)
    }

    fn to_chess(self) -> chess::Piece {
        match self {
            PieceKind::Pawn => chess::Piece::Pawn,
            PieceKind::Knight => chess::Piece::Knight,
            PieceKind::Bishop => chess::Piece::Bishop,
            PieceKind::Rook => chess::Piece::Rook,
            PieceKind::Queen => chess::Piece::Queen,
            PieceKind::King => chess::Piece::King,
        }
    }

    fn from_chess(piece: chess::Piece) -> Self {
        match piece {
            chess::Piece::Pawn => PieceKind::Pawn,
            chess::Piece::Knight => PieceKind::Knight,
            chess::Piece::Bishop => PieceKind::Bishop,
            chess::Piece::Rook => PieceKind::Rook,
            chess::Piece::Queen => PieceKind::Queen,
            chess::Piece::King => PieceKind::King,
        }
    }
}

impl FromStr for PieceKind {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p" | "pawn" => Ok(PieceKind::Pawn),
            "n" | "knight" => Ok(PieceKind::Knight),
            "b" | "bishop" => Ok(PieceKind::Bishop),
            "r" | "rook" => Ok(PieceKind::Rook),
            "q" | "queen" => Ok(PieceKind::Queen),
            "k" | "king" => Ok(PieceKind::King),
            _ => Err(OracleError::InvalidPieceKind(s.to_string())),
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }
}

/// Board square, `a1 = 0` through `h8 = 63`. Serialized as algebraic text (`"e4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index < 64 {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn file(self) -> u8 {
        self.0 % 8
    }

    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    pub fn offset(self, file_delta: i8, rank_delta: i8) -> Option<Self> {
        let file = self.file() as i8 + file_delta;
        let rank = self.rank() as i8 + rank_delta;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Square::new(file as u8, rank as u8)
        } else {
            None
        }
    }

    /// `(file delta, rank delta)` from `self` to `other`.
    pub fn delta_to(self, other: Square) -> (i8, i8) {
        (
            other.file() as i8 - self.file() as i8,
            other.rank() as i8 - self.rank() as i8,
        )
    }

    pub fn is_adjacent(self, other: Square) -> bool {
        let (df, dr) = self.delta_to(other);
        self != other && df.abs() <= 1 && dr.abs() <= 1
    }

    pub fn neighbors(self) -> impl Iterator<Item = Square> {
        KING_STEPS
            .iter()
            .filter_map(move |&(df, dr)| self.offset(df, dr))
    }

    /// Squares strictly between two squares on a shared rank, file or diagonal.
    /// Empty when the squares are not aligned or are adjacent.
    pub fn between(self, other: Square) -> Vec<Square> {
        let (df, dr) = self.delta_to(other);
        let aligned = df == 0 || dr == 0 || df.abs() == dr.abs();
        if !aligned || self == other {
            return Vec::new();
        }
        let step = (df.signum(), dr.signum());
        let mut squares = Vec::new();
        let mut cursor = self.offset(step.0, step.1);
        while let Some(sq) = cursor {
            if sq == other {
                break;
            }
            squares.push(sq);
            cursor = sq.offset(step.0, step.1);
        }
        squares
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0u8..64).map(Square)
    }

    fn to_chess(self) -> chess::Square {
        chess::Square::make_square(
            chess::Rank::from_index(self.rank() as usize),
            chess::File::from_index(self.file() as usize),
        )
    }

    fn from_chess(square: chess::Square) -> Self {
        Square(square.to_index() as u8)
    }
}

impl FromStr for Square {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(OracleError::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| OracleError::InvalidSquare(s.to_string()))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }
}

impl Serialize for Square {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

const KING_STEPS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
pub(crate) const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];
const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialFlag {
    DoublePush,
    EnPassant,
    KingsideCastle,
    QueensideCastle,
    Promotion,
}

impl SpecialFlag {
    pub fn is_castle(self) -> bool {
        matches!(self, SpecialFlag::KingsideCastle | SpecialFlag::QueensideCastle)
    }
}

/// A move the engine may apply: either produced by the oracle's own move
/// generator or synthesized by an arcana movement rule in the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMove {
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    /// Square the captured piece stood on. Differs from `to` for en passant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_square: Option<Square>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialFlag>,
}

impl LegalMove {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

impl fmt::Display for LegalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "={}", promotion)?;
        }
        Ok(())
    }
}

/// The move actually applied to the board, stamped with the mover's color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    pub color: Color,
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_square: Option<Square>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialFlag>,
}

impl MoveResult {
    fn from_legal(color: Color, mv: &LegalMove) -> Self {
        Self {
            color,
            from: mv.from,
            to: mv.to,
            piece: mv.piece,
            captured: mv.captured,
            capture_square: mv.capture_square,
            promotion: mv.promotion,
            special: mv.special,
        }
    }

    pub fn delta(&self) -> (i8, i8) {
        self.from.delta_to(self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Terminal {
    Ongoing,
    Checkmate { loser: Color },
    Stalemate,
    InsufficientMaterial,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    board: Board,
}

impl Default for Position {
    fn default() -> Self {
        Self::standard()
    }
}

impl Position {
    pub fn standard() -> Self {
        Self {
            board: Board::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, OracleError> {
        Board::from_str(fen)
            .map(|board| Self { board })
            .map_err(|_| OracleError::InvalidFen(fen.to_string()))
    }

    pub fn fen(&self) -> String {
        self.board.to_string()
    }

    pub fn side_to_move(&self) -> Color {
        Color::from_chess(self.board.side_to_move())
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        let sq = square.to_chess();
        let kind = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some(Piece::new(PieceKind::from_chess(kind), Color::from_chess(color)))
    }

    pub fn pieces(&self, color: Color) -> Vec<(Square, Piece)> {
        Square::all()
            .filter_map(|sq| self.piece_at(sq).map(|p| (sq, p)))
            .filter(|(_, p)| p.color == color)
            .collect()
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces(color)
            .into_iter()
            .find(|(_, p)| p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
    }

    pub fn in_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    pub fn legal_moves(&self) -> Vec<LegalMove> {
        MoveGen::new_legal(&self.board)
            .filter_map(|m| self.describe(m))
            .collect()
    }

    /// Legal moves for `color` as if it were that color's turn. The flip is
    /// evaluated on a copy and never committed; an unrepresentable flip (the
    /// other side already in check) yields no moves.
    pub fn legal_moves_for(&self, color: Color) -> Vec<LegalMove> {
        if self.side_to_move() == color {
            return self.legal_moves();
        }
        let mut flipped = *self;
        match flipped.set_side_to_move(color) {
            Ok(()) => flipped.legal_moves(),
            Err(_) => Vec::new(),
        }
    }

    pub fn find_legal(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Option<LegalMove> {
        let candidates: Vec<LegalMove> = self
            .legal_moves()
            .into_iter()
            .filter(|m| m.from == from && m.to == to)
            .collect();
        match promotion {
            Some(kind) => candidates.into_iter().find(|m| m.promotion == Some(kind)),
            None => candidates
                .iter()
                .find(|m| m.promotion.is_none())
                .or_else(|| {
                    candidates
                        .iter()
                        .find(|m| m.promotion == Some(PieceKind::Queen))
                })
                .copied(),
        }
    }

    pub fn apply_legal(&mut self, mv: &LegalMove) -> Result<MoveResult, OracleError> {
        let chess_move = ChessMove::new(
            mv.from.to_chess(),
            mv.to.to_chess(),
            mv.promotion.map(PieceKind::to_chess),
        );
        if !self.board.legal(chess_move) {
            return Err(OracleError::IllegalMove(mv.to_string()));
        }
        let mover = self.side_to_move();
        self.board = self.board.make_move_new(chess_move);
        Ok(MoveResult::from_legal(mover, mv))
    }

    /// Applies an arcana-licensed move through the board editor. The move is
    /// rejected when the resulting position is invalid, which covers leaving
    /// the mover's own king attacked.
    pub fn apply_synthetic(
        &mut self,
        color: Color,
        mv: &LegalMove,
    ) -> Result<MoveResult, OracleError> {
        let mut applied = *mv;
        let committed = self.edit(|editor| {
            let moving = editor.piece_at(mv.from)?;
            if moving.color != color {
                return None;
            }
            if let Some(capture_square) = mv.capture_square {
                editor.remove(capture_square);
            }
            editor.remove(mv.from);
            let kind = if moving.kind == PieceKind::Pawn && mv.to.rank() == color.promotion_rank()
            {
                let promoted = mv.promotion.unwrap_or(PieceKind::Queen);
                applied.promotion = Some(promoted);
                applied.special = Some(SpecialFlag::Promotion);
                promoted
            } else {
                moving.kind
            };
            editor.put(mv.to, Piece::new(kind, color));
            editor.set_side_to_move(color.opposite());
            Some(())
        });
        match committed {
            Some(()) => Ok(MoveResult::from_legal(color, &applied)),
            None => Err(OracleError::IllegalMove(mv.to_string())),
        }
    }

    pub fn status(&self) -> Terminal {
        match self.board.status() {
            BoardStatus::Checkmate => Terminal::Checkmate {
                loser: self.side_to_move(),
            },
            BoardStatus::Stalemate => Terminal::Stalemate,
            BoardStatus::Ongoing if self.insufficient_material() => Terminal::InsufficientMaterial,
            BoardStatus::Ongoing => Terminal::Ongoing,
        }
    }

    /// Raw color-to-move override used to pass a turn without a real move.
    pub fn set_side_to_move(&mut self, color: Color) -> Result<(), OracleError> {
        if self.side_to_move() == color {
            return Ok(());
        }
        self.edit(|editor| {
            editor.set_side_to_move(color);
            Some(())
        })
        .ok_or(OracleError::InvalidPosition)
    }

    /// All-or-nothing board edit. The closure may bail out with `None`; the
    /// edited board is committed only when the oracle accepts it as a valid
    /// position. Castling rights that no longer match the king and rook
    /// placement are dropped and the en passant square is cleared.
    pub fn edit<T>(&mut self, f: impl FnOnce(&mut BoardEditor) -> Option<T>) -> Option<T> {
        let mut editor = BoardEditor {
            builder: BoardBuilder::from(self.board),
        };
        let value = f(&mut editor)?;
        let board = editor.commit()?;
        self.board = board;
        Some(value)
    }

    /// Squares holding `by`-colored pieces that attack `target`.
    pub fn attackers(&self, target: Square, by: Color) -> Vec<Square> {
        let grid = self.grid();
        Square::all()
            .filter(|&sq| matches!(grid[sq.index()], Some(p) if p.color == by))
            .filter(|&sq| {
                grid[sq.index()]
                    .map(|piece| attacked_from(&grid, sq, piece).contains(&target))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// `color`'s pieces that the opponent currently attacks.
    pub fn threatened_pieces(&self, color: Color) -> Vec<(Square, Piece)> {
        self.pieces(color)
            .into_iter()
            .filter(|(sq, _)| !self.attackers(*sq, color.opposite()).is_empty())
            .collect()
    }

    pub fn material(&self, color: Color) -> i32 {
        self.pieces(color)
            .iter()
            .filter(|(_, p)| p.kind != PieceKind::King)
            .map(|(_, p)| p.kind.value())
            .sum()
    }

    fn grid(&self) -> [Option<Piece>; 64] {
        let mut grid = [None; 64];
        for sq in Square::all() {
            grid[sq.index()] = self.piece_at(sq);
        }
        grid
    }

    fn insufficient_material(&self) -> bool {
        let minors: Vec<PieceKind> = Color::BOTH
            .iter()
            .flat_map(|&c| self.pieces(c))
            .map(|(_, p)| p.kind)
            .filter(|&k| k != PieceKind::King)
            .collect();
        match minors.as_slice() {
            [] => true,
            [single] => matches!(single, PieceKind::Knight | PieceKind::Bishop),
            _ => false,
        }
    }

    fn describe(&self, m: ChessMove) -> Option<LegalMove> {
        let from = Square::from_chess(m.get_source());
        let to = Square::from_chess(m.get_dest());
        let moving = self.piece_at(from)?;
        let target = self.piece_at(to);
        let (df, dr) = from.delta_to(to);

        let mut captured = target.map(|p| p.kind);
        let mut capture_square = target.map(|_| to);
        let promotion = m.get_promotion().map(PieceKind::from_chess);
        let mut special = None;

        match moving.kind {
            PieceKind::Pawn if df != 0 && target.is_none() => {
                let victim = Square::new(to.file(), from.rank())?;
                captured = Some(PieceKind::Pawn);
                capture_square = Some(victim);
                special = Some(SpecialFlag::EnPassant);
            }
            PieceKind::Pawn if dr.abs() == 2 => special = Some(SpecialFlag::DoublePush),
            PieceKind::King if df == 2 => special = Some(SpecialFlag::KingsideCastle),
            PieceKind::King if df == -2 => special = Some(SpecialFlag::QueensideCastle),
            _ => {}
        }
        if promotion.is_some() {
            special = Some(SpecialFlag::Promotion);
        }

        Some(LegalMove {
            from,
            to,
            piece: moving.kind,
            captured,
            capture_square,
            promotion,
            special,
        })
    }
}

/// Squares a piece standing on `from` attacks, honoring blockers for sliders.
fn attacked_from(grid: &[Option<Piece>; 64], from: Square, piece: Piece) -> Vec<Square> {
    let mut out = Vec::new();
    match piece.kind {
        PieceKind::Pawn => {
            let dr = piece.color.forward();
            out.extend([-1, 1].iter().filter_map(|&df| from.offset(df, dr)));
        }
        PieceKind::Knight => {
            out.extend(KNIGHT_STEPS.iter().filter_map(|&(df, dr)| from.offset(df, dr)));
        }
        PieceKind::King => out.extend(from.neighbors()),
        PieceKind::Bishop => slide(grid, from, &DIAGONAL, &mut out),
        PieceKind::Rook => slide(grid, from, &ORTHOGONAL, &mut out),
        PieceKind::Queen => {
            slide(grid, from, &DIAGONAL, &mut out);
            slide(grid, from, &ORTHOGONAL, &mut out);
        }
    }
    out
}

fn slide(grid: &[Option<Piece>; 64], from: Square, dirs: &[(i8, i8)], out: &mut Vec<Square>) {
    for &(df, dr) in dirs {
        let mut cursor = from.offset(df, dr);
        while let Some(sq) = cursor {
            out.push(sq);
            if grid[sq.index()].is_some() {
                break;
            }
            cursor = sq.offset(df, dr);
        }
    }
}

/// Mutable view over a pending board edit. Changes only reach the
/// [`Position`] when the whole edit is accepted.
pub struct BoardEditor {
    builder: BoardBuilder,
}

impl BoardEditor {
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.builder[square.to_chess()]
            .map(|(kind, color)| Piece::new(PieceKind::from_chess(kind), Color::from_chess(color)))
    }

    pub fn put(&mut self, square: Square, piece: Piece) {
        self.builder.piece(
            square.to_chess(),
            piece.kind.to_chess(),
            piece.color.to_chess(),
        );
    }

    pub fn remove(&mut self, square: Square) -> Option<Piece> {
        let previous = self.piece_at(square);
        if previous.is_some() {
            self.builder.clear_square(square.to_chess());
        }
        previous
    }

    /// Moves whatever stands on `from` to `to`. Fails when `from` is empty or
    /// `to` is occupied.
    pub fn relocate(&mut self, from: Square, to: Square) -> Option<Piece> {
        if self.piece_at(to).is_some() {
            return None;
        }
        let piece = self.remove(from)?;
        self.put(to, piece);
        Some(piece)
    }

    pub fn side_to_move(&self) -> Color {
        Color::from_chess(self.builder.get_side_to_move())
    }

    pub fn set_side_to_move(&mut self, color: Color) {
        self.builder.side_to_move(color.to_chess());
    }

    pub fn occupied(&self) -> Vec<(Square, Piece)> {
        Square::all()
            .filter_map(|sq| self.piece_at(sq).map(|p| (sq, p)))
            .collect()
    }

    fn commit(mut self) -> Option<Board> {
        let occupied = self.occupied();
        let pawn_on_back_rank = occupied
            .iter()
            .any(|(sq, p)| p.kind == PieceKind::Pawn && (sq.rank() == 0 || sq.rank() == 7));
        let one_king_each = Color::BOTH.iter().all(|&c| {
            occupied
                .iter()
                .filter(|(_, p)| *p == Piece::new(PieceKind::King, c))
                .count()
                == 1
        });
        if pawn_on_back_rank || !one_king_each {
            return None;
        }

        for color in Color::BOTH {
            let rank = color.back_rank();
            let own = |editor: &BoardEditor, file: u8, kind: PieceKind| {
                Square::new(file, rank)
                    .and_then(|sq| editor.piece_at(sq))
                    .map(|p| p == Piece::new(kind, color))
                    .unwrap_or(false)
            };
            let king_home = own(&self, 4, PieceKind::King);
            let current = self.builder.get_castle_rights(color.to_chess());
            let kingside =
                current.has_kingside() && king_home && own(&self, 7, PieceKind::Rook);
            let queenside =
                current.has_queenside() && king_home && own(&self, 0, PieceKind::Rook);
            let rights = match (kingside, queenside) {
                (true, true) => CastleRights::Both,
                (true, false) => CastleRights::KingSide,
                (false, true) => CastleRights::QueenSide,
                (false, false) => CastleRights::NoRights,
            };
            self.builder.castle_rights(color.to_chess(), rights);
        }
        self.builder.en_passant(None);
        Board::try_from(&self.builder).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn square_round_trips_algebraic_notation() {
        assert_eq!(sq("a1").index(), 0);
        assert_eq!(sq("h8").index(), 63);
        assert_eq!(sq("e4").to_string(), "e4");
        assert!("i9".parse::<Square>().is_err());
        assert_eq!(serde_json::to_string(&sq("c6")).unwrap(), "\"c6\"");
    }

    #[test]
    fn opening_has_twenty_moves() {
        let position = Position::standard();
        assert_eq!(position.legal_moves().len(), 20);
        assert_eq!(position.side_to_move(), Color::White);
        assert!(!position.in_check());
    }

    #[test]
    fn hypothetical_flip_is_not_committed() {
        let position = Position::standard();
        let black = position.legal_moves_for(Color::Black);
        assert_eq!(black.len(), 20);
        assert!(black.iter().all(|m| m.from.rank() >= 6));
        assert_eq!(position.side_to_move(), Color::White);
    }

    #[test]
    fn describes_en_passant_capture_square() {
        let position =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let mv = position.find_legal(sq("e5"), sq("f6"), None).unwrap();
        assert_eq!(mv.special, Some(SpecialFlag::EnPassant));
        assert_eq!(mv.capture_square, Some(sq("f5")));
        assert_eq!(mv.captured, Some(PieceKind::Pawn));
    }

    #[test]
    fn edit_rejects_missing_king_and_keeps_board() {
        let mut position = Position::standard();
        let before = position.fen();
        let result = position.edit(|editor| editor.remove(sq("e1")));
        assert!(result.is_none());
        assert_eq!(position.fen(), before);
    }

    #[test]
    fn edit_drops_castling_rights_of_moved_rook() {
        let mut position = Position::standard();
        position
            .edit(|editor| {
                editor.remove(sq("h1"));
                Some(())
            })
            .unwrap();
        assert!(!position.fen().contains("KQ"));
    }

    #[test]
    fn attackers_respect_blockers() {
        let position = Position::from_fen("4k3/8/8/8/8/8/4P3/4R1K1 w - - 0 1").unwrap();
        assert!(position.attackers(sq("e8"), Color::White).is_empty());
        assert_eq!(position.attackers(sq("e2"), Color::White), vec![sq("e1")]);
    }

    #[test]
    fn bare_kings_are_insufficient_material() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(position.status(), Terminal::InsufficientMaterial);
    }

    #[test]
    fn fools_mate_is_checkmate_for_white() {
        let position =
            Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        assert_eq!(
            position.status(),
            Terminal::Checkmate {
                loser: Color::White
            }
        );
    }

    #[test]
    fn synthetic_move_promotes_on_last_rank() {
        let mut position = Position::from_fen("4k3/8/8/8/8/P7/8/4K3 w - - 0 1").unwrap();
        let mv = LegalMove {
            from: sq("a3"),
            to: sq("a8"),
            piece: PieceKind::Pawn,
            captured: None,
            capture_square: None,
            promotion: None,
            special: None,
        };
        let result = position.apply_synthetic(Color::White, &mv).unwrap();
        assert_eq!(result.promotion, Some(PieceKind::Queen));
        assert_eq!(
            position.piece_at(sq("a8")),
            Some(Piece::new(PieceKind::Queen, Color::White))
        );
        assert_eq!(position.side_to_move(), Color::Black);
    }
}
