//! Core game state: board, pieces, collision, rotation, line clear, scoring.

use crate::highscores::ScoreStore;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default playfield size in cells.
pub const DEFAULT_ROWS: usize = 20;
pub const DEFAULT_COLS: usize = 10;

/// Gravity curve: base − (level−1)·step, floored at min (all ms).
pub const BASE_FALL_INTERVAL_MS: u64 = 1000;
pub const FALL_INTERVAL_STEP_MS: u64 = 50;
pub const MIN_FALL_INTERVAL_MS: u64 = 100;

/// Points for 0..=4 rows cleared in a single lock, before the level multiplier.
const LINE_SCORES: [u32; 5] = [0, 100, 300, 500, 800];

/// Column offsets tried in order when a naive rotation collides.
const KICK_OFFSETS: [i32; 4] = [1, -1, 2, -2];

/// Tetromino kinds (I, O, T, S, Z, J, L).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

/// Square occupancy matrix; a falling piece always works on a private copy.
pub type ShapeMatrix = Vec<Vec<bool>>;

impl PieceKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::T, Self::S, Self::Z, Self::J, Self::L];

    /// Canonical spawn-orientation matrix. Bounding boxes are 4 (I), 2 (O), 3 (rest).
    pub fn base_shape(&self) -> ShapeMatrix {
        let rows: &[&[u8]] = match self {
            Self::I => &[&[0, 0, 0, 0], &[1, 1, 1, 1], &[0, 0, 0, 0], &[0, 0, 0, 0]],
            Self::O => &[&[1, 1], &[1, 1]],
            Self::T => &[&[0, 1, 0], &[1, 1, 1], &[0, 0, 0]],
            Self::S => &[&[0, 1, 1], &[1, 1, 0], &[0, 0, 0]],
            Self::Z => &[&[1, 1, 0], &[0, 1, 1], &[0, 0, 0]],
            Self::J => &[&[1, 0, 0], &[1, 1, 1], &[0, 0, 0]],
            Self::L => &[&[0, 0, 1], &[1, 1, 1], &[0, 0, 0]],
        };
        rows.iter()
            .map(|r| r.iter().map(|&c| c != 0).collect())
            .collect()
    }

    /// Colour index 0..7 for theme.piece_color().
    pub fn color_index(&self) -> u8 {
        match self {
            Self::I => 0, // cyan
            Self::O => 1, // yellow
            Self::T => 2, // magenta
            Self::S => 3, // green
            Self::Z => 4, // red
            Self::J => 5, // light blue
            Self::L => 6, // orange
        }
    }
}

/// Rotate a square matrix 90° clockwise: input (row, col) maps to (col, N−1−row).
pub fn rotate_cw(shape: &ShapeMatrix) -> ShapeMatrix {
    let n = shape.len();
    let mut out = vec![vec![false; n]; n];
    for (y, row) in shape.iter().enumerate() {
        for (x, &filled) in row.iter().enumerate() {
            if filled {
                out[x][n - 1 - y] = true;
            }
        }
    }
    out
}

/// Single board cell: empty or locked content tagged with its piece kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Filled(PieceKind),
}

/// Locked playfield. y=0 is the top row; dimensions never change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl Board {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::Empty; cols]; rows],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Bounds test. y may be negative (above the visible top).
    #[inline]
    pub fn is_inside(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.cols as i32 && y < self.rows as i32
    }

    /// True when the cell exists and is filled; above-top positions count as free.
    #[inline]
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        if y < 0 || !self.is_inside(x, y) {
            return false;
        }
        self.cells[y as usize][x as usize] != Cell::Empty
    }

    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.cells[y][x]
    }

    /// Write the piece's occupied cells into the grid. No validation; callers
    /// must have checked placement. Cells above the top row are dropped.
    pub fn lock(&mut self, piece: &Piece) {
        for (x, y) in piece.cells() {
            if y >= 0 && self.is_inside(x, y) {
                self.cells[y as usize][x as usize] = Cell::Filled(piece.kind);
            }
        }
    }

    /// Row indices (top to bottom) whose every column is occupied.
    pub fn find_full_rows(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|&c| c != Cell::Empty))
            .map(|(y, _)| y)
            .collect()
    }

    /// Remove the given rows, shifting everything above downward and inserting
    /// empty rows at the top. Relative order of retained rows is preserved.
    pub fn compact(&mut self, full_rows: &[usize]) {
        let retained: Vec<Vec<Cell>> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(y, _)| !full_rows.contains(y))
            .map(|(_, row)| row.clone())
            .collect();
        let mut cells = vec![vec![Cell::Empty; self.cols]; self.rows - retained.len()];
        cells.extend(retained);
        self.cells = cells;
    }

    pub fn reset(&mut self) {
        for row in &mut self.cells {
            row.fill(Cell::Empty);
        }
    }
}

/// The one collision predicate: every movement, rotation, and spawn decision
/// goes through here. True only when every occupied cell of `shape`, placed
/// with its top-left at (x, y), is within horizontal bounds, above the floor,
/// and not overlapping a filled cell at a non-negative row.
pub fn is_valid_placement(shape: &ShapeMatrix, x: i32, y: i32, board: &Board) -> bool {
    for (dy, row) in shape.iter().enumerate() {
        for (dx, &filled) in row.iter().enumerate() {
            if !filled {
                continue;
            }
            let ax = x + dx as i32;
            let ay = y + dy as i32;
            if !board.is_inside(ax, ay) || board.is_occupied(ax, ay) {
                return false;
            }
        }
    }
    true
}

/// Live falling tetromino: current rotation state plus board-space position of
/// the matrix's top-left cell.
#[derive(Debug, Clone)]
pub struct Piece {
    pub kind: PieceKind,
    pub shape: ShapeMatrix,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// New piece at the spawn position: horizontally centred, top row.
    pub fn spawn(kind: PieceKind, cols: usize) -> Self {
        let shape = kind.base_shape();
        let x = (cols / 2) as i32 - (shape.len() / 2) as i32;
        Self { kind, shape, x, y: 0 }
    }

    /// Absolute board positions of the occupied cells.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape.iter().enumerate().flat_map(move |(dy, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &filled)| filled)
                .map(move |(dx, _)| (self.x + dx as i32, self.y + dy as i32))
        })
    }
}

/// Piece spawner: uniform over the seven kinds (LCG, seedable for tests).
#[derive(Debug, Clone)]
pub struct PieceRng {
    state: u32,
}

impl PieceRng {
    pub fn new() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x1234_5678);
        Self::seeded(nanos | 1)
    }

    pub fn seeded(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_rand(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.state >> 16
    }

    pub fn next_kind(&mut self) -> PieceKind {
        PieceKind::ALL[(self.next_rand() as usize) % PieceKind::ALL.len()]
    }
}

impl Default for PieceRng {
    fn default() -> Self {
        Self::new()
    }
}

/// Discrete notifications for presentation adapters. The session works the
/// same with zero subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Moved,
    Rotated,
    Locked,
    LinesCleared(u32),
    LevelUp(u32),
    GameOver,
}

/// Session state machine: Idle → Running ⇄ Paused → GameOver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    GameOver,
}

/// Session construction parameters. Validated once, up front.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    pub base_interval_ms: u64,
    pub interval_step_ms: u64,
    pub min_interval_ms: u64,
    /// Fixed spawn sequence seed; None seeds from the clock.
    pub rng_seed: Option<u32>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            base_interval_ms: BASE_FALL_INTERVAL_MS,
            interval_step_ms: FALL_INTERVAL_STEP_MS,
            min_interval_ms: MIN_FALL_INTERVAL_MS,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("playfield must be at least 1x1, got {rows}x{cols}")]
    BadDimensions { rows: usize, cols: usize },
    #[error(
        "fall intervals must be positive and min ({min_ms}ms) must not exceed base ({base_ms}ms)"
    )]
    BadSpeedCurve { base_ms: u64, min_ms: u64 },
}

impl GameConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::BadDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.min_interval_ms == 0 || self.min_interval_ms > self.base_interval_ms {
            return Err(ConfigError::BadSpeedCurve {
                base_ms: self.base_interval_ms,
                min_ms: self.min_interval_ms,
            });
        }
        Ok(())
    }

    fn interval_for_level(&self, level: u32) -> Duration {
        let decrement = self
            .interval_step_ms
            .saturating_mul(u64::from(level.saturating_sub(1)));
        Duration::from_millis(
            self.base_interval_ms
                .saturating_sub(decrement)
                .max(self.min_interval_ms),
        )
    }
}

/// Deadline for the next automatic descent. The session is the only owner, so
/// level changes re-arm the pending deadline instead of stacking timers, and
/// cancelling guarantees no tick fires against terminal state. Tests bypass it
/// entirely via `GameSession::fall_tick`.
#[derive(Debug, Clone)]
pub struct FallTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl FallTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Change the interval; an armed deadline is rescheduled immediately
    /// rather than at the next tick boundary.
    fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        if self.deadline.is_some() {
            self.deadline = Some(now + interval);
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

type EventHandler = Box<dyn FnMut(GameEvent)>;

/// Read-only view of the live piece.
#[derive(Debug, Clone)]
pub struct PieceView {
    pub kind: PieceKind,
    pub shape: ShapeMatrix,
    pub x: i32,
    pub y: i32,
}

/// Owned, read-only copy of the observable session state. Renderers never see
/// the session's grid storage.
#[derive(Debug, Clone)]
pub struct Snapshot {
    board: Board,
    pub current: Option<PieceView>,
    pub next: Option<PieceKind>,
    pub score: u32,
    pub lines: u32,
    pub level: u32,
    pub best: u32,
    pub phase: Phase,
    pub fall_interval: Duration,
}

impl Snapshot {
    #[inline]
    pub fn rows(&self) -> usize {
        self.board.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.board.cols()
    }

    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.board.cell(x, y)
    }

    /// Row the current piece would land on if dropped now (ghost preview).
    pub fn ghost_y(&self) -> Option<i32> {
        let piece = self.current.as_ref()?;
        let mut y = piece.y;
        while is_valid_placement(&piece.shape, piece.x, y + 1, &self.board) {
            y += 1;
        }
        Some(y)
    }
}

/// One game of falling blocks. Owns the board, the current/next pieces, the
/// fall timer, and all statistics; adapters talk to it through the synchronous
/// operations below and the event subscription.
pub struct GameSession {
    config: GameConfig,
    board: Board,
    current: Option<Piece>,
    next: Option<PieceKind>,
    rng: PieceRng,
    score: u32,
    lines: u32,
    level: u32,
    best: u32,
    phase: Phase,
    timer: FallTimer,
    store: Box<dyn ScoreStore>,
    handlers: Vec<EventHandler>,
}

impl GameSession {
    pub fn new(config: GameConfig, mut store: Box<dyn ScoreStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let best = store.load_best();
        let rng = match config.rng_seed {
            Some(seed) => PieceRng::seeded(seed),
            None => PieceRng::new(),
        };
        let interval = config.interval_for_level(1);
        Ok(Self {
            board: Board::new(config.rows, config.cols),
            current: None,
            next: None,
            rng,
            score: 0,
            lines: 0,
            level: 1,
            best,
            phase: Phase::Idle,
            timer: FallTimer::new(interval),
            store,
            handlers: Vec::new(),
            config,
        })
    }

    /// Register a presentation/audio adapter callback.
    pub fn subscribe(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    fn emit(&mut self, event: GameEvent) {
        for handler in &mut self.handlers {
            handler(event);
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn fall_interval(&self) -> Duration {
        self.timer.interval()
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[inline]
    pub fn best(&self) -> u32 {
        self.best
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board.clone(),
            current: self.current.as_ref().map(|p| PieceView {
                kind: p.kind,
                shape: p.shape.clone(),
                x: p.x,
                y: p.y,
            }),
            next: self.next,
            score: self.score,
            lines: self.lines,
            level: self.level,
            best: self.best,
            phase: self.phase,
            fall_interval: self.timer.interval(),
        }
    }

    /// Begin a fresh game: empty board, zeroed stats, new piece pair, timer armed.
    pub fn start(&mut self, now: Instant) -> Snapshot {
        self.board.reset();
        self.score = 0;
        self.lines = 0;
        self.level = 1;
        let kind = self.rng.next_kind();
        self.current = Some(Piece::spawn(kind, self.config.cols));
        self.next = Some(self.rng.next_kind());
        self.timer.set_interval(self.config.interval_for_level(1), now);
        self.timer.arm(now);
        self.phase = Phase::Running;
        self.snapshot()
    }

    /// Full reset back to Running; valid from any phase.
    pub fn restart(&mut self, now: Instant) -> Snapshot {
        self.start(now)
    }

    /// Suspend the fall timer; piece state is kept.
    pub fn pause(&mut self) -> Snapshot {
        if self.phase == Phase::Running {
            self.phase = Phase::Paused;
            self.timer.cancel();
        }
        self.snapshot()
    }

    /// Re-arm the timer at the currently configured interval.
    pub fn resume(&mut self, now: Instant) -> Snapshot {
        if self.phase == Phase::Paused {
            self.phase = Phase::Running;
            self.timer.arm(now);
        }
        self.snapshot()
    }

    /// Stop the session outright; the timer is cancelled so no further tick
    /// can fire.
    pub fn stop(&mut self) -> Snapshot {
        self.timer.cancel();
        if self.phase == Phase::Running || self.phase == Phase::Paused {
            self.phase = Phase::Idle;
            self.current = None;
            self.next = None;
        }
        self.snapshot()
    }

    /// Drive the timer from the event loop: runs a fall tick when the
    /// deadline has passed and re-arms it.
    pub fn poll(&mut self, now: Instant) {
        if self.phase == Phase::Running && self.timer.due(now) {
            self.fall_tick(now);
            if self.phase == Phase::Running {
                self.timer.arm(now);
            }
        }
    }

    /// One automatic descent step. Public so tests can drive time manually.
    pub fn fall_tick(&mut self, now: Instant) {
        if self.phase != Phase::Running {
            return;
        }
        self.descend_or_lock(now);
    }

    pub fn move_left(&mut self, _now: Instant) -> Snapshot {
        self.shift(-1)
    }

    pub fn move_right(&mut self, _now: Instant) -> Snapshot {
        self.shift(1)
    }

    fn shift(&mut self, dx: i32) -> Snapshot {
        if self.phase == Phase::Running {
            if let Some(piece) = self.current.as_mut() {
                if is_valid_placement(&piece.shape, piece.x + dx, piece.y, &self.board) {
                    piece.x += dx;
                    self.emit(GameEvent::Moved);
                }
            }
        }
        self.snapshot()
    }

    /// Clockwise rotation with wall-kick fallback. A rotation no offset can
    /// save is a silent no-op.
    pub fn rotate(&mut self, _now: Instant) -> Snapshot {
        if self.phase != Phase::Running {
            return self.snapshot();
        }
        if let Some(piece) = self.current.as_mut() {
            let rotated = rotate_cw(&piece.shape);
            let offset = std::iter::once(0)
                .chain(KICK_OFFSETS)
                .find(|&k| is_valid_placement(&rotated, piece.x + k, piece.y, &self.board));
            if let Some(k) = offset {
                piece.x += k;
                piece.shape = rotated;
                self.emit(GameEvent::Rotated);
            }
        }
        self.snapshot()
    }

    /// One validated descent; locks the piece when it cannot move down.
    pub fn soft_drop(&mut self, now: Instant) -> Snapshot {
        if self.phase == Phase::Running {
            self.descend_or_lock(now);
        }
        self.snapshot()
    }

    /// Descend until blocked, award one point per row, then lock immediately
    /// (not at the next tick boundary).
    pub fn hard_drop(&mut self, now: Instant) -> Snapshot {
        if self.phase != Phase::Running {
            return self.snapshot();
        }
        if let Some(piece) = self.current.as_mut() {
            let mut distance = 0u32;
            while is_valid_placement(&piece.shape, piece.x, piece.y + 1, &self.board) {
                piece.y += 1;
                distance += 1;
            }
            self.add_score(distance);
            self.lock_current(now);
            if self.phase == Phase::Running {
                self.timer.arm(now);
            }
        }
        self.snapshot()
    }

    fn descend_or_lock(&mut self, now: Instant) {
        let Some(piece) = self.current.as_mut() else {
            return;
        };
        if is_valid_placement(&piece.shape, piece.x, piece.y + 1, &self.board) {
            piece.y += 1;
        } else {
            self.lock_current(now);
        }
    }

    /// Lock, clear, score, promote next, spawn, and detect game over.
    fn lock_current(&mut self, now: Instant) {
        let Some(piece) = self.current.take() else {
            return;
        };
        self.board.lock(&piece);
        self.emit(GameEvent::Locked);

        let full = self.board.find_full_rows();
        if !full.is_empty() {
            self.board.compact(&full);
            self.apply_clear(full.len() as u32, now);
        }

        let kind = self.next.take().unwrap_or_else(|| self.rng.next_kind());
        let fresh = Piece::spawn(kind, self.config.cols);
        self.next = Some(self.rng.next_kind());
        let blocked = !is_valid_placement(&fresh.shape, fresh.x, fresh.y, &self.board);
        self.current = Some(fresh);
        if blocked {
            self.phase = Phase::GameOver;
            self.timer.cancel();
            self.emit(GameEvent::GameOver);
        }
    }

    fn apply_clear(&mut self, cleared: u32, now: Instant) {
        self.lines += cleared;
        self.add_score(LINE_SCORES[cleared.min(4) as usize] * self.level);
        self.emit(GameEvent::LinesCleared(cleared));

        let new_level = self.lines / 10 + 1;
        if new_level > self.level {
            self.level = new_level;
            self.timer
                .set_interval(self.config.interval_for_level(new_level), now);
            self.emit(GameEvent::LevelUp(new_level));
        }
    }

    fn add_score(&mut self, delta: u32) {
        self.score += delta;
        if self.score > self.best {
            self.best = self.score;
            self.store.save_best(self.best);
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("phase", &self.phase)
            .field("score", &self.score)
            .field("lines", &self.lines)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highscores::MemoryScoreStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session() -> GameSession {
        session_with(GameConfig {
            rng_seed: Some(42),
            ..GameConfig::default()
        })
    }

    fn session_with(config: GameConfig) -> GameSession {
        GameSession::new(config, Box::new(MemoryScoreStore::default())).unwrap()
    }

    fn board(rows: usize, cols: usize) -> Board {
        Board::new(rows, cols)
    }

    /// Fill a row except the given columns.
    fn fill_row_except(b: &mut Board, y: usize, gaps: &[usize]) {
        for x in 0..b.cols() {
            if !gaps.contains(&x) {
                b.cells[y][x] = Cell::Filled(PieceKind::J);
            }
        }
    }

    #[test]
    fn rotation_four_times_is_identity() {
        for kind in PieceKind::ALL {
            let base = kind.base_shape();
            let mut shape = base.clone();
            for _ in 0..4 {
                shape = rotate_cw(&shape);
            }
            assert_eq!(shape, base, "{kind:?} not restored after 4 rotations");
        }
    }

    #[test]
    fn rotation_maps_row_col_to_col_n_minus_one_minus_row() {
        let shape = PieceKind::L.base_shape();
        let rotated = rotate_cw(&shape);
        let n = shape.len();
        for y in 0..n {
            for x in 0..n {
                assert_eq!(rotated[x][n - 1 - y], shape[y][x]);
            }
        }
    }

    #[test]
    fn placement_rejects_out_of_bounds() {
        let b = board(20, 10);
        let o = PieceKind::O.base_shape();
        assert!(is_valid_placement(&o, 0, 0, &b));
        assert!(!is_valid_placement(&o, -1, 0, &b), "left of grid");
        assert!(!is_valid_placement(&o, 9, 0, &b), "right edge overflow");
        assert!(!is_valid_placement(&o, 0, 19, &b), "below the floor");
        assert!(is_valid_placement(&o, 8, 18, &b), "flush bottom-right corner");
    }

    #[test]
    fn placement_allows_above_top_and_rejects_overlap() {
        let mut b = board(20, 10);
        let o = PieceKind::O.base_shape();
        assert!(is_valid_placement(&o, 4, -1, &b), "above-top rows are free");
        b.cells[1][4] = Cell::Filled(PieceKind::T);
        assert!(!is_valid_placement(&o, 4, 0, &b), "overlaps filled cell");
        assert!(is_valid_placement(&o, 4, -2, &b), "fully above the overlap");
    }

    #[test]
    fn compact_preserves_row_order_and_dimensions() {
        let mut b = board(6, 3);
        b.cells[1] = vec![Cell::Filled(PieceKind::S); 3];
        b.cells[3][0] = Cell::Filled(PieceKind::I);
        b.cells[4] = vec![Cell::Filled(PieceKind::Z); 3];
        b.cells[5][2] = Cell::Filled(PieceKind::L);
        b.compact(&[1, 4]);

        assert_eq!(b.rows(), 6);
        assert_eq!(b.cols(), 3);
        // Two fresh empty rows on top; former rows 0, 2, 3, 5 follow in order.
        for y in 0..4 {
            assert!(b.cells[y].iter().all(|&c| c == Cell::Empty), "row {y}");
        }
        assert_eq!(b.cells[4][0], Cell::Filled(PieceKind::I));
        assert_eq!(b.cells[5][2], Cell::Filled(PieceKind::L));
    }

    #[test]
    fn lock_without_clear_adds_exactly_the_piece_cells() {
        let mut b = board(20, 10);
        b.cells[19][0] = Cell::Filled(PieceKind::J);
        let before = b.clone();

        let mut piece = Piece::spawn(PieceKind::O, 10);
        piece.x = 4;
        piece.y = 18;
        b.lock(&piece);
        assert!(b.find_full_rows().is_empty());

        for y in 0..b.rows() {
            for x in 0..b.cols() {
                let expected = if piece.cells().any(|(px, py)| (px, py) == (x as i32, y as i32)) {
                    Cell::Filled(PieceKind::O)
                } else {
                    before.cell(x, y)
                };
                assert_eq!(b.cell(x, y), expected, "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn lock_ignores_cells_above_the_top() {
        let mut b = board(20, 10);
        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.y = -1; // occupied row of the I matrix sits at y = 0
        b.lock(&piece);
        assert!((3..7).all(|x| b.cell(x, 0) == Cell::Filled(PieceKind::I)));
        assert!((0..10).all(|x| b.cell(x, 1) == Cell::Empty));
    }

    #[test]
    fn spawn_is_centred_on_the_top_row() {
        let piece = Piece::spawn(PieceKind::I, 10);
        assert_eq!((piece.x, piece.y), (3, 0));
        let piece = Piece::spawn(PieceKind::O, 10);
        assert_eq!((piece.x, piece.y), (4, 0));
        let piece = Piece::spawn(PieceKind::T, 10);
        assert_eq!((piece.x, piece.y), (4, 0));
    }

    #[test]
    fn config_rejects_degenerate_dimensions_and_speed() {
        let bad = GameConfig {
            cols: 0,
            ..GameConfig::default()
        };
        assert!(matches!(
            GameSession::new(bad, Box::new(MemoryScoreStore::default())),
            Err(ConfigError::BadDimensions { .. })
        ));
        let bad = GameConfig {
            min_interval_ms: 2000,
            ..GameConfig::default()
        };
        assert!(matches!(
            GameSession::new(bad, Box::new(MemoryScoreStore::default())),
            Err(ConfigError::BadSpeedCurve { .. })
        ));
    }

    #[test]
    fn fall_interval_follows_the_level_curve() {
        let config = GameConfig::default();
        assert_eq!(config.interval_for_level(1), Duration::from_millis(1000));
        assert_eq!(config.interval_for_level(2), Duration::from_millis(950));
        assert_eq!(config.interval_for_level(19), Duration::from_millis(100));
        // Floored at the minimum from then on.
        assert_eq!(config.interval_for_level(30), Duration::from_millis(100));
    }

    #[test]
    fn state_machine_idle_running_paused() {
        let now = Instant::now();
        let mut s = session();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.timer.is_running());

        let snap = s.start(now);
        assert_eq!(snap.phase, Phase::Running);
        assert!(snap.current.is_some());
        assert!(snap.next.is_some());
        assert!(s.timer.is_running());

        s.pause();
        assert_eq!(s.phase(), Phase::Paused);
        assert!(!s.timer.is_running(), "pause cancels the timer");
        // Piece survives the pause and ignores ticks.
        let before = s.snapshot().current.unwrap().y;
        s.fall_tick(now);
        assert_eq!(s.snapshot().current.unwrap().y, before);

        s.resume(now);
        assert_eq!(s.phase(), Phase::Running);
        assert!(s.timer.is_running());
    }

    #[test]
    fn poll_descends_only_when_due() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let y0 = s.snapshot().current.unwrap().y;

        s.poll(now);
        assert_eq!(s.snapshot().current.unwrap().y, y0, "deadline not reached");

        s.poll(now + Duration::from_millis(1001));
        assert_eq!(s.snapshot().current.unwrap().y, y0 + 1);
    }

    #[test]
    fn moves_are_silent_noops_at_walls() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        // Walk the piece into the left wall; extra moves must change nothing.
        for _ in 0..s.config.cols {
            s.move_left(now);
        }
        let at_wall = s.snapshot().current.unwrap().x;
        s.move_left(now);
        assert_eq!(s.snapshot().current.unwrap().x, at_wall);
    }

    #[test]
    fn soft_drop_descends_without_scoring() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let y0 = s.snapshot().current.unwrap().y;
        s.soft_drop(now);
        let snap = s.snapshot();
        assert_eq!(snap.current.unwrap().y, y0 + 1);
        assert_eq!(snap.score, 0);
    }

    #[test]
    fn hard_drop_awards_one_point_per_row_and_locks() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let piece = s.snapshot().current.unwrap();
        let drop_rows = (s.snapshot().ghost_y().unwrap() - piece.y) as u32;

        let snap = s.hard_drop(now);
        assert_eq!(snap.score, drop_rows);
        // The locked cells are on the board and a fresh piece spawned at the top.
        assert_eq!(snap.current.as_ref().unwrap().y, 0);
        let filled = (0..snap.rows())
            .flat_map(|y| (0..snap.cols()).map(move |x| (x, y)))
            .filter(|&(x, y)| snap.cell(x, y) != Cell::Empty)
            .count();
        assert_eq!(filled, 4);
    }

    #[test]
    fn score_is_non_decreasing_and_level_tracks_lines() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let mut last_score = 0;
        for _ in 0..200 {
            if s.phase() != Phase::Running {
                break;
            }
            s.hard_drop(now);
            let snap = s.snapshot();
            assert!(snap.score >= last_score);
            assert_eq!(snap.level, snap.lines / 10 + 1);
            last_score = snap.score;
        }
    }

    /// Scenario A: O-pieces pave the bottom rows up to column 7; a vertical I
    /// dropped at the right edge is 1 wide and cannot complete the 10-wide row.
    #[test]
    fn vertical_i_at_the_edge_clears_nothing() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        for x in [0, 2, 4, 6] {
            let mut o = Piece::spawn(PieceKind::O, 10);
            o.x = x;
            s.current = Some(o);
            s.hard_drop(now);
        }
        // Rows 18 and 19 now hold columns 0..=7; columns 8 and 9 are open.
        assert!((0..8).all(|x| s.board.cell(x, 19) != Cell::Empty));

        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.shape = rotate_cw(&piece.shape); // vertical: 1 wide, 4 tall
        piece.x = 7; // occupied column of the rotated matrix lands at x = 9
        piece.y = 0;
        s.current = Some(piece);
        s.hard_drop(now);

        let snap = s.snapshot();
        assert_eq!(snap.lines, 0);
        assert_eq!(snap.cell(9, 19), Cell::Filled(PieceKind::I));
        assert_eq!(snap.cell(8, 19), Cell::Empty, "gap column keeps the row open");
    }

    /// Scenario B: one gap in the bottom row; filling it clears exactly that
    /// row for 100 × level and shifts the row above down.
    #[test]
    fn single_line_clear_scores_and_shifts() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        fill_row_except(&mut s.board, 19, &[9]);
        // A marker above the full row, clear of the I-piece's landing column.
        s.board.cells[18][0] = Cell::Filled(PieceKind::S);

        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.shape = rotate_cw(&piece.shape);
        piece.x = 7;
        s.current = Some(piece);
        let score_before = s.score();
        s.hard_drop(now);

        let snap = s.snapshot();
        assert_eq!(snap.lines, 1);
        assert_eq!(snap.score - score_before, 100 + 16, "100×level + 16 drop rows");
        // The marker moved down into the cleared row's place.
        assert_eq!(snap.cell(0, 19), Cell::Filled(PieceKind::S));
        assert_eq!(snap.cell(0, 18), Cell::Empty);
    }

    /// Scenario C: four simultaneous rows at level 1 award exactly 800.
    #[test]
    fn quadruple_clear_awards_800_at_level_one() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        for y in 16..20 {
            fill_row_except(&mut s.board, y, &[9]);
        }
        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.shape = rotate_cw(&piece.shape);
        piece.x = 7;
        s.current = Some(piece);
        let score_before = s.score();
        s.hard_drop(now);

        let snap = s.snapshot();
        assert_eq!(snap.lines, 4);
        assert_eq!(snap.score - score_before, 800 + 16, "800×1 + 16 drop rows");
        assert!((0..20).all(|y| (0..10).all(|x| snap.cell(x, y) == Cell::Empty)));
    }

    /// Scenario D: a blocked spawn transitions to GameOver without the spawn
    /// attempt mutating the board.
    #[test]
    fn blocked_spawn_is_game_over_with_board_untouched() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        // Wall off the spawn rows, leaving one survivor column so nothing clears.
        for y in 0..3 {
            fill_row_except(&mut s.board, y, &[0]);
        }
        let mut piece = Piece::spawn(PieceKind::O, 10);
        piece.x = 0;
        piece.y = 17;
        s.current = Some(piece);
        let board_before = s.board.clone();
        s.hard_drop(now);

        assert_eq!(s.phase(), Phase::GameOver);
        assert!(!s.timer.is_running(), "game over cancels the timer");
        // Board = before + exactly the locked O cells; the failed spawn wrote nothing.
        let mut expected = board_before;
        expected.cells[18][0] = Cell::Filled(PieceKind::O);
        expected.cells[18][1] = Cell::Filled(PieceKind::O);
        expected.cells[19][0] = Cell::Filled(PieceKind::O);
        expected.cells[19][1] = Cell::Filled(PieceKind::O);
        assert_eq!(s.board, expected);

        // Terminal phase accepts no further mutation.
        let x_before = s.snapshot().current.unwrap().x;
        s.move_left(now);
        s.rotate(now);
        s.fall_tick(now);
        assert_eq!(s.snapshot().current.unwrap().x, x_before);
    }

    /// Scenario E: a vertical I flush against the left wall rotates back to
    /// horizontal via a wall kick instead of silently failing.
    #[test]
    fn wall_kick_saves_rotation_at_the_left_wall() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.shape = rotate_cw(&piece.shape); // occupied column at offset 2
        piece.x = -2; // cells hug column 0
        piece.y = 5;
        assert!(is_valid_placement(&piece.shape, piece.x, piece.y, &s.board));
        s.current = Some(piece);

        s.rotate(now);
        let view = s.snapshot().current.unwrap();
        // Naive rotation at x = −2 pokes out of the left wall; the +2 kick commits it.
        assert!(view.shape[2].iter().all(|&c| c), "now horizontal");
        assert_eq!(view.x, 0, "origin shifted right by the kick");
        assert!(is_valid_placement(&view.shape, view.x, view.y, &s.board));
    }

    #[test]
    fn rotation_with_no_valid_kick_changes_nothing() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        // Box in a vertical I so neither the naive rotation nor any kick fits.
        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.shape = rotate_cw(&piece.shape);
        piece.x = -2;
        piece.y = 16;
        for x in 1..10 {
            for y in 16..20 {
                s.board.cells[y][x] = Cell::Filled(PieceKind::J);
            }
        }
        s.current = Some(piece.clone());
        s.rotate(now);
        let view = s.snapshot().current.unwrap();
        assert_eq!(view.shape, piece.shape);
        assert_eq!((view.x, view.y), (piece.x, piece.y));
    }

    #[test]
    fn level_up_reschedules_the_timer_immediately() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        s.lines = 9;
        fill_row_except(&mut s.board, 19, &[9]);
        let mut piece = Piece::spawn(PieceKind::I, 10);
        piece.shape = rotate_cw(&piece.shape);
        piece.x = 7;
        s.current = Some(piece);

        assert_eq!(s.fall_interval(), Duration::from_millis(1000));
        s.hard_drop(now);
        let snap = s.snapshot();
        assert_eq!(snap.lines, 10);
        assert_eq!(snap.level, 2);
        assert_eq!(snap.fall_interval, Duration::from_millis(950));
        assert!(s.timer.is_running());
    }

    #[test]
    fn best_score_is_loaded_and_saved_through_the_store() {
        let now = Instant::now();
        struct SharedStore(Rc<RefCell<u32>>);
        impl ScoreStore for SharedStore {
            fn load_best(&mut self) -> u32 {
                *self.0.borrow()
            }
            fn save_best(&mut self, best: u32) {
                *self.0.borrow_mut() = best;
            }
        }
        let store = Rc::new(RefCell::new(7u32));
        let mut s = GameSession::new(
            GameConfig {
                rng_seed: Some(1),
                ..GameConfig::default()
            },
            Box::new(SharedStore(store.clone())),
        )
        .unwrap();
        assert_eq!(s.best(), 7);

        s.start(now);
        s.hard_drop(now); // well over 7 rows of drop points
        assert!(s.best() > 7);
        assert_eq!(*store.borrow(), s.best());
    }

    #[test]
    fn events_reach_subscribers() {
        let now = Instant::now();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut s = session();
        s.subscribe(Box::new(move |ev| sink.borrow_mut().push(ev)));

        s.start(now);
        s.move_left(now);
        s.rotate(now);
        s.hard_drop(now);

        let events = seen.borrow();
        assert!(events.contains(&GameEvent::Moved));
        assert!(events.contains(&GameEvent::Rotated));
        assert!(events.contains(&GameEvent::Locked));
    }

    #[test]
    fn restart_after_game_over_resets_everything() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        // Stack pieces without steering until the board tops out.
        for _ in 0..500 {
            if s.phase() == Phase::GameOver {
                break;
            }
            s.hard_drop(now);
        }
        assert_eq!(s.phase(), Phase::GameOver);

        let snap = s.restart(now);
        assert_eq!(snap.phase, Phase::Running);
        assert_eq!((snap.score, snap.lines, snap.level), (0, 0, 1));
        assert!(
            (0..snap.rows()).all(|y| (0..snap.cols()).all(|x| snap.cell(x, y) == Cell::Empty))
        );
    }

    #[test]
    fn snapshot_is_detached_from_the_session() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let snap = s.snapshot();
        s.board.cells[19][0] = Cell::Filled(PieceKind::Z);
        assert_eq!(snap.cell(0, 19), Cell::Empty);
    }

    #[test]
    fn ghost_matches_hard_drop_landing_row() {
        let now = Instant::now();
        let mut s = session();
        s.start(now);
        let ghost = s.snapshot().ghost_y().unwrap();
        let kind = s.snapshot().current.unwrap().kind;
        s.hard_drop(now);
        // The locked cells of that kind sit where the ghost predicted.
        let snap = s.snapshot();
        let top_filled = (0..snap.rows())
            .find(|&y| (0..snap.cols()).any(|x| snap.cell(x, y) == Cell::Filled(kind)))
            .unwrap() as i32;
        let shape = kind.base_shape();
        let first_occupied_row = shape.iter().position(|r| r.iter().any(|&c| c)).unwrap() as i32;
        assert_eq!(top_filled, ghost + first_occupied_row);
    }
}
