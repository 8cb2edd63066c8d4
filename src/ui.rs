//! Layout and drawing: menu, playfield with ghost piece, sidebar, pause,
//! game over, line-clear fade.

use crate::app::Screen;
use crate::game::{Cell, PieceKind, Snapshot};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Each board cell is 2 terminal columns wide, 1 row tall.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the line-clear flash (TachyonFX fade back to board content).
const LINE_CLEAR_FADE_MS: u32 = 350;

/// How long a score/level popup stays in the sidebar.
pub const POPUP_TTL_MS: u64 = 2000;

/// Playfield size in terminal cells (grid + border) for given board dimensions.
fn board_pixel_size(cols: u16, rows: u16) -> (u16, u16) {
    (cols * CELL_WIDTH + 2, rows + 2)
}

/// Playfield inner rect (board only, no border); matches draw_game's layout.
fn board_rect(area: Rect, snap: &Snapshot) -> Rect {
    let (pw, ph) = board_pixel_size(snap.cols() as u16, snap.rows() as u16);
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    Rect {
        x: x + 1,
        y: y + 1,
        width: (snap.cols() as u16 * CELL_WIDTH).min(area.width.saturating_sub(2)),
        height: (snap.rows() as u16).min(area.height.saturating_sub(2)),
    }
}

/// Draw the current screen. When a line clear just happened and animation is
/// enabled, `line_clear_effect` holds the fade; this updates and renders it.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    snap: &Snapshot,
    theme: &Theme,
    popups: &[(String, Instant)],
    line_clear_effect: &mut Option<Effect>,
    line_clear_process_time: &mut Option<Instant>,
    now: Instant,
    no_animation: bool,
) {
    let area = frame.area();
    match screen {
        Screen::Menu => draw_menu(frame, snap, theme, area),
        Screen::Playing => {
            draw_game(frame, snap, theme, popups, area, now);
            if snap.phase == crate::game::Phase::Paused {
                draw_pause_overlay(frame, theme, area);
            }
            if !no_animation && line_clear_effect.is_some() {
                apply_line_clear_effect(
                    frame,
                    snap,
                    area,
                    line_clear_effect,
                    line_clear_process_time,
                    now,
                );
            }
        }
        Screen::GameOver => {
            draw_game(frame, snap, theme, popups, area, now);
            draw_game_over(frame, snap, theme, area);
        }
    }
}

/// Update and render the line-clear fade over the board area.
fn apply_line_clear_effect(
    frame: &mut Frame,
    snap: &Snapshot,
    area: Rect,
    line_clear_effect: &mut Option<Effect>,
    line_clear_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let rect = board_rect(area, snap);
    let delta = line_clear_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    *line_clear_process_time = Some(now);
    if let Some(effect) = line_clear_effect {
        frame.render_effect(effect, rect, TfxDuration::from_millis(delta_ms));
    }
}

/// Fresh fade effect for a just-cleared set of rows. The app owns it and drops
/// it once `done()`.
pub fn new_line_clear_effect(theme: &Theme, snap: &Snapshot, area: Rect) -> Effect {
    let rect = board_rect(area, snap);
    fx::fade_from(theme.title, theme.bg, (LINE_CLEAR_FADE_MS, Interpolation::Linear))
        .with_area(rect)
}

fn neon_title(theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(" NEON", Style::default().fg(theme.pieces[0]).bold()),
        Span::styled("TRIS ", Style::default().fg(theme.pieces[2]).bold()),
    ])
}

fn draw_menu(frame: &mut Frame, snap: &Snapshot, theme: &Theme, area: Rect) {
    let popup_w = 44u16;
    let popup_h = 16u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let key_style = Style::default().fg(theme.pieces[3]);
    let fg = Style::default().fg(theme.main_fg);
    let lines = vec![
        Line::from(""),
        neon_title(theme),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Best: {} ", snap.best),
            Style::default().fg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " ─ CONTROLS ─ ",
            Style::default().fg(theme.div_line),
        )),
        Line::from(vec![
            Span::styled(" ←/→ or A/D ", key_style),
            Span::styled("Move   ", fg),
            Span::styled(" ↑ or W ", key_style),
            Span::styled("Rotate ", fg),
        ]),
        Line::from(vec![
            Span::styled(" ↓ or S ", key_style),
            Span::styled("Soft drop   ", fg),
            Span::styled(" Enter/Space ", key_style),
            Span::styled("Hard drop ", fg),
        ]),
        Line::from(vec![
            Span::styled(" P ", key_style),
            Span::styled("Pause   ", fg),
            Span::styled(" Q/Esc ", key_style),
            Span::styled("Quit ", fg),
        ]),
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            " [ ENTER — START ] ",
            Style::default().fg(Color::Black).bg(theme.title).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " ⌁ [Q] QUIT ",
            Style::default().fg(theme.pieces[4]),
        )),
    ];

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, snap: &Snapshot, theme: &Theme, area: Rect) {
    let popup_w = 30u16;
    let popup_h = 11u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(theme.pieces[4]),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", snap.score), fg)),
        Line::from(Span::styled(format!(" Best: {} ", snap.best), fg)),
        Line::from(Span::styled(format!(" Lines: {} ", snap.lines), fg)),
    ];
    if snap.score > 0 && snap.score >= snap.best {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " R — Restart    Q — Quit ",
        fg,
    )));
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Neontris ", Style::default().fg(theme.title))),
    );
    p.render(popup, frame.buffer_mut());
}

/// Draw game: playfield + sidebar; use full area and center the board.
fn draw_game(
    frame: &mut Frame,
    snap: &Snapshot,
    theme: &Theme,
    popups: &[(String, Instant)],
    area: Rect,
    now: Instant,
) {
    let (pw, ph) = board_pixel_size(snap.cols() as u16, snap.rows() as u16);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let active = vert[1];

    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(active);

    draw_playfield(frame, snap, theme, inner[0]);
    draw_sidebar(frame, snap, theme, popups, inner[1], now);
}

fn draw_playfield(frame: &mut Frame, snap: &Snapshot, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Neontris ", Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let rect = Rect {
        x: inner.x,
        y: inner.y,
        width: (snap.cols() as u16 * CELL_WIDTH).min(inner.width),
        height: (snap.rows() as u16).min(inner.height),
    };

    // Cells occupied by the live piece and by its ghost preview.
    let piece_cells: Vec<(i32, i32)> = snap
        .current
        .as_ref()
        .map(|p| occupied_cells(&p.shape, p.x, p.y))
        .unwrap_or_default();
    let ghost_cells: Vec<(i32, i32)> = match (snap.current.as_ref(), snap.ghost_y()) {
        (Some(p), Some(gy)) if gy != p.y => occupied_cells(&p.shape, p.x, gy),
        _ => Vec::new(),
    };
    let piece_color = snap
        .current
        .as_ref()
        .map(|p| theme.piece_color(p.kind.color_index()));

    let buf = frame.buffer_mut();
    for y in 0..snap.rows() {
        for x in 0..snap.cols() {
            let pos = (x as i32, y as i32);
            let (symbol, style) = if piece_cells.contains(&pos) {
                let c = piece_color.unwrap_or(theme.main_fg);
                ("██", Style::default().fg(c).bg(theme.bg))
            } else if ghost_cells.contains(&pos) {
                ("░░", Style::default().fg(theme.ghost).bg(theme.bg))
            } else {
                match snap.cell(x, y) {
                    Cell::Filled(kind) => {
                        let c = theme.piece_color(kind.color_index());
                        ("██", Style::default().fg(c).bg(theme.bg))
                    }
                    Cell::Empty => ("  ", Style::default().bg(theme.bg)),
                }
            };
            let rx = rect.x + x as u16 * CELL_WIDTH;
            let ry = rect.y + y as u16;
            if rx + CELL_WIDTH <= rect.x + rect.width && ry < rect.y + rect.height {
                buf.set_string(rx, ry, symbol, style);
            }
        }
    }
}

fn occupied_cells(shape: &crate::game::ShapeMatrix, x: i32, y: i32) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    for (dy, row) in shape.iter().enumerate() {
        for (dx, &filled) in row.iter().enumerate() {
            if filled {
                out.push((x + dx as i32, y + dy as i32));
            }
        }
    }
    out
}

fn draw_sidebar(
    frame: &mut Frame,
    snap: &Snapshot,
    theme: &Theme,
    popups: &[(String, Instant)],
    area: Rect,
    now: Instant,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Next (border + title + 4-row preview)
            Constraint::Length(1), // gap
            Constraint::Length(7), // Stats (border + score, best, level, lines, speed)
            Constraint::Length(1), // gap
            Constraint::Length(5), // Popups
            Constraint::Fill(1),
        ])
        .split(area);

    // --- Next (own border) ---
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let next_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(4)])
        .split(next_inner);
    Paragraph::new(Line::from(Span::styled("Next", title_style)))
        .render(next_layout[0], frame.buffer_mut());
    if let Some(kind) = snap.next {
        draw_next_preview(frame, theme, next_layout[1], kind);
    }

    // --- Stats ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(snap.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(snap.best.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Level: ", title_style),
            Span::styled(snap.level.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Lines: ", title_style),
            Span::styled(snap.lines.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Speed: ", title_style),
            Span::styled(format!("{}ms", snap.fall_interval.as_millis()), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Recent score / level popups ---
    let popup_lines: Vec<Line> = popups
        .iter()
        .rev()
        .filter(|(_, t)| now.saturating_duration_since(*t).as_millis() < u128::from(POPUP_TTL_MS))
        .take(chunks[4].height as usize)
        .map(|(text, _)| Line::from(Span::styled(text.clone(), title_style.bold())))
        .collect();
    Paragraph::new(ratatui::text::Text::from(popup_lines))
        .alignment(Alignment::Center)
        .render(chunks[4], frame.buffer_mut());
}

/// Draw the next piece's base shape as a small block preview.
fn draw_next_preview(frame: &mut Frame, theme: &Theme, area: Rect, kind: PieceKind) {
    let shape = kind.base_shape();
    let color = theme.piece_color(kind.color_index());

    // Bounding box of occupied cells, so the preview is centred regardless
    // of the matrix size.
    let mut x_lo = usize::MAX;
    let mut x_hi = 0usize;
    let mut y_lo = usize::MAX;
    let mut y_hi = 0usize;
    for (y, row) in shape.iter().enumerate() {
        for (x, &filled) in row.iter().enumerate() {
            if filled {
                x_lo = x_lo.min(x);
                x_hi = x_hi.max(x);
                y_lo = y_lo.min(y);
                y_hi = y_hi.max(y);
            }
        }
    }
    if x_lo > x_hi {
        return;
    }
    let bw = (x_hi - x_lo + 1) as u16;
    let bh = (y_hi - y_lo + 1) as u16;
    let off_x = area.width.saturating_sub(bw * CELL_WIDTH) / 2;
    let off_y = area.height.saturating_sub(bh) / 2;

    let buf = frame.buffer_mut();
    for (y, row) in shape.iter().enumerate() {
        for (x, &filled) in row.iter().enumerate() {
            if !filled {
                continue;
            }
            let rx = area.x + off_x + (x - x_lo) as u16 * CELL_WIDTH;
            let ry = area.y + off_y + (y - y_lo) as u16;
            if rx + CELL_WIDTH <= area.x + area.width && ry < area.y + area.height {
                buf.set_string(rx, ry, "██", Style::default().fg(color).bg(theme.bg));
            }
        }
    }
}
