//! App: terminal init, main loop, key repeat and screen switching.

use crate::Args;
use crate::game::{GameConfig, GameEvent, GameSession, Phase};
use crate::highscores::FileScoreStore;
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
}

pub struct App {
    args: Args,
    theme: Theme,
    session: GameSession,
    screen: Screen,
    /// Events drained once per frame; the subscription writes into this sink.
    events: Rc<RefCell<Vec<GameEvent>>>,
    /// Recent sidebar popup texts ("+300", "LEVEL 2!") with their birth time.
    popups: Vec<(String, Instant)>,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// TachyonFX fade for line clears (created when a clear happens).
    line_clear_effect: Option<Effect>,
    /// Last time the effect was advanced (for delta).
    line_clear_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let mut session = GameSession::new(config, Box::new(FileScoreStore::new()))?;
        let events: Rc<RefCell<Vec<GameEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.subscribe(Box::new(move |ev| sink.borrow_mut().push(ev)));
        Ok(Self {
            args,
            theme,
            session,
            screen: Screen::Menu,
            events,
            popups: Vec::new(),
            repeat_state: None,
            last_repeat_fire: None,
            line_clear_effect: None,
            line_clear_effect_process_time: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Attempt to enable enhanced keyboard for Release events
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        if self.args.no_menu {
            self.session.start(Instant::now());
            self.screen = Screen::Playing;
        }

        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            self.session.poll(now);
            self.drain_events(terminal, now)?;
            self.popups.retain(|(_, t)| {
                now.saturating_duration_since(*t).as_millis() < u128::from(crate::ui::POPUP_TTL_MS)
            });

            let snap = self.session.snapshot();
            let screen = self.screen;
            let theme = &self.theme;
            let popups = &self.popups;
            let no_animation = self.args.no_animation;
            let effect = &mut self.line_clear_effect;
            let effect_time = &mut self.line_clear_effect_process_time;
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    screen,
                    &snap,
                    theme,
                    popups,
                    effect,
                    effect_time,
                    now,
                    no_animation,
                );
            })?;

            if self.line_clear_effect.as_ref().is_some_and(Effect::done) {
                self.line_clear_effect = None;
                self.line_clear_effect_process_time = None;
            }

            // Limit event polling to hit ~60 FPS rendering (16ms)
            let timeout = Duration::from_millis(16).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        let action = key_to_action(key);

                        // Only the first Press starts a repeat; Release ends it.
                        if key.kind != KeyEventKind::Press {
                            if key.kind == KeyEventKind::Release
                                && self.repeat_state.map(|(a, _)| a) == Some(action)
                            {
                                self.repeat_state = None;
                                self.last_repeat_fire = None;
                            }
                            continue;
                        }
                        if self.repeat_state.map(|(a, _)| a) == Some(action) {
                            continue;
                        }

                        if self.handle_key(action)? {
                            return Ok(());
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && self.session.phase() == Phase::Running {
                self.tick_repeat();
            }
        }
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, action: Action) -> Result<bool> {
        let now = Instant::now();
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return Ok(true),
                Action::HardDrop => {
                    self.session.start(now);
                    self.screen = Screen::Playing;
                }
                _ => {}
            },
            Screen::Playing => match action {
                Action::Quit => {
                    self.session.stop();
                    self.screen = Screen::Menu;
                    self.popups.clear();
                    self.repeat_state = None;
                    self.last_repeat_fire = None;
                }
                Action::Pause => {
                    if self.session.phase() == Phase::Paused {
                        self.session.resume(now);
                    } else {
                        self.session.pause();
                        self.repeat_state = None;
                        self.last_repeat_fire = None;
                    }
                }
                Action::Restart => {
                    self.session.restart(now);
                    self.popups.clear();
                }
                _ => {
                    self.apply_action(action, now);
                    let repeatable = matches!(
                        action,
                        Action::MoveLeft | Action::MoveRight | Action::SoftDrop
                    );
                    if repeatable {
                        self.repeat_state = Some((action, now));
                        self.last_repeat_fire = None;
                    }
                }
            },
            Screen::GameOver => match action {
                Action::Quit => return Ok(true),
                Action::Restart | Action::HardDrop => {
                    self.session.restart(now);
                    self.screen = Screen::Playing;
                    self.popups.clear();
                }
                _ => {}
            },
        }
        Ok(false)
    }

    fn apply_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::MoveLeft => {
                self.session.move_left(now);
            }
            Action::MoveRight => {
                self.session.move_right(now);
            }
            Action::Rotate => {
                self.session.rotate(now);
            }
            Action::SoftDrop => {
                self.session.soft_drop(now);
            }
            Action::HardDrop => {
                self.session.hard_drop(now);
                self.repeat_state = None;
                self.last_repeat_fire = None;
            }
            Action::Pause | Action::Restart | Action::Quit | Action::None => {}
        }
    }

    fn tick_repeat(&mut self) {
        let now = Instant::now();
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if !matches!(
            action,
            Action::MoveLeft | Action::MoveRight | Action::SoftDrop
        ) {
            return;
        }
        if now.saturating_duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action, now);
            self.last_repeat_fire = Some(now);
        }
    }

    /// Turn session events into sidebar popups, the line-clear fade, and the
    /// game-over screen switch.
    fn drain_events(&mut self, terminal: &DefaultTerminal, now: Instant) -> Result<()> {
        let drained: Vec<GameEvent> = self.events.borrow_mut().drain(..).collect();
        for ev in drained {
            match ev {
                GameEvent::LinesCleared(n) => {
                    let label = match n {
                        1 => "LINE CLEAR!".to_string(),
                        4 => "NEONTRIS!".to_string(),
                        n => format!("{n} LINES!"),
                    };
                    self.popups.push((label, now));
                    if !self.args.no_animation {
                        let size = terminal.size()?;
                        let area = Rect::new(0, 0, size.width, size.height);
                        let snap = self.session.snapshot();
                        self.line_clear_effect =
                            Some(crate::ui::new_line_clear_effect(&self.theme, &snap, area));
                        self.line_clear_effect_process_time = None;
                    }
                }
                GameEvent::LevelUp(level) => {
                    self.popups.push((format!("LEVEL {level}!"), now));
                }
                GameEvent::GameOver => {
                    self.screen = Screen::GameOver;
                    self.repeat_state = None;
                    self.last_repeat_fire = None;
                }
                GameEvent::Locked | GameEvent::Moved | GameEvent::Rotated => {}
            }
        }
        Ok(())
    }
}
