//! Neontris — neon-flavoured falling-block puzzle game in the terminal.

mod app;
mod game;
mod highscores;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use game::GameConfig;

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        rows: args.height as usize,
        cols: args.width as usize,
        base_interval_ms: args.base_interval_ms,
        interval_step_ms: args.interval_step_ms,
        min_interval_ms: args.min_interval_ms,
        rng_seed: args.seed,
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Neon falling-block puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "neontris",
    version,
    about = "Neon falling-block puzzle in the terminal. Stack pieces, clear lines, chase the speed.",
    long_about = "Neontris is a terminal falling-block puzzle game.\n\n\
        Guide the falling tetrominoes; complete horizontal lines to clear them and score. \
        Every 10 lines the level rises and the pieces fall faster.\n\n\
        CONTROLS (arrows):\n  Left/Right  Move    Up        Rotate     Down       Soft drop\n  Enter/Space Hard drop   P          Pause      Q / Esc    Quit\n\n\
        CONTROLS (wasd / vim):\n  a/d or h/l  Move    w or k    Rotate     s or j     Soft drop\n  Space       Hard drop   r          Restart\n\n\
        Hold a movement key to keep the piece moving. Use --theme to load a btop-style theme file."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses the neon palette if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Playfield width in columns.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: u16,

    /// Playfield height in rows.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: u16,

    /// Fall interval at level 1, in ms.
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub base_interval_ms: u64,

    /// How much faster each level falls, in ms.
    #[arg(long, default_value = "50", value_name = "MS")]
    pub interval_step_ms: u64,

    /// Fastest fall interval, in ms (speed floor).
    #[arg(long, default_value = "100", value_name = "MS")]
    pub min_interval_ms: u64,

    /// Fixed piece-sequence seed (for practising the same game twice).
    #[arg(long, value_name = "N")]
    pub seed: Option<u32>,

    /// Disable the line-clear animation.
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start the game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
