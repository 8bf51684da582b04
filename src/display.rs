use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

use crate::video::Framebuffer;

/// Display is used by frontends to put the machine's framebuffer on a screen.
/// It should abstract the implementation details, so a variety of kinds of
/// screen would work.
pub trait Display {
    /// draw the framebuffer, with a one-line status (title, paused etc.)
    fn draw(&mut self, screen: &dyn Framebuffer, status: &str) -> Result<(), io::Error>;
}

// framebuffer dimensions, and their mapping onto canvas coordinates
struct Resolution(usize, usize);

impl Resolution {
    fn of(screen: &dyn Framebuffer) -> Self {
        Resolution(screen.width(), screen.height())
    }

    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// canvas coordinates of every pixel that is `lit` (or unlit); y grows
    /// downward on the machine and upward on the canvas
    fn points(&self, screen: &dyn Framebuffer, lit: bool) -> Vec<(f64, f64)> {
        let w = self.0;
        (0..self.pixel_count())
            .map(|i| (i % w, i / w))
            .filter(|(x, y)| screen.pixel(*x, *y) == lit)
            .map(|(x, y)| (x as f64, -1.0 * y as f64))
            .collect()
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl MonoTermDisplay {
    pub fn new() -> Result<MonoTermDisplay, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        Ok(MonoTermDisplay { terminal })
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, screen: &dyn Framebuffer, status: &str) -> Result<(), io::Error> {
        let resolution = Resolution::of(screen);
        let on = resolution.points(screen, true);
        let off = resolution.points(screen, false);

        // for now this assumes a 1:1 ratio between terminal cells and pixels
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + resolution.0 as u16, 2 + resolution.1 as u16);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(status)
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &off,
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &on,
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines; remembers what it was last given
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
    pub lit: usize,
    pub status: String,
}

impl Display for DummyDisplay {
    fn draw(&mut self, screen: &dyn Framebuffer, status: &str) -> Result<(), io::Error> {
        self.frames += 1;
        self.lit = Resolution::of(screen).points(screen, true).len();
        self.status = status.to_owned();
        Ok(())
    }
}
