use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Block,
};
use shoal_core::{BubbleConfig, PlacementConfig};
use shoal_protocol::{RenderCommand, TextAlign, ThemeToken};
use tracing::info;

use crate::aquarium::{Aquarium, CELL_HEIGHT, CELL_WIDTH};

const FRAME: Duration = Duration::from_millis(50);

/// Placement policy scaled to terminal cells: every length is a whole
/// number of cells so bubbles land on the grid.
pub fn terminal_config() -> PlacementConfig {
    PlacementConfig {
        annotation_band_height: 3.0 * CELL_HEIGHT,
        bubble: BubbleConfig {
            min_width: 8.0 * CELL_WIDTH,
            max_width: 30.0 * CELL_WIDTH,
            ideal_single_line_width: 30.0 * CELL_WIDTH,
            line_height: CELL_HEIGHT,
            padding_x: 2.0 * CELL_WIDTH,
            padding_y: CELL_HEIGHT,
            ..BubbleConfig::default()
        },
        ..PlacementConfig::default()
    }
}

fn theme_to_color(token: &ThemeToken) -> Color {
    match token {
        ThemeToken::Background => Color::Black,
        ThemeToken::Water => Color::Rgb(6, 24, 48),
        ThemeToken::RowBorder => Color::Rgb(40, 70, 110),
        ThemeToken::SwimBand => Color::Rgb(8, 32, 62),
        ThemeToken::AnnotationBand => Color::Rgb(6, 24, 48),
        ThemeToken::LaneGuide => Color::Rgb(30, 55, 90),
        ThemeToken::FishBody => Color::LightYellow,
        ThemeToken::FishLabel => Color::Gray,
        ThemeToken::TextPrimary => Color::White,
        ThemeToken::TextMuted => Color::DarkGray,
        ThemeToken::BubbleDefaultFill => Color::Rgb(230, 230, 230),
        ThemeToken::BubbleDefaultBorder => Color::Gray,
        ThemeToken::BubbleDefaultText => Color::Black,
        ThemeToken::BubbleCheerfulFill => Color::Rgb(255, 236, 150),
        ThemeToken::BubbleCheerfulBorder => Color::Yellow,
        ThemeToken::BubbleCheerfulText => Color::Rgb(80, 50, 0),
        ThemeToken::BubbleShyFill => Color::Rgb(250, 210, 225),
        ThemeToken::BubbleShyBorder => Color::LightMagenta,
        ThemeToken::BubbleShyText => Color::Rgb(90, 30, 60),
        ThemeToken::BubbleBraveFill => Color::Rgb(255, 190, 170),
        ThemeToken::BubbleBraveBorder => Color::LightRed,
        ThemeToken::BubbleBraveText => Color::Rgb(90, 10, 0),
        ThemeToken::BubbleLazyFill => Color::Rgb(200, 220, 240),
        ThemeToken::BubbleLazyBorder => Color::LightBlue,
        ThemeToken::BubbleLazyText => Color::Rgb(20, 40, 80),
    }
}

/// Maps logical pixels onto the content area's cells.
#[derive(Debug, Clone, Copy)]
struct Grid {
    area: Rect,
}

impl Grid {
    fn col(&self, x: f64) -> i32 {
        i32::from(self.area.x) + (x / CELL_WIDTH).round() as i32
    }

    fn row(&self, y: f64) -> i32 {
        i32::from(self.area.y) + (y / CELL_HEIGHT).floor() as i32
    }

    fn contains(&self, col: i32, row: i32) -> bool {
        col >= i32::from(self.area.x)
            && row >= i32::from(self.area.y)
            && col < i32::from(self.area.right())
            && row < i32::from(self.area.bottom())
    }

    fn paint(&self, buf: &mut Buffer, col: i32, row: i32, symbol: char, style: Style) {
        if !self.contains(col, row) {
            return;
        }
        if let Some(cell) = buf.cell_mut((col as u16, row as u16)) {
            cell.set_char(symbol).set_style(style);
        }
    }

    fn text(&self, buf: &mut Buffer, col: i32, row: i32, text: &str, style: Style) {
        if !self.contains(col.max(i32::from(self.area.x)), row) {
            return;
        }
        let start = col.max(i32::from(self.area.x)) as u16;
        let skip = (i32::from(start) - col) as usize;
        let visible: String = text.chars().skip(skip).collect();
        let room = self.area.right().saturating_sub(start) as usize;
        let _ = buf.set_stringn(start, row as u16, visible, room, style);
    }
}

fn draw_command(buf: &mut Buffer, grid: Grid, cmd: &RenderCommand) {
    match cmd {
        RenderCommand::DrawRect {
            rect,
            color,
            border_color,
            ..
        } => {
            let bg = theme_to_color(color);
            let (c0, r0) = (grid.col(rect.x), grid.row(rect.y));
            let (c1, r1) = (grid.col(rect.right()), grid.row(rect.bottom()));
            for row in r0..r1.max(r0 + 1) {
                for col in c0..c1 {
                    if !grid.contains(col, row) {
                        continue;
                    }
                    if let Some(cell) = buf.cell_mut((col as u16, row as u16)) {
                        cell.set_bg(bg);
                    }
                }
            }
            if let Some(border) = border_color {
                let style = Style::default().fg(theme_to_color(border)).bg(bg);
                for row in r0..r1 {
                    grid.paint(buf, c0, row, '┊', style);
                    grid.paint(buf, c1 - 1, row, '┊', style);
                }
            }
        }
        RenderCommand::DrawLine { from, to, color, .. } => {
            let row = grid.row(from.y.min(to.y));
            let fg = theme_to_color(color);
            for col in grid.col(from.x)..grid.col(to.x) {
                if !grid.contains(col, row) {
                    continue;
                }
                if let Some(cell) = buf.cell_mut((col as u16, row as u16)) {
                    cell.set_char('─').set_fg(fg);
                }
            }
        }
        RenderCommand::DrawText {
            position,
            text,
            color,
            align,
            ..
        } => {
            let width = unicode_columns(text) as i32;
            let col = match align {
                TextAlign::Left => grid.col(position.x),
                TextAlign::Center => grid.col(position.x) - width / 2,
                TextAlign::Right => grid.col(position.x) - width,
            };
            let row = grid.row(position.y);
            // Keep whatever band the text sits on.
            let bg = if grid.contains(col.max(0), row) {
                buf.cell((col.max(0) as u16, row as u16))
                    .map_or(Color::Reset, |c| c.bg)
            } else {
                return;
            };
            grid.text(buf, col, row, text, Style::default().fg(theme_to_color(color)).bg(bg));
        }
        RenderCommand::DrawBubble {
            rect,
            tail,
            lines,
            line_height,
            padding,
            palette,
            opacity,
        } => {
            if *opacity <= 0.0 {
                return;
            }
            let mut frame = Style::default()
                .fg(theme_to_color(&palette.border))
                .bg(theme_to_color(&palette.fill));
            let mut ink = Style::default()
                .fg(theme_to_color(&palette.text))
                .bg(theme_to_color(&palette.fill));
            if *opacity < 0.6 {
                frame = frame.add_modifier(Modifier::DIM);
                ink = ink.add_modifier(Modifier::DIM);
            }

            let (c0, r0) = (grid.col(rect.x), grid.row(rect.y));
            let (c1, r1) = (grid.col(rect.right()) - 1, grid.row(rect.bottom()) - 1);
            for row in r0..=r1 {
                for col in c0..=c1 {
                    let symbol = match (row == r0, row == r1, col == c0, col == c1) {
                        (true, _, true, _) => '╭',
                        (true, _, _, true) => '╮',
                        (_, true, true, _) => '╰',
                        (_, true, _, true) => '╯',
                        (true, _, _, _) | (_, true, _, _) => '─',
                        (_, _, true, _) | (_, _, _, true) => '│',
                        _ => ' ',
                    };
                    grid.paint(buf, col, row, symbol, frame);
                }
            }

            let (tail_col, tail_row) = (grid.col(tail.x), grid.row(tail.y));
            let tail_col = tail_col.clamp(c0 + 1, (c1 - 1).max(c0 + 1));
            if tail_row > r1 {
                grid.paint(buf, tail_col, r1, '┬', frame);
            } else if tail_row < r0 {
                grid.paint(buf, tail_col, r0, '┴', frame);
            }

            let text_col = grid.col(rect.x + padding.x);
            for (i, line) in lines.iter().enumerate() {
                let row = grid.row(rect.y + padding.y + i as f64 * line_height);
                if row < r1 {
                    grid.text(buf, text_col, row, line, ink);
                }
            }
        }
        RenderCommand::SetClip { .. }
        | RenderCommand::ClearClip
        | RenderCommand::BeginGroup { .. }
        | RenderCommand::EndGroup => {}
    }
}

fn unicode_columns(text: &str) -> usize {
    ratatui::text::Line::raw(text).width()
}

pub fn run(fish: usize, compact: bool, config: PlacementConfig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let logical = |w: u16, h: u16| {
        (
            f64::from(w) * CELL_WIDTH,
            f64::from(h.saturating_sub(1)) * CELL_HEIGHT,
        )
    };
    let (width, height) = logical(size.width, size.height);
    let mut aquarium = Aquarium::new(fish, width, height, compact, config);
    info!(fish, width, height, "tank opened");

    let mut last = Instant::now();
    loop {
        let term_size = terminal.size()?;
        let (width, height) = logical(term_size.width, term_size.height);
        aquarium.resize(width, height);

        let now = Instant::now();
        aquarium.step(now.duration_since(last).as_secs_f64() * 1000.0);
        last = now;
        let cmds = aquarium.frame();
        let status = aquarium.status();

        terminal.draw(|frame| {
            let area = frame.area();

            let header_area = Rect::new(0, 0, area.width, 1);
            let header = Block::default()
                .title(format!(
                    " shoal | {status} | space uproar | +/- fish | c clear | q quit "
                ))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, header_area);

            let grid = Grid {
                area: Rect::new(0, 1, area.width, area.height.saturating_sub(1)),
            };
            let buf = frame.buffer_mut();
            for cmd in &cmds {
                draw_command(buf, grid, cmd);
            }
        })?;

        if event::poll(FRAME)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char(' ') => aquarium.uproar(),
                    KeyCode::Char('c') => aquarium.clear(),
                    KeyCode::Char('+') | KeyCode::Char('=') => aquarium.add_fish(),
                    KeyCode::Char('-') => aquarium.remove_fish(),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!(fish = aquarium.fish_count(), "tank closed");

    Ok(())
}
