//! Terminal plots of acquired data.
//!
//! Line series are drawn with a ratatui [`Chart`]; image frames with
//! [`FrameView`], which packs two pixel rows into each cell using the upper
//! half block. The `show_*` functions take over the terminal until `q` or
//! `Esc` is pressed.

use crate::frame::ImageFrame;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Widget};
use ratatui::{Frame, Terminal};
use std::io::{self, stdout};
use std::time::Duration;

const SERIES_COLORS: [Color; 4] = [Color::Cyan, Color::Yellow, Color::Magenta, Color::Green];

/// One named line on a chart.
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Plots `values` against their 1-based sample number.
    pub fn indexed(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        let points = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| ((i + 1) as f64, v))
            .collect();
        Self::new(name, points)
    }
}

/// Labels for a chart.
#[derive(Debug, Clone)]
pub struct ChartLabels {
    pub title: String,
    pub x: String,
    pub y: String,
}

impl ChartLabels {
    pub fn new(title: &str, x: &str, y: &str) -> Self {
        Self {
            title: title.to_string(),
            x: x.to_string(),
            y: y.to_string(),
        }
    }
}

/// Min and max over every point, widened when flat so the axis is drawable.
fn bounds(series: &[Series], pick: impl Fn(&(f64, f64)) -> f64) -> [f64; 2] {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for p in series.iter().flat_map(|s| s.points.iter()) {
        let v = pick(p);
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    if lo == hi {
        return [lo - 0.5, hi + 0.5];
    }
    [lo, hi]
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::raw(format!("{:.3}", v)))
        .collect()
}

/// Draws `series` as a line chart filling `area`.
pub fn render_chart(frame: &mut Frame, area: Rect, labels: &ChartLabels, series: &[Series]) {
    let x_bounds = bounds(series, |p| p.0);
    let y_bounds = bounds(series, |p| p.1);

    let datasets: Vec<Dataset> = series
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Dataset::default()
                .name(s.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(&s.points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(labels.title.clone())
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title(labels.x.clone())
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(labels.y.clone())
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );
    frame.render_widget(chart, area);
}

/// Grayscale rendering of one frame, scaled to the widget area.
pub struct FrameView<'a> {
    frame: &'a ImageFrame,
    bit_depth: u32,
}

impl<'a> FrameView<'a> {
    pub fn new(frame: &'a ImageFrame, bit_depth: u32) -> Self {
        Self {
            frame,
            bit_depth: bit_depth.clamp(1, 16),
        }
    }

    /// Maps a pixel to an 8-bit gray level over `0 ..= 2^bit_depth - 1`.
    pub fn level(&self, value: u16) -> u8 {
        let max = (1u32 << self.bit_depth) - 1;
        let clamped = u32::from(value).min(max);
        (clamped * 255 / max) as u8
    }

    fn gray_at(&self, area: Rect, x: u16, sub_row: usize) -> Color {
        let rows = self.frame.rows;
        let cols = self.frame.cols;
        let r = sub_row * rows / (usize::from(area.height) * 2);
        let c = usize::from(x) * cols / usize::from(area.width);
        let g = self.frame.get(r, c).map(|v| self.level(v)).unwrap_or(0);
        Color::Rgb(g, g, g)
    }
}

impl Widget for FrameView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.frame.rows == 0 || self.frame.cols == 0 {
            return;
        }
        for y in 0..area.height {
            for x in 0..area.width {
                let top = self.gray_at(area, x, usize::from(y) * 2);
                let bottom = self.gray_at(area, x, usize::from(y) * 2 + 1);
                buf.get_mut(area.x + x, area.y + y)
                    .set_char(symbols::half_block::UPPER)
                    .set_fg(top)
                    .set_bg(bottom);
            }
        }
    }
}

/// Draws frame `index` of `frames` with a titled border. Titles count from 1.
pub fn render_frame(frame: &mut Frame, area: Rect, frames: &[ImageFrame], index: usize, bit_depth: u32) {
    let block = Block::default()
        .title(format!(
            "Image Frame {} of {}  (←/→ to switch, q to quit)",
            index + 1,
            frames.len()
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if let Some(image) = frames.get(index) {
        frame.render_widget(FrameView::new(image, bit_depth), inner);
    }
}

/// Key handling outcome for the interactive views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    Next,
    Previous,
    None,
}

fn next_action(timeout: Duration) -> io::Result<Action> {
    if !event::poll(timeout)? {
        return Ok(Action::None);
    }
    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            return Ok(match key.code {
                KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
                KeyCode::Right | KeyCode::Char('n') => Action::Next,
                KeyCode::Left | KeyCode::Char('p') => Action::Previous,
                _ => Action::None,
            });
        }
    }
    Ok(Action::None)
}

/// Runs `body` on an alternate screen in raw mode, restoring the terminal
/// whether or not `body` succeeds.
fn with_terminal<F>(body: F) -> io::Result<()>
where
    F: FnOnce(&mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()>,
{
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = Terminal::new(CrosstermBackend::new(stdout())).and_then(|mut terminal| {
        terminal.clear()?;
        body(&mut terminal)
    });
    let restore_screen = stdout().execute(LeaveAlternateScreen).map(|_| ());
    let restore_mode = disable_raw_mode();
    result.and(restore_screen).and(restore_mode)
}

fn chart_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    labels: &ChartLabels,
    series: &[Series],
) -> io::Result<()> {
    loop {
        terminal.draw(|f| {
            let area = f.size();
            render_chart(f, area, labels, series)
        })?;
        if next_action(Duration::from_millis(250))? == Action::Quit {
            return Ok(());
        }
    }
}

fn frame_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    frames: &[ImageFrame],
    bit_depth: u32,
) -> io::Result<()> {
    let mut index = 0;
    loop {
        terminal.draw(|f| {
            let area = f.size();
            render_frame(f, area, frames, index, bit_depth)
        })?;
        match next_action(Duration::from_millis(250))? {
            Action::Quit => return Ok(()),
            Action::Next if !frames.is_empty() => index = (index + 1) % frames.len(),
            Action::Previous if !frames.is_empty() => {
                index = (index + frames.len() - 1) % frames.len()
            }
            _ => {}
        }
    }
}

/// Shows a line chart until the user quits.
pub fn show_chart(labels: &ChartLabels, series: &[Series]) -> io::Result<()> {
    with_terminal(|terminal| chart_loop(terminal, labels, series))
}

/// Shows the frames one at a time until the user quits.
pub fn show_frames(frames: &[ImageFrame], bit_depth: u32) -> io::Result<()> {
    with_terminal(|terminal| frame_loop(terminal, frames, bit_depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn bounds_widen_flat_series() {
        let flat = [Series::indexed("flat", [3.0, 3.0, 3.0])];
        assert_eq!(bounds(&flat, |p| p.1), [2.5, 3.5]);
        assert_eq!(bounds(&flat, |p| p.0), [1.0, 3.0]);
        assert_eq!(bounds(&[], |p| p.0), [0.0, 1.0]);
    }

    #[test]
    fn chart_renders_title_and_legend() {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        let labels = ChartLabels::new("BRAM Dump", "Sample Number", "Decimal Code");
        let series = [Series::indexed("bram", (1..=50).map(f64::from))];
        terminal
            .draw(|f| {
                let area = f.size();
                render_chart(f, area, &labels, &series)
            })
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("BRAM Dump"));
        assert!(text.contains("bram"));
    }

    #[test]
    fn frame_levels_span_bit_depth() {
        let image = ImageFrame::from_flat(1, 1, vec![0]).unwrap();
        let view16 = FrameView::new(&image, 16);
        assert_eq!(view16.level(0), 0);
        assert_eq!(view16.level(65535), 255);
        let view12 = FrameView::new(&image, 12);
        assert_eq!(view12.level(4095), 255);
        assert_eq!(view12.level(65535), 255);
    }

    #[test]
    fn frame_view_paints_every_cell() {
        let image = ImageFrame::from_flat(2, 2, vec![0, 0, 65535, 65535]).unwrap();
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        FrameView::new(&image, 16).render(area, &mut buf);
        let cell = buf.get(0, 0);
        assert_eq!(cell.symbol(), symbols::half_block::UPPER.to_string());
        assert_eq!(cell.fg, Color::Rgb(0, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(255, 255, 255));
    }

    #[test]
    fn frame_title_counts_frames() {
        let frames = vec![ImageFrame::from_flat(4, 4, vec![100; 16]).unwrap(); 3];
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal
            .draw(|f| {
                let area = f.size();
                render_frame(f, area, &frames, 1, 16)
            })
            .unwrap();
        assert!(buffer_text(&terminal).contains("Image Frame 2 of 3"));
    }

    #[test]
    fn last_frame_title_reaches_total() {
        let frames = vec![ImageFrame::from_flat(2, 2, vec![0; 4]).unwrap(); 4];
        let mut terminal = Terminal::new(TestBackend::new(60, 8)).unwrap();
        terminal
            .draw(|f| {
                let area = f.size();
                render_frame(f, area, &frames, 3, 16)
            })
            .unwrap();
        assert!(buffer_text(&terminal).contains("Image Frame 4 of 4"));
    }
}
