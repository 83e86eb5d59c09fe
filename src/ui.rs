use arboard::Clipboard as SystemBoard;
use ratatui::{
    Frame,
    prelude::*,
    style::Style,
    widgets::{Block, Borders, Clear, Paragraph},
};
use tracing::warn;

const LIST_WIDTH: u16 = 48;
const COLOR_SAND: Color = Color::Rgb(0xEB, 0xDB, 0xB2);
const COLOR_OLIVE: Color = Color::Rgb(0x98, 0x97, 0x1A);
const COLOR_MOSS: Color = Color::Rgb(0x67, 0x67, 0x1C);

pub const HELP_HINT: &str = "press 'h' to toggle help";
pub const HELP_LINES: [&str; 12] = [
    "'j' / ↓   scroll down",
    "'k' / ↑   scroll up",
    "'gg'      jump to top",
    "'G'       jump to bottom",
    "'M'       jump to middle",
    "'d'       reveal password",
    "'c'       copy password to clipboard",
    "'a'       add new custom password",
    "'r'       generate new password",
    "'D'       delete password",
    "'/'       search by key",
    "'q'       quit",
];

/// Receives revealed secrets. Failures stay inside the implementation.
pub trait Clipboard {
    fn copy(&mut self, text: &str);
}

/// The desktop clipboard. The handle is kept for the whole session because
/// some platforms drop the contents together with it.
#[derive(Default)]
pub struct SystemClipboard {
    board: Option<SystemBoard>,
}

impl Clipboard for SystemClipboard {
    fn copy(&mut self, text: &str) {
        if self.board.is_none() {
            match SystemBoard::new() {
                Ok(board) => self.board = Some(board),
                Err(e) => {
                    warn!("clipboard unavailable: {e}");
                    return;
                }
            }
        }
        if let Some(board) = self.board.as_mut() {
            if let Err(e) = board.set_text(text.to_owned()) {
                warn!("failed to set clipboard: {e}");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Plain,
    Selected,
    Revealed,
    Copied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub text: String,
    pub style: RowStyle,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub rows: Vec<Row>,
    pub capacity: usize,
    pub help_visible: bool,
    pub status: Option<String>,
    pub modal: Option<Modal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Clone, Copy)]
struct OverlayTheme {
    border: Color,
    title: Color,
    text: Color,
    bg: Color,
}

fn themed_overlay(title: &str) -> OverlayTheme {
    match title {
        "Add password" => OverlayTheme {
            border: COLOR_OLIVE,
            title: COLOR_SAND,
            text: COLOR_SAND,
            bg: Color::Rgb(0x1D, 0x21, 0x10),
        },
        "Generate password" => OverlayTheme {
            border: Color::Rgb(0xB3, 0xB2, 0x3A),
            title: COLOR_OLIVE,
            text: COLOR_SAND,
            bg: Color::Rgb(0x20, 0x23, 0x12),
        },
        "Confirm delete" => OverlayTheme {
            border: Color::Rgb(0xB3, 0x88, 0x45),
            title: Color::Rgb(0xF0, 0xD8, 0xA8),
            text: COLOR_SAND,
            bg: Color::Rgb(0x2A, 0x1C, 0x11),
        },
        _ => OverlayTheme {
            border: COLOR_MOSS,
            title: COLOR_SAND,
            text: COLOR_SAND,
            bg: Color::Rgb(0x1E, 0x20, 0x12),
        },
    }
}

fn centered_overlay_area(frame_size: Rect, lines: &[String]) -> Rect {
    let maxw = lines.iter().map(|s| s.chars().count()).max().unwrap_or(0) as u16 + 4;
    let maxh = lines.len() as u16 + 2;
    Rect::new(
        (frame_size.width.saturating_sub(maxw)) / 2,
        (frame_size.height.saturating_sub(maxh)) / 2,
        maxw.min(frame_size.width),
        maxh.min(frame_size.height),
    )
}

fn render_overlay(f: &mut Frame<'_>, modal: &Modal) {
    let area = centered_overlay_area(f.size(), &modal.lines);
    let theme = themed_overlay(&modal.title);
    let paragraph = Paragraph::new(
        modal
            .lines
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect::<Vec<Line>>(),
    )
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                modal.title.as_str(),
                Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(theme.border).add_modifier(Modifier::BOLD))
            .style(Style::default().bg(theme.bg)),
    );
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

fn row_style(style: RowStyle) -> Style {
    match style {
        RowStyle::Plain => Style::default().fg(COLOR_SAND),
        RowStyle::Selected => Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::REVERSED),
        RowStyle::Revealed => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::REVERSED | Modifier::BOLD),
        RowStyle::Copied => Style::default()
            .fg(COLOR_SAND)
            .add_modifier(Modifier::REVERSED),
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + area.width.saturating_sub(w) / 2,
        area.y + area.height.saturating_sub(h) / 2,
        w,
        h,
    )
}

pub fn draw(f: &mut Frame<'_>, view: &View) {
    let help_height = if view.help_visible {
        HELP_LINES.len() as u16 + 2
    } else {
        0
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(help_height),
            Constraint::Length(3),
        ])
        .split(f.size());

    let list_height = u16::try_from(view.capacity).unwrap_or(u16::MAX).saturating_add(2);
    let list_area = centered(layout[0], LIST_WIDTH, list_height);
    let lines: Vec<Line> = if view.rows.is_empty() {
        vec![Line::from(Span::styled(
            "No passwords yet, press 'a' to add one",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        view.rows
            .iter()
            .map(|row| Line::from(Span::styled(row.text.as_str(), row_style(row.style))))
            .collect()
    };
    let list = Paragraph::new(lines).block(
        Block::default()
            .title(Span::styled(
                "PASSWORDS",
                Style::default().fg(COLOR_SAND).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_MOSS)),
    );
    f.render_widget(list, list_area);

    if view.help_visible {
        let help_area = centered(layout[1], LIST_WIDTH, help_height);
        let help = Paragraph::new(
            HELP_LINES
                .iter()
                .map(|l| Line::from(*l))
                .collect::<Vec<Line>>(),
        )
        .style(Style::default().fg(COLOR_SAND))
        .block(Block::default().title("Press").borders(Borders::ALL));
        f.render_widget(help, help_area);
    }

    let footer_text = view.status.as_deref().unwrap_or(HELP_HINT);
    let footer = Paragraph::new(Line::from(footer_text))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[2]);

    if let Some(modal) = &view.modal {
        render_overlay(f, modal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    fn sample_view() -> View {
        View {
            rows: vec![
                Row {
                    text: "github: hunter2".into(),
                    style: RowStyle::Revealed,
                },
                Row {
                    text: "Gs: ba".into(),
                    style: RowStyle::Plain,
                },
            ],
            capacity: 11,
            help_visible: false,
            status: None,
            modal: None,
        }
    }

    #[test]
    fn draws_rows_and_hint() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| draw(f, &sample_view())).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("PASSWORDS"));
        assert!(text.contains("github: hunter2"));
        assert!(text.contains(HELP_HINT));
    }

    #[test]
    fn draws_help_and_modal() {
        let mut view = sample_view();
        view.help_visible = true;
        view.status = Some("Added site".into());
        view.modal = Some(Modal {
            title: "Search".into(),
            lines: vec!["Key: git".into()],
        });
        let mut terminal = Terminal::new(TestBackend::new(80, 40)).unwrap();
        terminal.draw(|f| draw(f, &view)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("jump to top"));
        assert!(text.contains("Added site"));
        assert!(text.contains("Key: git"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut view = sample_view();
        view.help_visible = true;
        let mut terminal = Terminal::new(TestBackend::new(10, 4)).unwrap();
        terminal.draw(|f| draw(f, &view)).unwrap();
    }
}
