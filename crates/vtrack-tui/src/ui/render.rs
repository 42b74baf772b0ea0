use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use vtrack_core::session::IdleState;

use crate::app::{format_countdown, App, AppState, LoginFocus};
use crate::ui::styles;

const TITLE: &str = "  Violation Tracker";

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(8),    // Session pane
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_session_pane(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Overlays
    match app.state {
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }

    if app.warning.is_some() {
        render_warning_overlay(frame, app);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let right = match app.current_user() {
        Some(user) if user.is_admin() => format!("{} (admin)", user.display_name()),
        Some(user) => user.display_name(),
        None => "not signed in".to_string(),
    };

    let padding = (area.width as usize)
        .saturating_sub(TITLE.len() + right.len() + 4);
    let title_line = Line::from(vec![
        Span::styled(TITLE, styles::title_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_session_pane(frame: &mut Frame, app: &App, area: Rect) {
    let manager = app.manager();
    let mut lines = vec![Line::from("")];

    if app.state == AppState::Booting {
        lines.push(Line::from(Span::styled(
            "  Checking session...",
            styles::highlight_style(),
        )));
    } else if let Some(data) = manager.session().data {
        let user = &data.user;
        let started = data.started_at.with_timezone(&chrono::Local).format("%H:%M:%S");
        lines.push(field_line("User", user.display_name()));
        lines.push(field_line("Email", user.email.clone()));
        lines.push(field_line("Role", if user.is_admin() { "Admin" } else { "User" }.to_string()));
        lines.push(field_line("Signed in", started.to_string()));

        let idle = match manager.idle_state() {
            IdleState::Active => "active".to_string(),
            IdleState::WarningShown => "idle warning".to_string(),
            IdleState::Inactive => "inactive".to_string(),
        };
        lines.push(field_line("Idle", idle));

        let settings = manager.settings().idle;
        lines.push(field_line(
            "Timeout",
            format!(
                "{} (warning {} before)",
                format_countdown(settings.timeout()),
                format_countdown(settings.warning_lead())
            ),
        ));
    } else {
        lines.push(Line::from(Span::styled("  Not signed in", styles::muted_style())));
    }

    let block = Block::default()
        .title(" Session ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", label), styles::muted_style()),
        Span::styled(value, styles::list_item_style()),
    ])
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = if app.is_authenticated() {
        "[r]evalidate | l[o]gout | [q]uit"
    } else {
        "[Esc] quit"
    };

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => String::new(),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::success_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(50, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    let email_focused = app.login_focus == LoginFocus::Email;
    let cursor = if email_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Email:    [", styles::muted_style()),
        Span::styled(
            format!("{:<24}{}", tail(&app.login_email, 24), cursor),
            field_style(email_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let cursor = if password_focused { "▌" } else { "" };
    let masked = "*".repeat(app.login_password.chars().count().min(24));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{:<24}{}", masked, cursor), field_style(password_focused)),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let label = if button_focused { " ▶ Login ◀ " } else { "   Login   " };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("                 ["),
        Span::styled(label, field_style(button_focused)),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .title(" Sign in ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_warning_overlay(frame: &mut Frame, app: &App) {
    let Some(ref prompt) = app.warning else {
        return;
    };

    let area = centered_rect_fixed(50, 8, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  You will be logged out in ", styles::list_item_style()),
            Span::styled(format_countdown(prompt.logout_in()), styles::highlight_style()),
            Span::styled(" due to inactivity.", styles::list_item_style()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("[S]", styles::help_key_style()),
            Span::styled("tay logged in    ", styles::muted_style()),
            Span::styled("[L]", styles::help_key_style()),
            Span::styled("ogout now", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(" Session Timeout Warning ")
        .borders(Borders::ALL)
        .border_style(styles::warning_border_style());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(" Quit ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_style(focused: bool) -> ratatui::style::Style {
    if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    }
}

/// Last `width` characters, so the cursor end of a long email stays visible
fn tail(s: &str, width: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(width)).collect()
}

fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect_fixed(50, 10, outer), Rect::new(25, 15, 50, 10));

        // Clamped to a small terminal
        let small = Rect::new(0, 0, 30, 5);
        assert_eq!(centered_rect_fixed(50, 10, small), Rect::new(0, 0, 30, 5));
    }

    #[test]
    fn test_tail_keeps_end_of_long_input() {
        assert_eq!(tail("short@x.io", 24), "short@x.io");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("", 3), "");
    }
}
