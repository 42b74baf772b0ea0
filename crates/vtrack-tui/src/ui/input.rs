//! Terminal event handling for the TUI.
//!
//! Every key press and mouse event is first reported to the session as user
//! activity, then translated into application state changes.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use vtrack_core::session::ActivityKind;

use crate::app::{can_add_email_char, can_add_password_char, App, AppState, LoginFocus};

/// Which activity channel a terminal event counts as, if any
pub fn activity_kind(event: &Event) -> Option<ActivityKind> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(ActivityKind::KeyPress),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ActivityKind::PointerMove),
            MouseEventKind::Down(_) => Some(ActivityKind::Click),
            MouseEventKind::ScrollUp
            | MouseEventKind::ScrollDown
            | MouseEventKind::ScrollLeft
            | MouseEventKind::ScrollRight => Some(ActivityKind::Scroll),
            MouseEventKind::Up(_) => None,
        },
        _ => None,
    }
}

/// Handle one terminal event. Returns true when the app should exit.
pub async fn handle_event(app: &mut App, event: Event) -> Result<bool> {
    if let Some(kind) = activity_kind(&event) {
        app.record_activity(kind);
    }

    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            handle_input(app, key).await
        }
        _ => Ok(false),
    }
}

async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // The warning modal takes every key while it is up
    if app.warning.is_some() {
        handle_warning_input(app, key).await;
        return Ok(false);
    }

    match app.state {
        AppState::Booting => {
            if key.code == KeyCode::Esc {
                app.state = AppState::Quitting;
                return Ok(true);
            }
        }
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::ConfirmingQuit => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_quit(),
            _ => {}
        },
        AppState::Normal => match key.code {
            KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
            KeyCode::Char('o') => app.logout().await,
            KeyCode::Char('r') => app.revalidate().await,
            KeyCode::Esc => app.status_message = None,
            _ => {}
        },
        AppState::Quitting => return Ok(true),
    }
    Ok(false)
}

async fn handle_warning_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Enter | KeyCode::Esc => {
            app.stay_logged_in();
        }
        KeyCode::Char('l') | KeyCode::Char('L') => app.logout().await,
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Email,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                // Failure lands in login_error
                let _ = app.attempt_login().await;
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.len(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.len(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}
