//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use clinicdesk_core::auth::login::{can_add_password_char, can_add_username_char};
use clinicdesk_core::auth::{GuardDecision, Route};

use crate::app::{App, AppState, EditableForm, FormState, LoginFocus};

/// Days the calendar jumps on `<` / `>`
const CALENDAR_WEEK: i64 = 7;

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Nothing works once storage has failed
    if app.fatal_error.is_some() {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    if app.route == Route::Login {
        return handle_login_input(app, key).await;
    }

    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingLogout => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    if let Err(e) = app.logout() {
                        app.fail(e);
                    }
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_delete(),
                _ => {}
            }
            return Ok(false);
        }
        AppState::EditingPatient => {
            if let Some(submit) = app.patient_form.as_mut().and_then(|f| handle_form_key(f, key)) {
                if submit {
                    app.submit_patient_form();
                } else {
                    app.close_form();
                }
            }
            return Ok(false);
        }
        AppState::EditingAppointment => {
            if let Some(submit) = app
                .appointment_form
                .as_mut()
                .and_then(|f| handle_form_key(f, key))
            {
                if submit {
                    app.submit_appointment_form();
                } else {
                    app.close_form();
                }
            }
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting | AppState::ConfirmingQuit => {}
    }

    match app.decision {
        GuardDecision::Loading => {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                app.state = AppState::ConfirmingQuit;
            }
            Ok(false)
        }
        GuardDecision::Degraded => {
            match key.code {
                KeyCode::Char('r') => app.retry_session(),
                KeyCode::Char('L') => app.state = AppState::ConfirmingLogout,
                KeyCode::Char('q') | KeyCode::Esc => app.state = AppState::ConfirmingQuit,
                _ => {}
            }
            Ok(false)
        }
        GuardDecision::Render | GuardDecision::RedirectToLogin { .. } => {
            handle_screen_input(app, key);
            Ok(false)
        }
    }
}

/// Keys on the patients and appointments screens
fn handle_screen_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('L') => app.state = AppState::ConfirmingLogout,
        KeyCode::Esc => {
            if app.search_query.is_empty() {
                app.state = AppState::ConfirmingQuit;
            } else {
                app.search_query.clear();
                app.clamp_selection();
            }
        }

        // Screens
        KeyCode::Char('1') => app.go_to(Route::Patients),
        KeyCode::Char('2') => app.go_to(Route::Appointments),
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
            let other = match app.route {
                Route::Patients => Route::Appointments,
                _ => Route::Patients,
            };
            app.go_to(other);
        }

        // List
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Char(']') | KeyCode::PageDown => app.next_page(),
        KeyCode::Char('[') | KeyCode::PageUp => app.prev_page(),
        KeyCode::Char('s') => app.cycle_page_size(),
        KeyCode::Char('u') => {
            app.status_message = None;
            app.refresh_current();
        }
        KeyCode::Char('/') => {
            app.state = AppState::Searching;
        }

        // Records
        KeyCode::Char('a') => app.open_add_form(),
        KeyCode::Char('e') | KeyCode::Enter => app.open_edit_form(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char(' ') if app.route == Route::Patients => app.toggle_mark(),

        // Calendar
        KeyCode::Char(',') if app.route == Route::Appointments => app.move_calendar(-1),
        KeyCode::Char('.') if app.route == Route::Appointments => app.move_calendar(1),
        KeyCode::Char('<') if app.route == Route::Appointments => {
            app.move_calendar(-CALENDAR_WEEK)
        }
        KeyCode::Char('>') if app.route == Route::Appointments => {
            app.move_calendar(CALENDAR_WEEK)
        }
        KeyCode::Char('c') if app.route == Route::Appointments => app.toggle_day_filter(),
        KeyCode::Char('t') if app.route == Route::Appointments => app.calendar_today(),
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.search_query.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => {
            app.state = AppState::Normal;
        }
        KeyCode::Backspace => {
            app.search_query.pop();
        }
        KeyCode::Char(c) if !c.is_control() => {
            app.search_query.push(c);
        }
        _ => {}
    }
    app.clamp_selection();
}

/// Edit a modal form. `Some(true)` submits, `Some(false)` cancels.
fn handle_form_key<F: EditableForm>(state: &mut FormState<F>, key: KeyEvent) -> Option<bool> {
    match key.code {
        KeyCode::Esc => return Some(false),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => return Some(true),
        KeyCode::Enter if state.is_last_field() => return Some(true),
        KeyCode::Enter | KeyCode::Tab | KeyCode::Down => state.next_field(),
        KeyCode::BackTab | KeyCode::Up => state.prev_field(),
        KeyCode::Backspace => state.pop_char(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => state.push_char(c),
        _ => {}
    }
    None
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => {
                app.login_focus = LoginFocus::Password;
            }
            LoginFocus::Password | LoginFocus::Button => {
                if let Err(e) = app.attempt_login().await {
                    app.fail(e);
                }
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_form.username.pop();
            }
            LoginFocus::Password => {
                app.login_form.password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_form.username.chars().count(), c) {
                    app.login_form.username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_form.password.chars().count(), c) {
                    app.login_form.password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}
