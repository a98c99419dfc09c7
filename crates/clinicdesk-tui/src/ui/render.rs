use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use clinicdesk_core::auth::{GuardDecision, Route};

use crate::app::{App, AppState, DeleteTarget, LoginFocus};

use super::forms;
use super::styles;
use super::tabs::{appointments, patients};

/// Width of the login, quit and confirmation dialogs
const DIALOG_WIDTH: u16 = 48;

pub fn render(frame: &mut Frame, app: &App) {
    if let Some(ref error) = app.fatal_error {
        render_fatal_screen(frame, error);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::EditingPatient => forms::render_patient_form(frame, app),
        AppState::EditingAppointment => forms::render_appointment_form(frame, app),
        AppState::ConfirmingDelete => render_delete_overlay(frame, app),
        AppState::ConfirmingLogout => render_confirm_overlay(
            frame,
            "Sign out of ClinicDesk?",
            " to sign out, ",
        ),
        AppState::ConfirmingQuit => render_confirm_overlay(
            frame,
            "Are you sure you want to quit?",
            " to quit, ",
        ),
        AppState::Normal | AppState::Searching | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  ClinicDesk";
    let session = format!("[{}]", app.session.status().label());
    let help_hint = "[?] Help";

    let used = title.len() + session.len() + help_hint.len() + 6;
    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(session, session_style(app)),
        Span::raw("  "),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn session_style(app: &App) -> Style {
    if app.session.is_valid() {
        styles::success_style()
    } else if app.session.has_network_error() {
        styles::error_style()
    } else {
        styles::muted_style()
    }
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = [
        ("[1] Patients", Route::Patients),
        ("[2] Appointments", Route::Appointments),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (i, (label, route)) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        spans.push(Span::styled(*label, styles::tab_style(app.route == *route)));
    }

    if app.route == Route::Login {
        spans.push(Span::styled("   sign in to continue", styles::muted_style()));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    if app.route == Route::Login {
        render_login(frame, app, area);
        return;
    }

    match app.decision {
        GuardDecision::Render => match app.route {
            Route::Patients => patients::render(frame, app, area),
            Route::Appointments => appointments::render(frame, app, area),
            Route::Login => render_login(frame, app, area),
        },
        GuardDecision::Loading => render_loading(frame, area),
        GuardDecision::Degraded => render_degraded(frame, app, area),
        GuardDecision::RedirectToLogin { .. } => render_login(frame, app, area),
    }
}

/// Neutral placeholder while the stored token is being checked
fn render_loading(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Checking your session...", styles::muted_style())),
    ];
    let paragraph = Paragraph::new(lines).alignment(ratatui::layout::Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Server unreachable; the token is kept so a retry can succeed
fn render_degraded(frame: &mut Frame, app: &App, area: Rect) {
    let area = centered_rect_fixed(56, 9, area);
    let failures = app.session.network_failures();

    let mut lines = vec![
        Line::from(Span::styled(
            " Unable to reach the clinic server.",
            styles::error_style(),
        )),
        Line::from(Span::styled(
            " Your sign-in has been kept.",
            styles::muted_style(),
        )),
    ];
    if failures > 1 {
        lines.push(Line::from(Span::styled(
            format!(" Failed {} times in a row.", failures),
            styles::muted_style(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" [r]", styles::help_key_style()),
        Span::styled(" retry   ", styles::help_desc_style()),
        Span::styled("[L]", styles::help_key_style()),
        Span::styled(" sign out   ", styles::help_desc_style()),
        Span::styled("[q]", styles::help_key_style()),
        Span::styled(" quit", styles::help_desc_style()),
    ]));

    let block = Block::default()
        .title(" Connection problem ")
        .borders(Borders::ALL)
        .border_style(styles::error_style());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_fatal_screen(frame: &mut Frame, error: &str) {
    let area = centered_rect_fixed(64, 10, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            " Credential storage failed. ClinicDesk cannot continue.",
            styles::error_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" {}", error), styles::muted_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Press ", styles::muted_style()),
            Span::styled("[q]", styles::help_key_style()),
            Span::styled(" to exit", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(" Error ")
        .borders(Borders::ALL)
        .border_style(styles::error_style());

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match (app.route, app.decision) {
        (Route::Login, _) => "[Tab] next field | [Enter] sign in | [Esc] quit",
        (_, GuardDecision::Degraded) => "[r]etry | [L]ogout | [q]uit",
        (_, GuardDecision::Loading) => "[q]uit",
        _ => "[a]dd | [e]dit | [d]elete | [/] search | [u]pdate | [L]ogout | [q]uit",
    };

    let left_text = if app.state == AppState::Searching {
        format!(" Search: {}▌ ", app.search_query)
    } else if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if !app.search_query.is_empty() {
        format!(" Filter: {} ", app.search_query)
    } else {
        String::new()
    };
    let left_style = if app.state == AppState::Searching || !app.search_query.is_empty() {
        styles::search_style()
    } else {
        styles::muted_style()
    };

    let right_text = format!(" {} ", shortcuts);
    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 28, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(
            format!("  ClinicDesk {}", version),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1/2", "Patients / appointments"),
        help_line("←/→", "Previous / next screen"),
        help_line("↑/↓ j/k", "Move selection"),
        help_line("[ / ]", "Previous / next page"),
        help_line("s", "Cycle page size"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("/", "Search this page"),
        help_line("a", "Add"),
        help_line("e, Enter", "Edit selected"),
        help_line("d", "Delete selected (or ticked)"),
        help_line("u", "Reload from server"),
        help_line("L", "Sign out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(" Patients", styles::highlight_style())),
        help_line("Space", "Tick for bulk delete"),
        Line::from(""),
        Line::from(Span::styled(" Appointments", styles::highlight_style())),
        help_line(", / .", "Calendar day back / forward"),
        help_line("< / >", "Calendar week back / forward"),
        help_line("c", "Filter by day (again to clear)"),
        help_line("t", "Calendar to today"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(DIALOG_WIDTH, height, area);
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    let username_focused = app.login_focus == LoginFocus::Username;
    let username_style = if username_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let username_display = format!("{:<20}", app.login_form.username);
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(format!("{}{}", username_display, cursor), username_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked = "*".repeat(app.login_form.password.chars().count().min(20));
    let password_display = format!("{:<20}", password_masked);
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{}{}", password_display, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let label = if button_focused {
        " ▶ Sign in ◀ "
    } else {
        "   Sign in   "
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("              ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(" Sign in ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_delete_overlay(frame: &mut Frame, app: &App) {
    let question = match app.pending_delete {
        Some(DeleteTarget::Patients(ref ids)) if ids.len() == 1 => {
            format!("Delete patient {}?", ids[0])
        }
        Some(DeleteTarget::Patients(ref ids)) => format!("Delete {} patients?", ids.len()),
        Some(DeleteTarget::Appointment(id)) => format!("Delete appointment {}?", id),
        None => return,
    };

    let area = centered_rect_fixed(DIALOG_WIDTH + 6, 8, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
    ];
    if matches!(app.pending_delete, Some(DeleteTarget::Patients(_))) {
        lines.push(Line::from(Span::styled(
            "   Their appointments are deleted too.",
            styles::muted_style(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" to delete, ", styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ]));

    let block = Block::default()
        .title(" Confirm delete ")
        .borders(Borders::ALL)
        .border_style(styles::error_style());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm_overlay(frame: &mut Frame, question: &str, action: &'static str) {
    let area = centered_rect_fixed(DIALOG_WIDTH, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(action, styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
