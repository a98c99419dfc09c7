use ratatui::{
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, EditableForm, FormState};

use super::render::centered_rect_fixed;
use super::styles;

const FORM_WIDTH: u16 = 60;
const LABEL_WIDTH: usize = 18;

pub fn render_patient_form(frame: &mut Frame, app: &App) {
    if let Some(ref state) = app.patient_form {
        let title = if state.is_editing() {
            " Edit patient "
        } else {
            " Add patient "
        };
        render_form(frame, title, state);
    }
}

pub fn render_appointment_form(frame: &mut Frame, app: &App) {
    if let Some(ref state) = app.appointment_form {
        let title = if state.is_editing() {
            " Edit appointment "
        } else {
            " Add appointment "
        };
        render_form(frame, title, state);
    }
}

fn render_form<F: EditableForm>(frame: &mut Frame, title: &str, state: &FormState<F>) {
    let labels = F::labels();
    let height = labels.len() as u16 + state.errors.len() as u16 + 7;
    let area = centered_rect_fixed(FORM_WIDTH, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    for (i, label) in labels.iter().enumerate() {
        let focused = i == state.focus;
        let style = if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let cursor = if focused { "▌" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<width$}", label, width = LABEL_WIDTH), styles::muted_style()),
            Span::styled(format!("{}{}", state.form.value(i), cursor), style),
        ]));
    }

    if !state.errors.is_empty() {
        lines.push(Line::from(""));
        for error in &state.errors {
            lines.push(Line::from(Span::styled(
                format!("  {}", error.message),
                styles::error_style(),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  [Tab]", styles::help_key_style()),
        Span::styled(" next field  ", styles::muted_style()),
        Span::styled("[Ctrl+S]", styles::help_key_style()),
        Span::styled(" save  ", styles::muted_style()),
        Span::styled("[Esc]", styles::help_key_style()),
        Span::styled(" cancel", styles::muted_style()),
    ]));

    let block = Block::default()
        .title(title.to_string())
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
