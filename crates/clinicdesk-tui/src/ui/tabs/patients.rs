use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use clinicdesk_core::models::Patient;
use clinicdesk_core::utils::{format_date, truncate_string};

use crate::app::App;
use crate::ui::styles;

use super::paging_summary;

/// Render the Patients screen - table of the current page plus detail panel
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_patient_table(frame, app, chunks[0]);
    render_patient_detail(frame, app.selected_patient(), chunks[1]);
}

fn render_patient_table(frame: &mut Frame, app: &App, area: Rect) {
    let visible = app.visible_patients();
    let view = &app.patients;

    let header = Row::new([
        Cell::from("  "),
        Cell::from("ID"),
        Cell::from("First name"),
        Cell::from("Last name"),
        Cell::from("Date of birth"),
        Cell::from("Gender"),
    ])
    .style(styles::header_style())
    .height(1);

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(i, patient)| {
            let style = if i == view.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let mark = if view.marked.contains(&patient.patient_id) {
                "✓"
            } else {
                " "
            };

            Row::new(vec![
                Cell::from(Span::styled(mark, styles::success_style())),
                Cell::from(patient.patient_id.to_string()),
                Cell::from(truncate_string(&patient.first_name, 20)),
                Cell::from(truncate_string(&patient.last_name, 20)),
                Cell::from(patient.dob.clone()),
                Cell::from(patient.gender.clone()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Length(8),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Length(13),
        Constraint::Fill(1),
    ];

    let loading = if view.loading { " · loading" } else { "" };
    let marked = if view.marked.is_empty() {
        String::new()
    } else {
        format!(" · {} ticked", view.marked.len())
    };
    let title = format!(" Patients{}{} ", marked, loading);

    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .title_bottom(Line::from(paging_summary(
            &view.request,
            view.page_count(),
            view.page.total_elements,
        )))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    if visible.is_empty() {
        let message = if view.loading || !view.loaded {
            "Loading patients..."
        } else if !app.search_query.is_empty() {
            "No patients match the search."
        } else {
            "No patients yet. Press [a] to add one."
        };
        let paragraph = Paragraph::new(Span::styled(message, styles::muted_style())).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(view.selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_patient_detail(frame: &mut Frame, selected: Option<&Patient>, area: Rect) {
    let placeholder = "-";

    let lines = match selected {
        Some(patient) => {
            let gender = if patient.gender.is_empty() {
                placeholder
            } else {
                patient.gender.as_str()
            };
            vec![
                Line::from(Span::styled(patient.full_name(), styles::title_style())),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Patient ID:  ", styles::muted_style()),
                    Span::raw(patient.patient_id.to_string()),
                ]),
                Line::from(vec![
                    Span::styled("Born:        ", styles::muted_style()),
                    Span::raw(format_date(&patient.dob)),
                ]),
                Line::from(vec![
                    Span::styled("Gender:      ", styles::muted_style()),
                    Span::raw(gender.to_string()),
                ]),
            ]
        }
        None => vec![Line::from(Span::styled(
            "No patient selected",
            styles::muted_style(),
        ))],
    };

    let block = Block::default()
        .title(" Details ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
