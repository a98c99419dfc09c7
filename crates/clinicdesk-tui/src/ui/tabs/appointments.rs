use chrono::{Datelike, Duration, Local, NaiveDate};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use clinicdesk_core::models::Appointment;
use clinicdesk_core::utils::{format_date, truncate_string};

use crate::app::App;
use crate::ui::styles;

use super::paging_summary;

/// Calendar panel height: title, weekday header, six weeks, borders
const CALENDAR_HEIGHT: u16 = 10;

/// Render the Appointments screen - table on the left, calendar and detail on the right
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(area);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(CALENDAR_HEIGHT), Constraint::Min(4)])
        .split(chunks[1]);

    render_appointment_table(frame, app, chunks[0]);
    render_calendar(frame, app, side[0]);
    render_appointment_detail(frame, app.selected_appointment(), side[1]);
}

fn render_appointment_table(frame: &mut Frame, app: &App, area: Rect) {
    let visible = app.visible_appointments();
    let view = &app.appointments;

    let header = Row::new([
        Cell::from("ID"),
        Cell::from("Date"),
        Cell::from("Patient"),
        Cell::from("Description"),
    ])
    .style(styles::header_style())
    .height(1);

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(i, appointment)| {
            let style = if i == view.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };

            Row::new(vec![
                Cell::from(appointment.appointment_id.to_string()),
                Cell::from(appointment.appointment_date.clone()),
                Cell::from(patient_label(appointment)),
                Cell::from(truncate_string(&appointment.description, 40)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(7),
        Constraint::Length(17),
        Constraint::Fill(1),
        Constraint::Fill(2),
    ];

    let filter = match view.filter_day {
        Some(day) => format!(" · {}", day.format("%Y-%m-%d")),
        None => String::new(),
    };
    let loading = if view.loading { " · loading" } else { "" };
    let title = format!(" Appointments{}{} ", filter, loading);

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
            "Loading appointments..."
        } else if view.filter_day.is_some() {
            "No appointments on this day. Press [c] to clear the filter."
        } else if !app.search_query.is_empty() {
            "No appointments match the search."
        } else {
            "No appointments yet. Press [a] to add one."
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

fn patient_label(appointment: &Appointment) -> String {
    match (&appointment.first_name, appointment.patient_id) {
        (Some(name), Some(id)) => format!("{} (#{})", name, id),
        (Some(name), None) => name.clone(),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => "-".to_string(),
    }
}

/// Monday-first weeks covering the month of `day`; `None` pads cells
/// outside the month.
pub fn month_grid(day: NaiveDate) -> Vec<[Option<NaiveDate>; 7]> {
    let Some(first) = day.with_day(1) else {
        return Vec::new();
    };
    let offset = first.weekday().num_days_from_monday() as i64;
    let mut cursor = first - Duration::days(offset);

    let mut weeks = Vec::new();
    loop {
        let mut week = [None; 7];
        for cell in week.iter_mut() {
            if cursor.month() == first.month() {
                *cell = Some(cursor);
            }
            cursor += Duration::days(1);
        }
        weeks.push(week);
        if cursor.month() != first.month() {
            break;
        }
    }
    weeks
}

fn render_calendar(frame: &mut Frame, app: &App, area: Rect) {
    let view = &app.appointments;
    let today = Local::now().date_naive();

    let mut lines = vec![Line::from(Span::styled(
        " Mo Tu We Th Fr Sa Su",
        styles::muted_style(),
    ))];

    for week in month_grid(view.cursor_day) {
        let mut spans = vec![Span::raw(" ")];
        for cell in week {
            match cell {
                Some(day) => {
                    let mut style = styles::calendar_day_style(
                        day == view.cursor_day,
                        view.filter_day == Some(day),
                        day == today,
                    );
                    if view.page.content.iter().any(|a| a.is_on(day)) {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    spans.push(Span::styled(format!("{:>2}", day.day()), style));
                }
                None => spans.push(Span::raw("  ")),
            }
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let title = format!(" {} ", view.cursor_day.format("%B %Y"));
    let block = Block::default()
        .title(title)
        .title_style(styles::highlight_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(view.filter_day.is_some()));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_appointment_detail(frame: &mut Frame, selected: Option<&Appointment>, area: Rect) {
    let lines = match selected {
        Some(appointment) => vec![
            Line::from(Span::styled(
                appointment.description.clone(),
                styles::title_style(),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("Appointment: ", styles::muted_style()),
                Span::raw(format!("#{}", appointment.appointment_id)),
            ]),
            Line::from(vec![
                Span::styled("When:        ", styles::muted_style()),
                Span::raw(format_date(&appointment.appointment_date)),
            ]),
            Line::from(vec![
                Span::styled("Patient:     ", styles::muted_style()),
                Span::raw(patient_label(appointment)),
            ]),
        ],
        None => vec![Line::from(Span::styled(
            "No appointment selected",
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

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_grid_starts_on_monday() {
        // 1 March 2024 was a Friday
        let grid = month_grid(date(2024, 3, 15));
        assert!(grid[0][..4].iter().all(Option::is_none));
        assert_eq!(grid[0][4], Some(date(2024, 3, 1)));
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[4][6], Some(date(2024, 3, 31)));
    }

    #[test]
    fn test_month_grid_covers_every_day() {
        let grid = month_grid(date(2023, 2, 1));
        let days: Vec<_> = grid.iter().flatten().flatten().collect();
        assert_eq!(days.len(), 28);
        assert_eq!(*days[0], date(2023, 2, 1));
    }

    #[test]
    fn test_patient_label() {
        let mut appointment = Appointment {
            appointment_id: 4,
            description: "Checkup".to_string(),
            appointment_date: "2024-03-05".to_string(),
            patient_id: Some(7),
            first_name: Some("Ada".to_string()),
        };
        assert_eq!(patient_label(&appointment), "Ada (#7)");
        appointment.first_name = None;
        assert_eq!(patient_label(&appointment), "#7");
        appointment.patient_id = None;
        assert_eq!(patient_label(&appointment), "-");
    }
}
