use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph, Wrap},
};
use vizwire_client::{NativeClient, Session};
use vizwire_core::{ConnectionState, Resolved, Route, RoutingError};
use vizwire_protocol::{PlotScalarData, ThreeDViewData, Viz, Widget};

use crate::app::App;

fn state_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::DarkGray,
        ConnectionState::Errored => Color::Red,
    }
}

pub fn run_tui(session: &mut Session, app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    session.start();
    let result = event_loop(&mut terminal, session, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    session: &mut Session,
    app: &mut App,
) -> Result<()> {
    while !app.quit {
        session.drain();
        app.clamp_selection(session.client().records().len());
        terminal.draw(|frame| draw(frame, app, session.client()))?;

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.handle_key(key.code, session.client_mut());
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, app: &App, client: &NativeClient) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(frame, header, client);
    match client.resolve(&app.route) {
        Ok(Resolved::Dashboard(records)) => draw_dashboard(frame, body, records, app.selected),
        Ok(Resolved::Record { index, viz }) => draw_record(frame, body, index, viz),
        Err(err) => draw_not_found(frame, body, &err, client.records().is_empty()),
    }

    let help = match app.route {
        Route::Dashboard => " ↑↓ select | enter open | c clear | r reconnect | q quit ",
        _ => " ←→ prev/next | esc dashboard | c clear | r reconnect | q quit ",
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::White).bg(Color::DarkGray)),
        footer,
    );
}

fn draw_header(frame: &mut Frame, area: Rect, client: &NativeClient) {
    let view = client.view();
    let status = match view.state {
        ConnectionState::Connected => "Connected",
        ConnectionState::Connecting => "Connecting…",
        ConnectionState::Disconnected => "Disconnected",
        ConnectionState::Errored if client.manager().retry_pending() => {
            "Disconnected - reconnecting…"
        }
        ConnectionState::Errored => "Disconnected (r to reconnect)",
    };
    let first = vec![
        Span::styled(" vizwire ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(status, Style::default().fg(state_color(view.state))),
        Span::raw(format!("  {}", view.endpoint)),
        Span::styled(
            format!("  {} records", view.records.len()),
            Style::default().fg(Color::Gray),
        ),
    ];
    let second = match view.last_error {
        Some(error) => Line::styled(format!(" {error}"), Style::default().fg(Color::Red)),
        None => Line::raw(""),
    };
    frame.render_widget(Paragraph::new(vec![Line::from(first), second]), area);
}

fn draw_dashboard(frame: &mut Frame, area: Rect, records: &[Viz], selected: usize) {
    let items: Vec<ListItem> = records
        .iter()
        .enumerate()
        .map(|(index, viz)| {
            let source = viz.source.as_deref().unwrap_or("-");
            ListItem::new(Line::from(vec![
                Span::styled(format!("{index:>4} "), Style::default().fg(Color::DarkGray)),
                Span::styled(viz.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("  [{}]  ", viz.widget_summary())),
                Span::styled(source.to_string(), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let block = Block::bordered().title(" Dashboard ");
    if items.is_empty() {
        frame.render_widget(
            Paragraph::new("Waiting for visualization updates…").block(block),
            area,
        );
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");
    let mut state = ListState::default().with_selected(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_record(frame: &mut Frame, area: Rect, index: usize, viz: &Viz) {
    let block = Block::bordered().title(format!(" #{index} {} ", viz.name));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if viz.widgets.is_empty() {
        frame.render_widget(Paragraph::new("No widgets"), inner);
        return;
    }

    let constraints = vec![Constraint::Fill(1); viz.widgets.len()];
    let areas = Layout::vertical(constraints).split(inner);
    for (widget, area) in viz.widgets.iter().zip(areas.iter()) {
        match widget {
            Widget::ScalarPlot(data) => draw_scalar_plot(frame, *area, data, viz.range_bounds()),
            Widget::ThreeDView(data) => draw_three_d_summary(frame, *area, data),
            Widget::Unknown(raw) => {
                let text = serde_json::to_string(raw).unwrap_or_default();
                frame.render_widget(
                    Paragraph::new(format!("unsupported widget: {text}"))
                        .style(Style::default().fg(Color::DarkGray))
                        .wrap(Wrap { trim: true }),
                    *area,
                );
            }
        }
    }
}

fn draw_scalar_plot(
    frame: &mut Frame,
    area: Rect,
    data: &PlotScalarData,
    range: Option<(f64, f64)>,
) {
    let (x_min, x_max) = data
        .data_x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(x, _)| {
            (lo.min(x), hi.max(x))
        });
    if !x_min.is_finite() {
        frame.render_widget(Paragraph::new("empty plot"), area);
        return;
    }
    let (y_min, y_max) = range.or_else(|| data.y_bounds()).unwrap_or((0.0, 1.0));

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data.data_x);
    let chart = Chart::new(vec![dataset])
        .x_axis(
            Axis::default()
                .bounds([x_min, x_max])
                .labels([format!("{x_min:.2}"), format!("{x_max:.2}")]),
        )
        .y_axis(
            Axis::default()
                .bounds([y_min, y_max])
                .labels([format!("{y_min:.2}"), format!("{y_max:.2}")]),
        );
    frame.render_widget(chart, area);
}

fn draw_three_d_summary(frame: &mut Frame, area: Rect, data: &ThreeDViewData) {
    let points: usize = data
        .primitives
        .iter()
        .map(|(_, primitive)| primitive.point_count())
        .sum();
    let text = format!(
        "3D view: {} frames over {:.2}s, {points} points",
        data.primitives.len(),
        data.duration()
    );
    frame.render_widget(Paragraph::new(text), area);
}

fn draw_not_found(frame: &mut Frame, area: Rect, err: &RoutingError, waiting: bool) {
    let message = if waiting && matches!(err, RoutingError::OutOfBounds { .. }) {
        "Waiting for visualization data…".to_string()
    } else {
        format!("Not found: {err}")
    };
    frame.render_widget(
        Paragraph::new(vec![
            Line::raw(message),
            Line::styled(
                "esc: back to dashboard",
                Style::default().fg(Color::DarkGray),
            ),
        ])
        .block(Block::bordered()),
        area,
    );
}
