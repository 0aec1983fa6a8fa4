use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use crate::app::{App, Tab};
use crate::page::FormField;
use crate::render::{ChartSlot, GridContent, ResultsView};
use std::time::Instant;

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    match app.tab {
        Tab::Predict => render_predict(f, app, layout[1]),
        Tab::Popular => render_popular(f, app, layout[1]),
    }

    render_footer(f, app, layout[2]);

    if let Some(banner) = app.predict.banners.visible(Instant::now()) {
        render_banner(f, &banner.message, layout[1]);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let tab_style = |tab: Tab| {
        if app.tab == tab {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };
    let mut spans = vec![
        Span::styled(" Stockify ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled("F1 Predict", tab_style(Tab::Predict)),
        Span::raw("  "),
        Span::styled("F2 Popular", tab_style(Tab::Popular)),
        Span::raw(" | "),
        Span::styled(app.api_host(), Style::default().fg(Color::DarkGray)),
    ];
    if app.request_pending() {
        spans.push(Span::styled("  request pending", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.tab {
        Tab::Predict => {
            "Tab: next field | Up/Down: change | Enter: predict | PgUp/PgDn: scroll | Esc: quit"
        }
        Tab::Popular => "Up/Down: select | Enter: predict | r: reload | q/Esc: quit",
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(hint, Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_predict(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(0)])
        .split(area);

    render_form(f, app, chunks[0]);

    let page = &app.predict;
    if page.loading.visible {
        render_loading(f, &page.loading.message, chunks[1]);
    } else if page.results.visible {
        render_results(f, &page.results, app.results_scroll, chunks[1]);
    } else {
        let idle = Paragraph::new("Enter a ticker and press Enter to forecast.")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Results "));
        f.render_widget(idle, chunks[1]);
    }
}

fn render_form(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.predict.form;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let field = |title: &'static str, value: String, which: FormField| {
        let focused = form.focus == which;
        let border = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Paragraph::new(value)
            .style(Style::default().fg(Color::White))
            .block(Block::default().borders(Borders::ALL).border_style(border).title(title))
    };

    f.render_widget(field(" Ticker ", form.ticker.clone(), FormField::Ticker), chunks[0]);
    f.render_widget(
        field(" Model ", format!("< {} >", form.model.label()), FormField::Model),
        chunks[1],
    );
    f.render_widget(field(" Days (1-30) ", form.days.clone(), FormField::Days), chunks[2]);

    if let Some(req) = &app.predict.last_request {
        let last = Paragraph::new(vec![
            Line::from(Span::styled("Last request", Style::default().fg(Color::Cyan))),
            Line::from(format!("{} / {} / {}d", req.ticker(), req.model().label(), req.days())),
        ])
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(last, chunks[3]);
    }
}

fn render_loading(f: &mut Frame, msg: &str, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let text = Paragraph::new(msg)
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(text, area);
}

fn render_results(f: &mut Frame, results: &ResultsView, scroll: u16, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(4)])
        .split(area);

    let stamp = results
        .rendered_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let price = Paragraph::new(Line::from(vec![
        Span::styled("Current price: ", Style::default().fg(Color::Gray)),
        Span::styled(
            results.price.as_str(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(format!("updated {}", stamp), Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Results "));
    f.render_widget(price, chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    let mut title = String::from(" Predictions ");
    if results.scrollable {
        title.push_str("(scroll) ");
    }
    let lines: Vec<Line> = match results.placeholder {
        Some(placeholder) => {
            vec![Line::from(Span::styled(placeholder, Style::default().fg(Color::Gray)))]
        }
        None => results
            .predictions
            .iter()
            .map(|p| {
                Line::from(vec![
                    Span::styled(format!("{:<8}", p.label()), Style::default().fg(Color::Gray)),
                    Span::styled(p.value.as_str(), Style::default().fg(Color::Yellow)),
                ])
            })
            .collect(),
    };
    let scroll = if results.scrollable { scroll } else { 0 };
    let predictions = Paragraph::new(lines)
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(predictions, middle[0]);

    let metrics = Paragraph::new(vec![
        Line::from(format!("Model:    {}", results.metrics.model)),
        Line::from(format!("R2 score: {}", results.metrics.r2_score)),
        Line::from(format!("MSE:      {}", results.metrics.mse)),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Model Metrics "));
    f.render_widget(metrics, middle[1]);

    let charts = Paragraph::new(results.charts.iter().map(chart_line).collect::<Vec<_>>())
        .block(Block::default().borders(Borders::ALL).title(" Charts "));
    f.render_widget(charts, chunks[2]);
}

fn chart_line(chart: &ChartSlot) -> Line<'static> {
    if chart.visible && !chart.verified {
        let preview: String = chart.src.as_deref().unwrap_or_default().chars().take(32).collect();
        Line::from(vec![
            Span::styled(format!("{:<24}", chart.title), Style::default().fg(Color::Yellow)),
            Span::raw("image data could not be checked, download ready "),
            Span::styled(format!("{}...", preview), Style::default().fg(Color::DarkGray)),
        ])
    } else if chart.visible {
        let download = if chart.download_enabled { "download ready" } else { "download disabled" };
        let preview: String = chart.src.as_deref().unwrap_or_default().chars().take(32).collect();
        Line::from(vec![
            Span::styled(format!("{:<24}", chart.title), Style::default().fg(Color::Green)),
            Span::raw(format!("PNG {:.1} KB, {} ", chart.byte_len as f64 / 1024.0, download)),
            Span::styled(format!("{}...", preview), Style::default().fg(Color::DarkGray)),
        ])
    } else {
        Line::from(vec![
            Span::styled(format!("{:<24}", chart.title), Style::default().fg(Color::DarkGray)),
            Span::styled("no chart data", Style::default().fg(Color::DarkGray)),
        ])
    }
}

fn render_popular(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Popular Stocks ");
    match &app.popular.grid.content {
        GridContent::Loading => render_loading(f, "Loading popular stocks...", area),
        GridContent::Message { text, detail } => {
            let mut lines = vec![Line::from(Span::styled(
                text.as_str(),
                Style::default().fg(Color::Red),
            ))];
            if let Some(detail) = detail {
                lines.push(Line::from(Span::styled(
                    detail.as_str(),
                    Style::default().fg(Color::Gray),
                )));
            }
            let msg = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block);
            f.render_widget(msg, area);
        }
        GridContent::Cards(cards) => {
            let items: Vec<ListItem> = cards
                .iter()
                .map(|card| {
                    ListItem::new(Line::from(vec![
                        Span::styled(
                            format!("{:<8}", card.ticker),
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(card.name.clone()),
                    ]))
                })
                .collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
            let mut state = ListState::default().with_selected(Some(app.popular.grid.selected));
            f.render_stateful_widget(list, area, &mut state);
        }
    }
}

fn render_banner(f: &mut Frame, message: &str, area: Rect) {
    let height = 3u16.min(area.height);
    let banner_area = Rect {
        x: area.x + 2,
        y: area.y + area.height.saturating_sub(height),
        width: area.width.saturating_sub(4),
        height,
    };
    let banner = Paragraph::new(message)
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Error "));
    f.render_widget(Clear, banner_area);
    f.render_widget(banner, banner_area);
}
