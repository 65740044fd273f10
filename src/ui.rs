use crate::app::{App, Mode};
use energy_atlas::braille::BrailleCanvas;
use energy_atlas::drilldown::{DrillDown, ShareStack};
use energy_atlas::map::{render_drilldown, MapLayers};
use energy_atlas::scale::{format_number, hex_rgb, Rgb, NO_DATA_COLOR};
use energy_atlas::treemap::TreemapNode;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
    Frame,
};

/// Line colors for plotted series, in order
const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
];

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map and side panel
            Constraint::Length(1), // Status bar
        ])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(2, 3), Constraint::Ratio(1, 3)])
        .split(rows[0]);

    render_map(frame, app, columns[0]);
    match &app.drilldown {
        Some(drill) => render_country_panel(frame, app, drill, columns[1]),
        None => render_world_panel(frame, app, columns[1]),
    }
    render_status_bar(frame, app, rows[1]);
}

fn rgb(c: Rgb) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

fn hex(c: &str) -> Color {
    hex_rgb(c).map_or(Color::Gray, rgb)
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.state();
    let title = match &app.drilldown {
        Some(drill) => format!(" {} · {} · {} ", drill.country, state.metric, state.year()),
        None => format!(" World · {} · {} ", state.metric, state.year()),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (width, height) = (inner.width as usize, inner.height as usize);
    let layers = match &app.drilldown {
        Some(drill) => render_drilldown(width, height, drill, &app.cell_fills),
        None => {
            // Braille gives 2x4 resolution per character
            let mut viewport = app.viewport.clone();
            viewport.width = width * 2;
            viewport.height = height * 4;
            app.map_renderer.render(width, height, &viewport, &app.fills)
        }
    };

    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);
}

/// Braille map: colored fills with borders drawn over them
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, default: Color, area: Rect, buf: &mut Buffer) {
        for row in 0..(area.height as usize).min(canvas.height()) {
            let y = area.y + row as u16;
            for col in 0..area.width as usize {
                let Some((ch, color)) = canvas.cell(col, row) else {
                    break;
                };
                // Skip empty braille characters (U+2800)
                if ch == '\u{2800}' {
                    continue;
                }
                let x = area.x + col as u16;
                buf[(x, y)].set_char(ch).set_fg(color.map_or(default, rgb));
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Self::render_layer(&self.layers.fill, Color::Gray, area, buf);
        Self::render_layer(&self.layers.borders, Color::DarkGray, area, buf);

        if let Some((cx, cy)) = self.cursor_pos {
            let x = area.x + cx;
            let y = area.y + cy;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn render_world_panel(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(3)])
        .split(area);

    let scale = &app.snapshot.scale;
    let mut legend: Vec<Line> = scale
        .legend()
        .iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled("██ ", Style::default().fg(hex(entry.color))),
                Span::raw(format!("{} – {}", format_number(entry.lo), format_number(entry.hi))),
            ])
        })
        .collect();
    legend.push(Line::from(vec![
        Span::styled("██ ", Style::default().fg(hex(NO_DATA_COLOR))),
        Span::raw("no data"),
    ]));
    frame.render_widget(
        Paragraph::new(legend).block(panel_block(format!(" {} ", app.snapshot.metric))),
        chunks[0],
    );

    let state = app.state();
    let width = chunks[1].width.saturating_sub(2) as usize;
    let lines = treemap_lines(&app.treemap, width);
    frame.render_widget(
        Paragraph::new(lines).block(panel_block(format!(" Top {} ", state.top_n))),
        chunks[1],
    );
}

fn panel_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(title, Style::default().fg(Color::Cyan)))
}

/// Continent and region headings with a bar per country, scaled to the
/// largest leaf
fn treemap_lines(root: &TreemapNode, width: usize) -> Vec<Line<'static>> {
    let largest = root.leaves().iter().filter_map(|l| l.value).fold(0.0_f64, f64::max);
    let mut lines = Vec::new();
    for continent in &root.children {
        lines.push(Line::from(Span::styled(
            format!("{} ({})", continent.name, format_number(continent.total())),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        for region in &continent.children {
            lines.push(Line::from(Span::styled(
                format!(" {}", region.name),
                Style::default().fg(Color::Magenta),
            )));
            for leaf in &region.children {
                let value = leaf.value.unwrap_or(0.0);
                let label = format!("  {:<14.14} {:>7} ", leaf.name, format_number(value));
                let room = width.saturating_sub(label.chars().count());
                let bar = if largest > 0.0 {
                    ((value / largest) * room as f64).round() as usize
                } else {
                    0
                };
                lines.push(Line::from(vec![
                    Span::raw(label),
                    Span::styled("▇".repeat(bar.min(room)), Style::default().fg(Color::Cyan)),
                ]));
            }
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("no classified countries", Style::default().fg(Color::DarkGray))));
    }
    lines
}

fn render_country_panel(frame: &mut Frame, app: &App, drill: &DrillDown, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let state = app.state();
    let (start, end) = (state.animation.start_year, state.animation.end_year);

    let mut series = drill.series(&app.datasets, &[state.metric], start, end);
    series.extend(
        app.formulas
            .iter()
            .map(|f| drill.formula_series(&app.datasets, f, start, end)),
    );
    let points: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| {
            s.points
                .iter()
                .filter(|(_, v)| v.is_finite())
                .map(|&(year, v)| (year as f64, v))
                .collect()
        })
        .collect();
    let (lo, hi) = points
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (0.0, 1.0) };

    let datasets: Vec<Dataset> = series
        .iter()
        .zip(&points)
        .enumerate()
        .map(|(i, (s, data))| {
            Dataset::default()
                .name(s.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();
    let chart = Chart::new(datasets)
        .block(panel_block(format!(" {} ", drill.country)))
        .x_axis(
            Axis::default()
                .bounds([start as f64, end as f64])
                .labels([start.to_string(), end.to_string()]),
        )
        .y_axis(
            Axis::default()
                .bounds([lo, hi])
                .labels([format_number(lo), format_number(hi)]),
        );
    frame.render_widget(chart, chunks[0]);

    let stacks = drill.share_stacks(&app.datasets, start, end);
    let lines: Vec<Line> = stacks.iter().map(share_line).collect();
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(panel_block(" Shares every 5 years ".to_string())),
        chunks[1],
    );
}

/// `2005_elec  coal 41.2 gas 20.0 hydro 9.1 ...`, every share with data, largest first
fn share_line(stack: &ShareStack) -> Line<'static> {
    let parts = share_parts(stack);
    Line::from(vec![
        Span::styled(format!("{:<12}", stack.label()), Style::default().fg(Color::Yellow)),
        Span::raw(if parts.is_empty() { "no data".to_string() } else { parts.join(" ") }),
    ])
}

fn share_parts(stack: &ShareStack) -> Vec<String> {
    let mut segments: Vec<_> = stack.segments.iter().filter(|(_, v)| !v.is_nan()).collect();
    segments.sort_by(|a, b| b.1.total_cmp(&a.1));
    segments
        .iter()
        .map(|(m, v)| format!("{} {:.1}", m.name().split("_share").next().unwrap_or_default(), v))
        .collect()
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.state();
    let line = if app.mode == Mode::Formula {
        Line::from(vec![
            Span::styled(" formula> ", Style::default().fg(Color::Yellow)),
            Span::raw(app.formula_input.clone()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
            Span::styled("  Enter:add Esc:cancel", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        let mut spans = vec![
            Span::styled(
                if state.is_playing() { " ▶ " } else { " ❚❚ " },
                Style::default().fg(if state.is_playing() { Color::Green } else { Color::DarkGray }),
            ),
            Span::styled(state.year().to_string(), Style::default().fg(Color::Yellow)),
            Span::styled(
                format!(" [{}-{}] ", state.animation.start_year, state.animation.end_year),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(app.zoom_level(), Style::default().fg(Color::Magenta)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        ];
        match app.status.clone().or_else(|| app.hover_text()) {
            Some(text) => spans.push(Span::styled(text, Style::default().fg(Color::White))),
            None => spans.push(Span::styled(
                "space:play ,/.:year m/M:metric [/]:top-n f:formula enter:open esc:back q:quit",
                Style::default().fg(Color::DarkGray),
            )),
        }
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_atlas::data::Metric;
    use energy_atlas::drilldown::ShareKind;

    #[test]
    fn test_share_parts_list_every_segment() {
        let stack = ShareStack {
            year: 2005,
            kind: ShareKind::Elec,
            segments: vec![
                (Metric::CoalShareElec, 41.2),
                (Metric::GasShareElec, 20.0),
                (Metric::HydroShareElec, 9.1),
                (Metric::WindShareElec, 4.0),
                (Metric::SolarShareElec, 1.5),
                (Metric::NuclearShareElec, f64::NAN),
            ],
        };
        assert_eq!(
            share_parts(&stack),
            vec!["coal 41.2", "gas 20.0", "hydro 9.1", "wind 4.0", "solar 1.5"]
        );

        let empty = ShareStack {
            segments: vec![(Metric::CoalShareElec, f64::NAN)],
            ..stack
        };
        assert!(share_parts(&empty).is_empty());
    }
}
