use std::io::{self, IsTerminal, Write};
use std::time::Instant;

use anyhow::anyhow;
use gantry_shared::{BarDto, ChartDto, FilterOptionsDto, StatusClassDto, TaskRowDto};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::{Config, DevConfig};

const TITLE_WIDTH: usize = 32;
const BAR_CHAR: &str = "█";
const EMPTY_CHAR: &str = "·";
const TODAY_CHAR: &str = "|";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    columns: usize,
    dev: DevConfig,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            columns: cfg.chart_columns(),
            dev: cfg.dev_config(),
        })
    }

    #[tracing::instrument(skip(self, chart), fields(rows = chart.rows.len()))]
    pub fn print_chart(&self, chart: &ChartDto, today_fraction: Option<f64>) -> anyhow::Result<()> {
        let started = Instant::now();
        let mut out = io::stdout().lock();
        self.write_chart(&mut out, chart, today_fraction)?;
        self.dev.observe("render", started.elapsed());
        Ok(())
    }

    pub fn write_chart<W: Write>(
        &self,
        mut out: W,
        chart: &ChartDto,
        today_fraction: Option<f64>,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} .. {} ({} days)",
            chart.window_start, chart.window_end, chart.day_count
        )?;

        if chart.rows.is_empty() {
            writeln!(out, "No tasks match the current filters.")?;
            return Ok(());
        }

        let headers = vec![
            "Key".to_string(),
            "Task".to_string(),
            "Project".to_string(),
            "Assignee".to_string(),
            "Start".to_string(),
            "Due".to_string(),
            "Status".to_string(),
            "%".to_string(),
            self.axis(today_fraction),
        ];

        let rows = chart
            .rows
            .iter()
            .map(|row| self.chart_row(row, today_fraction))
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, options))]
    pub fn print_options(&self, options: &FilterOptionsDto) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_options(&mut out, options)
    }

    fn chart_row(&self, row: &TaskRowDto, today_fraction: Option<f64>) -> Vec<String> {
        let key = self.paint(&row.issue_key, "33");
        let due = row.end_date.clone().unwrap_or_default();
        let due = match &row.bar {
            Some(bar) if bar.overdue => self.paint(&due, "31"),
            _ => due,
        };

        vec![
            key,
            truncate_to_width(&row.title, TITLE_WIDTH),
            row.project_key.clone(),
            row.assignee.clone(),
            row.start_date.clone().unwrap_or_default(),
            due,
            row.status.clone(),
            row.progress_percent.to_string(),
            self.bar_cells(row, today_fraction),
        ]
    }

    fn axis(&self, today_fraction: Option<f64>) -> String {
        let today = today_fraction.map(|f| column_of(f, self.columns));
        (0..self.columns)
            .map(|col| if Some(col) == today { "v" } else { " " })
            .collect()
    }

    fn bar_cells(&self, row: &TaskRowDto, today_fraction: Option<f64>) -> String {
        let today = today_fraction.map(|f| column_of(f, self.columns));
        let span = row.bar.as_ref().map(|bar| bar_span(bar, self.columns));
        let code = bar_color_code(row);

        let mut cells = String::new();
        for col in 0..self.columns {
            let filled = span.is_some_and(|(first, last)| col >= first && col <= last);
            let cell = if filled {
                self.paint(BAR_CHAR, code)
            } else if Some(col) == today {
                TODAY_CHAR.to_string()
            } else {
                EMPTY_CHAR.to_string()
            };
            cells.push_str(&cell);
        }
        cells
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn bar_color_code(row: &TaskRowDto) -> &'static str {
    match &row.bar {
        Some(bar) if bar.overdue => "31",
        _ => match row.status_class {
            StatusClassDto::Completed => "32",
            StatusClassDto::InProgress => "34",
            StatusClassDto::Open | StatusClassDto::Other => "90",
        },
    }
}

fn column_of(fraction: f64, columns: usize) -> usize {
    let col = (fraction * columns as f64).floor() as usize;
    col.min(columns.saturating_sub(1))
}

/// Inclusive column range covered by a bar; any visible bar gets at least
/// one cell.
fn bar_span(bar: &BarDto, columns: usize) -> (usize, usize) {
    let first = column_of(bar.left, columns);
    let end = ((bar.left + bar.width) * columns as f64).ceil() as usize;
    let last = end.saturating_sub(1).clamp(first, columns.saturating_sub(1));
    (first, last)
}

fn write_options<W: Write>(mut out: W, options: &FilterOptionsDto) -> anyhow::Result<()> {
    writeln!(out, "assignees      {}", options.assignees.join(", "))?;
    writeln!(
        out,
        "projects       {}",
        options
            .projects
            .iter()
            .map(|p| format!("{} ({})", p.key, p.name))
            .collect::<Vec<_>>()
            .join(", ")
    )?;
    writeln!(out, "edit assignees {}", options.edit_assignees.join(", "))?;
    writeln!(out, "priorities     {}", options.priorities.join(", "))?;
    writeln!(out, "resolutions    {}", options.resolutions.join(", "))?;
    if !options.statuses.is_empty() {
        writeln!(out, "statuses       {}", options.statuses.join(", "))?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let pad = |cell: &str, width: usize| {
        let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
        format!("{}{}", cell, " ".repeat(width.saturating_sub(visible_width)))
    };

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| pad(header, widths[idx]))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(idx, cell)| pad(cell, widths[idx]))
            .collect();
        writeln!(writer, "{}", line.join(" ").trim_end())?;
    }

    Ok(())
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max.saturating_sub(1) {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use gantry_shared::{BarDto, ChartDto, StatusClassDto, TaskRowDto};
    use unicode_width::UnicodeWidthStr;

    use super::{Renderer, bar_span, strip_ansi, truncate_to_width};
    use crate::config::DevConfig;

    fn renderer(columns: usize) -> Renderer {
        Renderer {
            color: false,
            columns,
            dev: DevConfig::default(),
        }
    }

    fn row(bar: Option<BarDto>) -> TaskRowDto {
        TaskRowDto {
            id: 1,
            issue_key: "PROJ-1".to_string(),
            title: "設計レビュー".to_string(),
            project_key: "PROJ".to_string(),
            project_name: "Project".to_string(),
            assignee: "Alice".to_string(),
            start_date: Some("2023-12-20".to_string()),
            end_date: Some("2024-01-05".to_string()),
            status: "未対応".to_string(),
            status_class: StatusClassDto::Open,
            priority: "Normal".to_string(),
            resolution: None,
            progress_percent: 0,
            bar,
        }
    }

    #[test]
    fn bar_span_covers_at_least_one_cell() {
        let bar = BarDto {
            left: 0.0,
            width: 1.0 / 92.0,
            color: "#718096".to_string(),
            overdue: false,
            show_label: true,
        };
        assert_eq!(bar_span(&bar, 10), (0, 0));

        let tail = BarDto {
            left: 0.5,
            width: 0.5,
            ..bar
        };
        assert_eq!(bar_span(&tail, 10), (5, 9));
    }

    #[test]
    fn chart_aligns_wide_titles() {
        let chart = ChartDto {
            window_start: "2024-01-01".to_string(),
            window_end: "2024-04-01".to_string(),
            day_count: 92,
            sort_column: None,
            sort_direction: "none".to_string(),
            rows: vec![row(Some(BarDto {
                left: 0.0,
                width: 5.0 / 92.0,
                color: "#718096".to_string(),
                overdue: false,
                show_label: true,
            }))],
        };

        let mut out = Vec::new();
        renderer(20).write_chart(&mut out, &chart, Some(0.0)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "2024-01-01 .. 2024-04-01 (92 days)");
        assert!(lines[3].starts_with("PROJ-1 設計レビュー"));
        assert!(lines[3].ends_with(&format!("██{}", "·".repeat(18))));
        assert_eq!(
            UnicodeWidthStr::width(lines[3]),
            UnicodeWidthStr::width(lines[2])
        );
    }

    #[test]
    fn empty_chart_says_so() {
        let chart = ChartDto {
            window_start: "2024-01-01".to_string(),
            window_end: "2024-04-01".to_string(),
            day_count: 92,
            sort_column: None,
            sort_direction: "none".to_string(),
            rows: vec![],
        };
        let mut out = Vec::new();
        renderer(20).write_chart(&mut out, &chart, None).unwrap();
        assert!(
            String::from_utf8(out)
                .unwrap()
                .contains("No tasks match")
        );
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        let cut = truncate_to_width("日本語のタイトルです", 7);
        assert_eq!(cut, "日本語…");
        assert!(UnicodeWidthStr::width(cut.as_str()) <= 7);
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
