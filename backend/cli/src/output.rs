//! Terminal rendering for results, monitors, devices and one-line notes.

use ocrdeck_capture::MonitorInfo;
use ocrdeck_core::Session;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Longest text cell before it is cut with an ellipsis.
const MAX_TEXT_WIDTH: usize = 60;

fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false)
}

fn note(color: &str, mark: &str, plain: &str, msg: &str) -> String {
    if color_enabled() {
        format!("{color}{BOLD}{mark}{RESET} {msg}")
    } else {
        format!("{plain}: {msg}")
    }
}

pub fn note_info(msg: &str) {
    println!("{}", note(CYAN, "ℹ", "INFO", msg));
}

pub fn note_warn(msg: &str) {
    println!("{}", note(YELLOW, "⚠", "WARN", msg));
}

pub fn note_error(msg: &str) {
    eprintln!("{}", note(RED, "✗", "ERROR", msg));
}

pub fn note_success(msg: &str) {
    println!("{}", note(GREEN, "✓", "OK", msg));
}

/// Left-aligned plain-text table. Widths count characters, not bytes.
struct Table {
    headers: Vec<&'static str>,
    right_aligned: Vec<bool>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(columns: &[(&'static str, bool)]) -> Self {
        Self {
            headers: columns.iter().map(|(h, _)| *h).collect(),
            right_aligned: columns.iter().map(|(_, r)| *r).collect(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = self.line(&widths, &self.headers);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&self.line(&widths, &rule));
        for row in &self.rows {
            out.push_str(&self.line(&widths, row));
        }
        out
    }

    fn line<S: AsRef<str>>(&self, widths: &[usize], cells: &[S]) -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .zip(&self.right_aligned)
            .map(|((cell, width), right)| {
                let cell = cell.as_ref();
                let pad = " ".repeat(width.saturating_sub(cell.chars().count()));
                if *right {
                    format!("{pad}{cell}")
                } else {
                    format!("{cell}{pad}")
                }
            })
            .collect();
        format!("  {}\n", padded.join("  ").trim_end())
    }
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

/// One line per region: label, box, confidence and text.
pub fn render_session(session: &Session) -> String {
    let mut out = format!(
        "Captured {} from {} ({}x{})\n\n",
        session.capture_time.format("%Y-%m-%d %H:%M:%S"),
        session.source,
        session.image_size.0,
        session.image_size.1
    );
    if session.boxes.is_empty() {
        out.push_str("  (no regions)\n");
        return out;
    }
    let mut table = Table::new(&[("#", true), ("Box", false), ("Conf", true), ("Text", false)]);
    for (i, result) in session.boxes.iter().enumerate() {
        table.row(vec![
            (i + 1).to_string(),
            result.bbox.to_string(),
            format!("{:.2}", result.confidence),
            truncate(&result.text, MAX_TEXT_WIDTH),
        ]);
    }
    out.push_str(&table.render());
    out
}

pub fn render_monitors(monitors: &[MonitorInfo]) -> String {
    if monitors.is_empty() {
        return "  (no monitors detected)\n".to_string();
    }
    let mut table = Table::new(&[("Index", true), ("Size", false)]);
    for m in monitors {
        table.row(vec![m.index.to_string(), format!("{}x{}", m.width, m.height)]);
    }
    table.render()
}

pub fn render_devices(format: &str, devices: &[String]) -> String {
    if devices.is_empty() {
        return format!("  (no {format} devices found; enter the device name manually)\n");
    }
    devices.iter().map(|d| format!("  {d}\n")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use ocrdeck_core::{RecognitionResult, Rect, SourceId};

    #[test]
    fn session_table_lists_regions_in_order() {
        let session = Session::new(
            Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            SourceId::Monitor(2),
            (1920, 1080),
            vec![
                RecognitionResult {
                    bbox: Rect::from_corners(0, 0, 10, 10).unwrap(),
                    text: "Xin chào".into(),
                    confidence: 0.87,
                },
                RecognitionResult {
                    bbox: Rect::from_corners(5, 5, 50, 20).unwrap(),
                    text: String::new(),
                    confidence: 0.0,
                },
            ],
        );
        let out = render_session(&session);
        assert!(out.starts_with("Captured 2026-03-01 09:30:00 from monitor 2 (1920x1080)"));
        let rows: Vec<&str> = out.lines().skip(4).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].trim_start().starts_with("1 "));
        assert!(rows[0].contains("0.87") && rows[0].ends_with("Xin chào"));
        assert!(rows[1].contains("0.00"));
    }

    #[test]
    fn long_text_is_cut() {
        let long = "a".repeat(100);
        let cut = truncate(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("one\ntwo", 10), "one two");
    }

    #[test]
    fn empty_lists_say_so() {
        assert!(render_monitors(&[]).contains("no monitors"));
        assert!(render_devices("dshow", &[]).contains("no dshow devices"));
        let out = render_monitors(&[MonitorInfo {
            index: 1,
            width: 2560,
            height: 1440,
        }]);
        assert!(out.contains("2560x1440"));
    }
}
