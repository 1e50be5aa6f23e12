//! Renderers for the k-selection curves.
//!
//! `SvgCurveRenderer` draws the elbow (inertia) and silhouette plots side by
//! side with the chosen k marked; `JsonCurveRenderer` dumps the raw numbers.

use super::selection::KSelection;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CurveRenderError {
    #[error("Failed to serialize curves")]
    Json(#[from] serde_json::Error),

    #[error("Failed to format curves")]
    Format(#[from] std::fmt::Error),

    #[error("Failed to write curves to {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait CurveRenderer {
    fn render(&self, selection: &KSelection) -> Result<String, CurveRenderError>;

    fn write_to(&self, selection: &KSelection, path: &Path) -> Result<(), CurveRenderError> {
        let content = self.render(selection)?;
        fs::write(path, content).map_err(|source| CurveRenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved cluster optimization curves to {:?}", path);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCurveRenderer;

impl CurveRenderer for JsonCurveRenderer {
    fn render(&self, selection: &KSelection) -> Result<String, CurveRenderError> {
        Ok(serde_json::to_string_pretty(selection)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SvgCurveRenderer {
    pub panel_width: f64,
    pub panel_height: f64,
}

impl Default for SvgCurveRenderer {
    fn default() -> Self {
        Self {
            panel_width: 450.0,
            panel_height: 360.0,
        }
    }
}

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 50.0;

struct Panel<'a> {
    offset_x: f64,
    title: &'a str,
    y_label: &'a str,
    color: &'a str,
    points: Vec<(usize, f64)>,
}

impl SvgCurveRenderer {
    fn draw_panel(
        &self,
        out: &mut String,
        panel: &Panel<'_>,
        ks: &[usize],
        chosen_k: usize,
    ) -> std::fmt::Result {
        let plot_w = self.panel_width - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = self.panel_height - MARGIN_TOP - MARGIN_BOTTOM;
        let x0 = panel.offset_x + MARGIN_LEFT;
        let y0 = MARGIN_TOP + plot_h;

        let k_min = ks.first().copied().unwrap_or(0) as f64;
        let k_max = ks.last().copied().unwrap_or(0) as f64;
        let k_span = (k_max - k_min).max(1.0);

        let (mut y_min, mut y_max) = panel
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| {
                (lo.min(v), hi.max(v))
            });
        if !y_min.is_finite() {
            y_min = 0.0;
            y_max = 1.0;
        }
        if (y_max - y_min).abs() < f64::EPSILON {
            y_min -= 0.5;
            y_max += 0.5;
        }

        let sx = |k: f64| x0 + (k - k_min) / k_span * plot_w;
        let sy = |v: f64| y0 - (v - y_min) / (y_max - y_min) * plot_h;

        writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="15">{}</text>"#,
            x0 + plot_w / 2.0,
            MARGIN_TOP / 2.0 + 5.0,
            panel.title
        )?;
        writeln!(
            out,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="none" stroke="#999"/>"##,
            x0, MARGIN_TOP, plot_w, plot_h
        )?;

        for &k in ks {
            let x = sx(k as f64);
            writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="11">{}</text>"#,
                x,
                y0 + 16.0,
                k
            )?;
        }
        for (value, anchor_y) in [(y_min, y0), (y_max, MARGIN_TOP)] {
            writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11">{:.3}</text>"#,
                x0 - 6.0,
                anchor_y + 4.0,
                value
            )?;
        }
        writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">Number of clusters (k)</text>"#,
            x0 + plot_w / 2.0,
            y0 + 38.0
        )?;
        writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12" transform="rotate(-90 {:.1} {:.1})">{}</text>"#,
            panel.offset_x + 18.0,
            MARGIN_TOP + plot_h / 2.0,
            panel.offset_x + 18.0,
            MARGIN_TOP + plot_h / 2.0,
            panel.y_label
        )?;

        let chosen_x = sx(chosen_k as f64);
        writeln!(
            out,
            r##"<line class="chosen-k" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#d62728" stroke-dasharray="6 4"/>"##,
            chosen_x, MARGIN_TOP, chosen_x, y0
        )?;

        let path: Vec<String> = panel
            .points
            .iter()
            .map(|&(k, v)| format!("{:.1},{:.1}", sx(k as f64), sy(v)))
            .collect();
        writeln!(
            out,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            path.join(" "),
            panel.color
        )?;
        for &(k, v) in &panel.points {
            writeln!(
                out,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3.5" fill="{}"/>"#,
                sx(k as f64),
                sy(v),
                panel.color
            )?;
        }
        Ok(())
    }
}

impl CurveRenderer for SvgCurveRenderer {
    fn render(&self, selection: &KSelection) -> Result<String, CurveRenderError> {
        let curves = &selection.curves;
        let width = self.panel_width * 2.0;
        let mut out = String::new();

        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="sans-serif">"#,
            width, self.panel_height, width, self.panel_height
        )?;
        writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;

        let elbow = Panel {
            offset_x: 0.0,
            title: "Elbow Method for Optimal k",
            y_label: "Inertia",
            color: "#1f77b4",
            points: curves.ks.iter().copied().zip(curves.inertias.iter().copied()).collect(),
        };
        let silhouette = Panel {
            offset_x: self.panel_width,
            title: "Silhouette Score for Optimal k",
            y_label: "Silhouette Score",
            color: "#2ca02c",
            points: curves
                .ks
                .iter()
                .zip(&curves.silhouettes)
                .filter_map(|(&k, s)| s.map(|s| (k, s)))
                .collect(),
        };

        self.draw_panel(&mut out, &elbow, &curves.ks, selection.chosen_k)?;
        self.draw_panel(&mut out, &silhouette, &curves.ks, selection.chosen_k)?;

        writeln!(out, "</svg>")?;
        Ok(out)
    }
}
