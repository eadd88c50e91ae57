use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use rrclean_batch::{CleanedRecording, Exporter};
use rrclean_lib::{
    io::naming::subject_file_name,
    plot::{figure_from_comparison, Figure, Series},
    Intensity,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MAX_POINTS: usize = 2048;

/// Render a single figure to a PNG.
pub fn draw_figure(path: &Path, fig: &Figure) -> Result<()> {
    let root = BitMapBackend::new(path, (900, 480)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_panel(&root, fig)?;
    root.present()?;
    Ok(())
}

/// Render figures side by side under a common title.
pub fn draw_panels(path: &Path, title: &str, figs: &[Figure]) -> Result<()> {
    let width = 480 * figs.len().max(1) as u32;
    let root = BitMapBackend::new(path, (width, 520)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 26))?;
    let panels = root.split_evenly((1, figs.len().max(1)));
    for (panel, fig) in panels.iter().zip(figs) {
        draw_panel(panel, fig)?;
    }
    root.present()?;
    Ok(())
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    if (max - min).abs() < 1e-9 {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    }
}

fn draw_panel(area: &DrawingArea<BitMapBackend<'_>, Shift>, fig: &Figure) -> Result<()> {
    let ([x_min, y_min], [x_max, y_max]) = fig.bounds().unwrap_or(([0.0, 0.0], [1.0, 1.0]));
    let (x_min, x_max) = padded(x_min, x_max);
    let (y_min, y_max) = padded(y_min, y_max);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 16),
        )
        .x_label_area_size(30)
        .y_label_area_size(45)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                let style = RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32);
                chart.draw_series(LineSeries::new(
                    line.points
                        .iter()
                        .filter(|p| p[0].is_finite() && p[1].is_finite())
                        .map(|p| (p[0], p[1])),
                    style,
                ))?;
            }
        }
    }
    Ok(())
}

struct SubjectTraces {
    name: String,
    code: String,
    traces: Vec<(Intensity, Vec<f64>, Vec<f64>)>,
}

/// Collects raw and cleaned traces and draws one comparison PNG per subject.
pub struct PlotExporter {
    out_dir: PathBuf,
    suffix: String,
    pending: BTreeMap<String, SubjectTraces>,
}

impl PlotExporter {
    pub fn new(out_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            suffix: suffix.into(),
            pending: BTreeMap::new(),
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Exporter for PlotExporter {
    fn export(&mut self, rec: &CleanedRecording<'_>) -> Result<Vec<PathBuf>> {
        let entry = self
            .pending
            .entry(rec.subject.key.clone())
            .or_insert_with(|| SubjectTraces {
                name: capitalize(&rec.subject.key),
                code: rec.subject.code.clone(),
                traces: Vec::new(),
            });
        entry
            .traces
            .push((rec.intensity, rec.raw.bpm.clone(), rec.cleaned.values.clone()));
        Ok(Vec::new())
    }

    fn discard(&mut self, rec: &CleanedRecording<'_>, _written: &[PathBuf]) -> Result<()> {
        if let Some(subject) = self.pending.get_mut(&rec.subject.key) {
            if let Some(pos) = subject
                .traces
                .iter()
                .rposition(|(intensity, _, _)| *intensity == rec.intensity)
            {
                subject.traces.remove(pos);
            }
            if subject.traces.is_empty() {
                self.pending.remove(&rec.subject.key);
            }
        }
        Ok(())
    }

    /// One PNG per subject; a subject that fails to render does not stop the rest.
    fn finish(&mut self) -> Vec<Result<PathBuf>> {
        let mut results = Vec::new();
        for (_, mut subject) in std::mem::take(&mut self.pending) {
            subject.traces.sort_by_key(|(intensity, _, _)| *intensity);
            let figs: Vec<Figure> = subject
                .traces
                .iter()
                .map(|(intensity, raw, clean)| {
                    figure_from_comparison(
                        &format!("Intensity {}", intensity.code()),
                        raw,
                        clean,
                        MAX_POINTS,
                    )
                })
                .collect();
            let file_name = subject_file_name(&subject.code, &self.suffix).replace(".csv", ".png");
            let path = self.out_dir.join(file_name);
            let title = format!("{} - Raw vs Cleaned BPM", subject.name);
            let result = draw_panels(&path, &title, &figs)
                .with_context(|| format!("plotting {}", path.display()))
                .map(|()| {
                    log::info!("wrote {}", path.display());
                    path
                });
            results.push(result);
        }
        results
    }
}
