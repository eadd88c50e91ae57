use crate::metrics::stats::Comparison;
use serde::{Deserialize, Serialize};

pub const RAW_COLOR: Color = Color(0xD62728);
pub const CLEAN_COLOR: Color = Color(0x2CA02C);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Finite (min, max) over every point, or `None` for an empty figure.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut points = self
            .series
            .iter()
            .flat_map(|series| match series {
                Series::Line(line) => line.points.iter(),
            })
            .filter(|p| p[0].is_finite() && p[1].is_finite());
        let first = *points.next()?;
        let mut min = first;
        let mut max = first;
        for p in points {
            min[0] = min[0].min(p[0]);
            min[1] = min[1].min(p[1]);
            max[0] = max[0].max(p[0]);
            max[1] = max[1].max(p[1]);
        }
        Some((min, max))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn indexed_points(values: &[f64]) -> Vec<[f64; 2]> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64, *value])
        .collect()
}

/// Raw and cleaned BPM traces over sample index, with mean/std in the title.
pub fn figure_from_comparison(
    title: &str,
    raw: &[f64],
    clean: &[f64],
    max_points: usize,
) -> Figure {
    let stats = Comparison::new(raw, clean);
    let mut fig = Figure::new(Some(format!(
        "{} | raw {:.1}±{:.1} | clean {:.1}±{:.1}",
        title, stats.raw.mean, stats.raw.std, stats.clean.mean, stats.clean.std
    )));
    fig.x.label = Some("sample".into());
    fig.y.label = Some("BPM".into());
    fig.add_series(Series::Line(LineSeries {
        name: "raw".into(),
        points: decimate_points(&indexed_points(raw), max_points),
        style: Style {
            width: 1.0,
            color: RAW_COLOR,
        },
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "clean".into(),
        points: decimate_points(&indexed_points(clean), max_points),
        style: Style {
            width: 1.6,
            color: CLEAN_COLOR,
        },
    }));
    fig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_caps_point_count() {
        let points: Vec<[f64; 2]> = (0..10_000).map(|i| [i as f64, 1.0]).collect();
        let out = decimate_points(&points, 2048);
        assert_eq!(out.len(), 2048);
        assert_eq!(out[0], [0.0, 1.0]);
        assert_eq!(decimate_points(&points[..10], 2048).len(), 10);
    }

    #[test]
    fn comparison_figure_has_two_traces() {
        let fig = figure_from_comparison("Low", &[75.0, 1200.0, 75.0], &[75.0, 75.0, 75.0], 2048);
        assert_eq!(fig.series.len(), 2);
        let (min, max) = fig.bounds().unwrap();
        assert_eq!(min, [0.0, 75.0]);
        assert_eq!(max, [2.0, 1200.0]);
        assert!(fig.title.unwrap().starts_with("Low |"));
    }

    #[test]
    fn empty_figure_has_no_bounds() {
        assert!(Figure::new(None).bounds().is_none());
    }

    #[test]
    fn color_unpacks_to_rgb() {
        assert_eq!(Color(0x2CA02C).rgb(), (0x2C, 0xA0, 0x2C));
    }
}
