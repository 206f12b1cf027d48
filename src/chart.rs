use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use plotters::prelude::*;
use uuid::Uuid;

use crate::models::{Criterion, RatingCounts};

const CHART_SIZE: (u32, u32) = (1000, 600);
const GROUP_WIDTH: f64 = 0.8;
const FALLBACK_COLOR: RGBColor = RGBColor(70, 130, 180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Plan,
    Desempeno,
    General,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Plan => "plan",
            ChartKind::Desempeno => "desempeno",
            ChartKind::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChartKey<'a> {
    pub docente: &'a str,
    pub asignatura: &'a str,
    pub kind: ChartKind,
}

impl ChartKey<'_> {
    /// `<kind>_<docente>_<asignatura>_<digest>.png`. The digest covers the raw
    /// names, so keys that sanitize alike still get distinct files.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.png",
            self.kind.as_str(),
            sanitize_component(self.docente),
            sanitize_component(self.asignatura),
            self.digest()
        )
    }

    fn digest(&self) -> String {
        let mut raw = Vec::with_capacity(self.docente.len() + self.asignatura.len() + 1);
        raw.extend_from_slice(self.docente.as_bytes());
        raw.push(0x1f);
        raw.extend_from_slice(self.asignatura.as_bytes());
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, &raw).simple().to_string();
        id[..12].to_string()
    }
}

fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' { ch } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "sin_nombre".to_string()
    } else {
        cleaned
    }
}

pub enum ChartData<'a> {
    /// One bar per value of a single column.
    Single { counts: &'a RatingCounts, x_desc: &'a str },
    /// One group per criterion, one bar per rating value.
    Grouped { criteria: &'a [(Criterion, RatingCounts)] },
}

/// Writes chart PNGs under one directory; files are overwritten, never versioned.
#[derive(Debug, Clone)]
pub struct FigureRenderer {
    dir: PathBuf,
}

impl FigureRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// A renderer in a fresh namespace below `root`, so concurrent runs never
    /// share file names.
    pub fn for_run(root: &Path) -> Self {
        Self::new(root.join(Uuid::new_v4().to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ChartKey<'_>) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn render(&self, key: &ChartKey<'_>, title: &str, data: &ChartData<'_>) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create chart directory {}", self.dir.display()))?;
        let path = self.path_for(key);

        match data {
            ChartData::Single { counts, x_desc } => draw_single(&path, title, counts, x_desc),
            ChartData::Grouped { criteria } => draw_grouped(&path, title, criteria),
        }
        .with_context(|| format!("failed to render chart {}", path.display()))?;

        log::debug!("rendered {} chart at {}", key.kind.as_str(), path.display());
        Ok(path)
    }

    pub fn cleanup(&self) -> anyhow::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .with_context(|| format!("failed to remove {}", self.dir.display()))?;
        }
        Ok(())
    }
}

pub fn rating_color(label: &str) -> RGBColor {
    match label {
        "Excelente" => RGBColor(46, 139, 87),
        "Bueno" => RGBColor(65, 105, 225),
        "Regular" => RGBColor(238, 201, 0),
        "Algo Deficiente" => RGBColor(255, 140, 0),
        "Totalmente Deficiente" => RGBColor(205, 38, 38),
        _ => FALLBACK_COLOR,
    }
}

/// Horizontal extent of bar `series` inside the group centred on `group`.
fn bar_span(group: usize, series: usize, series_count: usize) -> (f64, f64) {
    let width = GROUP_WIDTH / series_count.max(1) as f64;
    let start = group as f64 - GROUP_WIDTH / 2.0 + series as f64 * width;
    (start, start + width)
}

fn axis_label(labels: &[String], x: f64) -> String {
    let nearest = x.round();
    if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    labels.get(nearest as usize).cloned().unwrap_or_default()
}

fn y_ceiling(max: usize) -> f64 {
    (max.max(1) as f64 * 1.15).ceil()
}

fn draw_single(path: &Path, title: &str, counts: &RatingCounts, x_desc: &str) -> anyhow::Result<()> {
    let labels: Vec<String> = counts.labels().map(str::to_string).collect();
    let count = labels.len().max(1);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(count as f64 - 0.5), 0f64..y_ceiling(counts.max()))?;

    let x_formatter = |x: &f64| axis_label(&labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(count + 1)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&|y| format!("{y:.0}"))
        .x_desc(x_desc)
        .y_desc("Cantidad")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(idx, (label, value))| {
        let (x0, x1) = bar_span(idx, 0, 1);
        Rectangle::new([(x0, 0.0), (x1, value as f64)], rating_color(label).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn draw_grouped(path: &Path, title: &str, criteria: &[(Criterion, RatingCounts)]) -> anyhow::Result<()> {
    let groups: Vec<String> = criteria
        .iter()
        .map(|(criterion, _)| criterion.label().to_string())
        .collect();
    let mut series: Vec<&str> = Vec::new();
    for (_, counts) in criteria {
        for label in counts.labels() {
            if !series.contains(&label) {
                series.push(label);
            }
        }
    }
    let max = criteria.iter().map(|(_, counts)| counts.max()).max().unwrap_or(0);
    let group_count = groups.len().max(1);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(group_count as f64 - 0.5), 0f64..y_ceiling(max))?;

    let x_formatter = |x: &f64| axis_label(&groups, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(group_count + 1)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&|y| format!("{y:.0}"))
        .x_desc("Criterios")
        .y_desc("Cantidad")
        .draw()?;

    for (idx, label) in series.iter().enumerate() {
        let color = rating_color(label);
        let bars: Vec<Rectangle<(f64, f64)>> = criteria
            .iter()
            .enumerate()
            .map(|(group, (_, counts))| {
                let (x0, x1) = bar_span(group, idx, series.len());
                Rectangle::new([(x0, 0.0), (x1, counts.get(label) as f64)], color.filled())
            })
            .collect();
        chart
            .draw_series(bars)?
            .label(*label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
