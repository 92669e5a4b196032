use crate::{Admissions, ArcStr, Result};
use itertools::{Itertools, MinMaxResult};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use qu::ick_use::*;
use std::{collections::BTreeMap, path::PathBuf};

const SIZE: (u32, u32) = (1280, 760);

// Plotly's default qualitative colorway.
const GROUP_COLORS: [RGBColor; 10] = [
    RGBColor(99, 110, 250),
    RGBColor(239, 85, 59),
    RGBColor(0, 204, 150),
    RGBColor(171, 99, 250),
    RGBColor(255, 161, 90),
    RGBColor(25, 211, 243),
    RGBColor(255, 102, 146),
    RGBColor(182, 232, 128),
    RGBColor(255, 151, 255),
    RGBColor(254, 203, 82),
];

/// A least-squares line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least squares over `(x, y)` points. `None` when there are fewer
/// than two distinct x values, where the slope is undefined.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    match points.iter().map(|(x, _)| *x).minmax() {
        MinMaxResult::MinMax(lo, hi) if lo < hi => {}
        _ => return None,
    }
    let n = points.len() as f64;
    let (mut x_sum, mut y_sum, mut xx_sum, mut xy_sum) = (0.0, 0.0, 0.0, 0.0);
    for (x, y) in points {
        x_sum += x;
        y_sum += y;
        xx_sum += x * x;
        xy_sum += x * y;
    }
    let denom = n * xx_sum - x_sum * x_sum;
    let slope = (n * xy_sum - x_sum * y_sum) / denom;
    Some(LinearFit {
        slope,
        intercept: (y_sum - slope * x_sum) / n,
    })
}

/// The scatter points for one colored group.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterGroup {
    pub label: ArcStr,
    /// `(age, stay days)` per admission.
    pub points: Vec<(f64, f64)>,
    pub fit: Option<LinearFit>,
}

/// Scatter points grouped the way the chart colors them: one group per
/// service (admissions without a service value fall into "(unspecified)"),
/// or a single group when the service column is absent. Admissions without a
/// parsed age are left out.
pub fn age_stay_groups(admissions: &Admissions) -> Vec<ScatterGroup> {
    // B Tree so we get a predictable ordering.
    let mut map: BTreeMap<ArcStr, Vec<(f64, f64)>> = BTreeMap::new();
    for adm in admissions.iter() {
        let Some(age) = adm.age else { continue };
        let label: ArcStr = if admissions.has_service() {
            match &adm.service {
                Some(service) => service.clone(),
                None => "(unspecified)".into(),
            }
        } else {
            "pasien".into()
        };
        map.entry(label).or_default().push((age, adm.stay_days as f64));
    }
    map.into_iter()
        .map(|(label, points)| ScatterGroup {
            label,
            fit: linear_fit(&points),
            points,
        })
        .collect()
}

/// Render age against stay duration, colored by service when present, with a
/// least-squares line per group. `None` when there is nothing to plot.
pub fn age_stay_scatter(admissions: &Admissions) -> Result<Option<PathBuf>> {
    let groups = age_stay_groups(admissions);
    if groups.is_empty() {
        event!(Level::WARN, "no admissions with a parsed age, skipping the scatter plot");
        return Ok(None);
    }

    let (x_lo, x_hi) = pad_range(minmax(
        groups.iter().flat_map(|g| g.points.iter().map(|(x, _)| *x)),
    ));
    let (y_lo, y_hi) = pad_range(minmax(
        groups.iter().flat_map(|g| g.points.iter().map(|(_, y)| *y)),
    ));

    let path = super::chart_path(super::SCATTER_PNG);
    {
        let root = BitMapBackend::new(&path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Korelasi Usia Pasien vs Lama Rawat", ("sans-serif", 28))
            .margin(25)
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 50)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc("Usia Pasien")
            .y_desc("Durasi Rawat (Hari)")
            .label_style(FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal))
            .draw()?;

        for (idx, group) in groups.iter().enumerate() {
            let color = GROUP_COLORS[idx % GROUP_COLORS.len()];
            let series = chart.draw_series(
                group
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, color.mix(0.8).filled())),
            )?;
            if admissions.has_service() {
                series
                    .label(group.label.to_string())
                    .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
            }
            if let Some(fit) = group.fit {
                let (g_lo, g_hi) = minmax(group.points.iter().map(|(x, _)| *x));
                chart.draw_series(LineSeries::new(
                    [(g_lo, fit.at(g_lo)), (g_hi, fit.at(g_hi))],
                    color.stroke_width(2),
                ))?;
            }
        }

        if admissions.has_service() {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.7))
                .border_style(&BLACK.mix(0.3))
                .label_font(FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal))
                .draw()?;
        }

        root.present()?;
    }
    Ok(Some(path))
}

fn minmax(values: impl Iterator<Item = f64>) -> (f64, f64) {
    match values.minmax() {
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::NoElements => (0.0, 0.0),
    }
}

fn pad_range((lo, hi): (f64, f64)) -> (f64, f64) {
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { 1.0 };
    (lo - pad, hi + pad)
}
