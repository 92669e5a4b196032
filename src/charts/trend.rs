use crate::{Admissions, Result};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use qu::ick_use::*;
use std::{collections::BTreeMap, path::PathBuf};

const SIZE: (u32, u32) = (1280, 760);

/// One point of the weekly series.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekPoint {
    pub year: i32,
    pub week: u32,
    pub mean_stay: f64,
}

impl WeekPoint {
    /// Axis label, e.g. "2024-W07".
    pub fn label(&self) -> String {
        format!("{}-W{:02}", self.year, self.week)
    }
}

/// Mean stay duration per (year, ISO week), ascending.
pub fn weekly_mean_stay(admissions: &Admissions) -> Vec<WeekPoint> {
    // B Tree so we get a predictable ordering.
    let mut groups: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for adm in admissions.iter() {
        let entry = groups.entry((adm.year, adm.week)).or_insert((0.0, 0));
        entry.0 += adm.stay_days as f64;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|((year, week), (sum, n))| WeekPoint {
            year,
            week,
            mean_stay: sum / n as f64,
        })
        .collect()
}

/// Render the weekly mean stay as a line chart. `None` when there is nothing
/// to plot.
pub fn weekly_stay_trend(admissions: &Admissions) -> Result<Option<PathBuf>> {
    let series = weekly_mean_stay(admissions);
    if series.is_empty() {
        event!(Level::WARN, "no admissions to plot, skipping the weekly trend chart");
        return Ok(None);
    }

    let path = super::chart_path(super::WEEKLY_TREND_PNG);
    {
        let root = BitMapBackend::new(&path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let y_max = series.iter().map(|pt| pt.mean_stay).fold(0.0_f64, f64::max);
        let y_top = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };
        let x_top = (series.len() as i32 - 1).max(1);
        let mut chart = ChartBuilder::on(&root)
            .caption("Rata-rata Lama Rawat Pasien per Minggu", ("sans-serif", 28))
            .margin(25)
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 50)
            .build_cartesian_2d(0..x_top, 0.0..y_top)?;

        chart
            .configure_mesh()
            .x_labels(series.len().min(12))
            .x_label_formatter(&|idx| {
                series
                    .get(*idx as usize)
                    .map(|pt| pt.label())
                    .unwrap_or_default()
            })
            .x_desc("Periode Minggu")
            .y_desc("Durasi Rawat (Hari)")
            .label_style(FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal))
            .draw()?;

        chart.draw_series(LineSeries::new(
            series
                .iter()
                .enumerate()
                .map(|(idx, pt)| (idx as i32, pt.mean_stay)),
            &RGBColor(99, 110, 250),
        ))?;

        root.present()?;
    }
    Ok(Some(path))
}
