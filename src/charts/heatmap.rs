use crate::{Admissions, ArcStr, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};
use qu::ick_use::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

const SIZE: (u32, u32) = (1280, 640);
const LEFT: i32 = 170;
const RIGHT: i32 = 40;
const TOP: i32 = 70;
const BOTTOM: i32 = 90;

/// The (service × month) mean stay pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatGrid {
    /// Row labels, ascending.
    pub services: Vec<ArcStr>,
    /// Column labels, ascending.
    pub months: Vec<ArcStr>,
    /// Row-major `services.len() × months.len()` means, 0 where a service saw
    /// no admissions in a month.
    pub cells: Vec<f64>,
}

impl HeatGrid {
    pub fn value(&self, service_idx: usize, month_idx: usize) -> f64 {
        self.cells[service_idx * self.months.len() + month_idx]
    }
}

/// Mean stay duration per (service, month), pivoted with missing cells at 0.
/// Admissions without a service value are left out.
pub fn service_month_grid(admissions: &Admissions) -> HeatGrid {
    // B Tree so we get a predictable ordering.
    let mut groups: BTreeMap<(ArcStr, ArcStr), (f64, usize)> = BTreeMap::new();
    for adm in admissions.iter() {
        let Some(service) = &adm.service else { continue };
        let entry = groups
            .entry((service.clone(), adm.month.clone()))
            .or_insert((0.0, 0));
        entry.0 += adm.stay_days as f64;
        entry.1 += 1;
    }

    let mut services = Vec::new();
    let mut months = BTreeSet::new();
    for (service, month) in groups.keys() {
        if services.last() != Some(service) {
            services.push(service.clone());
        }
        months.insert(month.clone());
    }
    let months: Vec<ArcStr> = months.into_iter().collect();

    let mut cells = Vec::with_capacity(services.len() * months.len());
    for service in &services {
        for month in &months {
            let value = groups
                .get(&(service.clone(), month.clone()))
                .map(|(sum, n)| sum / *n as f64)
                .unwrap_or(0.0);
            cells.push(value);
        }
    }
    HeatGrid {
        services,
        months,
        cells,
    }
}

/// Render the pivot as an annotated color grid. `None` when there is nothing
/// to plot.
pub fn service_month_heatmap(admissions: &Admissions) -> Result<Option<PathBuf>> {
    let grid = service_month_grid(admissions);
    if grid.services.is_empty() {
        event!(Level::WARN, "no admissions with a service, skipping the heatmap");
        return Ok(None);
    }

    let path = super::chart_path(super::HEATMAP_PNG);
    {
        let root = BitMapBackend::new(&path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let title_font = FontDesc::new(FontFamily::SansSerif, 26.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&Text::new(
            "Heatmap Durasi Rawat per Layanan dan Bulan",
            (SIZE.0 as i32 / 2, 20),
            title_font,
        ))?;

        let plot_w = SIZE.0 as i32 - LEFT - RIGHT;
        let plot_h = SIZE.1 as i32 - TOP - BOTTOM;
        let max = grid.cells.iter().fold(0.0_f64, |a, &b| a.max(b));

        let row_edge = |row: usize| {
            TOP + (row as f64 / grid.services.len() as f64 * plot_h as f64) as i32
        };
        let col_edge =
            |col: usize| LEFT + (col as f64 / grid.months.len() as f64 * plot_w as f64) as i32;

        let side_font = FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        let bottom_font = FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        let dark_text = FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let light_text = FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal)
            .color(&WHITE)
            .pos(Pos::new(HPos::Center, VPos::Center));

        for (row, service) in grid.services.iter().enumerate() {
            let (y0, y1) = (row_edge(row), row_edge(row + 1));
            root.draw(&Text::new(
                service.to_string(),
                (LEFT - 10, (y0 + y1) / 2),
                side_font.clone(),
            ))?;
            for col in 0..grid.months.len() {
                let (x0, x1) = (col_edge(col), col_edge(col + 1));
                let value = grid.value(row, col);
                let t = if max > 0.0 { value / max } else { 0.0 };
                root.draw(&Rectangle::new([(x0, y0), (x1, y1)], heat_color(t).filled()))?;
                let annot = if t > 0.6 { &light_text } else { &dark_text };
                root.draw(&Text::new(
                    format!("{:.1}", value),
                    ((x0 + x1) / 2, (y0 + y1) / 2),
                    annot.clone(),
                ))?;
            }
        }
        for (col, month) in grid.months.iter().enumerate() {
            let (x0, x1) = (col_edge(col), col_edge(col + 1));
            root.draw(&Text::new(
                month.to_string(),
                ((x0 + x1) / 2, TOP + plot_h + 10),
                bottom_font.clone(),
            ))?;
        }

        let axis_font = FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new("Bulan", (LEFT + plot_w / 2, SIZE.1 as i32 - 35), axis_font.clone()))?;
        root.draw(&Text::new(
            "Layanan",
            (25, TOP + plot_h / 2),
            axis_font.transform(FontTransform::Rotate270),
        ))?;

        root.present()?;
    }
    Ok(Some(path))
}

/// Yellow through orange to deep red, like the usual heat palettes.
/// `t` outside [0, 1] is clamped.
fn heat_color(t: f64) -> RGBColor {
    const STOPS: [(f64, (u8, u8, u8)); 3] = [
        (0.0, (255, 255, 204)),
        (0.5, (253, 141, 60)),
        (1.0, (128, 0, 38)),
    ];
    let t = t.clamp(0.0, 1.0);
    for pair in STOPS.windows(2) {
        let (t0, (r0, g0, b0)) = pair[0];
        let (t1, (r1, g1, b1)) = pair[1];
        if t <= t1 {
            let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            return RGBColor(lerp(r0, r1, f), lerp(g0, g1, f), lerp(b0, b1, f));
        }
    }
    let (_, (r, g, b)) = STOPS[STOPS.len() - 1];
    RGBColor(r, g, b)
}

fn lerp(a: u8, b: u8, f: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * f).round() as u8
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::RawTable;

    fn admissions(csv: &str) -> Admissions {
        let table = RawTable::from_reader(csv.as_bytes()).unwrap();
        Admissions::clean(table).unwrap().0
    }

    #[test]
    fn pivot_means_and_zero_fill() {
        let adm = admissions(
            "arrival,departure,service\n\
             2024-01-10,2024-01-12,ICU\n\
             2024-01-20,2024-01-24,ICU\n\
             2024-02-01,2024-02-06,ICU\n\
             2024-01-05,2024-01-06,Bedah\n\
             2024-01-15,2024-01-16,\n",
        );
        let grid = service_month_grid(&adm);
        let services: Vec<&str> = grid.services.iter().map(|s| &**s).collect();
        let months: Vec<&str> = grid.months.iter().map(|m| &**m).collect();
        assert_eq!(services, ["Bedah", "ICU"]);
        assert_eq!(months, ["2024-01", "2024-02"]);
        assert_eq!(grid.value(0, 0), 1.0);
        assert_eq!(grid.value(0, 1), 0.0);
        assert_eq!(grid.value(1, 0), 3.0);
        assert_eq!(grid.value(1, 1), 5.0);
    }

    #[test]
    fn empty_without_services() {
        let adm = admissions("arrival,departure\n2024-01-10,2024-01-12\n");
        let grid = service_month_grid(&adm);
        assert!(grid.services.is_empty());
        assert!(grid.cells.is_empty());
    }

    #[test]
    fn heat_ramp_endpoints() {
        let low = heat_color(0.0);
        assert_eq!((low.0, low.1, low.2), (255, 255, 204));
        let mid = heat_color(0.5);
        assert_eq!((mid.0, mid.1, mid.2), (253, 141, 60));
        let high = heat_color(1.0);
        assert_eq!((high.0, high.1, high.2), (128, 0, 38));
        let clamped = heat_color(7.5);
        assert_eq!((clamped.0, clamped.1, clamped.2), (128, 0, 38));
    }
}
