//! Render the four report charts under the `visualizations/` directory.

mod heatmap;
pub use heatmap::{service_month_grid, service_month_heatmap, HeatGrid};
mod scatter;
pub use scatter::{age_stay_groups, age_stay_scatter, linear_fit, LinearFit, ScatterGroup};
mod treemap;
pub use treemap::{service_counts, service_volume_treemap, squarify, Tile};
mod trend;
pub use trend::{weekly_mean_stay, weekly_stay_trend, WeekPoint};

use crate::{path_exists, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Directory the chart images are written into.
pub const CHART_DIR: &str = "visualizations";

pub const WEEKLY_TREND_PNG: &str = "line_chart_lama_rawat_mingguan.png";
pub const HEATMAP_PNG: &str = "heatmap_durasi_rawat_layanan_bulan.png";
pub const TREEMAP_PNG: &str = "treemap_jumlah_pasien_layanan.png";
pub const SCATTER_PNG: &str = "scatter_plot_usia_lama_rawat.png";

/// Create the chart directory if it is missing. True if it was created.
pub fn ensure_chart_dir() -> Result<bool> {
    if path_exists(Path::new(CHART_DIR))? {
        Ok(false)
    } else {
        fs::create_dir_all(CHART_DIR)?;
        Ok(true)
    }
}

pub(crate) fn chart_path(file: &str) -> PathBuf {
    Path::new(CHART_DIR).join(file)
}
