use crate::{Admissions, ArcStr, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};
use qu::ick_use::*;
use std::{collections::BTreeMap, path::PathBuf};

const SIZE: (u32, u32) = (1280, 640);
const MARGIN: i32 = 20;
const TOP: i32 = 60;

// The matplotlib "tab10" cycle.
const TILE_COLORS: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// A laid-out tile, in canvas units.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub label: ArcStr,
    pub count: usize,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Admissions per service, largest first (ties by name). Admissions without
/// a service value are left out.
pub fn service_counts(admissions: &Admissions) -> Vec<(ArcStr, usize)> {
    // B Tree so we get a predictable ordering.
    let mut map: BTreeMap<ArcStr, usize> = BTreeMap::new();
    for adm in admissions.iter() {
        let Some(service) = &adm.service else { continue };
        *map.entry(service.clone()).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = map.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Squarified treemap layout (Bruls, Huizing and van Wijk).
///
/// `counts` must be sorted descending. Tile areas are proportional to the
/// counts and fill the `width` × `height` rectangle exactly.
pub fn squarify(counts: &[(ArcStr, usize)], width: f64, height: f64) -> Vec<Tile> {
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return Vec::new();
    }
    let scale = width * height / total as f64;

    let mut tiles = Vec::with_capacity(counts.len());
    let mut free = (0.0, 0.0, width, height);
    let mut row: Vec<(ArcStr, usize, f64)> = Vec::new();
    let (mut row_sum, mut row_min, mut row_max) = (0.0_f64, f64::INFINITY, 0.0_f64);

    let mut idx = 0;
    while idx < counts.len() {
        let (label, count) = &counts[idx];
        let area = *count as f64 * scale;
        let side = free.2.min(free.3);
        let grown = worst(row_sum + area, row_min.min(area), row_max.max(area), side);
        if row.is_empty() || grown <= worst(row_sum, row_min, row_max, side) {
            row.push((label.clone(), *count, area));
            row_sum += area;
            row_min = row_min.min(area);
            row_max = row_max.max(area);
            idx += 1;
        } else {
            flush_row(&mut row, row_sum, &mut free, &mut tiles);
            (row_sum, row_min, row_max) = (0.0, f64::INFINITY, 0.0);
        }
    }
    flush_row(&mut row, row_sum, &mut free, &mut tiles);
    tiles
}

/// Highest aspect ratio a row of tiles would have, the quantity squarified
/// layout minimises.
fn worst(sum: f64, min: f64, max: f64, side: f64) -> f64 {
    let s2 = sum * sum;
    let side2 = side * side;
    f64::max(side2 * max / s2, s2 / (side2 * min))
}

/// Lay the pending row along the shorter side of the free rectangle and
/// shrink it.
fn flush_row(
    row: &mut Vec<(ArcStr, usize, f64)>,
    row_sum: f64,
    free: &mut (f64, f64, f64, f64),
    tiles: &mut Vec<Tile>,
) {
    if row.is_empty() {
        return;
    }
    let (x, y, w, h) = *free;
    if w >= h {
        // Column against the left edge.
        let thickness = row_sum / h;
        let mut ty = y;
        for (label, count, area) in row.drain(..) {
            let th = area / thickness;
            tiles.push(Tile {
                label,
                count,
                x,
                y: ty,
                w: thickness,
                h: th,
            });
            ty += th;
        }
        free.0 += thickness;
        free.2 -= thickness;
    } else {
        // Band against the top edge.
        let thickness = row_sum / w;
        let mut tx = x;
        for (label, count, area) in row.drain(..) {
            let tw = area / thickness;
            tiles.push(Tile {
                label,
                count,
                x: tx,
                y,
                w: tw,
                h: thickness,
            });
            tx += tw;
        }
        free.1 += thickness;
        free.3 -= thickness;
    }
}

/// Render the service volumes as a treemap. `None` when there is nothing to
/// plot.
pub fn service_volume_treemap(admissions: &Admissions) -> Result<Option<PathBuf>> {
    let counts = service_counts(admissions);
    if counts.is_empty() {
        event!(Level::WARN, "no admissions with a service, skipping the treemap");
        return Ok(None);
    }

    let region_w = (SIZE.0 as i32 - 2 * MARGIN) as f64;
    let region_h = (SIZE.1 as i32 - TOP - MARGIN) as f64;
    let tiles = squarify(&counts, region_w, region_h);

    let path = super::chart_path(super::TREEMAP_PNG);
    {
        let root = BitMapBackend::new(&path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let title_font = FontDesc::new(FontFamily::SansSerif, 26.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&Text::new(
            "Treemap Jumlah Pasien per Layanan",
            (SIZE.0 as i32 / 2, 20),
            title_font,
        ))?;

        let label_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        for (idx, tile) in tiles.iter().enumerate() {
            let x0 = MARGIN + tile.x.round() as i32;
            let y0 = TOP + tile.y.round() as i32;
            let x1 = MARGIN + (tile.x + tile.w).round() as i32;
            let y1 = TOP + (tile.y + tile.h).round() as i32;
            let color = TILE_COLORS[idx % TILE_COLORS.len()];
            root.draw(&Rectangle::new([(x0, y0), (x1, y1)], color.mix(0.8).filled()))?;
            // Leave cramped tiles unlabelled rather than spilling over their
            // neighbours.
            if tile.w >= 60.0 && tile.h >= 44.0 {
                let (cx, cy) = ((x0 + x1) / 2, (y0 + y1) / 2);
                root.draw(&Text::new(tile.label.to_string(), (cx, cy - 11), label_font.clone()))?;
                root.draw(&Text::new(tile.count.to_string(), (cx, cy + 11), label_font.clone()))?;
            }
        }

        root.present()?;
    }
    Ok(Some(path))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::RawTable;

    fn admissions(csv: &str) -> Admissions {
        let table = RawTable::from_reader(csv.as_bytes()).unwrap();
        Admissions::clean(table).unwrap().0
    }

    fn named(counts: &[(&str, usize)]) -> Vec<(ArcStr, usize)> {
        counts
            .iter()
            .map(|&(label, n)| (ArcStr::from(label), n))
            .collect()
    }

    #[test]
    fn counts_order_largest_first_then_name() {
        let adm = admissions(
            "arrival,departure,service\n\
             2024-01-10,2024-01-12,ICU\n\
             2024-01-10,2024-01-12,Bedah\n\
             2024-01-10,2024-01-12,Anak\n\
             2024-01-10,2024-01-12,Bedah\n\
             2024-01-10,2024-01-12,\n",
        );
        let counts = service_counts(&adm);
        let labels: Vec<(&str, usize)> = counts.iter().map(|(s, n)| (&**s, *n)).collect();
        assert_eq!(labels, [("Bedah", 2), ("Anak", 1), ("ICU", 1)]);
    }

    #[test]
    fn equal_counts_split_a_square_into_quadrants() {
        let tiles = squarify(&named(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]), 100.0, 100.0);
        let rects: Vec<(f64, f64, f64, f64)> =
            tiles.iter().map(|t| (t.x, t.y, t.w, t.h)).collect();
        assert_eq!(
            rects,
            [
                (0.0, 0.0, 50.0, 50.0),
                (0.0, 50.0, 50.0, 50.0),
                (50.0, 0.0, 50.0, 50.0),
                (50.0, 50.0, 50.0, 50.0),
            ]
        );
    }

    #[test]
    fn areas_are_proportional_and_fill_the_canvas() {
        let counts = named(&[("a", 6), ("b", 3), ("c", 2), ("d", 1)]);
        let tiles = squarify(&counts, 120.0, 80.0);
        assert_eq!(tiles.len(), 4);
        let canvas = 120.0 * 80.0;
        let total: f64 = tiles.iter().map(|t| t.w * t.h).sum();
        assert!((total - canvas).abs() < 1e-6);
        for (tile, (_, count)) in tiles.iter().zip(&counts) {
            let expect = canvas * *count as f64 / 12.0;
            assert!((tile.w * tile.h - expect).abs() < 1e-6);
            assert!(tile.x >= -1e-9 && tile.y >= -1e-9);
            assert!(tile.x + tile.w <= 120.0 + 1e-9);
            assert!(tile.y + tile.h <= 80.0 + 1e-9);
        }
    }

    #[test]
    fn single_service_fills_everything() {
        let tiles = squarify(&named(&[("a", 9)]), 60.0, 40.0);
        assert_eq!(tiles.len(), 1);
        assert_eq!((tiles[0].x, tiles[0].y), (0.0, 0.0));
        assert_eq!((tiles[0].w, tiles[0].h), (60.0, 40.0));
    }

    #[test]
    fn no_tiles_without_counts() {
        assert!(squarify(&[], 100.0, 100.0).is_empty());
    }
}
