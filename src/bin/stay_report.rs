use qu::ick_use::*;
use term_data_table::{Cell, Row, Table};
use ward_stay_report::{
    charts, header, Admissions, RawTable, CLEANED_CSV, PATIENTS_CSV, SERVICES_CSV,
};

#[qu::ick]
pub fn main() -> Result {
    let mut patients = RawTable::load(PATIENTS_CSV)?;
    let services = RawTable::load(SERVICES_CSV)?;

    header("Input data");
    let (rows, columns) = patients.shape();
    println!("{}: {} rows x {} columns", PATIENTS_CSV, rows, columns);
    let (rows, columns) = services.shape();
    println!("{}: {} rows x {} columns", SERVICES_CSV, rows, columns);

    patients.normalize_columns();
    match patients.find_column("arrival") {
        Some(idx) => println!("arrival column: {}", patients.columns()[idx]),
        None => println!("arrival column: (not found)"),
    }
    match patients.find_column("departure") {
        Some(idx) => println!("departure column: {}", patients.columns()[idx]),
        None => println!("departure column: (not found)"),
    }

    let (admissions, counts) = Admissions::clean(patients)?;

    header("Cleaned patient data");
    println!(
        "{} of {} rows kept ({} with unparseable dates, {} with inverted stays)\n",
        counts.kept(),
        counts.total,
        counts.unparseable,
        counts.inverted,
    );
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Column"))
            .with_cell(Cell::from("Non-null"))
            .with_cell(Cell::from("Kind")),
    );
    for summary in admissions.column_summaries() {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(summary.label.to_string()))
                .with_cell(Cell::from(summary.non_null.to_string()))
                .with_cell(Cell::from(summary.kind)),
        );
    }
    println!("{}", table);

    header("Visualizations");
    if charts::ensure_chart_dir()? {
        println!("created \"{}\"", charts::CHART_DIR);
    }
    if let Some(path) = charts::weekly_stay_trend(&admissions)? {
        println!("line chart saved to \"{}\"", path.display());
    }
    if admissions.has_service() {
        if let Some(path) = charts::service_month_heatmap(&admissions)? {
            println!("heatmap saved to \"{}\"", path.display());
        }
        if let Some(path) = charts::service_volume_treemap(&admissions)? {
            println!("treemap saved to \"{}\"", path.display());
        }
    } else {
        event!(Level::WARN, "no \"service\" column, skipping the heatmap");
        event!(Level::WARN, "no \"service\" column, skipping the treemap");
    }
    if admissions.has_age() {
        if let Some(path) = charts::age_stay_scatter(&admissions)? {
            println!("scatter plot saved to \"{}\"", path.display());
        }
    } else {
        event!(Level::WARN, "no \"age\" column, skipping the scatter plot");
    }

    header("Storytelling flow");
    println!("1. Line Chart:");
    println!("    - Menunjukkan perubahan rata-rata lama rawat dari minggu ke minggu.");
    println!("    - Periode dengan kenaikan bisa menandakan peningkatan kompleksitas kasus.");
    println!();
    println!("2. Heatmap:");
    println!("    - Menunjukkan layanan mana yang memiliki durasi rawat tinggi tiap bulan.");
    println!("    - Warna gelap = beban tinggi.");
    println!();
    println!("3. Treemap:");
    println!("    - Menampilkan distribusi pasien per layanan.");
    println!("    - Kotak terbesar = layanan dengan volume pasien terbanyak.");
    println!();
    println!("4. Scatter Plot:");
    println!("    - Menganalisis hubungan usia pasien terhadap lama rawat.");
    println!("    - Jika tren naik, usia lanjut cenderung dirawat lebih lama.");
    println!();
    println!("Insight yang bisa diambil:");
    println!("- Layanan dengan durasi rawat tinggi perlu evaluasi efisiensi.");
    println!("- Minggu dengan durasi puncak bisa dianalisis penyebabnya (musiman, outbreak, dll).");
    println!("- Scatter menunjukkan pola kompleksitas pasien.");

    admissions.save(CLEANED_CSV)?;
    println!("\ncleaned table saved to \"{}\"", CLEANED_CSV);
    Ok(())
}
