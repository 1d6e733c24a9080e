//! Chart rendering for the analytics view
//!
//! Turns the aggregation outputs into SVG documents: one bar chart of
//! serviced volume by ship, and one pie chart of cost share by substance per
//! ship. The rest of the system treats the returned documents as opaque.

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};

const BAR_SIZE: (u32, u32) = (960, 420);
const PIE_SIZE: (u32, u32) = (480, 480);

const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// Bar chart of total serviced volume per ship. `names` and `volumes` are
/// aligned; ships without operations show an empty slot.
pub fn volume_bar_chart(names: &[String], volumes: &[f64]) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, BAR_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let y_max = volumes.iter().copied().fold(0.0f64, f64::max).max(1.0) * 1.1;
        let slots = names.len().max(1) as u32;
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption("Serviced volume by ship", ("sans-serif", 22))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 70)
            .build_cartesian_2d((0u32..slots).into_segmented(), 0.0..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|segment| match segment {
                SegmentValue::CenterOf(i) => {
                    names.get(*i as usize).cloned().unwrap_or_default()
                }
                _ => String::new(),
            })
            .x_labels(names.len().max(1))
            .y_desc("Volume, m3")
            .label_style(FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal))
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(SERIES_COLORS[0].filled())
                .margin(8)
                .data(
                    volumes
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, volume)| (i as u32, volume)),
                ),
        )?;

        root.present()?;
    }
    Ok(svg)
}

/// Pie chart of one ship's cost share by substance, percentage-labeled.
/// Returns None when the cost total is not positive; shares of a zero total
/// are undefined, and such ships get no chart at all.
pub fn cost_pie_chart(ship: &str, labels: &[String], costs: &[f64]) -> Result<Option<String>> {
    let cost_total: f64 = costs.iter().sum();
    if cost_total <= 0.0 {
        return Ok(None);
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, PIE_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(ship, TextStyle::from(("sans-serif", 20).into_font()))?;

        let center = (240, 230);
        let radius = 150.0;
        let colors: Vec<RGBColor> = (0..costs.len())
            .map(|i| SERIES_COLORS[i % SERIES_COLORS.len()])
            .collect();
        let labels: Vec<String> = labels.to_vec();

        let mut pie = Pie::new(&center, &radius, costs, &colors, &labels);
        pie.start_angle(-90.0);
        pie.label_style(TextStyle::from(("sans-serif", 15).into_font()));
        pie.percentages(TextStyle::from(("sans-serif", 12).into_font()));
        root.draw(&pie)?;

        root.present()?;
    }
    Ok(Some(svg))
}
