// src/viz/plots.rs
//
// Thin chart-drawing layer. Everything here takes plain labels/values;
// table access stays in the caller.

use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

type PlotResult = Result<(), Box<dyn Error>>;

pub fn bar_chart(
    path: &Path,
    size: (u32, u32),
    caption: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
) -> PlotResult {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    if labels.is_empty() {
        root.present()?;
        return Ok(());
    }

    let y_max = values.iter().copied().fold(f64::MIN, f64::max).max(1e-9);
    let y_min = values.iter().copied().fold(0.0f64, f64::min);

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(80)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..labels.len() as f64, y_min..(y_max * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().min(20))
        .x_label_formatter(&|x| {
            labels
                .get(x.floor() as usize)
                .cloned()
                .unwrap_or_default()
        })
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        Rectangle::new(
            [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, *v)],
            BLUE.mix(0.6).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

pub fn histogram(
    path: &Path,
    size: (u32, u32),
    caption: &str,
    x_desc: &str,
    values: &[f64],
    bins: usize,
) -> PlotResult {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    if values.is_empty() {
        root.present()?;
        return Ok(());
    }

    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let width = span / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min..(min + span), 0f64..(y_max * 1.1))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("count")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, c)| {
        let x0 = min + i as f64 * width;
        Rectangle::new([(x0, 0.0), (x0 + width, *c as f64)], BLUE.mix(0.6).filled())
    }))?;

    root.present()?;
    Ok(())
}

pub fn line_chart(
    path: &Path,
    size: (u32, u32),
    caption: &str,
    y_desc: &str,
    labels: &[String],
    series: &[(&str, &[f64])],
) -> PlotResult {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let n = labels.len();
    let mut y_max = f64::MIN;
    let mut y_min = f64::MAX;
    for (_, values) in series {
        for v in *values {
            y_max = y_max.max(*v);
            y_min = y_min.min(*v);
        }
    }
    if n == 0 || y_max < y_min {
        root.present()?;
        return Ok(());
    }
    let pad = ((y_max - y_min) * 0.05).max(1e-9);

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..(n.max(2) - 1) as f64, (y_min - pad)..(y_max + pad))?;

    chart
        .configure_mesh()
        .x_labels(n.min(12))
        .x_label_formatter(&|x| {
            labels
                .get(x.round() as usize)
                .cloned()
                .unwrap_or_default()
        })
        .y_desc(y_desc)
        .draw()?;

    let palette = [BLUE, RED, GREEN, MAGENTA];
    for (idx, (name, values)) in series.iter().enumerate() {
        let color = palette[idx % palette.len()];
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect();
        chart
            .draw_series(LineSeries::new(points, color))?
            .label(*name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

pub fn heatmap(
    path: &Path,
    size: (u32, u32),
    caption: &str,
    labels: &[String],
    matrix: &[Vec<Option<f64>>],
) -> PlotResult {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let n = labels.len();
    if n == 0 {
        root.present()?;
        return Ok(());
    }

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(100)
        .y_label_area_size(100)
        .build_cartesian_2d(0f64..n as f64, 0f64..n as f64)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n.min(20))
        .y_labels(n.min(20))
        .x_label_formatter(&|x| {
            labels
                .get(x.floor() as usize)
                .cloned()
                .unwrap_or_default()
        })
        .y_label_formatter(&|y| {
            // row 0 is drawn at the top
            let i = n.saturating_sub(1).saturating_sub(y.floor() as usize);
            labels.get(i).cloned().unwrap_or_default()
        })
        .draw()?;

    chart.draw_series(matrix.iter().enumerate().flat_map(|(i, row)| {
        row.iter().enumerate().map(move |(j, v)| {
            let color = match v {
                Some(v) => diverging_color(*v),
                None => RGBColor(230, 230, 230),
            };
            let y0 = (n - 1 - i) as f64;
            Rectangle::new([(j as f64, y0), (j as f64 + 1.0, y0 + 1.0)], color.filled())
        })
    }))?;

    root.present()?;
    Ok(())
}

pub fn boxplot(path: &Path, size: (u32, u32), caption: &str, mut values: Vec<f64>) -> PlotResult {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    if values.len() < 5 {
        root.present()?;
        return Ok(());
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile_sorted(&values, 0.25);
    let med = quantile_sorted(&values, 0.5);
    let q3 = quantile_sorted(&values, 0.75);
    let iqr = q3 - q1;
    let lo = values
        .iter()
        .copied()
        .find(|v| *v >= q1 - 1.5 * iqr)
        .unwrap_or(q1);
    let hi = values
        .iter()
        .rev()
        .copied()
        .find(|v| *v <= q3 + 1.5 * iqr)
        .unwrap_or(q3);

    let span = (values[values.len() - 1] - values[0]).max(1e-9);
    let x_min = values[0] - span * 0.05;
    let x_max = values[values.len() - 1] + span * 0.05;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(20)
        .build_cartesian_2d(x_min..x_max, 0f64..1f64)?;

    chart.configure_mesh().disable_y_mesh().draw()?;

    chart.draw_series(std::iter::once(Rectangle::new(
        [(q1, 0.3), (q3, 0.7)],
        BLUE.mix(0.4).filled(),
    )))?;
    for (a, b) in [
        ((med, 0.3), (med, 0.7)),
        ((lo, 0.5), (q1, 0.5)),
        ((q3, 0.5), (hi, 0.5)),
        ((lo, 0.4), (lo, 0.6)),
        ((hi, 0.4), (hi, 0.6)),
    ] {
        chart.draw_series(std::iter::once(PathElement::new(vec![a, b], BLACK)))?;
    }

    root.present()?;
    Ok(())
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    // R-7 interpolation over a pre-sorted slice
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Blue → white → red over [-1, 1].
fn diverging_color(v: f64) -> RGBColor {
    let v = v.clamp(-1.0, 1.0);
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    if v < 0.0 {
        let t = -v;
        RGBColor(lerp(255, 59, t), lerp(255, 76, t), lerp(255, 192, t))
    } else {
        RGBColor(lerp(255, 198, v), lerp(255, 45, v), lerp(255, 37, v))
    }
}
