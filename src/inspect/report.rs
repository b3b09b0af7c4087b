//! Inspect report types and terminal formatting.

use std::fmt;

use crate::dataset::ImageId;

/// The result of inspecting a dataset.
#[derive(Clone, Debug)]
pub struct InspectReport {
    pub summary: SummarySection,
    pub labels: LabelsSection,
    pub bboxes: BBoxStats,
    /// Present when masks were rasterized.
    pub masks: Option<MaskStats>,
}

/// Record and annotation counts.
#[derive(Clone, Debug, Default)]
pub struct SummarySection {
    pub images: usize,
    pub categories: usize,
    pub annotations: usize,
    /// Annotations stored as polygons (`iscrowd = 0`).
    pub polygon_annotations: usize,
    /// Total polygons over all polygon annotations.
    pub polygons: usize,
    /// Annotations stored as run-length masks (`iscrowd = 1`).
    pub crowd_annotations: usize,
    /// Images without annotations; expansion copies these without variants.
    pub unannotated: Vec<ImageId>,
}

/// Label distribution section.
#[derive(Clone, Debug)]
pub struct LabelsSection {
    pub top_n: usize,
    pub total_distinct: usize,
    pub total_annotations: usize,
    /// Top labels, count descending.
    pub entries: Vec<LabelCount>,
    /// Sum of counts for labels not in the top N.
    pub other_count: usize,
}

#[derive(Clone, Debug)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Bounding box sanity checks.
#[derive(Clone, Debug, Default)]
pub struct BBoxStats {
    pub total: usize,
    pub finite: usize,
    /// Zero or negative width or height.
    pub degenerate_area: usize,
    /// Extends past the image edges by more than the tolerance.
    pub out_of_bounds: usize,
    pub min_width: Option<f64>,
    pub max_width: Option<f64>,
    pub min_height: Option<f64>,
    pub max_height: Option<f64>,
}

/// Instance-mask statistics.
#[derive(Clone, Debug, Default)]
pub struct MaskStats {
    /// Images whose volume was built.
    pub images: usize,
    pub instances: usize,
    /// Largest volume depth.
    pub max_depth: usize,
    /// Instances without a single foreground pixel.
    pub empty_instances: usize,
    pub foreground_pixels: u64,
}

const BAR_WIDTH: usize = 20;

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset Inspection Report")?;
        writeln!(f, "=========================")?;
        writeln!(f)?;
        self.fmt_summary(f)?;
        writeln!(f)?;
        self.fmt_labels(f)?;
        writeln!(f)?;
        self.fmt_bboxes(f)?;
        if let Some(masks) = &self.masks {
            writeln!(f)?;
            fmt_masks(f, masks)?;
        }
        Ok(())
    }
}

impl InspectReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "Summary")?;
        writeln!(f, "  Images:          {:>8}", format_number(s.images))?;
        writeln!(f, "  Categories:      {:>8}", format_number(s.categories))?;
        writeln!(f, "  Annotations:     {:>8}", format_number(s.annotations))?;
        writeln!(
            f,
            "    polygon:       {:>8}  ({} polygons)",
            format_number(s.polygon_annotations),
            format_number(s.polygons)
        )?;
        writeln!(f, "    crowd (RLE):   {:>8}", format_number(s.crowd_annotations))?;

        let annotated = s.images - s.unannotated.len().min(s.images);
        writeln!(
            f,
            "  Annotated:       {:>8} of {} ({})",
            format_number(annotated),
            format_number(s.images),
            fmt_percent(annotated, s.images)
        )?;
        if !s.unannotated.is_empty() {
            let shown: Vec<String> = s.unannotated.iter().take(5).map(|id| id.to_string()).collect();
            let more = if s.unannotated.len() > 5 { ", ..." } else { "" };
            writeln!(f, "  Without annotations: {}{}", shown.join(", "), more)?;
        }
        Ok(())
    }

    fn fmt_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.labels;
        if l.total_distinct > l.top_n {
            writeln!(f, "Labels (top {} of {})", l.top_n, l.total_distinct)?;
        } else {
            writeln!(f, "Labels ({})", l.total_distinct)?;
        }

        if l.entries.is_empty() {
            return writeln!(f, "  No annotations found.");
        }

        let max_count = l.entries.iter().map(|e| e.count).max().unwrap_or(1);
        for entry in &l.entries {
            writeln!(
                f,
                "  {:<16} {:>7} {:>6}  {}",
                truncate_label(&entry.label, 16),
                format_number(entry.count),
                fmt_percent(entry.count, l.total_annotations),
                render_bar(entry.count, max_count, BAR_WIDTH)
            )?;
        }
        if l.other_count > 0 {
            writeln!(
                f,
                "  {:<16} {:>7} {:>6}  {}",
                "(other)",
                format_number(l.other_count),
                fmt_percent(l.other_count, l.total_annotations),
                render_bar(l.other_count, max_count, BAR_WIDTH)
            )?;
        }
        Ok(())
    }

    fn fmt_bboxes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bboxes;
        writeln!(f, "Bounding Boxes")?;
        if b.total == 0 {
            return writeln!(f, "  No bounding boxes found.");
        }

        if let (Some(min_w), Some(max_w), Some(min_h), Some(max_h)) =
            (b.min_width, b.max_width, b.min_height, b.max_height)
        {
            writeln!(f, "  Width  (px):  min {min_w:>8.1}  max {max_w:>8.1}")?;
            writeln!(f, "  Height (px):  min {min_h:>8.1}  max {max_h:>8.1}")?;
        }

        let non_finite = b.total - b.finite;
        if b.degenerate_area == 0 && b.out_of_bounds == 0 && non_finite == 0 {
            return writeln!(f, "  No issues detected");
        }
        for (label, count) in [
            ("Degenerate area", b.degenerate_area),
            ("Out of bounds", b.out_of_bounds),
            ("Non-finite coords", non_finite),
        ] {
            if count > 0 {
                writeln!(
                    f,
                    "  ! {:<18} {:>7} / {:>7}  ({})",
                    label,
                    format_number(count),
                    format_number(b.total),
                    fmt_percent(count, b.total)
                )?;
            }
        }
        Ok(())
    }
}

fn fmt_masks(f: &mut fmt::Formatter<'_>, m: &MaskStats) -> fmt::Result {
    writeln!(f, "Masks")?;
    writeln!(f, "  Images rasterized: {:>8}", format_number(m.images))?;
    writeln!(f, "  Instances:         {:>8}", format_number(m.instances))?;
    writeln!(f, "  Max depth:         {:>8}", m.max_depth)?;
    if m.instances > 0 {
        writeln!(
            f,
            "  Mean area (px):    {:>8.1}",
            m.foreground_pixels as f64 / m.instances as f64
        )?;
    }
    if m.empty_instances > 0 {
        writeln!(f, "  ! Empty instances: {:>8}", format_number(m.empty_instances))?;
    }
    Ok(())
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a percentage, handling zero denominators.
fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }
    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let head: String = label.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
