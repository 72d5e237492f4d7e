//! Column widths, row heights and image stacking

use crate::types::Column;
use std::collections::HashMap;

pub const DATE_COLUMN_WIDTH: f64 = 22.0;
pub const FIELD_COLUMN_WIDTH: f64 = 30.0;

/// `Row | Column | Original URL | Embedded Part`
pub const ATTACHMENT_COLUMN_WIDTHS: [f64; 4] = [10.0, 28.0, 60.0, 32.0];

pub const MIN_IMAGE_ROW_HEIGHT_PT: f64 = 60.0;

/// Excel refuses rows taller than this
pub const MAX_ROW_HEIGHT_PT: f64 = 409.0;

pub const IMAGE_STACK_GAP_PX: u32 = 4;
pub const NOTICE_ROW_HEIGHT_PT: f64 = 24.0;

pub const EMU_PER_PIXEL: u64 = 9525;

/// Screen pixels (96 dpi) to points, rounded to hundredths
pub fn pixels_to_points(px: u32) -> f64 {
    (px as f64 * 72.0 / 96.0 * 100.0).round() / 100.0
}

pub fn pixels_to_emu(px: u32) -> u64 {
    px as u64 * EMU_PER_PIXEL
}

pub fn clamp_row_height(points: f64) -> f64 {
    points.min(MAX_ROW_HEIGHT_PT)
}

pub fn column_width(column: &Column) -> f64 {
    if column.is_submission_date() {
        DATE_COLUMN_WIDTH
    } else {
        FIELD_COLUMN_WIDTH
    }
}

/// Where an image lands inside its cell and how tall the row must be
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub row_offset_px: u32,
    pub row_height_pt: f64,
}

/// Tracks stacked image height per `(row, column)` cell.
///
/// Each image is placed below the previous ones in the same cell; the row
/// grows to fit the stack with a 60pt floor. The first image of a cell is
/// always placed (its row is clamped at 409pt); a later image that would end
/// below that limit is refused so it never spills into the next row.
#[derive(Debug, Default)]
pub struct ImageStacker {
    used_px: HashMap<(u32, u32), u32>,
}

impl ImageStacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, row: u32, column: u32, height_px: u32) -> Option<Placement> {
        let used = self.used_px.entry((row, column)).or_insert(0);
        let row_offset_px = *used;
        let bottom = row_offset_px.saturating_add(height_px);
        if row_offset_px > 0 && pixels_to_points(bottom) > MAX_ROW_HEIGHT_PT {
            return None;
        }
        *used = bottom.saturating_add(IMAGE_STACK_GAP_PX);

        Some(Placement {
            row_offset_px,
            row_height_pt: clamp_row_height(pixels_to_points(bottom).max(MIN_IMAGE_ROW_HEIGHT_PT)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(pixels_to_points(96), 72.0);
        assert_eq!(pixels_to_points(120), 90.0);
        assert_eq!(pixels_to_points(1), 0.75);
        assert_eq!(pixels_to_emu(10), 95_250);
    }

    #[test]
    fn test_small_image_gets_floor_height() {
        let mut stacker = ImageStacker::new();
        let placement = stacker.place(2, 3, 20).unwrap();
        assert_eq!(placement.row_offset_px, 0);
        assert_eq!(placement.row_height_pt, MIN_IMAGE_ROW_HEIGHT_PT);
    }

    #[test]
    fn test_stacking_in_same_cell() {
        let mut stacker = ImageStacker::new();
        let first = stacker.place(2, 1, 100).unwrap();
        let second = stacker.place(2, 1, 100).unwrap();
        let other_cell = stacker.place(2, 2, 100).unwrap();

        assert_eq!(first.row_offset_px, 0);
        assert_eq!(second.row_offset_px, 104);
        assert_eq!(second.row_height_pt, 153.0);
        assert_eq!(other_cell.row_offset_px, 0);
    }

    #[test]
    fn test_height_is_clamped() {
        let mut stacker = ImageStacker::new();
        assert_eq!(stacker.place(2, 1, 2000).unwrap().row_height_pt, MAX_ROW_HEIGHT_PT);
        assert_eq!(stacker.place(2, 1, 10), None);
    }

    #[test]
    fn test_stack_stops_at_row_limit() {
        let mut stacker = ImageStacker::new();
        assert!(stacker.place(3, 1, 300).is_some());
        // 304 + 300 px would end at 453pt
        assert_eq!(stacker.place(3, 1, 300), None);

        // A refused image leaves room for a smaller one
        let third = stacker.place(3, 1, 200).unwrap();
        assert_eq!(third.row_offset_px, 304);
        assert_eq!(third.row_height_pt, 378.0);
    }
}
