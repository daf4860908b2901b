/// Per-line text measurements from the font collaborator. `height` is the
/// extent above the baseline; `baseline` is the descender extent below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextMetrics {
    pub width: i32,
    pub height: i32,
    pub baseline: i32,
}

/// Caption placement knobs. Offsets may be absent; a non-negative offset
/// anchors to that edge, a negative one nudges away from center.
#[derive(Clone, Copy, Debug, Default)]
pub struct Placement {
    pub left: Option<i32>,
    pub right: Option<i32>,
    pub top: Option<i32>,
    pub bottom: Option<i32>,
    pub padding: i32,
    pub linespace: i32,
    /// Extend bottom-anchored captions and the background rect by the last
    /// line's descender.
    pub descender: bool,
}

/// One placed line: glyph origin (x at left edge, y at the baseline) and
/// the background-rect origin above it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePlacement {
    pub x: i32,
    pub y: i32,
    pub rect_x: i32,
    pub rect_y: i32,
    pub width: i32,
    pub height: i32,
    pub baseline: i32,
}

/// All lines of one caption plus the running bounding boxes over glyph and
/// rect coordinates. Computed fresh per caption.
#[derive(Clone, Debug)]
pub struct CaptionLayout {
    pub lines: Vec<LinePlacement>,
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub min_rect_x: i32,
    pub min_rect_y: i32,
    pub max_rect_x: i32,
    pub max_rect_y: i32,
}

/// Place every line of a caption on a frame. X and Y are resolved
/// independently: explicit non-negative offsets anchor to an edge (left and
/// top win over right and bottom), otherwise the text centers and negative
/// offsets shift it from center. Lines stack downward by
/// `height + linespace`.
pub fn layout_caption(
    frame_width: u32,
    frame_height: u32,
    metrics: &[TextMetrics],
    place: &Placement,
) -> CaptionLayout {
    let width = frame_width as i32;
    let height = frame_height as i32;
    let n_lines = metrics.len() as i32;
    let padding = place.padding;

    let mut lines = Vec::with_capacity(metrics.len());
    let mut lineheight = 0i32;

    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    let (mut min_rect_x, mut min_rect_y) = (i32::MAX, i32::MAX);
    let (mut max_rect_x, mut max_rect_y) = (i32::MIN, i32::MIN);

    for tm in metrics {
        let mut x = match (place.left, place.right) {
            (Some(left), _) if left >= 0 => left + padding,
            (_, Some(right)) if right >= 0 => width - tm.width - right - padding,
            _ => (width - tm.width) / 2,
        };
        if !anchored_x(place) {
            if let Some(left) = place.left.filter(|&v| v < 0) {
                x += left;
            } else if let Some(right) = place.right.filter(|&v| v < 0) {
                x -= right;
            }
        }

        let mut y = match (place.top, place.bottom) {
            (Some(top), _) if top >= 0 => tm.height + top + padding,
            (_, Some(bottom)) if bottom >= 0 => {
                let mut y = height - bottom - ((n_lines - 1) * (tm.height + place.linespace))
                    - padding;
                if place.descender {
                    y -= tm.baseline;
                }
                y
            }
            _ => (height + tm.height) / 2,
        };
        if !anchored_y(place) {
            if let Some(top) = place.top.filter(|&v| v < 0) {
                y += top;
            } else if let Some(bottom) = place.bottom.filter(|&v| v < 0) {
                y -= bottom;
            }
        }

        y += lineheight;
        lineheight += tm.height + place.linespace;

        let placed = LinePlacement {
            x,
            y,
            rect_x: x,
            rect_y: y - tm.height,
            width: tm.width,
            height: tm.height,
            baseline: tm.baseline,
        };

        min_x = min_x.min(placed.x);
        min_y = min_y.min(placed.y);
        max_x = max_x.max(placed.x + placed.width);
        max_y = max_y.max(placed.y + placed.height);
        min_rect_x = min_rect_x.min(placed.rect_x);
        min_rect_y = min_rect_y.min(placed.rect_y);
        max_rect_x = max_rect_x.max(placed.rect_x + placed.width);
        max_rect_y = max_rect_y.max(placed.rect_y + placed.height);

        lines.push(placed);
    }

    CaptionLayout {
        lines,
        min_x,
        min_y,
        max_x,
        max_y,
        min_rect_x,
        min_rect_y,
        max_rect_x,
        max_rect_y,
    }
}

fn anchored_x(place: &Placement) -> bool {
    place.left.is_some_and(|v| v >= 0) || place.right.is_some_and(|v| v >= 0)
}

fn anchored_y(place: &Placement) -> bool {
    place.top.is_some_and(|v| v >= 0) || place.bottom.is_some_and(|v| v >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tm(width: i32, height: i32, baseline: i32) -> TextMetrics {
        TextMetrics {
            width,
            height,
            baseline,
        }
    }

    #[test]
    fn left_top_anchor_adds_padding() {
        let place = Placement {
            left: Some(5),
            top: Some(10),
            padding: 4,
            ..Placement::default()
        };
        let layout = layout_caption(200, 100, &[tm(50, 20, 6)], &place);
        assert_eq!(layout.lines[0].x, 5 + 4);
        assert_eq!(layout.lines[0].y, 20 + 10 + 4);
    }

    #[test]
    fn unset_offsets_center_the_caption() {
        let place = Placement::default();
        let layout = layout_caption(200, 100, &[tm(50, 20, 6)], &place);
        assert_eq!(layout.lines[0].x, (200 - 50) / 2);
        assert_eq!(layout.lines[0].y, (100 + 20) / 2);
    }

    #[test]
    fn right_anchor_measures_from_the_far_edge() {
        let place = Placement {
            right: Some(10),
            padding: 2,
            ..Placement::default()
        };
        let layout = layout_caption(200, 100, &[tm(50, 20, 6)], &place);
        assert_eq!(layout.lines[0].x, 200 - 50 - 10 - 2);
    }

    #[test]
    fn negative_offsets_nudge_from_center() {
        let place = Placement {
            left: Some(-8),
            bottom: Some(-6),
            ..Placement::default()
        };
        let layout = layout_caption(200, 100, &[tm(50, 20, 6)], &place);
        assert_eq!(layout.lines[0].x, (200 - 50) / 2 - 8);
        assert_eq!(layout.lines[0].y, (100 + 20) / 2 + 6);
    }

    #[test]
    fn negative_left_wins_over_negative_right() {
        let place = Placement {
            left: Some(-8),
            right: Some(-3),
            ..Placement::default()
        };
        let layout = layout_caption(200, 100, &[tm(50, 20, 6)], &place);
        assert_eq!(layout.lines[0].x, (200 - 50) / 2 - 8);
    }

    #[test]
    fn lines_stack_by_height_plus_linespace() {
        let place = Placement {
            top: Some(0),
            linespace: 5,
            ..Placement::default()
        };
        let layout = layout_caption(200, 200, &[tm(40, 20, 6), tm(60, 20, 6)], &place);
        assert_eq!(layout.lines[1].y - layout.lines[0].y, 20 + 5);
    }

    #[test]
    fn bottom_anchor_accounts_for_stacked_height() {
        let place = Placement {
            bottom: Some(10),
            padding: 4,
            linespace: 2,
            ..Placement::default()
        };
        let layout = layout_caption(200, 300, &[tm(40, 20, 6), tm(60, 20, 6)], &place);
        // Last line's baseline sits at height - bottom - padding.
        assert_eq!(layout.lines[1].y, 300 - 10 - 4);
        assert_eq!(layout.lines[0].y, 300 - 10 - 4 - (20 + 2));
    }

    #[test]
    fn descender_lifts_bottom_anchored_text() {
        let base = Placement {
            bottom: Some(10),
            ..Placement::default()
        };
        let with = Placement {
            descender: true,
            ..base
        };
        let plain = layout_caption(200, 300, &[tm(40, 20, 6)], &base);
        let lifted = layout_caption(200, 300, &[tm(40, 20, 6)], &with);
        assert_eq!(plain.lines[0].y - lifted.lines[0].y, 6);
    }

    #[test]
    fn bbox_spans_all_lines() {
        let place = Placement {
            top: Some(0),
            ..Placement::default()
        };
        let layout = layout_caption(200, 200, &[tm(40, 20, 6), tm(80, 20, 6)], &place);
        assert_eq!(layout.min_x, (200 - 80) / 2);
        assert_eq!(layout.max_x, (200 - 80) / 2 + 80);
        assert_eq!(layout.min_rect_y, layout.lines[0].rect_y);
        assert_eq!(layout.max_y, layout.lines[1].y + 20);
    }
}
