use strum_macros::{Display, EnumIter, EnumString};

/// Which half of the image is kept and mirrored onto the other half.
///
/// `Left` keeps the left half and reflects it onto the right, `Top` keeps the
/// top half and reflects it onto the bottom. `Right` and `Bottom` are the
/// opposite policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    /// Plain "mirror" requests map here
    #[default]
    #[strum(to_string = "left", serialize = "l", serialize = "mirror")]
    Left,
    #[strum(to_string = "right", serialize = "r")]
    Right,
    #[strum(to_string = "top", serialize = "t", serialize = "up", serialize = "u")]
    Top,
    #[strum(to_string = "bottom", serialize = "b", serialize = "down", serialize = "d")]
    Bottom,
}

/// The axis a direction splits the image along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Split into left/right halves at `floor(W/2)`
    Horizontal,
    /// Split into top/bottom halves at `floor(H/2)`
    Vertical,
}

impl Direction {
    pub fn axis(self) -> Axis {
        match self {
            Direction::Left | Direction::Right => Axis::Horizontal,
            Direction::Top | Direction::Bottom => Axis::Vertical,
        }
    }

    /// True when the source half is the leading one (left or top).
    pub fn source_is_leading(self) -> bool {
        match self {
            Direction::Left | Direction::Top => true,
            Direction::Right | Direction::Bottom => false,
        }
    }

    /// Length of the split axis for an image of the given size.
    pub fn axis_len(self, width: u32, height: u32) -> u32 {
        match self.axis() {
            Axis::Horizontal => width,
            Axis::Vertical => height,
        }
    }

    /// The midline index: `floor(len / 2)` along this direction's axis.
    pub fn split_point(self, width: u32, height: u32) -> u32 {
        self.axis_len(width, height) / 2
    }

    /// Half-open range `[start, end)` of the source half along the axis.
    pub fn source_span(self, len: u32) -> (u32, u32) {
        let mid = len / 2;
        if self.source_is_leading() {
            (0, mid)
        } else {
            (mid, len)
        }
    }

    /// Index along the axis whose pixel ends up at `pos` in the output.
    ///
    /// Positions inside the source half map to themselves. Destination
    /// positions map to their reflection `len - 1 - pos`; for odd lengths
    /// with a leading source, the middle line takes the reflected pixel
    /// adjacent to it (`mid - 1`).
    pub fn source_index(self, len: u32, pos: u32) -> u32 {
        let mid = len / 2;
        if mid == 0 {
            return pos;
        }

        let (start, end) = self.source_span(len);
        if (start..end).contains(&pos) {
            return pos;
        }

        if self.source_is_leading() {
            (len - 1 - pos).min(mid - 1)
        } else {
            len - 1 - pos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_direction_from_str() {
        assert_eq!(Direction::from_str("left").unwrap(), Direction::Left);
        assert_eq!(Direction::from_str("L").unwrap(), Direction::Left);
        assert_eq!(Direction::from_str("mirror").unwrap(), Direction::Left);
        assert_eq!(Direction::from_str("Right").unwrap(), Direction::Right);
        assert_eq!(Direction::from_str("up").unwrap(), Direction::Top);
        assert_eq!(Direction::from_str("DOWN").unwrap(), Direction::Bottom);
        assert!(Direction::from_str("diagonal").is_err());
    }

    #[test]
    fn test_direction_display_round_trips() {
        for direction in Direction::iter() {
            let name = direction.to_string();
            assert_eq!(Direction::from_str(&name).unwrap(), direction);
        }
        assert_eq!(Direction::Bottom.to_string(), "bottom");
    }

    #[test]
    fn test_axis_and_split_point() {
        assert_eq!(Direction::Left.axis(), Axis::Horizontal);
        assert_eq!(Direction::Bottom.axis(), Axis::Vertical);
        assert_eq!(Direction::Left.split_point(5, 8), 2);
        assert_eq!(Direction::Right.split_point(5, 8), 2);
        assert_eq!(Direction::Top.split_point(5, 8), 4);
        assert_eq!(Direction::Bottom.split_point(5, 7), 3);
    }

    #[test]
    fn test_source_span() {
        assert_eq!(Direction::Left.source_span(5), (0, 2));
        assert_eq!(Direction::Right.source_span(5), (2, 5));
        assert_eq!(Direction::Top.source_span(4), (0, 2));
        assert_eq!(Direction::Bottom.source_span(4), (2, 4));
        assert_eq!(Direction::Left.source_span(1), (0, 0));
    }

    #[test]
    fn test_source_index_odd_width_left() {
        // W=5: columns [0,1] are the source, [2,3,4] receive [1,1,0]
        let mapped: Vec<u32> = (0..5).map(|x| Direction::Left.source_index(5, x)).collect();
        assert_eq!(mapped, vec![0, 1, 1, 1, 0]);
    }

    #[test]
    fn test_source_index_odd_width_right() {
        // The middle column belongs to the right half, so it is kept
        let mapped: Vec<u32> = (0..5).map(|x| Direction::Right.source_index(5, x)).collect();
        assert_eq!(mapped, vec![4, 3, 2, 3, 4]);
    }

    #[test]
    fn test_source_index_even_length() {
        let top: Vec<u32> = (0..4).map(|y| Direction::Top.source_index(4, y)).collect();
        assert_eq!(top, vec![0, 1, 1, 0]);
        let bottom: Vec<u32> = (0..4).map(|y| Direction::Bottom.source_index(4, y)).collect();
        assert_eq!(bottom, vec![3, 2, 2, 3]);
    }

    #[test]
    fn test_source_index_degenerate_length() {
        for direction in Direction::iter() {
            assert_eq!(direction.source_index(1, 0), 0);
        }
    }
}
