/// Margin-based bubble grid: one row per question, one column per option.
///
/// Production sheets would anchor this on timing marks; the margin layout
/// mirrors the reference sheet geometry (10% horizontal, 15% vertical
/// margins).
#[derive(Clone, Copy, Debug)]
pub struct BubbleGrid {
    pub margin_x: usize,
    pub margin_y: usize,
    pub bubble_width: usize,
    pub bubble_height: usize,
    pub options: u32,
}

const MARGIN_X_RATIO: f64 = 0.1;
const MARGIN_Y_RATIO: f64 = 0.15;

impl BubbleGrid {
    pub fn layout(width: u32, height: u32, total_questions: u32, options_per_question: u32) -> Self {
        let margin_x = (width as f64 * MARGIN_X_RATIO) as usize;
        let margin_y = (height as f64 * MARGIN_Y_RATIO) as usize;
        let usable_width = width as usize - 2 * margin_x;
        let usable_height = height as usize - 2 * margin_y;

        Self {
            margin_x,
            margin_y,
            bubble_width: usable_width / options_per_question.max(1) as usize,
            bubble_height: usable_height / total_questions.max(1) as usize,
            options: options_per_question,
        }
    }

    /// Pixel rectangle `(x0, y0, x1, y1)` of one bubble cell, clamped to the
    /// image. `question_number` is 1-based, `option_index` 0-based.
    pub fn bubble_rect(
        &self,
        question_number: u32,
        option_index: u32,
        width: u32,
        height: u32,
    ) -> (usize, usize, usize, usize) {
        let x0 = self.margin_x + option_index as usize * self.bubble_width;
        let y0 = self.margin_y + (question_number as usize - 1) * self.bubble_height;
        let x1 = (x0 + self.bubble_width).min(width as usize);
        let y1 = (y0 + self.bubble_height).min(height as usize);
        (x0.min(x1), y0.min(y1), x1, y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_divides_usable_area() {
        let grid = BubbleGrid::layout(100, 80, 4, 4);
        assert_eq!(grid.margin_x, 10);
        assert_eq!(grid.margin_y, 12);
        assert_eq!(grid.bubble_width, 20);
        assert_eq!(grid.bubble_height, 14);
    }

    #[test]
    fn rects_tile_without_overlap() {
        let grid = BubbleGrid::layout(100, 80, 4, 4);
        let (x0, y0, x1, y1) = grid.bubble_rect(1, 0, 100, 80);
        assert_eq!((x0, y0, x1, y1), (10, 12, 30, 26));

        let (nx0, ..) = grid.bubble_rect(1, 1, 100, 80);
        assert_eq!(nx0, x1);

        let (_, ny0, ..) = grid.bubble_rect(2, 0, 100, 80);
        assert_eq!(ny0, y1);
    }
}
