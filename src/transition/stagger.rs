use crate::style::Rect;

/// Start delays for a batch of nodes entering together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaggerFunction {
    pub step_ms: u32,
    pub cap_ms: u32,
}

impl Default for StaggerFunction {
    fn default() -> Self {
        Self::new(40, 400)
    }
}

impl StaggerFunction {
    pub const fn new(step_ms: u32, cap_ms: u32) -> Self {
        Self { step_ms, cap_ms }
    }

    /// One delay per slot, in slot order. Slots are ranked top to bottom,
    /// then left to right; equal slots keep their input order.
    pub fn delays(&self, slots: &[Rect]) -> Vec<u32> {
        let mut order: Vec<usize> = (0..slots.len()).collect();
        order.sort_by(|&a, &b| {
            slots[a]
                .y
                .total_cmp(&slots[b].y)
                .then(slots[a].x.total_cmp(&slots[b].x))
        });

        let mut delays = vec![0; slots.len()];
        for (rank, index) in order.into_iter().enumerate() {
            let rank = u32::try_from(rank).unwrap_or(u32::MAX);
            delays[index] = rank.saturating_mul(self.step_ms).min(self.cap_ms);
        }
        delays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slots_are_ranked_by_row_then_column() {
        let slots = [
            Rect::new(50.0, 10.0, 10.0, 10.0),
            Rect::new(0.0, 10.0, 10.0, 10.0),
            Rect::new(90.0, 0.0, 10.0, 10.0),
        ];
        assert_eq!(StaggerFunction::new(30, 1000).delays(&slots), vec![60, 30, 0]);
    }

    #[test]
    fn delays_stop_at_the_cap() {
        let slots: Vec<Rect> = (0..5)
            .map(|row| Rect::new(0.0, row as f32 * 20.0, 10.0, 10.0))
            .collect();
        assert_eq!(StaggerFunction::new(50, 120).delays(&slots), vec![0, 50, 100, 120, 120]);
    }
}
