/// 帧计数器，决定每一帧使用哪个 frame slot
pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    slot_count: usize,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, slot_count: usize) -> Self {
        debug_assert!(slot_count > 0);
        Self {
            frame_id: init_frame_id,
            slot_count: slot_count.max(1),
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[inline]
    pub fn slot_index(&self) -> usize {
        (self.frame_id % self.slot_count as u64) as usize
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}S{}]", self.frame_id, self.slot_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_cycles() {
        let mut counter = FrameCounter::new(0, 3);
        let slots = (0..7)
            .map(|_| {
                let slot = counter.slot_index();
                counter.next_frame();
                slot
            })
            .collect::<Vec<_>>();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(counter.frame_id(), 7);
    }

    #[test]
    fn frame_id_wraps() {
        let mut counter = FrameCounter::new(u64::MAX, 2);
        counter.next_frame();
        assert_eq!(counter.frame_id(), 0);
        assert_eq!(counter.slot_index(), 0);
    }

    #[test]
    fn frame_name_contains_slot() {
        let counter = FrameCounter::new(5, 3);
        assert_eq!(counter.frame_name(), "[F5S2]");
    }
}
