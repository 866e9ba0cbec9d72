use crate::{
    error::{RenderError, RenderResult},
    frame::frame_counter::FrameCounter,
};

/// frame slot 上用于等待 GPU 完成的同步对象
pub trait SlotFence {
    /// 阻塞等待，直到该 slot 上一次提交的命令执行完毕
    fn wait(&self) -> RenderResult<()>;

    /// 提交前重置为未触发状态
    fn reset(&self) -> RenderResult<()>;
}

/// frame slot 的状态
///
/// Idle -> Recording -> Submitted -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// 可以开始录制；上一次提交（如果有）已经完成
    Idle,
    /// 正在录制命令
    Recording,
    /// 已经提交，GPU 可能仍在使用该 slot 的资源
    Submitted,
}

/// 固定数量的 frame slot 组成的环
///
/// 每一帧使用 `frame_id % slot_count` 号 slot，slot 只有在上一次提交完成后才会被再次交出
pub struct FrameRing<S: SlotFence> {
    slots: Vec<S>,
    states: Vec<SlotState>,
    counter: FrameCounter,
}

// new & init
impl<S: SlotFence> FrameRing<S> {
    pub fn new(slots: Vec<S>) -> Self {
        debug_assert!(!slots.is_empty());
        let counter = FrameCounter::new(0, slots.len());
        Self {
            states: vec![SlotState::Idle; slots.len()],
            slots,
            counter,
        }
    }
}

// update
impl<S: SlotFence> FrameRing<S> {
    /// 取得当前帧的 slot；如果该 slot 仍在 GPU 上执行，会先等待其完成
    pub fn acquire_slot(&mut self) -> RenderResult<usize> {
        let slot_index = self.counter.slot_index();
        match self.states[slot_index] {
            SlotState::Idle => {}
            SlotState::Submitted => {
                self.slots[slot_index].wait()?;
                self.states[slot_index] = SlotState::Idle;
            }
            SlotState::Recording => {
                return Err(RenderError::SlotState {
                    slot: slot_index,
                    expected: SlotState::Idle,
                    actual: SlotState::Recording,
                });
            }
        }
        Ok(slot_index)
    }

    pub fn begin_recording(&mut self, slot_index: usize) -> RenderResult<()> {
        self.transition(slot_index, SlotState::Idle, SlotState::Recording)
    }

    /// 重置 fence 并通过 `submit` 提交，成功后进入下一帧
    ///
    /// 提交失败时 slot 回到 Idle，下次使用时不会等待一个永远不会触发的 fence
    pub fn submit_with(&mut self, slot_index: usize, submit: impl FnOnce(&S) -> RenderResult<()>) -> RenderResult<()> {
        self.submit_inner(slot_index, submit)?;
        self.counter.next_frame();
        Ok(())
    }

    /// 录制失败，但交换链图像已经获取时使用
    ///
    /// `release` 需要提交一个等待 image-acquired semaphore 并触发 fence 的 batch，
    /// 之后 slot 与普通提交一样处于 Submitted。帧序号不前进
    pub fn release_with(
        &mut self,
        slot_index: usize,
        release: impl FnOnce(&S) -> RenderResult<()>,
    ) -> RenderResult<()> {
        self.submit_inner(slot_index, release)
    }

    /// 等待所有已提交的 slot 完成
    pub fn drain(&mut self) -> RenderResult<()> {
        for (slot, state) in self.slots.iter().zip(self.states.iter_mut()) {
            if *state == SlotState::Submitted {
                slot.wait()?;
                *state = SlotState::Idle;
            }
        }
        Ok(())
    }
}

// getter
impl<S: SlotFence> FrameRing<S> {
    #[inline]
    pub fn slot(&self, slot_index: usize) -> &S {
        &self.slots[slot_index]
    }

    #[inline]
    pub fn slots(&self) -> &[S] {
        &self.slots
    }

    #[inline]
    pub fn state(&self, slot_index: usize) -> SlotState {
        self.states[slot_index]
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn counter(&self) -> &FrameCounter {
        &self.counter
    }

    /// 交出所有 slot 用于销毁，调用前需要先 [`Self::drain`]
    pub fn into_slots(self) -> Vec<S> {
        self.slots
    }
}

// tools
impl<S: SlotFence> FrameRing<S> {
    fn expect_state(&self, slot_index: usize, expected: SlotState) -> RenderResult<()> {
        let actual = self.states[slot_index];
        if actual != expected {
            return Err(RenderError::SlotState {
                slot: slot_index,
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn submit_inner(&mut self, slot_index: usize, submit: impl FnOnce(&S) -> RenderResult<()>) -> RenderResult<()> {
        self.expect_state(slot_index, SlotState::Recording)?;

        let slot = &self.slots[slot_index];
        match slot.reset().and_then(|_| submit(slot)) {
            Ok(()) => {
                self.states[slot_index] = SlotState::Submitted;
                Ok(())
            }
            Err(e) => {
                self.states[slot_index] = SlotState::Idle;
                Err(e)
            }
        }
    }

    fn transition(&mut self, slot_index: usize, from: SlotState, to: SlotState) -> RenderResult<()> {
        self.expect_state(slot_index, from)?;
        self.states[slot_index] = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// GPU 上的工作在被 wait 时才完成
    #[derive(Default)]
    struct FakeSlot {
        in_flight: Cell<bool>,
        /// 交换链获取图像时触发，被某次提交等待后清除
        acquire_signaled: Cell<bool>,
        waits: Cell<u32>,
        resets: Cell<u32>,
    }
    impl SlotFence for FakeSlot {
        fn wait(&self) -> RenderResult<()> {
            self.waits.set(self.waits.get() + 1);
            self.in_flight.set(false);
            Ok(())
        }

        fn reset(&self) -> RenderResult<()> {
            self.resets.set(self.resets.get() + 1);
            Ok(())
        }
    }

    fn ring(n: usize) -> FrameRing<FakeSlot> {
        FrameRing::new((0..n).map(|_| FakeSlot::default()).collect())
    }

    fn render(ring: &mut FrameRing<FakeSlot>) -> usize {
        let slot = ring.acquire_slot().unwrap();
        assert!(!ring.slot(slot).in_flight.get(), "slot {} handed out while in flight", slot);
        ring.begin_recording(slot).unwrap();
        ring.submit_with(slot, |s| {
            s.in_flight.set(true);
            Ok(())
        })
        .unwrap();
        slot
    }

    #[test]
    fn slots_are_not_reused_before_completion() {
        const N: usize = 3;
        let mut ring = ring(N);

        let used = (0..2 * N).map(|_| render(&mut ring)).collect::<Vec<_>>();
        assert_eq!(used, vec![0, 1, 2, 0, 1, 2]);

        // 第一轮不需要等待，第二轮每个 slot 都等待了一次
        assert!(ring.slots().iter().all(|s| s.waits.get() == 1 && s.resets.get() == 2));
        assert!((0..N).all(|i| ring.state(i) == SlotState::Submitted));
        assert_eq!(ring.counter().frame_id(), 2 * N as u64);
    }

    #[test]
    fn drain_waits_every_submitted_slot() {
        let mut ring = ring(2);
        render(&mut ring);

        ring.drain().unwrap();
        assert_eq!(ring.slot(0).waits.get(), 1);
        assert_eq!(ring.slot(1).waits.get(), 0);
        assert!((0..2).all(|i| ring.state(i) == SlotState::Idle));
        assert_eq!(ring.into_slots().len(), 2);
    }

    #[test]
    fn skipped_frame_keeps_slot_idle() {
        let mut ring = ring(2);
        let slot = ring.acquire_slot().unwrap();
        // 交换链过期：不录制也不提交，下一次仍然使用同一个 slot
        assert_eq!(ring.state(slot), SlotState::Idle);
        assert_eq!(ring.acquire_slot().unwrap(), slot);
        assert_eq!(ring.slot(slot).resets.get(), 0);
    }

    #[test]
    fn failed_submit_returns_slot_to_idle() {
        let mut ring = ring(1);
        let slot = ring.acquire_slot().unwrap();
        ring.begin_recording(slot).unwrap();
        let result = ring.submit_with(slot, |_| Err(RenderError::EmptyPrimitive(0)));

        assert!(result.is_err());
        assert_eq!(ring.state(slot), SlotState::Idle);
        assert_eq!(ring.counter().frame_id(), 0);
        ring.acquire_slot().unwrap();
        assert_eq!(ring.slot(slot).waits.get(), 0);
    }

    #[test]
    fn failed_record_consumes_the_acquire_semaphore() {
        let mut ring = ring(2);
        let slot = ring.acquire_slot().unwrap();
        ring.slot(slot).acquire_signaled.set(true);
        ring.begin_recording(slot).unwrap();

        // 录制失败：只提交一个等待 semaphore 的 batch
        ring.release_with(slot, |s| {
            s.acquire_signaled.set(false);
            s.in_flight.set(true);
            Ok(())
        })
        .unwrap();

        assert!(!ring.slot(slot).acquire_signaled.get());
        assert_eq!(ring.state(slot), SlotState::Submitted);
        assert_eq!(ring.slot(slot).resets.get(), 1);
        assert_eq!(ring.counter().frame_id(), 0);

        // 同一个 slot 再次使用前会等待这次提交完成
        assert_eq!(ring.acquire_slot().unwrap(), slot);
        assert_eq!(ring.slot(slot).waits.get(), 1);
        assert!(!ring.slot(slot).in_flight.get());
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut ring = ring(1);
        assert!(matches!(
            ring.submit_with(0, |_| Ok(())),
            Err(RenderError::SlotState {
                expected: SlotState::Recording,
                actual: SlotState::Idle,
                ..
            })
        ));

        ring.begin_recording(0).unwrap();
        assert!(ring.acquire_slot().is_err());
        assert!(ring.begin_recording(0).is_err());

        // release 失败后 slot 回到 Idle
        assert!(ring.release_with(0, |_| Err(RenderError::EmptyPrimitive(0))).is_err());
        assert_eq!(ring.state(0), SlotState::Idle);
    }
}
