//! 离散事件计时器：用可取消的虚拟时钟代替真实延时。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

pub type TimerId = u64;

/// 到期的计时器。`generation` 为调度时的阶段代数，由调用方判断是否过期。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer<K> {
    pub id: TimerId,
    pub due_ms: u64,
    pub generation: u64,
    pub kind: K,
}

#[derive(Debug, Clone)]
struct TimerItem<K> {
    id: TimerId,
    due_ms: u64,
    generation: u64,
    kind: K,
}

impl<K> PartialEq for TimerItem<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for TimerItem<K> {}

impl<K> PartialOrd for TimerItem<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for TimerItem<K> {
    // BinaryHeap 是最大堆，反转后最早到期、最先登记的排在堆顶。
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    now_ms: u64,
    next_id: TimerId,
    heap: BinaryHeap<TimerItem<K>>,
    cancelled: HashSet<TimerId>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
        }
    }
}

impl<K> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, generation: u64, kind: K) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        self.heap.push(TimerItem {
            id,
            due_ms: self.now_ms.saturating_add(delay_ms),
            generation,
            kind,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) {
        if self.heap.iter().any(|item| item.id == id) {
            self.cancelled.insert(id);
        }
    }

    /// 取出下一个不晚于 `until_ms` 到期的计时器，并把时钟推进到它的到期时间。
    pub fn pop_due(&mut self, until_ms: u64) -> Option<FiredTimer<K>> {
        loop {
            let due = self.heap.peek().map(|item| item.due_ms)?;
            if due > until_ms {
                return None;
            }
            let item = self.heap.pop()?;
            if self.cancelled.remove(&item.id) {
                continue;
            }
            self.now_ms = self.now_ms.max(item.due_ms);
            return Some(FiredTimer {
                id: item.id,
                due_ms: item.due_ms,
                generation: item.generation,
                kind: item.kind,
            });
        }
    }

    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn pending(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order_then_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(300, 0, "late");
        scheduler.schedule(100, 0, "first");
        scheduler.schedule(100, 0, "second");

        let fired: Vec<&str> = std::iter::from_fn(|| scheduler.pop_due(1_000))
            .map(|timer| timer.kind)
            .collect();
        assert_eq!(fired, vec!["first", "second", "late"]);
        assert_eq!(scheduler.now_ms(), 300);
    }

    #[test]
    fn nothing_fires_before_its_due_time() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(3_000, 7, ());
        assert!(scheduler.pop_due(2_999).is_none());
        let fired = scheduler.pop_due(3_000).expect("timer is due");
        assert_eq!(fired.generation, 7);
        assert_eq!(fired.due_ms, 3_000);
    }

    #[test]
    fn cancelled_timers_are_skipped() {
        let mut scheduler = Scheduler::new();
        let stale = scheduler.schedule(10, 0, 1);
        scheduler.schedule(20, 0, 2);
        scheduler.cancel(stale);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.pop_due(100).map(|timer| timer.kind), Some(2));
        assert!(scheduler.pop_due(100).is_none());
    }

    #[test]
    fn delays_are_relative_to_the_clock() {
        let mut scheduler = Scheduler::new();
        scheduler.set_now(5_000);
        scheduler.schedule(1_000, 0, ());
        assert!(scheduler.pop_due(5_999).is_none());
        assert!(scheduler.pop_due(6_000).is_some());
    }
}
