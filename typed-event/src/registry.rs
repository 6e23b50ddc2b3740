//! 订阅表（SubscriptionTable）
//!
//! 按插入顺序保存监听器及其 `once` 标记：
//! - 每个槽位持有单调递增的序号，派发按序号升序遍历；
//! - 以 `ListenerId` 建立索引，同一监听器至多占用一个槽位；
//! - 重复订阅保留原位置，仅覆盖 `once` 标记。
//!
use crate::listener::{Listener, ListenerId};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

struct Slot<T> {
    listener: Listener<T>,
    once: bool,
}

pub(crate) struct SubscriptionTable<T> {
    next_seq: u64,
    slots: BTreeMap<u64, Slot<T>>,
    index: HashMap<ListenerId, u64>,
}

impl<T> Default for SubscriptionTable<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            slots: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> SubscriptionTable<T> {
    /// 插入或覆盖 `once` 标记，返回是否为新增
    pub(crate) fn insert(&mut self, listener: &Listener<T>, once: bool) -> bool {
        if let Some(seq) = self.index.get(&listener.id()) {
            if let Some(slot) = self.slots.get_mut(seq) {
                slot.once = once;
            }
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(listener.id(), seq);
        self.slots.insert(
            seq,
            Slot {
                listener: listener.clone(),
                once,
            },
        );
        true
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        match self.index.remove(&id) {
            Some(seq) => self.slots.remove(&seq).is_some(),
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.index.contains_key(&id)
    }

    pub(crate) fn is_once(&self, id: ListenerId) -> Option<bool> {
        let seq = self.index.get(&id)?;
        self.slots.get(seq).map(|slot| slot.once)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    /// 下一个将要分配的序号；派发开始时记录，之后新增的槽位不在本次派发范围内
    pub(crate) fn watermark(&self) -> u64 {
        self.next_seq
    }

    /// 取出序号位于 `(after, upper)` 区间的第一个监听器；`once` 槽位在返回前即被移除
    pub(crate) fn take_next(
        &mut self,
        after: Option<u64>,
        upper: u64,
    ) -> Option<(u64, Listener<T>)> {
        let lower = match after {
            Some(seq) => Bound::Excluded(seq),
            None => Bound::Unbounded,
        };
        let (&seq, slot) = self
            .slots
            .range((lower, Bound::Excluded(upper)))
            .next()?;
        let listener = slot.listener.clone();

        if slot.once {
            self.slots.remove(&seq);
            self.index.remove(&listener.id());
        }
        Some((seq, listener))
    }
}
