use std::{cmp::Ordering, collections::HashSet};

use crate::{
    registry::{DependentObjectInfo, DependentSchedulingHint},
    types::InternalIndex,
};

/// What the scheduler needs to know about objects beyond their priority.
pub trait SchedulingView {
    fn dependents(&self, index: InternalIndex) -> Vec<DependentObjectInfo>;
    /// Whether the object has anything to send right now.
    fn has_work(&self, index: InternalIndex) -> bool;
    /// Whether the object's initial state is still to be sent.
    fn needs_initial_state(&self, index: InternalIndex) -> bool;
}

/// Smallest priority strictly greater than `priority`.
pub fn priority_above(priority: f32) -> f32 {
    if !priority.is_finite() {
        return priority;
    }
    let priority = priority.max(0.0);
    f32::from_bits(priority.to_bits() + 1)
}

fn by_descending_priority(a: &(InternalIndex, f32), b: &(InternalIndex, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Drops candidates below `threshold` and keeps the `max_count` most urgent,
/// highest priority first. Only the kept part is fully sorted.
pub fn select_candidates(
    candidates: &mut Vec<(InternalIndex, f32)>,
    threshold: f32,
    max_count: usize,
) {
    candidates.retain(|(_, priority)| *priority >= threshold);
    if max_count == 0 {
        candidates.clear();
        return;
    }
    if candidates.len() > max_count {
        candidates.select_nth_unstable_by(max_count - 1, by_descending_priority);
        candidates.truncate(max_count);
    }
    candidates.sort_unstable_by(by_descending_priority);
}

fn schedules_before_parent(view: &impl SchedulingView, dependent: &DependentObjectInfo) -> bool {
    match dependent.hint {
        DependentSchedulingHint::Default => false,
        DependentSchedulingHint::ScheduleBeforeParent => true,
        DependentSchedulingHint::ScheduleBeforeParentIfInitialState => {
            view.needs_initial_state(dependent.index)
        }
    }
}

/// Expands the selected objects with their dependents: dependents hinted
/// to precede their parent come right before it with a priority just above
/// the parent's, the rest right after it with the parent's priority.
pub fn order_with_dependents(
    view: &impl SchedulingView,
    selected: &[(InternalIndex, f32)],
) -> Vec<(InternalIndex, f32)> {
    let mut output = Vec::with_capacity(selected.len());
    let mut emitted = HashSet::new();
    for (index, priority) in selected {
        emit(view, *index, *priority, &mut output, &mut emitted);
    }
    output
}

fn emit(
    view: &impl SchedulingView,
    index: InternalIndex,
    priority: f32,
    output: &mut Vec<(InternalIndex, f32)>,
    emitted: &mut HashSet<InternalIndex>,
) {
    if !emitted.insert(index) {
        return;
    }
    let dependents = view.dependents(index);
    let (before, after): (Vec<DependentObjectInfo>, Vec<DependentObjectInfo>) = dependents
        .into_iter()
        .filter(|dependent| view.has_work(dependent.index))
        .partition(|dependent| schedules_before_parent(view, dependent));

    let before_priority = priority_above(priority);
    for dependent in before {
        emit(view, dependent.index, before_priority, output, emitted);
    }
    output.push((index, priority));
    for dependent in after {
        emit(view, dependent.index, priority, output, emitted);
    }
}
