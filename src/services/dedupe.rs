use std::collections::HashSet;

use crate::models::Task;

/// Collapse a task list to one record per `id`.
///
/// The first occurrence of each id wins and survivors keep their relative
/// order. Every layer that accepts or loads a task list goes through here so
/// the policy is the same everywhere.
pub fn dedupe(tasks: Vec<Task>) -> Vec<Task> {
    dedupe_counted(tasks).0
}

/// [`dedupe`] plus the number of records discarded.
pub fn dedupe_counted(tasks: Vec<Task>) -> (Vec<Task>, usize) {
    let total = tasks.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(total);

    let unique: Vec<Task> = tasks
        .into_iter()
        .filter(|task| seen.insert(task.id.clone()))
        .collect();

    let discarded = total - unique.len();
    (unique, discarded)
}
