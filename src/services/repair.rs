use std::ops::AddAssign;

use serde::Serialize;

use crate::config::CryptoConfig;
use crate::crypto::{envelope, ForensicHit, ForensicKeySearch, KeyResolver};
use crate::models::Task;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub scanned: usize,
    pub from_shadow: usize,
    pub from_key_search: usize,
    pub from_raw_bytes: usize,
    pub placeholders: usize,
}

impl RepairReport {
    /// Records whose title changed.
    pub fn touched(&self) -> usize {
        self.from_shadow + self.from_key_search + self.from_raw_bytes + self.placeholders
    }
}

impl AddAssign for RepairReport {
    fn add_assign(&mut self, other: Self) {
        self.scanned += other.scanned;
        self.from_shadow += other.from_shadow;
        self.from_key_search += other.from_key_search;
        self.from_raw_bytes += other.from_raw_bytes;
        self.placeholders += other.placeholders;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Healthy,
    Shadow,
    KeySearch,
    RawBytes,
    Placeholder,
}

/// Best-effort recovery of titles lost to historical key mistakes.
///
/// Targets tasks whose title is a failure marker, or still an envelope with
/// no shadow copy. Each record is handled on its own; nothing one record does
/// can stop the rest of the batch.
#[derive(Debug, Clone)]
pub struct RepairPass {
    resolver: KeyResolver,
    search: ForensicKeySearch,
}

impl RepairPass {
    pub fn new(resolver: KeyResolver, search: ForensicKeySearch) -> Self {
        Self { resolver, search }
    }

    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(KeyResolver::from_config(config), ForensicKeySearch::from_config(config))
    }

    /// Full pass, forensic key search included. Maintenance only.
    pub fn repair(&self, tasks: &mut [Task]) -> RepairReport {
        self.run(tasks, true)
    }

    /// Read-path variant: shadow copy and configured keys only, otherwise the
    /// placeholder. Never guesses keys or accepts raw ciphertext bytes.
    pub fn recover_on_read(&self, tasks: &mut [Task]) -> RepairReport {
        self.run(tasks, false)
    }

    fn run(&self, tasks: &mut [Task], forensic: bool) -> RepairReport {
        let mut report = RepairReport::default();
        for task in tasks.iter_mut() {
            report.scanned += 1;
            match self.repair_one(task, forensic) {
                Outcome::Healthy => {}
                Outcome::Shadow => report.from_shadow += 1,
                Outcome::KeySearch => report.from_key_search += 1,
                Outcome::RawBytes => report.from_raw_bytes += 1,
                Outcome::Placeholder => report.placeholders += 1,
            }
        }
        report
    }

    fn repair_one(&self, task: &mut Task, forensic: bool) -> Outcome {
        let wrapped = match envelope::strip_failure_marker(&task.title) {
            Some(inner) => inner.to_string(),
            None if task.shadow().is_none() && envelope::looks_like_envelope(&task.title) => {
                task.title.clone()
            }
            None => return Outcome::Healthy,
        };

        if let Some(shadow) = task.shadow() {
            let shadow = shadow.to_string();
            task.set_recovered_title(shadow);
            return Outcome::Shadow;
        }

        if let Ok(plaintext) = self.resolver.resolve(&wrapped) {
            task.set_recovered_title(plaintext);
            return Outcome::KeySearch;
        }

        let hit = if forensic { self.search.search(&wrapped) } else { None };
        match hit {
            Some(ForensicHit::KeySearch(plaintext)) => {
                tracing::info!("Recovered task {} title by key search", task.id);
                task.set_recovered_title(plaintext);
                Outcome::KeySearch
            }
            Some(ForensicHit::RawBytes(text)) => {
                tracing::info!("Recovered task {} title from raw ciphertext bytes", task.id);
                task.set_recovered_title(text);
                Outcome::RawBytes
            }
            None => {
                tracing::warn!("Task {} title unrecoverable, assigning placeholder", task.id);
                task.set_recovered_title(task.placeholder_title());
                Outcome::Placeholder
            }
        }
    }
}
