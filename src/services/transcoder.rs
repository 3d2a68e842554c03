use std::sync::Arc;

use serde::Serialize;

use crate::config::CryptoConfig;
use crate::crypto::{envelope, KeyResolver, TitleCipher};
use crate::models::Task;

/// Anything that holds zero or more tasks: one task, a slice, a list, or
/// an absent value.
pub trait TaskRecords {
    fn for_each_task(&mut self, f: &mut dyn FnMut(&mut Task));
}

impl TaskRecords for Task {
    fn for_each_task(&mut self, f: &mut dyn FnMut(&mut Task)) {
        f(self)
    }
}

impl TaskRecords for [Task] {
    fn for_each_task(&mut self, f: &mut dyn FnMut(&mut Task)) {
        self.iter_mut().for_each(|task| f(task))
    }
}

impl TaskRecords for Vec<Task> {
    fn for_each_task(&mut self, f: &mut dyn FnMut(&mut Task)) {
        self.as_mut_slice().for_each_task(f)
    }
}

impl<T: TaskRecords> TaskRecords for Option<T> {
    fn for_each_task(&mut self, f: &mut dyn FnMut(&mut Task)) {
        if let Some(inner) = self {
            inner.for_each_task(f)
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub from_shadow: usize,
    pub decrypted: usize,
    pub placeholders: usize,
    /// Titles carrying a failure marker, left for the repair pass.
    pub markers: usize,
}

/// Applies title encryption to task records on the way to and from storage.
#[derive(Debug, Clone)]
pub struct TaskTranscoder {
    cipher: Arc<TitleCipher>,
    resolver: Arc<KeyResolver>,
}

impl TaskTranscoder {
    pub fn new(cipher: TitleCipher, resolver: KeyResolver) -> Self {
        Self {
            cipher: Arc::new(cipher),
            resolver: Arc::new(resolver),
        }
    }

    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(TitleCipher::from_config(config), KeyResolver::from_config(config))
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    pub fn encryption_enabled(&self) -> bool {
        self.cipher.is_enabled()
    }

    /// Encrypt plaintext titles, stamping the plaintext into `plain_title`
    /// first. Titles that are already envelopes are left alone.
    ///
    /// With encryption disabled titles stay plaintext and any shadow copy is
    /// dropped, since it would only go stale when the title is edited.
    /// Returns the number of titles encrypted.
    pub fn encode_for_storage<R: TaskRecords + ?Sized>(&self, records: &mut R) -> usize {
        let mut encrypted = 0;
        records.for_each_task(&mut |task| {
            if envelope::is_well_formed(&task.title) {
                return;
            }
            if !self.cipher.is_enabled() {
                task.plain_title = None;
                return;
            }
            task.plain_title = Some(task.title.clone());
            task.title = self.cipher.encrypt(&task.title);
            encrypted += 1;
        });
        encrypted
    }

    /// Restore plaintext titles for in-memory use.
    ///
    /// The shadow copy wins when present. Otherwise envelopes go through the
    /// key resolver; a recovered title is written to both fields and a lost
    /// one becomes `"Task <id>"` in both fields. Records are modified in place.
    pub fn decode_for_use<R: TaskRecords + ?Sized>(&self, records: &mut R) -> DecodeReport {
        let mut report = DecodeReport::default();
        records.for_each_task(&mut |task| {
            if let Some(shadow) = task.shadow() {
                if task.title != shadow {
                    task.title = shadow.to_string();
                }
                report.from_shadow += 1;
                return;
            }

            if envelope::strip_failure_marker(&task.title).is_some() {
                report.markers += 1;
                return;
            }

            if !envelope::looks_like_envelope(&task.title) {
                return;
            }

            match self.resolver.resolve(&task.title) {
                Ok(plaintext) => {
                    task.set_recovered_title(plaintext);
                    report.decrypted += 1;
                }
                Err(err) => {
                    tracing::warn!("Task {} title unrecoverable on read: {}", task.id, err);
                    task.set_recovered_title(task.placeholder_title());
                    report.placeholders += 1;
                }
            }
        });
        report
    }
}
