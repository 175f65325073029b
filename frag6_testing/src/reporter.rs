//! ICMP reporter that keeps everything it is given.

use std::sync::{Arc, Mutex};

use frag6::icmp::{IcmpErrorKind, IcmpReport, IcmpReporter};

/// Cloneable reporter whose clones share one record of reports.
///
/// Install one clone on the domain and keep another to inspect what the
/// domain reported.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<IcmpReport>>>,
}

impl RecordingReporter {
    pub fn new() -> Self { Self::default() }

    /// Remove and return every report recorded so far.
    pub fn take(&self) -> Vec<IcmpReport> { std::mem::take(&mut *self.lock()) }

    /// Kinds of the reports recorded so far, oldest first.
    pub fn kinds(&self) -> Vec<IcmpErrorKind> {
        self.lock().iter().map(IcmpReport::kind).collect()
    }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<IcmpReport>> {
        self.reports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl IcmpReporter for RecordingReporter {
    fn report(&self, report: IcmpReport) { self.lock().push(report); }
}
