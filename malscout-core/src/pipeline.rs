//! Concurrent enrichment pipeline
//!
//! Fans a candidate set out across the description source on a bounded
//! worker pool and collects the hits into a report. Lookup failures cost only
//! their own entry; the run as a whole always completes.

use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::lookup::{DescriptionSource, LookupError};

/// Default number of concurrent lookup workers.
pub const DEFAULT_CONCURRENCY: usize = 12;

/// Progress notifications emitted while a run is in flight.
///
/// `Started` and `Finished` bracket the run; in between, every candidate name
/// resolves to exactly one `Hit`, `Miss` or `LookupFailed`, emitted after its
/// lookup completes. Completion order follows the network, not the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    Hit { name: String, description: String },
    Miss { name: String },
    LookupFailed { name: String, message: String },
    Finished { hits: usize },
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Worker pool size for concurrent lookups.
    pub concurrency: usize,
    /// Emit `Miss` events. Hits and errors are always reported.
    pub verbose: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            verbose: false,
        }
    }
}

enum TaskOutcome {
    Resolved(String, Result<Option<String>, LookupError>),
    Skipped,
}

/// Fetch descriptions for every candidate name and collect the hits.
///
/// Lookups run on a worker pool of `options.concurrency` (minimum 1);
/// completions are consumed in arrival order by a single collector, which
/// owns all writes to the report and the progress channel. Cancelling
/// `cancel` skips pending names and abandons in-flight lookups; skipped
/// names emit no event. A dropped progress receiver discards events without
/// affecting the run.
pub async fn fetch_descriptions<S>(
    source: &S,
    names: &BTreeSet<String>,
    options: &PipelineOptions,
    cancel: &CancellationToken,
    progress: Option<mpsc::Sender<ProgressEvent>>,
) -> BTreeMap<String, String>
where
    S: DescriptionSource + ?Sized,
{
    let total = names.len();
    emit(&progress, ProgressEvent::Started { total }).await;

    let mut completions = stream::iter(names.iter().cloned())
        .map(|name| {
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return TaskOutcome::Skipped;
                }
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => None,
                    outcome = source.lookup(&name) => Some(outcome),
                };
                match outcome {
                    Some(outcome) => TaskOutcome::Resolved(name, outcome),
                    None => TaskOutcome::Skipped,
                }
            }
        })
        .buffer_unordered(options.concurrency.max(1));

    let mut report = BTreeMap::new();
    while let Some(completion) = completions.next().await {
        match completion {
            TaskOutcome::Resolved(name, Ok(Some(description)))
                if !description.trim().is_empty() =>
            {
                tracing::info!(name = %name, "hit");
                report.insert(name.clone(), description.clone());
                emit(&progress, ProgressEvent::Hit { name, description }).await;
            }
            TaskOutcome::Resolved(name, Ok(_)) => {
                tracing::debug!(name = %name, "miss");
                if options.verbose {
                    emit(&progress, ProgressEvent::Miss { name }).await;
                }
            }
            TaskOutcome::Resolved(name, Err(e)) => {
                tracing::warn!(name = %name, error = %e, "lookup failed");
                emit(
                    &progress,
                    ProgressEvent::LookupFailed {
                        name,
                        message: e.to_string(),
                    },
                )
                .await;
            }
            TaskOutcome::Skipped => {}
        }
    }

    emit(
        &progress,
        ProgressEvent::Finished {
            hits: report.len(),
        },
    )
    .await;
    report
}

async fn emit(progress: &Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Hit(&'static str),
        Miss,
        Fail(&'static str),
    }

    struct MockSource {
        behaviors: HashMap<&'static str, Behavior>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn new(behaviors: &[(&'static str, Behavior)]) -> Self {
            Self {
                behaviors: behaviors.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DescriptionSource for MockSource {
        async fn lookup(&self, name: &str) -> Result<Option<String>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviors.get(name) {
                Some(Behavior::Hit(description)) => Ok(Some((*description).to_string())),
                Some(Behavior::Fail(message)) => Err(LookupError::Network((*message).to_string())),
                _ => Ok(None),
            }
        }
    }

    fn name_set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    async fn run(
        source: &MockSource,
        names: &BTreeSet<String>,
        options: PipelineOptions,
    ) -> (BTreeMap<String, String>, Vec<ProgressEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let report = fetch_descriptions(source, names, &options, &cancel, Some(tx)).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (report, events)
    }

    #[tokio::test]
    async fn collects_hits_and_isolates_failures() {
        let source = MockSource::new(&[
            ("CreateRemoteThread", Behavior::Hit("desc1")),
            ("VirtualAlloc", Behavior::Fail("connection reset")),
            ("Foo", Behavior::Miss),
        ]);
        let names = name_set(&["CreateRemoteThread", "VirtualAlloc", "Foo"]);

        let options = PipelineOptions {
            verbose: true,
            ..Default::default()
        };
        let (report, events) = run(&source, &names, options).await;

        assert_eq!(report.len(), 1);
        assert_eq!(report["CreateRemoteThread"], "desc1");

        assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 3 }));
        assert_eq!(events.last(), Some(&ProgressEvent::Finished { hits: 1 }));

        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::LookupFailed { name, .. } if name == "VirtualAlloc"))
            .collect();
        assert_eq!(errors.len(), 1);

        let misses: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Miss { name } if name == "Foo"))
            .collect();
        assert_eq!(misses.len(), 1);

        let hits = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Hit { .. }))
            .count();
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn misses_are_silent_without_verbose() {
        let source = MockSource::new(&[("Known", Behavior::Hit("d")), ("Unknown", Behavior::Miss)]);
        let names = name_set(&["Known", "Unknown"]);

        let (report, events) = run(&source, &names, PipelineOptions::default()).await;

        assert_eq!(report.len(), 1);
        assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Miss { .. })));
    }

    #[tokio::test]
    async fn report_is_independent_of_worker_pool_size() {
        let behaviors: &[(&str, Behavior)] = &[
            ("A1", Behavior::Hit("a")),
            ("B2", Behavior::Hit("b")),
            ("C3", Behavior::Miss),
            ("D4", Behavior::Fail("boom")),
            ("E5", Behavior::Hit("e")),
            ("F6", Behavior::Miss),
        ];
        let names = name_set(&["A1", "B2", "C3", "D4", "E5", "F6"]);

        let serial_source = MockSource::new(behaviors);
        let serial = fetch_descriptions(
            &serial_source,
            &names,
            &PipelineOptions {
                concurrency: 1,
                verbose: false,
            },
            &CancellationToken::new(),
            None,
        )
        .await;

        let parallel_source = MockSource::new(behaviors);
        let parallel = fetch_descriptions(
            &parallel_source,
            &names,
            &PipelineOptions {
                concurrency: 12,
                verbose: false,
            },
            &CancellationToken::new(),
            None,
        )
        .await;

        assert_eq!(serial, parallel);
        assert_eq!(serial.len(), 3);
    }

    #[tokio::test]
    async fn empty_candidate_set_completes_without_lookups() {
        let source = MockSource::new(&[]);
        let names = BTreeSet::new();

        let (report, events) = run(&source, &names, PipelineOptions::default()).await;

        assert!(report.is_empty());
        assert_eq!(
            events,
            vec![
                ProgressEvent::Started { total: 0 },
                ProgressEvent::Finished { hits: 0 }
            ]
        );
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_skips_all_lookups() {
        let source = MockSource::new(&[("X", Behavior::Hit("x"))]);
        let names = name_set(&["X", "Y", "Z"]);

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = fetch_descriptions(
            &source,
            &names,
            &PipelineOptions::default(),
            &cancel,
            Some(tx),
        )
        .await;

        assert!(report.is_empty());
        assert_eq!(source.calls(), 0);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Started { total: 3 },
                ProgressEvent::Finished { hits: 0 }
            ]
        );
    }

    #[tokio::test]
    async fn blank_descriptions_are_never_stored() {
        struct BlankSource;

        #[async_trait]
        impl DescriptionSource for BlankSource {
            async fn lookup(&self, _name: &str) -> Result<Option<String>, LookupError> {
                Ok(Some("   ".to_string()))
            }
        }

        let names = name_set(&["Anything"]);
        let report = fetch_descriptions(
            &BlankSource,
            &names,
            &PipelineOptions::default(),
            &CancellationToken::new(),
            None,
        )
        .await;

        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn report_keys_are_a_subset_of_the_candidate_set() {
        let source = MockSource::new(&[("A1", Behavior::Hit("a")), ("B2", Behavior::Hit("b"))]);
        let names = name_set(&["A1", "B2", "C3"]);

        let (report, _) = run(&source, &names, PipelineOptions::default()).await;

        assert!(report.keys().all(|k| names.contains(k)));
    }

    #[tokio::test]
    async fn dropped_progress_receiver_does_not_abort_the_run() {
        let source = MockSource::new(&[("A1", Behavior::Hit("a")), ("B2", Behavior::Hit("b"))]);
        let names = name_set(&["A1", "B2"]);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let report = fetch_descriptions(
            &source,
            &names,
            &PipelineOptions::default(),
            &CancellationToken::new(),
            Some(tx),
        )
        .await;

        assert_eq!(report.len(), 2);
    }
}
