//! Traffic statistics extraction
//!
//! Runs the eight metric queries and the top-talkers query against one
//! capture. The queries are independent reads of an immutable file, so they
//! run concurrently on a rayon pool; results are joined and validated before
//! anything downstream sees them. One failed metric fails the whole pass.

use std::collections::HashMap;
use std::path::Path;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::capture::{CaptureReader, TrafficFilter};
use crate::error::{ForensicError, ForensicResult};

use super::record::{TopTalker, TrafficCounters};

/// Number of top talkers kept by default
pub const DEFAULT_TOP_TALKERS: usize = 5;

/// Aggregates that survive extraction. No packet content is retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficStatistics {
    pub total_packets: u64,
    pub counters: TrafficCounters,
    pub top_talkers: Vec<TopTalker>,
}

/// Most frequent sources, descending by count, at most `limit` entries.
/// Equal counts keep first-seen order.
pub fn top_talkers<I, S>(sources: I, limit: usize) -> Vec<TopTalker>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut order: Vec<TopTalker> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for source in sources {
        let source = source.as_ref();
        if source.is_empty() {
            continue;
        }
        match index.get(source) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(source.to_string(), order.len());
                order.push(TopTalker { address: source.to_string(), count: 1 });
            }
        }
    }

    // sort_by is stable, so ties stay in first-seen order
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(limit);
    order
}

/// Drives a `CaptureReader` over one capture file
pub struct StatisticsExtractor<'r> {
    reader: &'r dyn CaptureReader,
    pool: ThreadPool,
    top_limit: usize,
}

impl<'r> StatisticsExtractor<'r> {
    pub fn new(reader: &'r dyn CaptureReader, threads: usize, top_limit: usize) -> ForensicResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("nft-extract-{}", i))
            .build()
            .map_err(|e| ForensicError::Config(format!("extraction pool: {}", e)))?;
        Ok(Self { reader, pool, top_limit })
    }

    #[instrument(skip(self), fields(path = %capture.display()))]
    pub fn extract(&self, capture: &Path) -> ForensicResult<TrafficStatistics> {
        let reader = self.reader;

        let (counts, sources) = self.pool.install(|| {
            rayon::join(
                || {
                    TrafficFilter::ALL
                        .par_iter()
                        .map(|&filter| reader.count(capture, filter).map(|n| (filter, n)))
                        .collect::<ForensicResult<Vec<(TrafficFilter, u64)>>>()
                },
                || reader.source_addresses(capture),
            )
        });

        let counts = counts?;
        let sources = sources?;

        let lookup: HashMap<TrafficFilter, u64> = counts.into_iter().collect();
        let get = |filter: TrafficFilter| {
            lookup.get(&filter).copied().ok_or_else(|| {
                ForensicError::extraction(filter.name(), "metric missing from result set")
            })
        };

        let stats = TrafficStatistics {
            total_packets: get(TrafficFilter::All)?,
            counters: TrafficCounters {
                tcp: get(TrafficFilter::Tcp)?,
                udp: get(TrafficFilter::Udp)?,
                http: get(TrafficFilter::Http)?,
                syn: get(TrafficFilter::Syn)?,
                syn_ack: get(TrafficFilter::SynAck)?,
                ack: get(TrafficFilter::Ack)?,
                syn_without_ack: get(TrafficFilter::SynWithoutAck)?,
            },
            top_talkers: top_talkers(&sources, self.top_limit),
        };

        debug!(
            total = stats.total_packets,
            tcp = stats.counters.tcp,
            udp = stats.counters.udp,
            talkers = stats.top_talkers.len(),
            "Statistics extracted"
        );
        Ok(stats)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted reader returning fixed counts, optionally failing one metric
    pub struct ScriptedReader {
        pub counts: HashMap<TrafficFilter, u64>,
        pub sources: Vec<String>,
        pub fail_on: Option<TrafficFilter>,
        pub calls: AtomicUsize,
    }

    impl ScriptedReader {
        pub fn new(counts: &[(TrafficFilter, u64)], sources: &[&str]) -> Self {
            Self {
                counts: counts.iter().copied().collect(),
                sources: sources.iter().map(|s| s.to_string()).collect(),
                fail_on: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(mut self, filter: TrafficFilter) -> Self {
            self.fail_on = Some(filter);
            self
        }
    }

    impl CaptureReader for ScriptedReader {
        fn count(&self, _capture: &Path, filter: TrafficFilter) -> ForensicResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(filter) {
                return Err(ForensicError::extraction(filter.name(), "reader returned garbage"));
            }
            Ok(self.counts.get(&filter).copied().unwrap_or(0))
        }

        fn source_addresses(&self, _capture: &Path) -> ForensicResult<Vec<String>> {
            Ok(self.sources.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedReader;
    use super::*;

    #[test]
    fn test_top_talkers_sorted_and_truncated() {
        let mut sources = Vec::new();
        for (addr, n) in [("a", 3), ("b", 9), ("c", 1), ("d", 7), ("e", 5), ("f", 2), ("g", 8)] {
            for _ in 0..n {
                sources.push(addr);
            }
        }
        let top = top_talkers(&sources, 5);
        let got: Vec<(&str, u64)> = top.iter().map(|t| (t.address.as_str(), t.count)).collect();
        assert_eq!(got, vec![("b", 9), ("g", 8), ("d", 7), ("e", 5), ("a", 3)]);
    }

    #[test]
    fn test_top_talkers_ties_keep_first_seen_order() {
        let sources = ["x", "y", "z", "z", "y", "x", "w"];
        let top = top_talkers(sources, 5);
        let got: Vec<&str> = top.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(got, vec!["x", "y", "z", "w"]);
        assert!(top.iter().take(3).all(|t| t.count == 2));
    }

    #[test]
    fn test_top_talkers_ignores_empty_sources() {
        assert!(top_talkers(["", ""], 5).is_empty());
    }

    #[test]
    fn test_extract_collects_all_metrics() {
        let reader = ScriptedReader::new(
            &[
                (TrafficFilter::All, 200),
                (TrafficFilter::Tcp, 150),
                (TrafficFilter::Udp, 50),
                (TrafficFilter::Http, 40),
                (TrafficFilter::Syn, 100),
                (TrafficFilter::SynAck, 5),
                (TrafficFilter::Ack, 60),
                (TrafficFilter::SynWithoutAck, 95),
            ],
            &["10.0.0.1.1", "10.0.0.2.2", "10.0.0.1.1"],
        );
        let extractor = StatisticsExtractor::new(&reader, 4, DEFAULT_TOP_TALKERS).unwrap();
        let stats = extractor.extract(Path::new("capture.pcap")).unwrap();

        assert_eq!(stats.total_packets, 200);
        assert_eq!(stats.counters.syn_ack, 5);
        assert_eq!(stats.counters.syn_without_ack, 95);
        assert_eq!(stats.top_talkers[0], TopTalker { address: "10.0.0.1.1".into(), count: 2 });
    }

    #[test]
    fn test_any_failed_metric_fails_extraction() {
        for filter in TrafficFilter::ALL {
            let reader = ScriptedReader::new(&[(TrafficFilter::All, 10)], &["a"]).failing(filter);
            let extractor = StatisticsExtractor::new(&reader, 2, 5).unwrap();
            let err = extractor.extract(Path::new("capture.pcap")).unwrap_err();
            assert_eq!(err.kind(), "ExtractionError", "filter {}", filter.name());
        }
    }
}
