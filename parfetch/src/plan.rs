use std::fmt;

use crate::config::DownloadConfig;
use crate::probe::ResourceDescriptor;

/// One contiguous, inclusive byte range owned by exactly one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ChunkSpec {
    /// Number of bytes in the range; never zero.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Why a download was kept on a single stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SingleReason {
    ProbeUnavailable,
    UnknownSize,
    TooSmall,
    RangesUnsupported,
    SingleWorker,
}

impl fmt::Display for SingleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SingleReason::ProbeUnavailable => "probe unavailable",
            SingleReason::UnknownSize => "size unknown",
            SingleReason::TooSmall => "resource fits in one buffer",
            SingleReason::RangesUnsupported => "server does not accept byte ranges",
            SingleReason::SingleWorker => "one worker is enough",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Single(SingleReason),
    Multi,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadPlan {
    pub strategy: Strategy,
    pub total_size: Option<u64>,
    /// Empty for single-stream plans.
    pub chunks: Vec<ChunkSpec>,
}

impl DownloadPlan {
    fn single(reason: SingleReason, total_size: Option<u64>) -> Self {
        Self {
            strategy: Strategy::Single(reason),
            total_size,
            chunks: Vec::new(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self.strategy, Strategy::Multi)
    }
}

/// Picks the download strategy for a probed resource. The first matching
/// rule wins:
///
/// 1. the probe failed
/// 2. the size is unknown
/// 3. the whole resource fits in one read buffer
/// 4. the server does not accept byte ranges
/// 5. the computed worker count is one
///
/// all keep a single stream; anything else is split across workers.
pub fn plan(descriptor: &ResourceDescriptor, config: &DownloadConfig) -> DownloadPlan {
    if !descriptor.status_ok {
        return DownloadPlan::single(SingleReason::ProbeUnavailable, None);
    }
    let total = match descriptor.total_size {
        Some(total) if total > 0 => total,
        _ => return DownloadPlan::single(SingleReason::UnknownSize, None),
    };
    if total <= config.buffer_size() {
        return DownloadPlan::single(SingleReason::TooSmall, Some(total));
    }
    if !descriptor.supports_ranges {
        return DownloadPlan::single(SingleReason::RangesUnsupported, Some(total));
    }

    let workers = thread_count(total, config);
    if workers <= 1 {
        return DownloadPlan::single(SingleReason::SingleWorker, Some(total));
    }

    DownloadPlan {
        strategy: Strategy::Multi,
        total_size: Some(total),
        chunks: partition(total, workers),
    }
}

/// `ceil(total / max_bytes_per_thread)`, capped at `max_threads` and never
/// below one.
pub fn thread_count(total: u64, config: &DownloadConfig) -> usize {
    let natural = total.div_ceil(config.max_bytes_per_thread());
    let capped = natural.min(config.max_threads() as u64);
    capped.max(1) as usize
}

/// Splits `[0, total)` into `count` inclusive ranges of `total / count`
/// bytes; the last range also takes the remainder.
pub fn partition(total: u64, count: usize) -> Vec<ChunkSpec> {
    if total == 0 {
        return Vec::new();
    }
    let count = (count.max(1) as u64).min(total);
    let per_chunk = total / count;
    (0..count)
        .map(|index| {
            let start = index * per_chunk;
            let end = if index + 1 == count {
                total - 1
            } else {
                (index + 1) * per_chunk - 1
            };
            ChunkSpec {
                index: index as usize,
                start,
                end,
            }
        })
        .collect()
}
