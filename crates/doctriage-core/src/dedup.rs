//! Duplicate-family index and the degenerate-item filter.
//!
//! Items sharing a content fingerprint and exact byte size form a
//! *duplicate family*: one canonical source plus zero or more copies.
//! Families are ephemeral -- recomputed per analysis pass, never
//! persisted. The same module owns the filter that keeps degenerate items
//! (zero-size, oversized, corrupt-hash, temporary) out of both duplicate
//! accounting and the result cache.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use doctriage_types::WorkItem;

/// Files above this are excluded from duplicate accounting (2^48 bytes,
/// far beyond any plausible real file; sizes that large indicate corrupt
/// inventory metadata).
pub const SIZE_CEILING: u64 = 1 << 48;

/// Timestamp formats tried, in order, when electing a family source.
const TIMESTAMP_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

/// File extensions that mark scratch files.
const TEMP_EXTENSIONS: &[&str] = &[".tmp", ".temp", ".~"];

/// Why an item is excluded from caching and duplicate accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The file has zero bytes.
    ZeroSize,
    /// The recorded size exceeds [`SIZE_CEILING`].
    TooLarge,
    /// The fingerprint carries an error marker instead of a hash.
    HashError,
    /// The path has a temporary-file extension.
    TemporaryFile,
}

impl IgnoreReason {
    /// Stable string form persisted as the exclusion reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::ZeroSize => "zero_size_file",
            IgnoreReason::TooLarge => "file_too_large",
            IgnoreReason::HashError => "hash_error",
            IgnoreReason::TemporaryFile => "temporary_file",
        }
    }
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counts over a set of duplicate families.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateStats {
    /// Number of families (each has >1 member).
    pub total_families: usize,
    /// Total members across all families.
    pub total_duplicates: usize,
    /// One source per family.
    pub total_sources: usize,
    /// Members beyond the source of each family.
    pub total_copies: usize,
    /// Σ over families of (members − 1) × representative file size.
    pub space_wasted_bytes: u64,
    /// Size of the largest family.
    pub largest_family_size: usize,
    /// Histogram: family size → number of families of that size.
    pub families_by_size: HashMap<usize, usize>,
    /// Mean family size (0 when there are no families).
    pub average_family_size: f64,
}

/// Groups items into duplicate families and filters degenerate items.
#[derive(Debug, Default)]
pub struct DuplicateIndex;

impl DuplicateIndex {
    /// Create an index.
    pub fn new() -> Self {
        Self
    }

    /// First-match-wins filter for degenerate items. Returns the reason an
    /// item must bypass caching and duplicate accounting, or `None`.
    pub fn should_ignore(&self, item: &WorkItem) -> Option<IgnoreReason> {
        if item.file_size == 0 {
            return Some(IgnoreReason::ZeroSize);
        }
        if item.file_size > SIZE_CEILING {
            return Some(IgnoreReason::TooLarge);
        }
        if let Some(fingerprint) = &item.fingerprint {
            if fingerprint.to_ascii_uppercase().contains("ERROR") {
                warn!(path = %item.path, "fingerprint error marker detected");
                return Some(IgnoreReason::HashError);
            }
        }
        if let Some(ext) = item.extension() {
            if TEMP_EXTENSIONS.contains(&ext.as_str()) {
                return Some(IgnoreReason::TemporaryFile);
            }
        }
        None
    }

    /// Family key: fingerprint and size joined, or the fingerprint alone
    /// when the size is unknown.
    pub fn family_key(fingerprint: &str, size: Option<u64>) -> String {
        match size {
            Some(size) => format!("{fingerprint}_{size}"),
            None => fingerprint.to_string(),
        }
    }

    /// Group items into duplicate families.
    ///
    /// Ignored items and items without a usable fingerprint are skipped.
    /// Only groups with more than one member are returned.
    pub fn detect_families(&self, items: &[WorkItem]) -> HashMap<String, Vec<WorkItem>> {
        let mut families: HashMap<String, Vec<WorkItem>> = HashMap::new();
        for item in items {
            if let Some(reason) = self.should_ignore(item) {
                debug!(path = %item.path, reason = %reason, "skipping item");
                continue;
            }
            let Some(fingerprint) = item.fingerprint.as_deref() else {
                debug!(path = %item.path, "no fingerprint, skipping");
                continue;
            };
            if fingerprint.trim().is_empty() {
                continue;
            }
            let key = Self::family_key(fingerprint, Some(item.file_size));
            families.entry(key).or_default().push(item.clone());
        }
        families.retain(|_, members| members.len() > 1);
        families
    }

    /// Elect the canonical source of a family: the member with the
    /// earliest parseable creation timestamp.
    ///
    /// Unparsable or missing timestamps sort as infinitely late, so such a
    /// member is never chosen unless the whole family is unparsable, in
    /// which case the first member by input order wins. Returns `None`
    /// only for an empty group.
    pub fn identify_source<'a>(&self, group: &'a [WorkItem]) -> Option<&'a WorkItem> {
        if group.len() <= 1 {
            return group.first();
        }
        group.iter().min_by_key(|item| {
            let parsed = item
                .creation_time
                .as_deref()
                .and_then(parse_creation_time);
            (parsed.is_none(), parsed.unwrap_or(NaiveDateTime::MAX))
        })
    }

    /// Aggregate counts over detected families.
    pub fn statistics(&self, families: &HashMap<String, Vec<WorkItem>>) -> DuplicateStats {
        if families.is_empty() {
            return DuplicateStats::default();
        }
        let total_families = families.len();
        let total_duplicates: usize = families.values().map(Vec::len).sum();
        let mut space_wasted_bytes = 0u64;
        let mut largest_family_size = 0usize;
        let mut families_by_size: HashMap<usize, usize> = HashMap::new();
        for members in families.values() {
            let size = members.len();
            largest_family_size = largest_family_size.max(size);
            *families_by_size.entry(size).or_default() += 1;
            if let Some(first) = members.first() {
                space_wasted_bytes += (size as u64 - 1) * first.file_size;
            }
        }
        DuplicateStats {
            total_families,
            total_duplicates,
            total_sources: total_families,
            total_copies: total_duplicates - total_families,
            space_wasted_bytes,
            largest_family_size,
            families_by_size,
            average_family_size: total_duplicates as f64 / total_families as f64,
        }
    }
}

/// Try each known timestamp format in order.
fn parse_creation_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
        // Date-only formats need the missing midnight time added.
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    warn!(raw, "could not parse creation timestamp");
    None
}
