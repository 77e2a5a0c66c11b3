//! Pairing versions with their extracted metadata and ordering the upload plan.

use thiserror::Error;

use crate::source::{MetadataRecord, VersionDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    #[error("extractor returned no metadata for {versions} versions")]
    NoMetadata { versions: usize },
    #[error("extractor returned {records} metadata records for {versions} versions")]
    CountMismatch { versions: usize, records: usize },
    #[error("metadata at position {position} belongs to version {found}, expected {expected}")]
    VersionMismatch {
        position: usize,
        expected: String,
        found: String,
    },
}

/// A version scheduled for replication.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedVersion {
    pub descriptor: VersionDescriptor,
    pub metadata: MetadataRecord,
    /// Newest version of the document; fetched through the current-content path.
    pub is_latest: bool,
}

/// Pair each listed version with its metadata record.
///
/// The extractor reports records in the same order as the version listing.
/// A single record without a version id is shared by every version.
pub fn pair_metadata(
    versions: &[VersionDescriptor],
    records: Vec<MetadataRecord>,
) -> Result<Vec<(VersionDescriptor, MetadataRecord)>, LineageError> {
    if records.is_empty() {
        return Err(LineageError::NoMetadata {
            versions: versions.len(),
        });
    }

    if records.len() == 1 && versions.len() > 1 && records[0].version_id.is_none() {
        let shared = &records[0];
        return Ok(versions
            .iter()
            .map(|v| (v.clone(), shared.clone()))
            .collect());
    }

    if records.len() != versions.len() {
        return Err(LineageError::CountMismatch {
            versions: versions.len(),
            records: records.len(),
        });
    }

    versions
        .iter()
        .cloned()
        .zip(records)
        .enumerate()
        .map(|(position, (version, record))| match &record.version_id {
            Some(found) if *found != version.id => Err(LineageError::VersionMismatch {
                position,
                expected: version.id.clone(),
                found: found.clone(),
            }),
            _ => Ok((version, record)),
        })
        .collect()
}

/// Order paired versions oldest to newest and pick what to replicate.
///
/// With `all_versions` every version is kept; otherwise only the newest. Ties
/// on modification time keep source order.
pub fn plan_versions(
    mut paired: Vec<(VersionDescriptor, MetadataRecord)>,
    all_versions: bool,
) -> Vec<PlannedVersion> {
    paired.sort_by_key(|(v, _)| v.modified_at);
    if !all_versions && paired.len() > 1 {
        paired.drain(..paired.len() - 1);
    }

    let last = paired.len().saturating_sub(1);
    paired
        .into_iter()
        .enumerate()
        .map(|(i, (descriptor, metadata))| PlannedVersion {
            descriptor,
            metadata,
            is_latest: i == last,
        })
        .collect()
}
