//! Source path convention.
//!
//! `{scheme}://{host}/{tenant}/{variant}_{collection}/{relative/path}`
//! Split on `/`, segment 3 is the tenant, segment 4 the schema variant and
//! collection, and everything after is the path inside the collection.

use thiserror::Error;

use crate::source::{DocumentRef, SchemaVariant};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed source path: {0}")]
    Malformed(String),
    #[error("unknown schema variant '{variant}' in {path}")]
    UnknownVariant { variant: String, path: String },
}

/// A parsed source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    pub tenant_id: String,
    /// Raw `{variant}_{collection}` segment.
    pub variant_segment: String,
    pub variant_name: String,
    pub collection: String,
    pub relative_path: String,
}

impl SourcePath {
    pub fn parse(source_path: &str) -> Result<Self, PathError> {
        let malformed = || PathError::Malformed(source_path.to_string());
        let segments: Vec<&str> = source_path.split('/').collect();
        if segments.len() < 6 {
            return Err(malformed());
        }

        let tenant_id = decode(segments[3]).ok_or_else(malformed)?;
        let variant_segment = decode(segments[4]).ok_or_else(malformed)?;
        let relative_path = segments[5..]
            .iter()
            .map(|s| decode(s))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(malformed)?
            .join("/");

        let (variant_name, collection) = match variant_segment.split_once('_') {
            Some((variant, collection)) => (variant.to_string(), collection.to_string()),
            None => (variant_segment.clone(), String::new()),
        };

        if tenant_id.is_empty()
            || variant_name.is_empty()
            || collection.is_empty()
            || relative_path.is_empty()
            || relative_path.split('/').any(|s| s.is_empty() || s == "..")
        {
            return Err(malformed());
        }

        Ok(Self {
            tenant_id,
            variant_segment,
            variant_name,
            collection,
            relative_path,
        })
    }

    /// Resolve the schema variant named by the path.
    pub fn variant(&self) -> Result<SchemaVariant, PathError> {
        SchemaVariant::from_str(&self.variant_name).ok_or_else(|| PathError::UnknownVariant {
            variant: self.variant_name.clone(),
            path: self.variant_segment.clone(),
        })
    }

    pub fn document(&self) -> DocumentRef {
        DocumentRef::new(&self.tenant_id, &self.collection, &self.relative_path)
    }

    /// Object store key: `{country}/{tenant}/{collection}/{relative path}`.
    pub fn destination_key(&self, country: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            country.to_uppercase(),
            self.tenant_id,
            self.collection,
            self.relative_path
        )
    }
}

fn decode(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}
