//! Primary and secondary renditions.
//!
//! A secondary rendition is a content record derived from another record of
//! the same object, e.g. the extracted text of a PDF. Each rendition is
//! committed on its own; a failure while producing one leaves the others
//! in place.

use dms_catalog::{CatalogError, ContentRecord};
use dms_types::ContentId;
use serde::Serialize;
use tracing::debug;

use crate::backend::StorageTarget;
use crate::error::{ContentError, ContentResult};
use crate::service::ContentService;
use crate::transform::TransformerRegistry;

/// A secondary rendition to attach to a source record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenditionRequest {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub indexable: bool,
}

/// A record together with the record it was derived from, when that record
/// still exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenditionView {
    pub record: ContentRecord,
    pub source: Option<ContentRecord>,
}

/// Name for a rendition of `source_name` in `content_type`: the source stem
/// followed by the MIME subtype (`report.pdf` + `text/plain` = `report.plain`).
pub fn rendition_name(source_name: &str, content_type: &str) -> String {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => source_name,
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let subtype = essence
        .split_once('/')
        .map(|(_, sub)| sub)
        .unwrap_or(essence)
        .to_ascii_lowercase();
    if subtype.is_empty() {
        format!("{stem}.rendition")
    } else {
        format!("{stem}.{subtype}")
    }
}

impl ContentService {
    /// Persist `bytes` as a secondary rendition of `source_id`.
    ///
    /// The name is derived from the source name and `content_type`; text
    /// renditions are flagged indexable.
    pub fn add_secondary_rendition(
        &self,
        source_id: ContentId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ContentResult<ContentRecord> {
        let source = self.get(source_id)?;
        let request = RenditionRequest {
            name: rendition_name(&source.name, content_type),
            bytes,
            content_type: content_type.to_string(),
            indexable: content_type.starts_with("text/"),
        };
        self.attach_rendition(&source, request)
    }

    /// Persist a rendition with an explicit name and indexable flag.
    pub fn add_rendition(
        &self,
        source_id: ContentId,
        request: RenditionRequest,
    ) -> ContentResult<ContentRecord> {
        let source = self.get(source_id)?;
        self.attach_rendition(&source, request)
    }

    /// Uses the source's storage mode. A file-backed source in a store that
    /// no longer accepts writes gets an inline rendition.
    fn attach_rendition(
        &self,
        source: &ContentRecord,
        request: RenditionRequest,
    ) -> ContentResult<ContentRecord> {
        if source.is_secondary() {
            return Err(ContentError::SecondarySource(source.id));
        }
        let _placing = self.gate().placing()?;
        let target = match source.storage.file_ref() {
            Some((store_id, _)) => match self.backend().store(store_id) {
                Ok(store) if store.is_active() => StorageTarget::Store(store_id),
                _ => StorageTarget::Inline,
            },
            None => StorageTarget::Inline,
        };
        let storage = self
            .backend()
            .write_fresh(target, &request.name, &request.bytes)?;
        let record = ContentRecord::rendition_of(
            source,
            request.name,
            Some(request.content_type),
            request.indexable,
            storage,
        );
        let record = self.persist_new(record)?;
        debug!(content = %record.id, source = %source.id, name = %record.name, "added rendition");
        Ok(record)
    }

    /// The primary followed by its secondary renditions in creation order.
    pub fn renditions_of(&self, primary_id: ContentId) -> ContentResult<Vec<ContentRecord>> {
        let primary = self.get(primary_id)?;
        let mut all = vec![primary];
        all.extend(self.catalog().renditions_of(primary_id)?);
        Ok(all)
    }

    /// A record and its source. A source that no longer exists is omitted.
    pub fn rendition_view(&self, id: ContentId) -> ContentResult<RenditionView> {
        let record = self.get(id)?;
        let source = match record.parent_rendition {
            None => None,
            Some(parent) => match self.catalog().get_content(parent) {
                Ok(source) => Some(source),
                Err(CatalogError::ContentNotFound(_)) => {
                    debug!(content = %id, %parent, "rendition source no longer exists");
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };
        Ok(RenditionView { record, source })
    }

    /// Delete every secondary rendition derived from `primary_id`.
    /// Returns how many were removed.
    pub fn remove_secondary_renditions(&self, primary_id: ContentId) -> ContentResult<usize> {
        let secondaries = self.catalog().renditions_of(primary_id)?;
        for secondary in &secondaries {
            self.delete(secondary.id)?;
        }
        Ok(secondaries.len())
    }

    /// Replace a primary's bytes and drop the renditions derived from the
    /// old bytes.
    pub fn update_primary_content(
        &self,
        primary_id: ContentId,
        bytes: &[u8],
    ) -> ContentResult<ContentRecord> {
        let primary = self.get(primary_id)?;
        if !primary.is_primary {
            return Err(ContentError::NotPrimary(primary_id));
        }
        let updated = self.set_bytes(primary_id, bytes)?;
        let removed = self.remove_secondary_renditions(primary_id)?;
        debug!(content = %primary_id, removed, "updated primary content");
        Ok(updated)
    }

    /// Run a transformer over `source_id` and store the output as a
    /// secondary rendition.
    ///
    /// With `target_type` the transformer must produce that type; without
    /// it the first transformer accepting the source is used.
    pub fn transform_and_add_rendition(
        &self,
        source_id: ContentId,
        target_type: Option<&str>,
        registry: &TransformerRegistry,
    ) -> ContentResult<ContentRecord> {
        let source = self.get(source_id)?;
        if source.is_secondary() {
            return Err(ContentError::SecondarySource(source_id));
        }
        let source_type = source.content_type.clone().unwrap_or_default();
        let transformer = match target_type {
            Some(target) => registry.find(&source_type, target),
            None => registry.find_for(&source),
        }
        .ok_or_else(|| ContentError::NoTransformer {
            source_type: source_type.clone(),
            target_type: target_type.unwrap_or("*").to_string(),
        })?;

        let input = self.backend().read(&source.storage)?;
        let output = transformer.transform(&input)?;
        debug!(
            content = %source_id,
            transformer = transformer.name(),
            in_len = input.len(),
            out_len = output.len(),
            "transformed content"
        );
        let request = RenditionRequest {
            name: rendition_name(&source.name, transformer.target_type()),
            bytes: output,
            content_type: transformer.target_type().to_string(),
            indexable: transformer.produces_indexable(),
        };
        self.attach_rendition(&source, request)
    }
}
