//! Forward relationship resolution.
//!
//! For every target record and every descriptor it yields, the record's
//! relationship field is rebuilt from scratch: matched related records become
//! [`RelationToken`]s on the field, and each match is recorded in the reverse
//! index for the reverse stage to pick up.

use crate::cache::RelatedDataCache;
use crate::error::{SyncError, SyncResult};
use crate::executor::BoundedExecutor;
use crate::protocol::SyncProtocol;
use crate::reverse_index::ReverseIndex;
use crate::staging::read_object;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use websync_model::{is_truthy, RelationshipDescriptor};
use websync_storage::Store;
use websync_types::{RelationToken, ReverseKey};

/// One (record, descriptor) pair to resolve.
#[derive(Debug, Clone)]
pub struct ResolutionUnit {
    pub record_key: String,
    pub descriptor: RelationshipDescriptor,
}

/// What the forward stage did.
#[derive(Debug, Default)]
pub struct ForwardOutcome {
    /// Units processed, including those with nothing to relate.
    pub units: usize,
    /// Relation tokens written across all records.
    pub tokens: usize,
    /// Records whose descriptors could not be produced. Those records are
    /// left untouched.
    pub descriptor_errors: Vec<SyncError>,
}

/// A reverse-index entry staged by matching.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReverseWrite {
    target_key: Option<String>,
    token: RelationToken,
}

/// Resolves the forward relationships of one source.
pub struct ForwardResolver<'a> {
    store: Arc<dyn Store>,
    protocol: &'a SyncProtocol,
    reverse_index: &'a ReverseIndex,
    executor: &'a BoundedExecutor,
}

impl<'a> ForwardResolver<'a> {
    pub fn new(
        store: Arc<dyn Store>,
        protocol: &'a SyncProtocol,
        reverse_index: &'a ReverseIndex,
        executor: &'a BoundedExecutor,
    ) -> Self {
        Self {
            store,
            protocol,
            reverse_index,
            executor,
        }
    }

    /// Resolves every unit, at most `executor.limit()` at a time. Fails with
    /// the first unit error once every unit has settled.
    ///
    /// Units themselves hold no executor slot. Each store access inside a unit
    /// takes exactly one, so the ceiling covers every outstanding operation.
    pub async fn run(&self) -> SyncResult<ForwardOutcome> {
        let (units, descriptor_errors) = self.list_units().await?;
        let cache = RelatedDataCache::new(
            Arc::clone(&self.store),
            self.protocol.paths().data_root.clone(),
        );

        let unit_count = units.len();
        let results: Vec<SyncResult<usize>> = stream::iter(units)
            .map(|unit| self.resolve_unit(unit, &cache))
            .buffer_unordered(self.executor.limit())
            .collect()
            .await;

        let mut outcome = ForwardOutcome {
            units: unit_count,
            descriptor_errors,
            ..ForwardOutcome::default()
        };
        for result in results {
            outcome.tokens += result?;
        }
        info!(
            "Resolved {} relationship units for {} ({} tokens, {} related types fetched)",
            outcome.units,
            self.protocol.content_type(),
            outcome.tokens,
            cache.len().await
        );
        Ok(outcome)
    }

    /// Lists one unit per (target record, descriptor).
    ///
    /// A record whose descriptors cannot be produced, or are invalid, is
    /// skipped and reported. A failure to read the target namespace fails the
    /// whole listing.
    pub async fn list_units(&self) -> SyncResult<(Vec<ResolutionUnit>, Vec<SyncError>)> {
        let model = self.protocol.model();
        let records = self
            .executor
            .run(read_object(self.store.as_ref(), &self.protocol.paths().target))
            .await?;

        let mut units = Vec::new();
        let mut errors = Vec::new();
        for (record_key, value) in records {
            let Value::Object(record) = value else { continue };
            let descriptors = model
                .descriptors_for_record(&record)
                .and_then(|descriptors| {
                    descriptors
                        .iter()
                        .try_for_each(RelationshipDescriptor::validate)
                        .map(|()| descriptors)
                });
            match descriptors {
                Ok(descriptors) => units.extend(descriptors.into_iter().map(|descriptor| {
                    ResolutionUnit {
                        record_key: record_key.clone(),
                        descriptor,
                    }
                })),
                Err(source) => {
                    warn!(
                        "Skipping relationships of {}/{}: {}",
                        self.protocol.content_type(),
                        record_key,
                        source
                    );
                    errors.push(SyncError::Descriptor {
                        key: record_key,
                        source,
                    });
                }
            }
        }
        Ok((units, errors))
    }

    /// Resolves one unit and saves the relationship field. Returns the number
    /// of tokens written.
    pub async fn resolve_unit(
        &self,
        unit: ResolutionUnit,
        cache: &RelatedDataCache,
    ) -> SyncResult<usize> {
        let ResolutionUnit {
            record_key,
            descriptor,
        } = unit;
        let source_type = self.protocol.content_type();
        let mut related = Vec::new();

        let data = if descriptor.has_work() {
            self.executor
                .run(cache.get(&descriptor.target_content_type))
                .await?
        } else {
            None
        };

        if let Some(data) = data {
            let target = descriptor.target_content_type.as_str();
            let reverse_key = descriptor.reverse_key(source_type)?;
            let back = RelationToken::new(source_type, record_key.as_str())?;
            self.executor
                .run(self.reverse_index.ensure_target(target))
                .await?;

            let matches = if descriptor.multiple {
                match_collection(&descriptor, &data)?
            } else {
                match_one_off(&descriptor, &data)?
            };

            let writes: Vec<ReverseWrite> = matches
                .iter()
                .map(|token| ReverseWrite {
                    target_key: descriptor.multiple.then(|| token.key().to_string()),
                    token: back.clone(),
                })
                .collect();
            self.save_reverse(target, &reverse_key, &writes).await?;
            related = matches;
        } else {
            debug!(
                "Nothing to relate for {}/{}.{}",
                source_type, record_key, descriptor.relationship_key
            );
        }

        self.save_field(&record_key, &descriptor.relationship_key, &related)
            .await?;
        Ok(related.len())
    }

    async fn save_reverse(
        &self,
        target: &str,
        reverse_key: &ReverseKey,
        writes: &[ReverseWrite],
    ) -> SyncResult<()> {
        self.executor
            .try_run_all(writes.iter().map(|write| {
                self.reverse_index
                    .record(target, write.target_key.as_deref(), reverse_key, &write.token)
            }))
            .await?;
        Ok(())
    }

    async fn save_field(
        &self,
        record_key: &str,
        relationship_key: &str,
        tokens: &[RelationToken],
    ) -> SyncResult<()> {
        let path = self
            .protocol
            .paths()
            .target
            .child(record_key)
            .child(relationship_key);
        let value = Value::Array(tokens.iter().map(|t| Value::String(t.to_string())).collect());
        self.executor.run(self.store.write(&path, value)).await?;
        Ok(())
    }
}

/// Matches a collection descriptor against the related collection.
///
/// Evaluation runs over `items_to_relate` in order, then over the related
/// records. A related record matches when its `target_match_field` value is
/// strictly equal to the item's value. Each related record appears at most
/// once.
fn match_collection(
    descriptor: &RelationshipDescriptor,
    related: &Value,
) -> SyncResult<Vec<RelationToken>> {
    let Some(candidates) = related.as_object() else {
        return Ok(Vec::new());
    };
    let Some(field) = descriptor.target_match_field.as_deref() else {
        return Ok(Vec::new());
    };

    let mut tokens: Vec<RelationToken> = Vec::new();
    for wanted in descriptor.match_values() {
        for (related_key, candidate) in candidates {
            if candidate.get(field) != Some(wanted) {
                continue;
            }
            let token =
                RelationToken::new(descriptor.target_content_type.as_str(), related_key.as_str())?;
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    Ok(tokens)
}

/// Relates to a one-off content type when it exists and is flagged present.
fn match_one_off(
    descriptor: &RelationshipDescriptor,
    related: &Value,
) -> SyncResult<Vec<RelationToken>> {
    if is_truthy(related) && descriptor.one_off_target_present() {
        Ok(vec![RelationToken::one_off(descriptor.target_content_type.as_str())?])
    } else {
        Ok(Vec::new())
    }
}
