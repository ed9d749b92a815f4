use crate::descriptor::RelationshipDescriptor;
use crate::error::ModelResult;
use crate::record::Record;
use futures::stream::BoxStream;
use serde_json::Value;

/// Rows produced by a source listing.
pub type SourceStream<'a> = BoxStream<'a, ModelResult<Record>>;

/// The capabilities a source must provide to be synced into the store.
///
/// Implemented once per content type. Everything here is pure with respect
/// to the store: models see records, never the store itself.
pub trait SyncModel: Send + Sync {
    /// The content type this model syncs into (`data/{type}`).
    fn webhook_content_type(&self) -> &str;

    /// The business key of a source row.
    fn key_from_source(&self, row: &Record) -> ModelResult<String>;

    /// The business key of a target record, if it has one.
    fn key_from_target(&self, record: &Record) -> Option<String>;

    /// Folds a source row into its (possibly empty) target record.
    fn merge_source_into_target(&self, target: Record, source: &Record) -> Record;

    /// Lists every row of the source system.
    fn list_source(&self) -> SourceStream<'_>;

    /// The static list of relationships this content type resolves. Used to
    /// drive reverse resolution, once per run.
    fn relationships_to_resolve(&self) -> Vec<RelationshipDescriptor>;

    /// The relationships one target record wants resolved, with its
    /// `items_to_relate` filled in.
    fn descriptors_for_record(&self, record: &Record) -> ModelResult<Vec<RelationshipDescriptor>>;

    /// Combines two source rows that share a key within one run.
    ///
    /// Sources that emit one row per facet of a record (e.g. one row per
    /// department a course is listed in) override this to accumulate.
    fn merge_staged(&self, existing: Record, incoming: Record) -> Record {
        let _ = existing;
        incoming
    }

    /// Decides the fate of a target record the source no longer lists.
    ///
    /// `None` removes the record (and its search entry). Returning a record
    /// keeps it in place as given, e.g. flagged as archived.
    fn target_not_in_source(&self, record: Record) -> Option<Record> {
        let _ = record;
        None
    }
}

/// An in-place transformation of a content type's records.
pub trait MapModel: Send + Sync {
    /// The content type whose records are mapped.
    fn webhook_content_type(&self) -> &str;

    /// Maps one record (or the single one-off record).
    fn map_record(&self, record: Value) -> Value;

    /// Whether [`MapModel::map_related`] should run after mapping.
    fn maps_related(&self) -> bool {
        false
    }

    /// Maps the value of a relation control elsewhere in the store that points
    /// at this content type. `mapped` is the full mapped data of this type.
    /// Returning `None` leaves the control untouched.
    fn map_related(
        &self,
        control: Option<&Value>,
        control_key: &str,
        in_grid: bool,
        mapped: &Value,
    ) -> Option<Value> {
        let _ = (control, control_key, in_grid, mapped);
        None
    }
}
