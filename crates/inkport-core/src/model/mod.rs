//! Records of the whiteboard document graph.

mod asset;
mod media;
mod records;

pub use asset::{
    AssetId, AssetKind, AssetProps, AssetRecord, AssetRef, AssetSource, EmbeddedPayload,
    PayloadError,
};
pub use media::{MediaType, OCTET_STREAM, choose_mime_type};
pub use records::{
    BindingRecord, DOCUMENT_RECORD_ID, DocumentRecord, OtherRecord, PageRecord, Record, RecordId,
    ShapeRecord, new_record_id,
};
