//! Live documents and the in-memory whiteboard.

use crate::assets::AssetError;
use crate::camera::Camera;
use crate::config::RefitOptions;
use crate::model::{
    AssetRecord, BindingRecord, DOCUMENT_RECORD_ID, DocumentRecord, PageRecord, Record, RecordId,
    ShapeRecord,
};
use crate::snapshot::{DocumentSnapshot, SchemaDescriptor, SnapshotError};
use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Viewport refit failures. Never fatal to an import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefitError {
    #[error("Viewport has no size")]
    NoViewport,
    #[error("Refit unsupported: {0}")]
    Unsupported(String),
}

/// The operations the export/import pipeline needs from an editor's document.
///
/// Implementations own their working copy; the pipeline only ever exchanges
/// whole snapshots and single asset records with it.
pub trait LiveDocument {
    /// Copy every record.
    fn capture_graph(&self) -> DocumentSnapshot;

    /// Swap the entire graph. On error the document must be left unmodified.
    fn replace_graph(&mut self, snapshot: DocumentSnapshot) -> Result<(), SnapshotError>;

    /// Get a copy of an asset record.
    fn get_asset_record(&self, id: &str) -> Option<AssetRecord>;

    /// Overwrite an existing asset record. Fails with `NotFound` if absent.
    fn update_asset_record(&mut self, record: AssetRecord) -> Result<(), AssetError>;

    /// Ask for a deferred zoom-to-fit.
    fn request_viewport_refit(&mut self, options: &RefitOptions) -> Result<(), RefitError>;
}

/// Outcome of [`Whiteboard::clear_canvas`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub shapes_removed: usize,
    pub pages_removed: usize,
    pub bindings_removed: usize,
}

/// A refit waiting for its delay to pass.
#[derive(Debug, Clone)]
struct PendingRefit {
    options: RefitOptions,
    requested_at: Instant,
}

impl PendingRefit {
    fn due_at(&self) -> Instant {
        self.requested_at + Duration::from_millis(self.options.delay_ms)
    }
}

/// A refit in progress.
#[derive(Debug, Clone)]
struct RefitAnimation {
    from: Camera,
    to: Camera,
    started: Instant,
    duration: Duration,
}

/// In-memory whiteboard document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Whiteboard {
    /// Unique document identifier.
    pub id: String,
    schema: SchemaDescriptor,
    store: BTreeMap<RecordId, Record>,
    /// Page currently shown.
    pub current_page: RecordId,
    pub camera: Camera,
    pub viewport: Size,
    #[serde(skip)]
    pending_refit: Option<PendingRefit>,
    #[serde(skip)]
    refit_animation: Option<RefitAnimation>,
}

impl Default for Whiteboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Whiteboard {
    /// Default viewport used until the host reports its size.
    pub const DEFAULT_VIEWPORT: Size = Size::new(1280.0, 800.0);

    /// Create a document with one empty page.
    pub fn new() -> Self {
        let document = DocumentRecord {
            id: DOCUMENT_RECORD_ID.to_string(),
            name: "Untitled".to_string(),
            meta: Map::new(),
            extra: Map::new(),
        };
        let page = PageRecord::new("Page 1", "a1");
        let current_page = page.id.clone();

        let mut store = BTreeMap::new();
        store.insert(document.id.clone(), Record::Document(document));
        store.insert(page.id.clone(), Record::Page(page));

        Self {
            id: Uuid::new_v4().to_string(),
            schema: SchemaDescriptor::default(),
            store,
            current_page,
            camera: Camera::new(),
            viewport: Self::DEFAULT_VIEWPORT,
            pending_refit: None,
            refit_animation: None,
        }
    }

    /// Set the viewport size in screen pixels.
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport = Size::new(width, height);
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.store.get(id)
    }

    /// Iterate over every record.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.store.values()
    }

    /// Number of records, pages and the document record included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the document has no shapes.
    pub fn is_empty(&self) -> bool {
        self.shapes().next().is_none()
    }

    /// Get the pages in display order.
    pub fn pages(&self) -> Vec<&PageRecord> {
        let mut pages: Vec<_> = self.store.values().filter_map(Record::as_page).collect();
        pages.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        pages
    }

    /// Iterate over every shape on every page.
    pub fn shapes(&self) -> impl Iterator<Item = &ShapeRecord> {
        self.store.values().filter_map(Record::as_shape)
    }

    /// Add a page after the existing ones and return its id.
    pub fn add_page(&mut self, name: &str) -> RecordId {
        let index = format!("a{}", self.pages().len() + 1);
        let page = PageRecord::new(name, &index);
        let id = page.id.clone();
        self.store.insert(id.clone(), Record::Page(page));
        id
    }

    /// Add a shape, placing it above its siblings.
    pub fn add_shape(&mut self, mut shape: ShapeRecord) -> RecordId {
        let siblings = self
            .shapes()
            .filter(|s| s.parent_id == shape.parent_id)
            .count();
        shape.index = format!("a{}", siblings + 1);
        let id = shape.id.clone();
        self.store.insert(id.clone(), Record::Shape(shape));
        id
    }

    /// Add or replace an asset and return its id.
    pub fn add_asset(&mut self, asset: AssetRecord) -> RecordId {
        let id = asset.id.clone();
        self.store.insert(id.clone(), Record::Asset(asset));
        id
    }

    /// Add a binding and return its id.
    pub fn add_binding(&mut self, binding: BindingRecord) -> RecordId {
        let id = binding.id.clone();
        self.store.insert(id.clone(), Record::Binding(binding));
        id
    }

    /// Remove a shape together with its descendants and any bindings to them.
    pub fn remove_shape(&mut self, id: &str) -> Option<ShapeRecord> {
        let removed = match self.store.remove(id) {
            Some(Record::Shape(shape)) => shape,
            Some(other) => {
                self.store.insert(id.to_string(), other);
                return None;
            }
            None => return None,
        };

        let children: Vec<RecordId> = self
            .shapes()
            .filter(|s| s.parent_id == id)
            .map(|s| s.id.clone())
            .collect();
        for child in children {
            self.remove_shape(&child);
        }
        self.store.retain(|_, record| match record {
            Record::Binding(b) => b.from_id != id && b.to_id != id,
            _ => true,
        });
        Some(removed)
    }

    /// Bounds of the top-level shapes on the current page.
    pub fn content_bounds(&self) -> Option<Rect> {
        self.shapes()
            .filter(|s| s.parent_id == self.current_page)
            .filter_map(ShapeRecord::bounds)
            .reduce(|a, b| a.union(b))
    }

    /// Delete every shape on the current page and every other page.
    ///
    /// Assets are kept; bindings left without endpoints are removed.
    pub fn clear_canvas(&mut self) -> ClearSummary {
        let mut summary = ClearSummary::default();
        let current = self.current_page.clone();
        self.store.retain(|_, record| match record {
            Record::Shape(_) => {
                summary.shapes_removed += 1;
                false
            }
            Record::Binding(_) => {
                summary.bindings_removed += 1;
                false
            }
            Record::Page(page) if page.id != current => {
                summary.pages_removed += 1;
                false
            }
            _ => true,
        });
        log::info!(
            "Cleared canvas: {} shapes, {} pages removed",
            summary.shapes_removed,
            summary.pages_removed
        );
        summary
    }

    /// Refit requested by an import whose delay has not passed yet.
    pub fn pending_refit(&self) -> Option<&RefitOptions> {
        self.pending_refit.as_ref().map(|pending| &pending.options)
    }

    /// When the pending refit starts moving the camera.
    pub fn refit_due_at(&self) -> Option<Instant> {
        self.pending_refit.as_ref().map(PendingRefit::due_at)
    }

    /// Whether a refit is waiting or animating.
    pub fn is_refitting(&self) -> bool {
        self.pending_refit.is_some() || self.refit_animation.is_some()
    }

    fn refit_target(&self, options: &RefitOptions) -> Camera {
        let mut target = self.camera.clone();
        match self.content_bounds() {
            Some(bounds) => target.fit_to_bounds(bounds, self.viewport, options.padding),
            None => target.reset(),
        }
        target
    }

    /// Advance the refit to `now`, for hosts that redraw per frame.
    ///
    /// Nothing happens until `delay_ms` after the request; the camera then
    /// moves to the fitted position over `animation_ms`. Returns true if the
    /// camera changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.pending_refit.as_ref().is_some_and(|p| now >= p.due_at()) {
            if let Some(pending) = self.pending_refit.take() {
                self.refit_animation = Some(RefitAnimation {
                    from: self.camera.clone(),
                    to: self.refit_target(&pending.options),
                    started: pending.due_at(),
                    duration: Duration::from_millis(pending.options.animation_ms),
                });
            }
        }

        let Some(animation) = &self.refit_animation else {
            return false;
        };
        let elapsed = now.saturating_duration_since(animation.started);
        if elapsed >= animation.duration {
            self.camera = animation.to.clone();
            self.refit_animation = None;
        } else {
            let t = elapsed.as_secs_f64() / animation.duration.as_secs_f64();
            self.camera = animation.from.lerp(&animation.to, t);
        }
        true
    }

    /// Apply any pending or running refit at once, skipping delay and
    /// animation. Returns true if one ran.
    pub fn flush_refit(&mut self) -> bool {
        if let Some(pending) = self.pending_refit.take() {
            self.camera = self.refit_target(&pending.options);
            self.refit_animation = None;
            return true;
        }
        match self.refit_animation.take() {
            Some(animation) => {
                self.camera = animation.to;
                true
            }
            None => false,
        }
    }

    /// Serialize the whiteboard to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a whiteboard from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl LiveDocument for Whiteboard {
    fn capture_graph(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            store: self.store.clone(),
            schema: self.schema.clone(),
        }
    }

    fn replace_graph(&mut self, snapshot: DocumentSnapshot) -> Result<(), SnapshotError> {
        snapshot.validate()?;

        let current_page = if snapshot.get(&self.current_page).and_then(Record::as_page).is_some() {
            self.current_page.clone()
        } else {
            let mut pages: Vec<_> = snapshot.pages().collect();
            pages.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
            pages
                .first()
                .map(|p| p.id.clone())
                .ok_or(SnapshotError::NoPages)?
        };

        self.store = snapshot.store;
        self.schema = snapshot.schema;
        self.current_page = current_page;
        Ok(())
    }

    fn get_asset_record(&self, id: &str) -> Option<AssetRecord> {
        self.store.get(id).and_then(Record::as_asset).cloned()
    }

    fn update_asset_record(&mut self, record: AssetRecord) -> Result<(), AssetError> {
        match self.store.get_mut(&record.id) {
            Some(Record::Asset(existing)) => {
                *existing = record;
                Ok(())
            }
            _ => Err(AssetError::NotFound(record.id)),
        }
    }

    fn request_viewport_refit(&mut self, options: &RefitOptions) -> Result<(), RefitError> {
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return Err(RefitError::NoViewport);
        }
        self.refit_animation = None;
        self.pending_refit = Some(PendingRefit {
            options: options.clone(),
            requested_at: Instant::now(),
        });
        Ok(())
    }
}
