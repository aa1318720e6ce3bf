use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A named rectangle of interest in percentage coordinates (0-100) of the
/// frame source's displayed size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Region fields supplied when adding a region; the registry assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDraft {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RegionDraft {
    pub fn new(name: &str, color: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            x,
            y,
            width,
            height,
        }
    }
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl RegionUpdate {
    pub fn rename(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn geometry(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    fn apply(self, region: &mut Region) {
        if let Some(name) = self.name {
            region.name = name;
        }
        if let Some(color) = self.color {
            region.color = color;
        }
        if let Some(x) = self.x {
            region.x = x;
        }
        if let Some(y) = self.y {
            region.y = y;
        }
        if let Some(width) = self.width {
            region.width = width;
        }
        if let Some(height) = self.height {
            region.height = height;
        }
    }
}

/// Ordered set of regions of interest.
///
/// Geometry is stored as given; clamping happens when a region is sampled.
pub struct RegionRegistry {
    regions: RwLock<Vec<Region>>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry seeded with the given drafts, in order
    pub fn with_regions<I: IntoIterator<Item = RegionDraft>>(drafts: I) -> Self {
        let registry = Self::new();
        for draft in drafts {
            registry.add(draft);
        }
        registry
    }

    /// Add a region, assigning it a fresh id
    pub fn add(&self, draft: RegionDraft) -> Region {
        let region = Region {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            color: draft.color,
            x: draft.x,
            y: draft.y,
            width: draft.width,
            height: draft.height,
        };

        debug!("Adding region '{}' ({})", region.name, region.id);
        self.regions.write().push(region.clone());
        region
    }

    /// Remove a region; unknown ids are ignored
    pub fn remove(&self, id: &str) -> Option<Region> {
        let mut regions = self.regions.write();
        let index = regions.iter().position(|r| r.id == id)?;
        let removed = regions.remove(index);
        debug!("Removed region '{}' ({})", removed.name, removed.id);
        Some(removed)
    }

    /// Merge the provided fields into a region, returning the updated value
    pub fn update(&self, id: &str, update: RegionUpdate) -> Option<Region> {
        let mut regions = self.regions.write();
        let region = regions.iter_mut().find(|r| r.id == id)?;
        update.apply(region);
        Some(region.clone())
    }

    pub fn get(&self, id: &str) -> Option<Region> {
        self.regions.read().iter().find(|r| r.id == id).cloned()
    }

    /// Independent copy of the current regions in insertion order
    pub fn list(&self) -> Vec<Region> {
        self.regions.read().clone()
    }

    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn default_color() -> String {
    "#FACC15".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> RegionDraft {
        RegionDraft::new(name, "#FFFFFF", 10.0, 20.0, 30.0, 40.0)
    }

    #[test]
    fn test_add_assigns_unique_ids_in_order() {
        let registry = RegionRegistry::new();
        let a = registry.add(draft("A"));
        let b = registry.add(draft("A"));

        assert_ne!(a.id, b.id);
        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[1].id, b.id);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let registry = RegionRegistry::with_regions(vec![draft("A")]);

        assert!(registry.remove("does-not-exist").is_none());
        assert_eq!(registry.len(), 1);

        let id = registry.list()[0].id.clone();
        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_merges_only_provided_fields() {
        let registry = RegionRegistry::new();
        let region = registry.add(draft("Speaker"));

        let updated = registry
            .update(&region.id, RegionUpdate::rename("Narrator"))
            .unwrap();

        assert_eq!(updated.name, "Narrator");
        assert_eq!(updated.color, region.color);
        assert_eq!(updated.x, region.x);
        assert_eq!(updated.height, region.height);

        let moved = registry
            .update(&region.id, RegionUpdate::geometry(0.0, 0.0, 100.0, 100.0))
            .unwrap();
        assert_eq!(moved.name, "Narrator");
        assert_eq!(moved.width, 100.0);

        assert!(registry.update("missing", RegionUpdate::rename("x")).is_none());
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let registry = RegionRegistry::new();
        let region = registry.add(draft("A"));
        let snapshot = registry.list();

        registry.update(&region.id, RegionUpdate::rename("B"));
        registry.add(draft("C"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "A");
    }

    #[test]
    fn test_out_of_range_geometry_is_stored_as_given() {
        let registry = RegionRegistry::new();
        let region = registry.add(RegionDraft::new("Wide", "#000000", 90.0, -5.0, 30.0, 10.0));

        assert_eq!(region.x, 90.0);
        assert_eq!(region.y, -5.0);
        assert_eq!(region.width, 30.0);
    }
}
