//! Catalog of loaded plugins
//!
//! Secondary indices over the loaded plugin table: by category, by tag and
//! by author, plus a case-insensitive substring search. Entries track the
//! loaded table exactly; nothing here outlives an unload.

use modforge_plugin_api::PluginDescriptor;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
pub struct Catalog {
    entries: HashMap<String, Arc<PluginDescriptor>>,
    by_category: HashMap<String, HashSet<String>>,
    by_tag: HashMap<String, HashSet<String>>,
    by_author: HashMap<String, HashSet<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a plugin on load. Replaces any previous entry with the same id.
    pub fn add(&mut self, descriptor: Arc<PluginDescriptor>) {
        self.remove(&descriptor.id);
        let id = descriptor.id.clone();
        if let Some(category) = &descriptor.category {
            self.by_category
                .entry(category.clone())
                .or_default()
                .insert(id.clone());
        }
        for tag in &descriptor.tags {
            self.by_tag.entry(tag.clone()).or_default().insert(id.clone());
        }
        if !descriptor.author.is_empty() {
            self.by_author
                .entry(descriptor.author.clone())
                .or_default()
                .insert(id.clone());
        }
        self.entries.insert(id, descriptor);
    }

    /// Drop a plugin from every index on unload.
    pub fn remove(&mut self, id: &str) {
        if self.entries.remove(id).is_none() {
            return;
        }
        for index in [&mut self.by_category, &mut self.by_tag, &mut self.by_author] {
            index.retain(|_, ids| {
                ids.remove(id);
                !ids.is_empty()
            });
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<PluginDescriptor>> {
        self.entries.get(id)
    }

    /// All indexed descriptors, sorted by id.
    pub fn list(&self) -> Vec<Arc<PluginDescriptor>> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<PluginDescriptor>> {
        self.collect(self.by_category.get(category))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Arc<PluginDescriptor>> {
        self.collect(self.by_tag.get(tag))
    }

    pub fn by_author(&self, author: &str) -> Vec<Arc<PluginDescriptor>> {
        self.collect(self.by_author.get(author))
    }

    /// Case-insensitive substring search over id, name, description and
    /// author. Results sorted by id.
    pub fn search(&self, query: &str) -> Vec<Arc<PluginDescriptor>> {
        let query = query.to_lowercase();
        let mut hits: Vec<_> = self
            .entries
            .values()
            .filter(|d| {
                d.id.to_lowercase().contains(&query)
                    || d.name.to_lowercase().contains(&query)
                    || d.description.to_lowercase().contains(&query)
                    || d.author.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn collect(&self, ids: Option<&HashSet<String>>) -> Vec<Arc<PluginDescriptor>> {
        let mut hits: Vec<_> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(id: &str, category: &str, tags: &[&str], author: &str) -> Arc<PluginDescriptor> {
        let raw = json!({
            "id": id,
            "name": format!("{id} plugin"),
            "version": "1.0.0",
            "description": format!("The {id} plugin"),
            "author": author,
            "category": category,
            "tags": tags,
        });
        Arc::new(serde_json::from_value(raw).unwrap())
    }

    #[test]
    fn indices_track_add_and_remove() {
        let mut catalog = Catalog::new();
        catalog.add(descriptor("mapper", "tools", &["map", "ui"], "ada"));
        catalog.add(descriptor("tracker", "tools", &["stats"], "ada"));

        assert_eq!(catalog.by_category("tools").len(), 2);
        assert_eq!(catalog.by_tag("map").len(), 1);
        assert_eq!(catalog.by_author("ada").len(), 2);

        catalog.remove("mapper");
        assert_eq!(catalog.by_category("tools").len(), 1);
        assert!(catalog.by_tag("map").is_empty());
        assert_eq!(catalog.by_author("ada").len(), 1);
    }

    #[test]
    fn re_add_replaces_previous_entry() {
        let mut catalog = Catalog::new();
        catalog.add(descriptor("mapper", "tools", &["map"], "ada"));
        catalog.add(descriptor("mapper", "overlays", &["hud"], "ada"));

        assert!(catalog.by_category("tools").is_empty());
        assert_eq!(catalog.by_category("overlays").len(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn search_is_case_insensitive_over_all_fields() {
        let mut catalog = Catalog::new();
        catalog.add(descriptor("mapper", "tools", &[], "Ada Lovelace"));
        catalog.add(descriptor("tracker", "tools", &[], "grace"));

        assert_eq!(catalog.search("MAPPER").len(), 1);
        assert_eq!(catalog.search("lovelace").len(), 1);
        assert_eq!(catalog.search("plugin").len(), 2);
        assert!(catalog.search("nothing").is_empty());
    }
}
