use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::{self, Storage, PRESETS_KEY};

use super::Preset;

/// Ordered, name-keyed preset list. Every mutation is written through to
/// storage before returning.
#[derive(Clone)]
pub struct PresetStore {
    storage: Arc<dyn Storage>,
}

impl PresetStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Presets in insertion order.
    pub fn list(&self) -> Result<Vec<Preset>> {
        storage::load_json(self.storage.as_ref(), PRESETS_KEY)
    }

    fn save(&self, presets: &[Preset]) -> Result<()> {
        storage::save_json(self.storage.as_ref(), PRESETS_KEY, presets)?;
        tracing::debug!(count = presets.len(), "saved presets");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<Preset>> {
        Ok(self.list()?.into_iter().find(|preset| preset.name == name))
    }

    /// Insert a preset, or replace the one with the same name where it stands.
    pub fn upsert(&self, preset: Preset) -> Result<()> {
        let preset = preset.normalized()?;
        let mut presets = self.list()?;
        upsert_into(&mut presets, preset);
        self.save(&presets)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut presets = self.list()?;
        let before = presets.len();
        presets.retain(|preset| preset.name != name);
        if presets.len() == before {
            return Ok(false);
        }
        self.save(&presets)?;
        Ok(true)
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let mut presets = self.list()?;
        let Some(preset) = presets.iter_mut().find(|preset| preset.name == name) else {
            return Ok(false);
        };
        preset.enabled = enabled;
        self.save(&presets)?;
        Ok(true)
    }

    /// Flip `enabled`, returning the new state.
    pub fn toggle(&self, name: &str) -> Result<Option<bool>> {
        let Some(preset) = self.get(name)? else {
            return Ok(None);
        };
        let enabled = !preset.enabled;
        self.set_enabled(name, enabled)?;
        Ok(Some(enabled))
    }

    /// Replace the whole list. Nothing is written unless every preset is
    /// valid; repeated names collapse onto the first position.
    pub fn replace_all(&self, presets: Vec<Preset>) -> Result<()> {
        let mut validated = Vec::with_capacity(presets.len());
        for preset in presets {
            upsert_into(&mut validated, preset.normalized()?);
        }
        self.save(&validated)
    }

    pub fn export_all(&self) -> Result<Vec<Preset>> {
        self.list()
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_all()?)?)
    }

    /// Replace the list with a JSON array of presets. Returns how many were
    /// stored.
    pub fn import_json(&self, raw: &str) -> Result<usize> {
        let presets: Vec<Preset> = serde_json::from_str(raw)
            .map_err(|err| Error::Validation(format!("preset import must be a JSON array of presets: {err}")))?;
        self.replace_all(presets)?;
        let count = self.list()?.len();
        tracing::info!(count, "imported presets");
        Ok(count)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }
}

fn upsert_into(presets: &mut Vec<Preset>, preset: Preset) {
    match presets.iter_mut().find(|existing| existing.name == preset.name) {
        Some(existing) => *existing = preset,
        None => presets.push(preset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PresetTarget;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn store() -> PresetStore {
        PresetStore::new(Arc::new(MemoryStorage::new()))
    }

    fn names(store: &PresetStore) -> Vec<String> {
        store.list().unwrap().into_iter().map(|preset| preset.name).collect()
    }

    #[test]
    fn upsert_keeps_position_of_existing_name() {
        let store = store();
        store.upsert(Preset::kv("a", PresetTarget::Query, "k1", "1")).unwrap();
        store.upsert(Preset::kv("b", PresetTarget::Query, "k2", "2")).unwrap();
        store.upsert(Preset::kv("c", PresetTarget::Query, "k3", "3")).unwrap();

        store.upsert(Preset::kv("b", PresetTarget::Headers, "X-B", "new")).unwrap();

        assert_eq!(names(&store), vec!["a", "b", "c"]);
        let b = store.get("b").unwrap().unwrap();
        assert_eq!(b.target, PresetTarget::Headers);
        assert_eq!(b.value, "new");
    }

    #[test]
    fn invalid_upsert_leaves_store_untouched() {
        let store = store();
        store.upsert(Preset::kv("a", PresetTarget::Query, "k", "v")).unwrap();

        let err = store.upsert(Preset::kv("b", PresetTarget::Query, "  ", "v")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(names(&store), vec!["a"]);
    }

    #[test]
    fn delete_and_toggle() {
        let store = store();
        store.upsert(Preset::kv("a", PresetTarget::Query, "k", "v")).unwrap();
        store.upsert(Preset::kv("b", PresetTarget::Query, "k", "v")).unwrap();

        assert_eq!(store.toggle("a").unwrap(), Some(false));
        assert!(!store.get("a").unwrap().unwrap().enabled);
        assert!(store.set_enabled("a", true).unwrap());
        assert!(store.get("a").unwrap().unwrap().enabled);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.toggle("missing").unwrap(), None);
        assert!(!store.set_enabled("missing", true).unwrap());
        assert_eq!(names(&store), vec!["b"]);
    }

    #[test]
    fn persists_through_shared_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        PresetStore::new(storage.clone())
            .upsert(Preset::json_path("j", "a.b", "1"))
            .unwrap();

        let reopened = PresetStore::new(storage);
        assert_eq!(reopened.list().unwrap(), vec![Preset::json_path("j", "a.b", "1")]);
    }

    #[test]
    fn export_then_import_replaces_everything() {
        let source = store();
        source.upsert(Preset::kv("a", PresetTarget::Query, "k", "v").with_auto()).unwrap();
        source.upsert(Preset::json_path("j", "x[0]", "1").with_scope("api", "")).unwrap();
        let exported = source.export_json().unwrap();

        let target = store();
        target.upsert(Preset::kv("old", PresetTarget::Query, "k", "v")).unwrap();
        assert_eq!(target.import_json(&exported).unwrap(), 2);
        assert_eq!(target.list().unwrap(), source.list().unwrap());
    }

    #[test]
    fn import_rejects_non_arrays_and_invalid_entries() {
        let store = store();
        store.upsert(Preset::kv("keep", PresetTarget::Query, "k", "v")).unwrap();

        assert!(matches!(store.import_json("{\"name\":\"x\"}"), Err(Error::Validation(_))));
        assert!(matches!(
            store.import_json(r#"[{"name":"ok","match":"k"},{"name":"","match":"k"}]"#),
            Err(Error::Validation(_))
        ));
        assert_eq!(names(&store), vec!["keep"]);
    }

    #[test]
    fn replace_all_collapses_duplicate_names() {
        let store = store();
        store
            .replace_all(vec![
                Preset::kv("a", PresetTarget::Query, "k", "1"),
                Preset::kv("b", PresetTarget::Query, "k", "2"),
                Preset::kv("a", PresetTarget::Query, "k", "3"),
            ])
            .unwrap();
        let presets = store.list().unwrap();
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[0].value, "3");
    }

    #[test]
    fn clear_empties_the_list() {
        let store = store();
        store.upsert(Preset::kv("a", PresetTarget::Query, "k", "v")).unwrap();
        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
