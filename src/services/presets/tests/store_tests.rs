use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::store::PresetStore;
use crate::services::library::settings::ModSettingsUpdate;
use crate::services::library::ModLibrary;
use crate::types::errors::EngineError;

struct Fixture {
    _tmp: TempDir,
    store: PresetStore,
    library: ModLibrary,
    store_path: PathBuf,
}

fn setup() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("Mods");
    fs::create_dir_all(&root).unwrap();
    let library = ModLibrary::open(&root, &tmp.path().join("trash")).unwrap();
    let store_path = tmp.path().join("data").join("presets.json");
    let store = PresetStore::open(&store_path).unwrap();
    Fixture {
        _tmp: tmp,
        store,
        library,
        store_path,
    }
}

fn make_mod(root: &Path, owner: &str, name: &str) {
    let dir = root.join(owner).join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("mod.ini"), "[Constants]").unwrap();
}

fn add_mod(fx: &Fixture, owner: &str, name: &str) -> String {
    make_mod(fx.library.root(), owner, name);
    fx.library.rescan().unwrap();
    fx.library
        .list_owner(owner)
        .into_iter()
        .find(|m| m.display_name() == name)
        .unwrap()
        .id
}

#[tokio::test]
async fn test_capture_snapshots_enabled_set_with_preferences() {
    let fx = setup();
    let a = add_mod(&fx, "Raiden", "SkinA");
    let b = add_mod(&fx, "Raiden", "SkinB");

    let mut prefs = std::collections::HashMap::new();
    prefs.insert("glow".to_string(), "high".to_string());
    fx.library
        .update_settings(
            &a,
            &ModSettingsUpdate {
                preferences: Some(prefs),
                ..Default::default()
            },
        )
        .unwrap();
    fx.library.disable(&b).await.unwrap();

    let preset = fx.store.capture("night-set", &fx.library).unwrap();
    assert_eq!(preset.entries.len(), 1);
    assert_eq!(preset.entries[0].mod_id, a);
    assert_eq!(preset.entries[0].preferences.get("glow").unwrap(), "high");

    // The snapshot survives a reopen of the store file.
    let reopened = PresetStore::open(&fx.store_path).unwrap();
    assert_eq!(reopened.get("night-set").unwrap().entries.len(), 1);
}

#[tokio::test]
async fn test_capture_same_name_replaces() {
    let fx = setup();
    let a = add_mod(&fx, "Raiden", "SkinA");
    fx.store.capture("set", &fx.library).unwrap();

    fx.library.disable(&a).await.unwrap();
    let preset = fx.store.capture("set", &fx.library).unwrap();
    assert!(preset.entries.is_empty());
    assert_eq!(fx.store.list().len(), 1);
}

#[tokio::test]
async fn test_apply_enables_and_applies_preferences() {
    let fx = setup();
    let a = add_mod(&fx, "Raiden", "SkinA");
    let mut prefs = std::collections::HashMap::new();
    prefs.insert("glow".to_string(), "low".to_string());
    fx.library
        .update_settings(
            &a,
            &ModSettingsUpdate {
                preferences: Some(prefs),
                ..Default::default()
            },
        )
        .unwrap();

    fx.store.capture("set", &fx.library).unwrap();
    fx.library.disable(&a).await.unwrap();

    let result = fx.store.apply("set", &fx.library).await.unwrap();
    assert_eq!(result.changed_count, 1);
    assert!(result.warnings.is_empty());
    assert!(fx.library.get(&a).unwrap().is_enabled);

    // Applying again changes nothing.
    let result = fx.store.apply("set", &fx.library).await.unwrap();
    assert_eq!(result.changed_count, 0);
}

#[tokio::test]
async fn test_apply_marks_missing_entries_persistently() {
    let fx = setup();
    let a = add_mod(&fx, "Raiden", "SkinA");
    let b = add_mod(&fx, "Raiden", "SkinB");
    fx.store.capture("set", &fx.library).unwrap();

    fx.library
        .delete(&[a.clone()], false)
        .await
        .unwrap();
    fx.library.disable(&b).await.unwrap();

    let result = fx.store.apply("set", &fx.library).await.unwrap();
    // The missing entry is a warning, not a failure; the rest applied.
    assert_eq!(result.changed_count, 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(fx.library.get(&b).unwrap().is_enabled);

    let preset = fx.store.get("set").unwrap();
    let entry = preset.entries.iter().find(|e| e.mod_id == a).unwrap();
    assert!(entry.is_missing);

    // The flag is persisted, not just in memory.
    let reopened = PresetStore::open(&fx.store_path).unwrap();
    let entry_on_disk = reopened
        .get("set")
        .unwrap()
        .entries
        .iter()
        .find(|e| e.mod_id == a)
        .cloned()
        .unwrap();
    assert!(entry_on_disk.is_missing);
}

#[tokio::test]
async fn test_apply_continues_past_entry_that_fails_to_enable() {
    let fx = setup();
    let a = add_mod(&fx, "Raiden", "SkinA");
    let b = add_mod(&fx, "Raiden", "SkinB");
    fx.store.capture("set", &fx.library).unwrap();

    fx.library.disable(&a).await.unwrap();
    fx.library.disable(&b).await.unwrap();
    // Re-enabling SkinA now collides with a freshly created folder.
    make_mod(fx.library.root(), "Raiden", "SkinA");

    let result = fx.store.apply("set", &fx.library).await.unwrap();
    assert_eq!(result.changed_count, 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(!fx.library.get(&a).unwrap().is_enabled);
    assert!(fx.library.get(&b).unwrap().is_enabled);
}

#[tokio::test]
async fn test_apply_unknown_preset() {
    let fx = setup();
    let result = fx.store.apply("nope", &fx.library).await;
    assert!(matches!(result, Err(EngineError::PresetNotFound(_))));
}

#[tokio::test]
async fn test_find_referencing_and_delete_entry() {
    let fx = setup();
    let a = add_mod(&fx, "Raiden", "SkinA");
    fx.store.capture("one", &fx.library).unwrap();
    fx.store.capture("two", &fx.library).unwrap();

    let refs = fx
        .store
        .find_presets_referencing(&[a.clone(), "unknown".to_string()]);
    assert_eq!(refs.get(&a).unwrap().len(), 2);
    assert!(!refs.contains_key("unknown"));

    fx.store.delete_entry("one", &a).unwrap();
    assert!(fx.store.get("one").unwrap().entries.is_empty());
    // A second removal of the same entry is a per-entry error the
    // caller records and moves past.
    let result = fx.store.delete_entry("one", &a);
    assert!(matches!(result, Err(EngineError::ModNotFound(_))));
}

#[tokio::test]
async fn test_delete_preset() {
    let fx = setup();
    add_mod(&fx, "Raiden", "SkinA");
    fx.store.capture("set", &fx.library).unwrap();

    fx.store.delete_preset("set").unwrap();
    assert!(fx.store.list().is_empty());
    assert!(matches!(
        fx.store.delete_preset("set"),
        Err(EngineError::PresetNotFound(_))
    ));
}
