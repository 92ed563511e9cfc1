#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use tempfile::TempDir;

    use skinvault::config::EngineConfig;
    use skinvault::engine::Engine;
    use skinvault::services::cache::archive_cache::hash_bytes;
    use skinvault::services::core::cancel::CancelToken;
    use skinvault::services::install::{InstallRequest, InstallSession, InstallState};

    fn engine() -> (TempDir, Engine) {
        let tmp = TempDir::new().unwrap();
        let config =
            EngineConfig::under_data_dir(&tmp.path().join("data"), tmp.path().join("Mods"));
        let engine = Engine::open(config).unwrap();
        (tmp, engine)
    }

    fn zip_bytes(inner_name: &str) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        writer
            .start_file(format!("{inner_name}/mod.ini"), options)
            .unwrap();
        writer.write_all(b"[Constants]\nglobal $active = 1").unwrap();
        writer.finish().unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_full_mod_lifecycle() {
        let (_tmp, engine) = engine();

        // 1. Admit the archive into the cache.
        let bytes = zip_bytes("NeonSkin-v3");
        let hash = hash_bytes(&bytes);
        engine.cache().put(bytes, &hash).await.unwrap();

        // 2. Install it under an owning object.
        let session = InstallSession::new();
        let outcome = engine
            .install(
                &InstallRequest {
                    archive_hash: hash.clone(),
                    archive_name: "NeonSkin_!!_gamebanana_!!_482913_!!_zip".to_string(),
                    owner: "Raiden".to_string(),
                    source_url: Some("https://example.com/482913".to_string()),
                    default_preferences: None,
                },
                &CancelToken::new(),
                &session,
            )
            .await
            .unwrap();
        assert_eq!(session.state(), InstallState::Installed);
        let mod_id = outcome.mod_folder.id.clone();
        assert!(!outcome.mod_folder.is_enabled);

        // 3. Enable it and snapshot the enabled set.
        engine.library().enable(&mod_id).await.unwrap();
        let preset = engine.presets().capture("main-look", engine.library()).unwrap();
        assert_eq!(preset.entries.len(), 1);

        // 4. Delete the mod through the engine: the preset reference is
        //    cleaned before the folder goes.
        let refs = engine.presets_referencing(&[mod_id.clone()]);
        assert_eq!(refs.get(&mod_id).unwrap(), &vec!["main-look".to_string()]);

        let result = engine
            .delete_mods(&[mod_id.clone()], false, true)
            .await
            .unwrap();
        assert!(result.all_succeeded());
        assert!(engine.library().get(&mod_id).is_none());
        assert!(engine
            .presets()
            .get("main-look")
            .unwrap()
            .entries
            .is_empty());

        // 5. Applying the now-empty preset is a clean no-op.
        let applied = engine
            .presets()
            .apply("main-look", engine.library())
            .await
            .unwrap();
        assert_eq!(applied.changed_count, 0);
        assert!(applied.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_trash_round_trip_through_engine() {
        let (_tmp, engine) = engine();

        let dir = engine.config().library_root.join("Ayaka").join("Frost");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("mod.ini"), "[Constants]").unwrap();
        engine.library().rescan().unwrap();
        let id = engine.library().list_owner("Ayaka")[0].id.clone();

        let result = engine.delete_mods(&[id.clone()], true, false).await.unwrap();
        assert!(result.all_succeeded());
        assert!(!dir.exists());

        let entries =
            skinvault::services::library::trash::list_trash(&engine.config().trash_dir).unwrap();
        assert_eq!(entries.len(), 1);
        skinvault::services::library::trash::restore_from_trash(
            &entries[0].id,
            &engine.config().trash_dir,
        )
        .unwrap();
        assert!(dir.join("mod.ini").exists());
    }

    #[tokio::test]
    async fn test_delete_can_keep_preset_references() {
        let (_tmp, engine) = engine();

        let dir = engine.config().library_root.join("Ayaka").join("Frost");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("mod.ini"), "[Constants]").unwrap();
        engine.library().rescan().unwrap();
        let id = engine.library().list_owner("Ayaka")[0].id.clone();
        engine.presets().capture("keep", engine.library()).unwrap();

        // Opting out of cleanup leaves the entry for the missing-mod
        // flow to surface on the next apply.
        let result = engine.delete_mods(&[id.clone()], false, false).await.unwrap();
        assert!(result.all_succeeded());
        assert_eq!(engine.presets().get("keep").unwrap().entries.len(), 1);

        let applied = engine.presets().apply("keep", engine.library()).await.unwrap();
        assert_eq!(applied.warnings.len(), 1);
        assert!(engine.presets().get("keep").unwrap().entries[0].is_missing);
    }

    #[tokio::test]
    async fn test_cancelled_install_is_invisible() {
        let (_tmp, engine) = engine();
        let bytes = zip_bytes("Skin");
        let hash = hash_bytes(&bytes);
        engine.cache().put(bytes, &hash).await.unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let session = InstallSession::new();
        let result = engine
            .install(
                &InstallRequest {
                    archive_hash: hash,
                    archive_name: "Skin_!!_src_!!_1_!!_zip".to_string(),
                    owner: "Raiden".to_string(),
                    source_url: None,
                    default_preferences: None,
                },
                &cancel,
                &session,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(session.state(), InstallState::Canceled);
        assert!(engine.library().list().is_empty());
    }
}
