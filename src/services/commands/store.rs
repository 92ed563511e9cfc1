//! Persistence for command definitions.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use uuid::Uuid;

use super::types::{CommandDefinition, CommandDefinitionUpdate};
use crate::types::errors::{EngineError, EngineResult};

pub struct CommandStore {
    path: PathBuf,
    definitions: StdMutex<Vec<CommandDefinition>>,
}

impl CommandStore {
    pub fn open(path: &Path) -> EngineResult<Self> {
        let definitions = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| EngineError::Document(format!("{}: {e}", path.display())))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            definitions: StdMutex::new(definitions),
        })
    }

    pub fn list(&self) -> Vec<CommandDefinition> {
        self.definitions.lock().unwrap().clone()
    }

    pub fn get(&self, command_id: &str) -> Option<CommandDefinition> {
        self.definitions
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == command_id)
            .cloned()
    }

    pub fn create(&self, mut definition: CommandDefinition) -> EngineResult<CommandDefinition> {
        if definition.id.is_empty() {
            definition.id = Uuid::new_v4().to_string();
        }
        let mut defs = self.definitions.lock().unwrap();
        defs.push(definition.clone());
        self.persist(&defs)?;
        log::info!("[Commands] Created '{}'", definition.display_name);
        Ok(definition)
    }

    pub fn update(
        &self,
        command_id: &str,
        update: &CommandDefinitionUpdate,
    ) -> EngineResult<CommandDefinition> {
        let mut defs = self.definitions.lock().unwrap();
        let def = defs
            .iter_mut()
            .find(|d| d.id == command_id)
            .ok_or_else(|| EngineError::CommandNotFound(command_id.to_string()))?;

        if !update.any_set() {
            return Ok(def.clone());
        }
        if let Some(name) = &update.display_name {
            def.display_name = name.clone();
        }
        if let Some(exe) = &update.executable {
            def.executable = exe.clone();
        }
        if let Some(args) = &update.arguments {
            def.arguments = args.clone();
        }
        if let Some(dir) = &update.working_dir {
            def.working_dir = dir.clone();
        }
        if let Some(elevated) = update.run_elevated {
            def.run_elevated = elevated;
        }
        if let Some(shell) = update.use_shell_execute {
            def.use_shell_execute = shell;
        }
        if let Some(kill) = update.kill_on_exit {
            def.kill_on_exit = kill;
        }
        let updated = def.clone();
        self.persist(&defs)?;
        Ok(updated)
    }

    pub fn delete(&self, command_id: &str) -> EngineResult<()> {
        let mut defs = self.definitions.lock().unwrap();
        let before = defs.len();
        defs.retain(|d| d.id != command_id);
        if defs.len() == before {
            return Err(EngineError::CommandNotFound(command_id.to_string()));
        }
        self.persist(&defs)?;
        Ok(())
    }

    fn persist(&self, definitions: &[CommandDefinition]) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(definitions)
            .map_err(|e| EngineError::Document(e.to_string()))?;
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| EngineError::Document(format!("persist commands: {e}")))?;
        Ok(())
    }
}
