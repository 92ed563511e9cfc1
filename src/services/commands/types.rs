use serde::{Deserialize, Serialize};

/// Placeholder in a definition's argument string, replaced with the
/// target path at launch time.
pub const TARGET_PATH_PLACEHOLDER: &str = "%TARGET%";

/// A user-defined external command, persisted in `commands.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub id: String,
    pub display_name: String,
    pub executable: String,
    /// Space-separated argument string; may contain `%TARGET%`.
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub run_elevated: bool,
    #[serde(default)]
    pub use_shell_execute: bool,
    /// Terminate live runs of this definition on engine shutdown.
    #[serde(default)]
    pub kill_on_exit: bool,
}

/// Explicit per-field update; a field applies exactly when set.
#[derive(Debug, Clone, Default)]
pub struct CommandDefinitionUpdate {
    pub display_name: Option<String>,
    pub executable: Option<String>,
    pub arguments: Option<String>,
    pub working_dir: Option<Option<String>>,
    pub run_elevated: Option<bool>,
    pub use_shell_execute: Option<bool>,
    pub kill_on_exit: Option<bool>,
}

impl CommandDefinitionUpdate {
    pub fn any_set(&self) -> bool {
        self.display_name.is_some()
            || self.executable.is_some()
            || self.arguments.is_some()
            || self.working_dir.is_some()
            || self.run_elevated.is_some()
            || self.use_shell_execute.is_some()
            || self.kill_on_exit.is_some()
    }
}

/// One live run of a definition. Several runs of one definition may
/// exist at the same time.
#[derive(Debug, Clone, Serialize)]
pub struct RunningCommand {
    pub run_id: String,
    pub command_id: String,
    pub command_line: String,
    pub started_at: String,
}

/// Change notification for the running set.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum CommandEvent {
    Started { run: RunningCommand },
    Exited { run_id: String, exit_code: Option<i32> },
}

/// Tokenize the argument template and substitute launch-time
/// placeholders. Splitting happens before substitution so a target
/// path containing spaces stays a single argument.
pub fn resolve_arguments(arguments: &str, target_path: Option<&str>) -> Vec<String> {
    arguments
        .split_whitespace()
        .map(|token| match target_path {
            Some(target) => token.replace(TARGET_PATH_PLACEHOLDER, target),
            None => token.to_string(),
        })
        .collect()
}
