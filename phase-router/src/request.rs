//! Phase requests and the task context they are built from

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::backend::{Backend, Phase};

/// Tool capability a backend session may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Read,
    Glob,
    Grep,
    Write,
    Edit,
    Bash,
    TodoWrite,
}

impl Capability {
    /// Tool name as understood by the backend CLI
    pub fn tool_name(&self) -> &'static str {
        match self {
            Capability::Read => "Read",
            Capability::Glob => "Glob",
            Capability::Grep => "Grep",
            Capability::Write => "Write",
            Capability::Edit => "Edit",
            Capability::Bash => "Bash",
            Capability::TodoWrite => "TodoWrite",
        }
    }

    /// Browse, search and read only
    pub fn read_only() -> BTreeSet<Capability> {
        [Capability::Read, Capability::Glob, Capability::Grep].into()
    }

    /// Read-only set plus write, edit, shell and todo tracking
    pub fn read_write() -> BTreeSet<Capability> {
        let mut set = Self::read_only();
        set.extend([
            Capability::Write,
            Capability::Edit,
            Capability::Bash,
            Capability::TodoWrite,
        ]);
        set
    }

    pub fn for_phase(phase: Phase) -> BTreeSet<Capability> {
        if phase.is_read_only() {
            Self::read_only()
        } else {
            Self::read_write()
        }
    }
}

/// Permission mode passed to the backend CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionPolicy {
    Default,
    #[default]
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl PermissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionPolicy::Default => "default",
            PermissionPolicy::AcceptEdits => "acceptEdits",
            PermissionPolicy::BypassPermissions => "bypassPermissions",
            PermissionPolicy::Plan => "plan",
        }
    }
}

/// Kind of workspace a task runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceTaskType {
    /// Improve an existing codebase
    Refine,
    /// Build from scratch in a fresh workspace
    New,
}

/// Summary of an Execution phase handed to the Review phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub output: String,
    pub files_modified: BTreeSet<PathBuf>,
    pub commands_executed: Vec<String>,
}

/// Everything a phase needs to know about the task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: String,
    pub description: String,
    /// Free-form notes about the workspace
    #[serde(default)]
    pub workspace_context: String,
    pub working_directory: PathBuf,
    /// Additional directories the backend may access
    #[serde(default)]
    pub extra_directories: Vec<PathBuf>,
    #[serde(default)]
    pub task_type: Option<WorkspaceTaskType>,
    /// Overrides the configured turn budget for every phase
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Planning output, set before Execution and Review
    #[serde(default)]
    pub plan: Option<String>,
    /// Execution outcome, set before Review
    #[serde(default)]
    pub execution: Option<ExecutionSummary>,
}

impl TaskContext {
    pub fn new(
        task_id: impl Into<String>,
        description: impl Into<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            description: description.into(),
            workspace_context: String::new(),
            working_directory: working_directory.into(),
            extra_directories: Vec::new(),
            task_type: None,
            max_turns: None,
            plan: None,
            execution: None,
        }
    }

    pub fn with_workspace_context(mut self, context: impl Into<String>) -> Self {
        self.workspace_context = context.into();
        self
    }

    pub fn with_task_type(mut self, task_type: WorkspaceTaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn with_extra_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_directories.push(dir.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }
}

/// A fully built request for one phase call
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRequest {
    pub phase: Phase,
    pub prompt_text: String,
    pub working_directory: PathBuf,
    pub extra_directories: Vec<PathBuf>,
    pub allowed_capabilities: BTreeSet<Capability>,
    pub permission_policy: PermissionPolicy,
    pub max_turns: u32,
    pub backend: Backend,
    pub model: Option<String>,
}

impl PhaseRequest {
    pub fn new(
        phase: Phase,
        backend: Backend,
        prompt_text: String,
        working_directory: &Path,
    ) -> Self {
        Self {
            phase,
            prompt_text,
            working_directory: working_directory.to_path_buf(),
            extra_directories: Vec::new(),
            allowed_capabilities: Capability::for_phase(phase),
            permission_policy: PermissionPolicy::default(),
            max_turns: phase.default_max_turns(),
            backend,
            model: None,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.allowed_capabilities.contains(&capability)
    }

    /// Comma-separated tool names in stable order
    pub fn allowed_tools(&self) -> String {
        self.allowed_capabilities
            .iter()
            .map(Capability::tool_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}
