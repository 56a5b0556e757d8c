//! Run input and task templating.

/// Default rendering of a structured task.
pub const DEFAULT_TASK_TEMPLATE: &str = "<task>\n{task}\n</task>\n\n\
Working directory: {workspace}\n\n\
Complete the task above. Use the available tools to inspect and change files. \
When you are finished, return control to the user with a short summary.";

/// What a run starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunInput {
    /// Plain user text, used as is
    Instruction(String),
    /// A task rendered through the agent's [`TaskTemplate`]
    Task {
        task: String,
        workspace: Option<String>,
    },
}

impl From<&str> for RunInput {
    fn from(text: &str) -> Self {
        RunInput::Instruction(text.to_string())
    }
}

impl From<String> for RunInput {
    fn from(text: String) -> Self {
        RunInput::Instruction(text)
    }
}

/// Prompt template with `{task}` and `{workspace}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate(String);

impl TaskTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, task: &str, workspace: &str) -> String {
        self.0.replace("{task}", task).replace("{workspace}", workspace)
    }

    /// Turn `input` into the text of the first user prompt. `default_workspace`
    /// fills `{workspace}` when the task names none.
    pub fn render_input(&self, input: &RunInput, default_workspace: &str) -> String {
        match input {
            RunInput::Instruction(text) => text.clone(),
            RunInput::Task { task, workspace } => {
                self.render(task, workspace.as_deref().unwrap_or(default_workspace))
            }
        }
    }
}

impl Default for TaskTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TEMPLATE)
    }
}
