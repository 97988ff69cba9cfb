use serde::{Deserialize, Serialize};

use forgeloop_core::Bundle;

/// Prompt templates used by the propose and judge oracles.
///
/// Templates are an explicit per-task value, constructed at task start and
/// threaded into the oracles, so concurrent tasks can never observe each
/// other's overrides. Slots are literal `{task}`-style placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplates {
    pub generation: String,
    pub review: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            generation: DEFAULT_GENERATION_PROMPT.to_string(),
            review: DEFAULT_REVIEW_PROMPT.to_string(),
        }
    }
}

const DEFAULT_GENERATION_PROMPT: &str = r#"You are an autonomous coding agent.

The task: {task}
The acceptance criteria: {criteria}

You must produce a container build recipe and code whose run output meets the acceptance criteria.

Requirements:
- Start with a `readme.md` file containing a brief summary of the task and a step-by-step plan for meeting the acceptance criteria.
- Use a stable base image such as `FROM python:3.10-slim`.
- Install any necessary dependencies in the build descriptor.
- Generate configuration files (like `pyproject.toml` or `requirements.txt`) before the main application files, if needed.
- The build descriptor must define an ENTRYPOINT that runs the main script automatically, so running the container immediately produces the final output.
- Ensure the output visible on stdout fulfills the acceptance criteria without further intervention.
{env_section}
End your reply with a single block in exactly this form:

<bundle>
{"build_descriptor": "<full build recipe>", "files": [{"path": "<relative path>", "content": "<full file content>"}]}
</bundle>

Return valid JSON inside the block, with no extra keys and no commentary.
"#;

const DEFAULT_REVIEW_PROMPT: &str = r#"You are reviewing one round of an autonomous coding loop.

The acceptance criteria: {criteria}

Build descriptor:
{build_descriptor}

Files:
{files}

Execution output:
{output}

If the execution output meets all acceptance criteria, end your reply with:

<verdict>
{"satisfied": true}
</verdict>

Otherwise end your reply with a verdict carrying a patch. A present patch field replaces the whole field; omit a field to leave it unchanged; an empty files array removes all files. Provide complete replacement content for every file you touch, never a diff:

<verdict>
{"satisfied": false, "patch": {"build_descriptor": "<full build recipe, or omit>", "files": [{"path": "<relative path>", "content": "<full file content>"}]}}
</verdict>

Follow the schema strictly. Do not add extra keys or commentary inside the block.
"#;

/// Longest execution output carried into the review prompt
const MAX_OUTPUT_CHARS: usize = 20_000;

impl PromptTemplates {
    /// Build the generation prompt for the propose oracle
    pub fn render_generation(&self, task: &str, criteria: &str, env_names: &[String]) -> String {
        self.generation
            .replace("{task}", task)
            .replace("{criteria}", criteria)
            .replace("{env_section}", &env_section(env_names))
    }

    /// Build the review prompt for the judge oracle
    pub fn render_review(&self, criteria: &str, bundle: &Bundle, output: &str) -> String {
        self.review
            .replace("{criteria}", criteria)
            .replace("{build_descriptor}", &bundle.build_descriptor)
            .replace("{files}", &render_files(bundle))
            .replace("{output}", &truncate_output(output, MAX_OUTPUT_CHARS))
    }
}

fn env_section(env_names: &[String]) -> String {
    if env_names.is_empty() {
        return String::new();
    }
    let mut section = String::from(
        "\nThe following environment variables will be provided to the container at run time:\n",
    );
    for name in env_names {
        section.push_str(&format!("- {}\n", name));
    }
    // Values are injected by the sandbox, never echoed into prompts
    section.push_str(
        "Read them via the environment where the task requires it; do not hardcode values.\n",
    );
    section
}

fn render_files(bundle: &Bundle) -> String {
    if bundle.files.is_empty() {
        return "(no files)".to_string();
    }
    let mut listing = String::new();
    for file in &bundle.files {
        listing.push_str(&format!("--- {} ---\n{}\n", file.path, file.content));
    }
    listing
}

fn truncate_output(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars).collect();
        format!("{}\n... [output truncated]", kept)
    }
}
