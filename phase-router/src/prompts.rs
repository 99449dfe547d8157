//! Phase prompt construction

use crate::request::{TaskContext, WorkspaceTaskType};

fn task_type_note(task_type: Option<WorkspaceTaskType>) -> &'static str {
    match task_type {
        Some(WorkspaceTaskType::Refine) => {
            r#"
## Refine Task
The workspace holds an existing codebase. Improve it rather than starting over:
- Understand the current implementation before changing it
- Refactor, optimize or extend existing modules
- Fix bugs and gaps in tests or documentation
"#
        }
        Some(WorkspaceTaskType::New) => {
            r#"
## New Task
The workspace is empty. Build the requested functionality from scratch:
- Design the modules you need
- Keep the first version small and working
"#
        }
        None => "",
    }
}

/// Prompt for the Planning phase
pub fn planner_prompt(ctx: &TaskContext) -> String {
    format!(
        r#"You are a planning expert. Analyze the task and the workspace, then produce a structured plan.
{note}
## Task
{description}

## Workspace Context
{context}

## Instructions
1. Analyze the task requirements and the workspace
2. Write a numbered TODO list of specific, actionable items
3. Note dependencies between items and estimate the effort of each
4. Mark which items are routine (suitable for a cost-optimized model) and which need a premium model

Output:
- Executive summary (2-3 sentences)
- Numbered TODO list with effort levels
- Approach notes, assumptions and potential blockers
- Model allocation recommendations
"#,
        note = task_type_note(ctx.task_type),
        description = ctx.description,
        context = if ctx.workspace_context.is_empty() {
            "(none provided)"
        } else {
            ctx.workspace_context.as_str()
        },
    )
}

/// Prompt for the Execution phase
pub fn worker_prompt(ctx: &TaskContext, cost_optimized: bool) -> String {
    let model_note = if cost_optimized {
        r#"
## Cost-Optimized Execution
You are running on a cost-effective model. Follow the plan precisely, keep the
code straightforward and avoid unnecessary complexity.
"#
    } else {
        r#"
## Premium Execution
You are running on a premium model. Prefer robust solutions, handle edge cases
and errors, and keep the code maintainable.
"#
    };

    format!(
        r#"You are an expert engineer. Execute the plan below to complete the task.
{model_note}
## Task
{description}

## Plan to Execute
{plan}

## Instructions
1. Work through the TODO items of the plan in order
2. Track progress with TodoWrite
3. Make changes with the available tools (Read, Write, Edit, Bash)
4. Test your changes as needed
5. Finish with a summary of what you completed, any deviations from the plan and any blockers
"#,
        model_note = model_note,
        description = ctx.description,
        plan = ctx.plan.as_deref().unwrap_or("(no plan available, work from the task description)"),
    )
}

/// Prompt for the Review phase
pub fn evaluator_prompt(ctx: &TaskContext) -> String {
    let (output, files, commands) = match &ctx.execution {
        Some(summary) => (
            summary.output.as_str(),
            summary.files_modified.len(),
            summary.commands_executed.len(),
        ),
        None => ("(no execution output)", 0, 0),
    };

    format!(
        r#"You are a quality assurance expert. Evaluate whether the task was completed.

## Task
{description}

## Original Plan
{plan}

## Worker Output
{output}

## Changes Made
- Files Modified: {files}
- Commands Executed: {commands}

## Instructions
1. Review the worker output against the plan
2. Verify each TODO item was addressed
3. Identify incomplete items or issues
4. Assess whether the model used for execution was appropriate

Output, using these section headings:
## Completion Status
One of COMPLETE, INCOMPLETE or PARTIAL.
## Completed Items
## Outstanding Items
A bulleted list, or "None".
## Quality Assessment
## Recommendations
A bulleted list, or "None".
"#,
        description = ctx.description,
        plan = ctx.plan.as_deref().unwrap_or("(no plan available)"),
        output = output,
        files = files,
        commands = commands,
    )
}
