//! Prompt text for commit generation and file selection

use crate::config::CommitConfig;

/// System prompt for commit messages
pub const COMMIT_SYSTEM_PROMPT: &str = r#"You are NEXUS AI, an expert at writing git commit messages.

Based on the changes provided, generate a semantic commit message following these rules:

## Format
```
<type>(<scope>): <subject>

<body>
```

## Types
- feat: New feature
- fix: Bug fix
- docs: Documentation changes
- style: Code style changes (formatting, semicolons, etc.)
- refactor: Code refactoring without functionality change
- perf: Performance improvements
- test: Adding or updating tests
- chore: Maintenance tasks, dependencies, configs
- ci: CI/CD changes

## Rules
1. Subject line: max 50 characters, imperative mood ("add" not "added")
2. Body: wrap at 72 characters, explain what and why (not how)
3. Scope is optional but helpful for larger projects
4. Keep it concise but informative

## Input
Each file starts with `### <path> (<status>)`. Each hunk starts with
`@@ <range> @@ <context>` followed by added (`+`) and removed (`-`) lines.
Noise such as lock files and formatting-only edits has been removed.

## Output
Provide ONLY the commit message, no explanations or markdown formatting."#;

/// System prompt for choosing files out of a large commit
pub const SELECTION_SYSTEM_PROMPT: &str = r#"You are NEXUS AI, choosing which changed files best describe a commit.

Guidelines:
- Favor files that represent the core purpose of the commit
- Prefer code over configuration and documentation, unless configuration is the change
- When several test files change in near-identical ways, keep one representative
- Treat added and deleted files as strong signals of a refactor or new feature

Respond with strict JSON only, no prose and no markdown:
{"selectedFiles": ["path", ...], "reasoning": "one sentence", "confidence": 0.0}"#;

/// User prompt for one piece of the serialized changes
pub fn commit_user_prompt(
    content: &str,
    part: usize,
    total: usize,
    policy: &CommitConfig,
) -> String {
    let mut prompt = String::new();

    if total > 1 {
        prompt.push_str(&format!(
            "This is part {} of {} of a large commit. \
             Describe the commit as a whole as far as this part shows it.\n\n",
            part, total
        ));
    }

    match (&policy.commit_type, &policy.scope) {
        (Some(kind), Some(scope)) => {
            prompt.push_str(&format!("Use the prefix `{}({}):`.\n\n", kind, scope))
        }
        (Some(kind), None) => prompt.push_str(&format!("Use the type `{}`.\n\n", kind)),
        (None, Some(scope)) => prompt.push_str(&format!("Use the scope `{}`.\n\n", scope)),
        (None, None) => {}
    }

    prompt.push_str("## Changes\n\n");
    prompt.push_str(content);
    prompt.push_str("\n\nGenerate a commit message:");
    prompt
}

/// User prompt listing file previews for selection
pub fn selection_user_prompt(previews: &str, file_count: usize, max_files: usize) -> String {
    format!(
        "{} files changed. Select at most {} of them.\n\n{}\n\nRespond with the JSON object:",
        file_count, max_files, previews
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part_prompt_has_no_part_note() {
        let prompt = commit_user_prompt("### a.rs (added)", 1, 1, &CommitConfig::default());
        assert!(!prompt.contains("part 1"));
        assert!(prompt.contains("### a.rs (added)"));
    }

    #[test]
    fn test_multi_part_prompt_and_policy() {
        let policy = CommitConfig {
            commit_type: Some("fix".into()),
            scope: Some("parser".into()),
        };
        let prompt = commit_user_prompt("body", 2, 3, &policy);
        assert!(prompt.contains("part 2 of 3"));
        assert!(prompt.contains("`fix(parser):`"));
    }
}
