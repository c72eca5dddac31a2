//! Merging per-chunk model outputs into one commit message

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::CommitConfig;

static PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)(\(([^)]*)\))?(!)?:\s*").expect("valid commit prefix regex"));

/// Conventional-commit type and scope every final message must carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPolicy {
    pub commit_type: Option<String>,
    pub scope: Option<String>,
}

impl From<&CommitConfig> for CommitPolicy {
    fn from(config: &CommitConfig) -> Self {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            commit_type: clean(&config.commit_type),
            scope: clean(&config.scope),
        }
    }
}

impl CommitPolicy {
    pub fn is_empty(&self) -> bool {
        self.commit_type.is_none() && self.scope.is_none()
    }

    /// Stable rendering for cache keys, `None` when nothing is required
    pub fn fingerprint(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!(
            "type={}\0scope={}",
            self.commit_type.as_deref().unwrap_or_default(),
            self.scope.as_deref().unwrap_or_default()
        ))
    }

    /// Rewrite only the leading `type(scope)!:` so it matches the policy
    pub fn enforce(&self, message: &str) -> String {
        if self.is_empty() {
            return message.to_string();
        }

        let Some(caps) = PREFIX.captures(message) else {
            return match &self.commit_type {
                Some(kind) => format!("{}{}", self.render(kind, None, false), message),
                None => message.to_string(),
            };
        };

        let current_type = caps.get(1).map_or("", |m| m.as_str());
        let current_scope = caps.get(3).map(|m| m.as_str());
        let breaking = caps.get(4).is_some();

        let kind = self.commit_type.as_deref().unwrap_or(current_type);
        let scope = self.scope.as_deref().or(current_scope);
        if kind == current_type && scope == current_scope {
            return message.to_string();
        }

        let rest = &message[caps.get(0).map_or(0, |m| m.end())..];
        format!("{}{}", self.render(kind, scope, breaking), rest)
    }

    fn render(&self, kind: &str, scope: Option<&str>, breaking: bool) -> String {
        let scope = scope.or(self.scope.as_deref());
        let mut prefix = kind.to_string();
        if let Some(scope) = scope.filter(|s| !s.is_empty()) {
            prefix.push('(');
            prefix.push_str(scope);
            prefix.push(')');
        }
        if breaking {
            prefix.push('!');
        }
        prefix.push_str(": ");
        prefix
    }
}

pub trait ResultCombiner: Send + Sync {
    /// `None` when there is nothing to combine
    fn combine(&self, messages: Vec<String>) -> Option<String>;
}

/// Keeps the longest message; the others are dropped
#[derive(Debug, Clone, Default)]
pub struct LongestMessageCombiner {
    policy: CommitPolicy,
}

impl LongestMessageCombiner {
    pub fn new(policy: CommitPolicy) -> Self {
        Self { policy }
    }
}

impl ResultCombiner for LongestMessageCombiner {
    fn combine(&self, messages: Vec<String>) -> Option<String> {
        let mut messages: Vec<String> = messages
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();

        if messages.len() <= 1 {
            return messages.pop();
        }

        let mut best = 0;
        for (i, message) in messages.iter().enumerate() {
            if message.chars().count() > messages[best].chars().count() {
                best = i;
            }
        }
        Some(self.policy.enforce(&messages[best]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(kind: Option<&str>, scope: Option<&str>) -> CommitPolicy {
        CommitPolicy {
            commit_type: kind.map(str::to_string),
            scope: scope.map(str::to_string),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fingerprint_tells_policies_apart() {
        assert_eq!(CommitPolicy::default().fingerprint(), None);
        let typed = policy(Some("fix"), None).fingerprint();
        let scoped = policy(None, Some("fix")).fingerprint();
        assert!(typed.is_some());
        assert_ne!(typed, scoped);
        assert_ne!(typed, policy(Some("feat"), None).fingerprint());
    }

    #[test]
    fn test_single_message_is_unchanged() {
        let combiner = LongestMessageCombiner::new(policy(Some("fix"), None));
        assert_eq!(
            combiner.combine(strings(&["feat: add parser"])).as_deref(),
            Some("feat: add parser")
        );
        assert_eq!(combiner.combine(vec![]), None);
        assert_eq!(combiner.combine(strings(&["  ", ""])), None);
    }

    #[test]
    fn test_longest_wins_first_on_ties() {
        let combiner = LongestMessageCombiner::default();
        assert_eq!(
            combiner
                .combine(strings(&["feat: a", "feat: longer one", "fix: shorter"]))
                .as_deref(),
            Some("feat: longer one")
        );
        assert_eq!(
            combiner.combine(strings(&["fix: aaa", "fix: bbb"])).as_deref(),
            Some("fix: aaa")
        );
    }

    #[test]
    fn test_policy_rewrites_only_the_prefix() {
        let combiner = LongestMessageCombiner::new(policy(Some("fix"), Some("parser")));
        let out = combiner
            .combine(strings(&["x", "feat(core): handle renames\n\nBody stays."]))
            .unwrap();
        assert_eq!(out, "fix(parser): handle renames\n\nBody stays.");
    }

    #[test]
    fn test_policy_edge_cases() {
        let fix = policy(Some("fix"), None);
        assert_eq!(fix.enforce("fix: ok"), "fix: ok");
        assert_eq!(fix.enforce("feat(api)!: drop v1"), "fix(api)!: drop v1");
        assert_eq!(fix.enforce("handle renames"), "fix: handle renames");

        let scoped = policy(None, Some("cli"));
        assert_eq!(scoped.enforce("feat: add flag"), "feat(cli): add flag");
        assert_eq!(scoped.enforce("add flag"), "add flag");

        let both = policy(Some("docs"), Some("readme"));
        assert_eq!(both.enforce("update install"), "docs(readme): update install");
    }

    #[test]
    fn test_policy_from_config_ignores_blanks() {
        let config = CommitConfig {
            commit_type: Some(" feat ".into()),
            scope: Some("  ".into()),
        };
        assert_eq!(CommitPolicy::from(&config), policy(Some("feat"), None));
    }
}
