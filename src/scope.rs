//! Scope Resolver (spec §3 Scope, §4.4). Parses the caller-supplied scope
//! shape into `Scope`, validates repo names, and enforces the global-scope
//! gate.

use crate::config::Config;
use crate::error::CompassError;
use crate::model::Scope;
use crate::sandbox::validate_repo_name;

const MAX_REPOS: usize = 10;

/// Resolve a request's scope from its JSON fields. Accepts the current
/// `{scope: {type, repos}}` shape and the legacy top-level `repo` field as a
/// fallback when `scope` is absent, per spec §3 Scope's back-compat note.
pub fn resolve_scope(
    scope_field: Option<&serde_json::Value>,
    legacy_repo: Option<&str>,
    config: &Config,
) -> Result<Scope, CompassError> {
    if let Some(value) = scope_field {
        return parse_scope_value(value, config);
    }
    if let Some(repo) = legacy_repo {
        validate_repo_name(repo)?;
        return Ok(Scope::Repo(repo.to_string()));
    }
    Err(CompassError::bad_request("scope is required"))
}

fn parse_scope_value(value: &serde_json::Value, config: &Config) -> Result<Scope, CompassError> {
    let ty = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CompassError::bad_request("scope.type is required"))?;

    match ty {
        "repo" => {
            let repo = value
                .get("repos")
                .and_then(|v| v.as_array())
                .and_then(|a| a.first())
                .and_then(|v| v.as_str())
                .or_else(|| value.get("repo").and_then(|v| v.as_str()))
                .ok_or_else(|| CompassError::bad_request("scope.repos[0] is required"))?;
            validate_repo_name(repo)?;
            Ok(Scope::Repo(repo.to_string()))
        }
        "repos" => {
            let raw = value
                .get("repos")
                .and_then(|v| v.as_array())
                .ok_or_else(|| CompassError::bad_request("scope.repos is required"))?;
            if raw.is_empty() {
                return Err(CompassError::bad_request("scope.repos must not be empty"));
            }
            let mut repos = Vec::with_capacity(raw.len());
            let mut seen = std::collections::HashSet::new();
            for entry in raw {
                let repo = entry
                    .as_str()
                    .ok_or_else(|| CompassError::bad_request("scope.repos entries must be strings"))?;
                validate_repo_name(repo)?;
                if seen.insert(repo.to_string()) {
                    repos.push(repo.to_string());
                }
            }
            if repos.len() > MAX_REPOS {
                return Err(CompassError::bad_request(format!(
                    "scope.repos must not exceed {MAX_REPOS} entries"
                )));
            }
            Ok(Scope::Repos(repos))
        }
        "all" => {
            if !config.allow_global_scope {
                return Err(CompassError::forbidden(
                    "global scope is disabled on this server",
                ));
            }
            Ok(Scope::All)
        }
        other => Err(CompassError::bad_request(format!("invalid scope.type '{other}'"))),
    }
}
