use shared::domain::SceneItem;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no scene item named '{name}'")]
    NotFound { name: String },
    #[error("{count} scene items are named '{name}'; names must be unique within a scene")]
    Ambiguous { name: String, count: usize },
}

/// Find the single item called `name` in a previously fetched scene snapshot.
pub fn resolve<'a>(items: &'a [SceneItem], name: &str) -> Result<&'a SceneItem, ResolveError> {
    let mut matches = items.iter().filter(|item| item.source_name == name);
    let Some(found) = matches.next() else {
        return Err(ResolveError::NotFound {
            name: name.to_string(),
        });
    };
    let extra = matches.count();
    if extra > 0 {
        return Err(ResolveError::Ambiguous {
            name: name.to_string(),
            count: extra + 1,
        });
    }
    Ok(found)
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
