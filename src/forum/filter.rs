//! Declarative puff filters and listing queries.

use super::puff::Shell;
use super::store::PuffStore;
use crate::dag::ContentHash;
use crate::error::Result;
use crate::users::canonical_username;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Sort order of a listing, by payload time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Pagination and ordering for [`crate::forum::Forum::list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub offset: usize,
    pub sort: SortOrder,
    /// Focus puff, used when the filter spec has none.
    pub focus: Option<ContentHash>,
}

/// Constraints on which shells a listing returns.
///
/// Every non-empty constraint must hold; within one list constraint any
/// single match is enough. The default spec matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub routes: Vec<String>,
    pub tags: Vec<String>,
    pub types: Vec<String>,
    /// Older spelling of `types`; still honored.
    #[serde(rename = "type")]
    pub legacy_types: Vec<String>,
    /// Authors, compared by bare username.
    pub users: Vec<String>,
    /// Only shells without parents.
    pub roots: bool,
    /// Only parents of `focus`.
    pub ancestors: bool,
    /// Only children of `focus`.
    pub descendants: bool,
    pub focus: Option<ContentHash>,
}

impl FilterSpec {
    /// True if this spec places no constraint at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Resolves the spec against the store into a reusable predicate.
    ///
    /// `ancestors` needs the focus puff's parents, which are looked up once
    /// here. An unknown focus makes `ancestors` match nothing.
    pub fn compile(&self, store: &dyn PuffStore) -> Result<PuffFilter> {
        let focus_parents = match (self.ancestors, self.focus.as_ref()) {
            (true, Some(focus)) => Some(
                store
                    .get_puff_by_sig(focus)?
                    .map(|puff| puff.payload().parents.iter().copied().collect())
                    .unwrap_or_default(),
            ),
            _ => None,
        };

        Ok(PuffFilter {
            spec: self.clone(),
            focus_parents,
        })
    }
}

/// A compiled [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct PuffFilter {
    spec: FilterSpec,
    focus_parents: Option<HashSet<ContentHash>>,
}

impl PuffFilter {
    /// A filter that accepts every shell.
    pub fn accept_all() -> Self {
        Self {
            spec: FilterSpec::default(),
            focus_parents: None,
        }
    }

    pub fn matches(&self, shell: &Shell) -> bool {
        let spec = &self.spec;
        let payload = &shell.payload;

        if !spec.routes.is_empty() && !spec.routes.iter().any(|r| shell.routes.contains(r)) {
            return false;
        }

        if !spec.tags.is_empty() && !spec.tags.iter().any(|t| payload.tags.contains(t)) {
            return false;
        }

        if !spec.types.is_empty() && !spec.types.contains(&payload.content_type) {
            return false;
        }

        if !spec.users.is_empty() {
            let author = canonical_username(&shell.username);
            if !spec.users.iter().any(|u| u == author) {
                return false;
            }
        }

        if spec.roots && !payload.parents.is_empty() {
            return false;
        }

        if let Some(focus_parents) = &self.focus_parents {
            if !focus_parents.contains(&shell.sig) {
                return false;
            }
        }

        if spec.descendants {
            if let Some(focus) = &spec.focus {
                if !payload.parents.contains(focus) {
                    return false;
                }
            }
        }

        if !spec.legacy_types.is_empty() && !spec.legacy_types.contains(&payload.content_type) {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::memory::MemoryPuffStore;
    use crate::forum::puff::{Payload, Puff};

    fn create_test_puff(n: u8, username: &str, content_type: &str, tags: &[&str], parents: &[ContentHash]) -> Puff {
        let mut payload = Payload::new(content_type, "body");
        payload.time = Some(n as u64);
        payload.tags = tags.iter().map(|t| t.to_string()).collect();
        payload.parents = parents.to_vec();
        Puff::new(
            ContentHash::of_bytes(&[n]),
            username,
            vec!["local".to_string()],
            payload,
            None,
        )
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let store = MemoryPuffStore::new();
        let spec = FilterSpec::default();
        assert!(spec.is_empty());

        let filter = spec.compile(&store).unwrap();
        assert!(filter.matches(&create_test_puff(1, "alice", "text", &[], &[]).shell()));
        assert!(PuffFilter::accept_all().matches(&create_test_puff(2, "bob", "image", &[], &[]).shell()));
    }

    #[test]
    fn test_types_and_tags() {
        let store = MemoryPuffStore::new();
        let p1 = create_test_puff(1, "alice", "text", &["a"], &[]);
        let p2 = create_test_puff(2, "alice", "image", &["a"], &[]);
        let p3 = create_test_puff(3, "alice", "text", &[], &[]);

        let spec = FilterSpec {
            types: vec!["text".into()],
            tags: vec!["a".into()],
            ..FilterSpec::default()
        };
        let filter = spec.compile(&store).unwrap();

        let matched: Vec<_> = [&p1, &p2, &p3]
            .iter()
            .filter(|p| filter.matches(&p.shell()))
            .map(|p| *p.sig())
            .collect();
        assert_eq!(matched, vec![*p1.sig()]);
    }

    #[test]
    fn test_legacy_type_and_routes() {
        let store = MemoryPuffStore::new();
        let puff = create_test_puff(1, "alice", "bbcode", &[], &[]);

        let legacy = FilterSpec {
            legacy_types: vec!["text".into()],
            ..FilterSpec::default()
        };
        assert!(!legacy.compile(&store).unwrap().matches(&puff.shell()));

        let routes = FilterSpec {
            routes: vec!["elsewhere".into(), "local".into()],
            ..FilterSpec::default()
        };
        assert!(routes.compile(&store).unwrap().matches(&puff.shell()));
    }

    #[test]
    fn test_users_are_canonicalized() {
        let store = MemoryPuffStore::new();
        let spec = FilterSpec {
            users: vec!["alice".into()],
            ..FilterSpec::default()
        };
        let filter = spec.compile(&store).unwrap();

        assert!(filter.matches(&create_test_puff(1, "alice:2", "text", &[], &[]).shell()));
        assert!(!filter.matches(&create_test_puff(2, "bob", "text", &[], &[]).shell()));
    }

    #[test]
    fn test_family_constraints() {
        let root = create_test_puff(1, "alice", "text", &[], &[]);
        let other_root = create_test_puff(2, "bob", "text", &[], &[]);
        let reply = create_test_puff(3, "bob", "text", &[], &[*root.sig(), *other_root.sig()]);
        let store = MemoryPuffStore::with_puffs([root.clone(), other_root.clone(), reply.clone()]).unwrap();

        let roots = FilterSpec {
            roots: true,
            ..FilterSpec::default()
        }
        .compile(&store)
        .unwrap();
        assert!(roots.matches(&root.shell()));
        assert!(!roots.matches(&reply.shell()));

        let ancestors = FilterSpec {
            ancestors: true,
            focus: Some(*reply.sig()),
            ..FilterSpec::default()
        }
        .compile(&store)
        .unwrap();
        assert!(ancestors.matches(&root.shell()));
        assert!(ancestors.matches(&other_root.shell()));
        assert!(!ancestors.matches(&reply.shell()));

        let descendants = FilterSpec {
            descendants: true,
            focus: Some(*root.sig()),
            ..FilterSpec::default()
        }
        .compile(&store)
        .unwrap();
        assert!(descendants.matches(&reply.shell()));
        assert!(!descendants.matches(&other_root.shell()));
    }

    #[test]
    fn test_unknown_focus_matches_nothing_for_ancestors() {
        let store = MemoryPuffStore::new();
        let filter = FilterSpec {
            ancestors: true,
            focus: Some(ContentHash::of_bytes(b"missing")),
            ..FilterSpec::default()
        }
        .compile(&store)
        .unwrap();

        assert!(!filter.matches(&create_test_puff(1, "alice", "text", &[], &[]).shell()));
    }

    #[test]
    fn test_spec_from_json() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"types":["text"],"type":["image"],"roots":true}"#).unwrap();
        assert_eq!(spec.types, vec!["text"]);
        assert_eq!(spec.legacy_types, vec!["image"]);
        assert!(spec.roots);
        assert!(!spec.is_empty());
    }
}
