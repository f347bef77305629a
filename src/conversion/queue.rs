//! Expansion of submitted references into conversion candidates.
//!
//! Children are fetched from the repository only when traversal reaches
//! them, so a group reflects the tree as it is while the batch runs.

use std::sync::Arc;

use mediashift_common::{MediaReference, Result};
use serde::{Deserialize, Serialize};

use crate::repository::ContentRepository;

/// A root submitted for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub reference: MediaReference,
    pub recursive: bool,
}

impl ConversionRequest {
    pub fn new(reference: MediaReference, recursive: bool) -> Self {
        Self {
            reference,
            recursive,
        }
    }
}

/// One record to visit, carrying the recursion intent of its request.
#[derive(Clone)]
pub struct ConversionCandidate {
    reference: MediaReference,
    deep: bool,
    repository: Arc<dyn ContentRepository>,
}

impl ConversionCandidate {
    pub fn reference(&self) -> &MediaReference {
        &self.reference
    }

    /// Query the direct children now. Candidates that are not deep have none.
    pub fn children(&self) -> Result<Vec<ConversionCandidate>> {
        if !self.deep {
            return Ok(Vec::new());
        }

        Ok(self
            .repository
            .children(&self.reference)?
            .into_iter()
            .map(|reference| ConversionCandidate {
                reference,
                deep: true,
                repository: self.repository.clone(),
            })
            .collect())
    }
}

impl std::fmt::Debug for ConversionCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionCandidate")
            .field("reference", &self.reference)
            .field("deep", &self.deep)
            .finish()
    }
}

/// Depth-first walk of one request: the root first, then its descendants.
///
/// A candidate's children are requested on the call to `next` that follows
/// the candidate, i.e. after the caller has processed it.
pub struct CandidateGroup {
    stack: Vec<ConversionCandidate>,
    expand: Option<ConversionCandidate>,
}

impl Iterator for CandidateGroup {
    type Item = Result<ConversionCandidate>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(parent) = self.expand.take() {
            match parent.children() {
                Ok(children) => self.stack.extend(children.into_iter().rev()),
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }

        let candidate = self.stack.pop()?;
        if candidate.deep {
            self.expand = Some(candidate.clone());
        }
        Some(Ok(candidate))
    }
}

/// Submitted requests in submission order.
pub struct CandidateQueue {
    requests: Vec<ConversionRequest>,
    repository: Arc<dyn ContentRepository>,
}

impl CandidateQueue {
    pub fn new(requests: Vec<ConversionRequest>, repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            requests,
            repository,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// One group per request. Every call starts a fresh walk.
    pub fn groups(&self) -> impl Iterator<Item = CandidateGroup> + '_ {
        self.requests.iter().map(|request| CandidateGroup {
            stack: vec![ConversionCandidate {
                reference: request.reference.clone(),
                deep: request.recursive,
                repository: self.repository.clone(),
            }],
            expand: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use mediashift_db::queries::items::NewItem;

    /// root -> (a -> (a1, a2), b)
    fn tree() -> (Arc<MemoryRepository>, Vec<MediaReference>) {
        let repo = Arc::new(MemoryRepository::new());
        let root = repo.create_item(&NewItem::new("master", "root")).unwrap();
        let a = repo
            .create_item(&NewItem::new("master", "a").parent(root.item_id))
            .unwrap();
        let b = repo
            .create_item(&NewItem::new("master", "b").parent(root.item_id))
            .unwrap();
        let a1 = repo
            .create_item(&NewItem::new("master", "a1").parent(a.item_id))
            .unwrap();
        let a2 = repo
            .create_item(&NewItem::new("master", "a2").parent(a.item_id))
            .unwrap();
        (repo, vec![root, a, a1, a2, b])
    }

    fn walk(group: CandidateGroup) -> Vec<MediaReference> {
        group
            .map(|candidate| candidate.unwrap().reference().clone())
            .collect()
    }

    #[test]
    fn test_non_recursive_group_has_only_root() {
        let (repo, refs) = tree();
        let queue = CandidateQueue::new(vec![ConversionRequest::new(refs[0].clone(), false)], repo);

        let groups: Vec<_> = queue.groups().map(walk).collect();
        assert_eq!(groups, vec![vec![refs[0].clone()]]);
    }

    #[test]
    fn test_recursive_group_is_depth_first() {
        let (repo, refs) = tree();
        let queue = CandidateQueue::new(vec![ConversionRequest::new(refs[0].clone(), true)], repo);

        let mut groups = queue.groups();
        assert_eq!(walk(groups.next().unwrap()), refs);
        assert!(groups.next().is_none());
    }

    #[test]
    fn test_groups_follow_submission_order() {
        let (repo, refs) = tree();
        let queue = CandidateQueue::new(
            vec![
                ConversionRequest::new(refs[4].clone(), false),
                ConversionRequest::new(refs[1].clone(), true),
            ],
            repo,
        );

        let groups: Vec<_> = queue.groups().map(walk).collect();
        assert_eq!(
            groups,
            vec![
                vec![refs[4].clone()],
                vec![refs[1].clone(), refs[2].clone(), refs[3].clone()],
            ]
        );
        // restartable
        assert_eq!(queue.groups().count(), 2);
    }

    #[test]
    fn test_children_fetched_lazily() {
        let (repo, refs) = tree();
        let queue = CandidateQueue::new(
            vec![ConversionRequest::new(refs[1].clone(), true)],
            repo.clone(),
        );

        let mut group = queue.groups().next().unwrap();
        assert_eq!(group.next().unwrap().unwrap().reference(), &refs[1]);

        // A child added after the parent was yielded is still visited.
        let late = repo
            .create_item(&NewItem::new("master", "a3").parent(refs[1].item_id))
            .unwrap();
        let rest: Vec<_> = group.map(|c| c.unwrap().reference().clone()).collect();
        assert_eq!(rest, vec![refs[2].clone(), refs[3].clone(), late]);
    }
}
