use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{EngineError, Result, TreeDefect};
use crate::models::Subject;

#[derive(Debug, Clone)]
pub struct SubjectTree<'a> {
    subjects: HashMap<Uuid, &'a Subject>,
    children: HashMap<Uuid, Vec<Uuid>>,
    /// Closest ancestor first.
    ancestors: HashMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
    order: Vec<Uuid>,
}

impl<'a> SubjectTree<'a> {
    /// Stored `depth` values are never trusted; each chain is walked with a
    /// visited set instead.
    pub fn build(subjects: &'a [Subject]) -> Result<Self> {
        let mut by_id: HashMap<Uuid, &'a Subject> = HashMap::with_capacity(subjects.len());
        for subject in subjects {
            if by_id.insert(subject.id, subject).is_some() {
                return Err(EngineError::InvalidTree {
                    subject_id: subject.id,
                    reason: TreeDefect::DuplicateId,
                });
            }
        }

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut ancestors: HashMap<Uuid, Vec<Uuid>> = HashMap::with_capacity(subjects.len());
        let mut roots = Vec::new();

        for subject in subjects {
            let chain = ancestor_chain(subject, &by_id)?;
            match subject.parent_id {
                Some(parent_id) => children.entry(parent_id).or_default().push(subject.id),
                None => roots.push(subject.id),
            }
            ancestors.insert(subject.id, chain);
        }

        let mut order: Vec<Uuid> = subjects.iter().map(|subject| subject.id).collect();
        order.sort_by(|a, b| {
            ancestors[a]
                .len()
                .cmp(&ancestors[b].len())
                .then_with(|| by_id[a].name.cmp(&by_id[b].name))
        });

        let tree = Self {
            subjects: by_id,
            children,
            ancestors,
            roots,
            order,
        };

        let stale = tree.stale_depths();
        if !stale.is_empty() {
            tracing::warn!(
                count = stale.len(),
                "stored subject depths disagree with parent chains"
            );
        }
        tracing::debug!(subjects = tree.len(), roots = tree.roots.len(), "indexed subject tree");

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subject(&self, id: Uuid) -> Option<&'a Subject> {
        self.subjects.get(&id).copied()
    }

    pub fn require(&self, id: Uuid) -> Result<&'a Subject> {
        self.subject(id).ok_or(EngineError::UnknownSubject(id))
    }

    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ancestors(&self, id: Uuid) -> &[Uuid] {
        self.ancestors.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn depth(&self, id: Uuid) -> Option<usize> {
        self.ancestors.get(&id).map(Vec::len)
    }

    pub fn is_ancestor_or_self(&self, ancestor: Uuid, id: Uuid) -> bool {
        ancestor == id || self.ancestors(id).contains(&ancestor)
    }

    pub fn by_depth(&self) -> &[Uuid] {
        &self.order
    }

    /// Subjects whose stored depth disagrees with their parent chain.
    pub fn stale_depths(&self) -> Vec<Uuid> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                let computed = self.ancestors[id].len();
                usize::try_from(self.subjects[id].depth).ok() != Some(computed)
            })
            .collect()
    }
}

fn ancestor_chain(subject: &Subject, by_id: &HashMap<Uuid, &Subject>) -> Result<Vec<Uuid>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([subject.id]);
    let mut current = subject;

    while let Some(parent_id) = current.parent_id {
        let parent = by_id.get(&parent_id).ok_or(EngineError::InvalidTree {
            subject_id: current.id,
            reason: TreeDefect::MissingParent(parent_id),
        })?;
        if !visited.insert(parent_id) {
            return Err(EngineError::InvalidTree {
                subject_id: subject.id,
                reason: TreeDefect::Cycle,
            });
        }
        chain.push(parent_id);
        current = parent;
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{id, subject};

    #[test]
    fn indexes_children_and_ancestors() {
        let subjects = vec![
            subject(1, "Maths", 100, None),
            subject(2, "Written", 700, Some(1)),
            subject(3, "Oral", 300, Some(1)),
            subject(4, "Algebra", 100, Some(2)),
        ];
        let tree = SubjectTree::build(&subjects).unwrap();

        assert_eq!(tree.roots(), &[id(1)]);
        let mut children = tree.children(id(1)).to_vec();
        children.sort();
        assert_eq!(children, vec![id(2), id(3)]);
        assert_eq!(tree.ancestors(id(4)), &[id(2), id(1)]);
        assert_eq!(tree.depth(id(4)), Some(2));
        assert!(tree.is_ancestor_or_self(id(1), id(4)));
        assert!(tree.is_ancestor_or_self(id(4), id(4)));
        assert!(!tree.is_ancestor_or_self(id(3), id(4)));
        assert!(tree.children(id(4)).is_empty());
    }

    #[test]
    fn orders_by_computed_depth() {
        let subjects = vec![
            subject(4, "Algebra", 100, Some(2)),
            subject(2, "Written", 700, Some(1)),
            subject(1, "Maths", 100, None),
        ];
        let tree = SubjectTree::build(&subjects).unwrap();
        assert_eq!(tree.by_depth(), &[id(1), id(2), id(4)]);
    }

    #[test]
    fn rejects_missing_parent() {
        let subjects = vec![subject(2, "Orphan", 100, Some(9))];
        let err = SubjectTree::build(&subjects).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTree {
                subject_id: id(2),
                reason: TreeDefect::MissingParent(id(9)),
            }
        );
    }

    #[test]
    fn rejects_cycles_even_with_plausible_depths() {
        let mut first = subject(1, "First", 100, Some(2));
        first.depth = 0;
        let mut second = subject(2, "Second", 100, Some(1));
        second.depth = 1;
        let subjects = vec![first, second];

        let err = SubjectTree::build(&subjects).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTree {
                reason: TreeDefect::Cycle,
                ..
            }
        ));
    }

    #[test]
    fn rejects_self_parent_and_duplicates() {
        let looped = vec![subject(1, "Loop", 100, Some(1))];
        assert!(SubjectTree::build(&looped).is_err());

        let duplicated = vec![subject(1, "A", 100, None), subject(1, "B", 100, None)];
        let err = SubjectTree::build(&duplicated).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTree {
                subject_id: id(1),
                reason: TreeDefect::DuplicateId,
            }
        );
    }

    #[test]
    fn reports_stale_depths() {
        let mut stale = subject(2, "Written", 700, Some(1));
        stale.depth = 5;
        let subjects = vec![subject(1, "Maths", 100, None), stale];
        let tree = SubjectTree::build(&subjects).unwrap();
        assert_eq!(tree.stale_depths(), vec![id(2)]);
        assert_eq!(tree.depth(id(2)), Some(1));
    }

    #[test]
    fn unknown_subject_lookup_fails() {
        let subjects = vec![subject(1, "Maths", 100, None)];
        let tree = SubjectTree::build(&subjects).unwrap();
        assert_eq!(tree.require(id(7)), Err(EngineError::UnknownSubject(id(7))));
    }
}
