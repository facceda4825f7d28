use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::AncestryError;
use crate::models::{Boundary, BoundaryId, BoundaryLevel, School, SchoolId};

/// District, block and cluster a school sits under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestry {
    pub district: BoundaryId,
    pub block: BoundaryId,
    pub cluster: BoundaryId,
}

impl Ancestry {
    pub fn at(&self, level: BoundaryLevel) -> BoundaryId {
        match level {
            BoundaryLevel::District => self.district,
            BoundaryLevel::Block => self.block,
            BoundaryLevel::Cluster => self.cluster,
        }
    }
}

/// Boundaries omitted from the district and block breakdown tables.
///
/// Entries match on id, or on the exact (case-sensitive) name for lists
/// carried over from older configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    ids: HashSet<BoundaryId>,
    names: HashSet<String>,
}

impl ExclusionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric entries are ids, anything else is a name.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut list = Self::new();
        for entry in entries.into_iter().map(str::trim).filter(|e| !e.is_empty()) {
            match entry.parse::<BoundaryId>() {
                Ok(id) => list.ids.insert(id),
                Err(_) => list.names.insert(entry.to_string()),
            };
        }
        list
    }

    #[cfg(test)]
    pub fn with_id(mut self, id: BoundaryId) -> Self {
        self.ids.insert(id);
        self
    }

    #[cfg(test)]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn matches(&self, boundary: &Boundary) -> bool {
        self.ids.contains(&boundary.id) || self.names.contains(&boundary.name)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ids.len() + self.names.len()
    }
}

/// Read-only lookup from schools to their place in the boundary tree.
#[derive(Debug, Default)]
pub struct GeoHierarchyIndex {
    boundaries: HashMap<BoundaryId, Boundary>,
    schools: HashMap<SchoolId, School>,
    ancestry: HashMap<SchoolId, Result<Ancestry, AncestryError>>,
    members: HashMap<BoundaryId, HashSet<SchoolId>>,
}

impl GeoHierarchyIndex {
    /// Resolves every school's ancestry up front. Schools that cannot be
    /// resolved are logged once here and skipped by every lookup.
    pub fn new(boundaries: Vec<Boundary>, schools: Vec<School>) -> Self {
        let mut index = Self {
            boundaries: boundaries.into_iter().map(|b| (b.id, b)).collect(),
            schools: schools.into_iter().map(|s| (s.id, s)).collect(),
            ancestry: HashMap::new(),
            members: HashMap::new(),
        };

        let mut unresolved = 0usize;
        for school in index.schools.values() {
            let resolved = index.resolve_from(school.boundary_id);
            match &resolved {
                Ok(ancestry) => {
                    for id in [ancestry.district, ancestry.block, ancestry.cluster] {
                        index.members.entry(id).or_default().insert(school.id);
                    }
                }
                Err(err) => {
                    unresolved += 1;
                    warn!(
                        school_id = school.id,
                        school = %school.name,
                        error = %err,
                        "school ancestry unresolved"
                    );
                }
            }
            index.ancestry.insert(school.id, resolved);
        }

        debug!(
            boundaries = index.boundaries.len(),
            schools = index.schools.len(),
            unresolved,
            "geography index built"
        );
        index
    }

    fn resolve_from(&self, cluster_id: BoundaryId) -> Result<Ancestry, AncestryError> {
        let mut chain = [0 as BoundaryId; 3];
        let mut visited = HashSet::new();
        let mut current = cluster_id;
        let mut expected = BoundaryLevel::Cluster;

        loop {
            let node = self
                .boundaries
                .get(&current)
                .ok_or(AncestryError::MissingBoundary(current))?;
            if !visited.insert(node.id) {
                return Err(AncestryError::Cycle(node.id));
            }
            if node.level != expected {
                return Err(AncestryError::UnexpectedLevel {
                    id: node.id,
                    expected,
                    found: node.level,
                });
            }

            chain[visited.len() - 1] = node.id;
            match expected.parent() {
                Some(next) => {
                    current = node.parent_id.ok_or(AncestryError::Truncated(node.id))?;
                    expected = next;
                }
                None if node.parent_id.is_some() => {
                    return Err(AncestryError::DistrictHasParent(node.id));
                }
                None => break,
            }
        }

        Ok(Ancestry {
            cluster: chain[0],
            block: chain[1],
            district: chain[2],
        })
    }

    pub fn ancestry(&self, school_id: SchoolId) -> Result<Ancestry, AncestryError> {
        match self.ancestry.get(&school_id) {
            Some(Ok(ancestry)) => Ok(*ancestry),
            Some(Err(err)) => Err(err.clone()),
            None => Err(AncestryError::UnknownSchool(school_id)),
        }
    }

    pub fn boundary(&self, id: BoundaryId) -> Option<&Boundary> {
        self.boundaries.get(&id)
    }

    /// Boundary at `level` above the school, if its ancestry resolves.
    pub fn boundary_of(&self, school_id: SchoolId, level: BoundaryLevel) -> Option<&Boundary> {
        self.ancestry(school_id)
            .ok()
            .and_then(|ancestry| self.boundary(ancestry.at(level)))
    }

    pub fn parent_of(&self, boundary: &Boundary) -> Option<&Boundary> {
        boundary.parent_id.and_then(|id| self.boundary(id))
    }

    /// Distinct boundaries at `level` above the given schools, in the order
    /// the schools first reach them. Unresolvable schools are skipped.
    pub fn ancestors_at_level<I>(&self, school_ids: I, level: BoundaryLevel) -> Vec<&Boundary>
    where
        I: IntoIterator<Item = SchoolId>,
    {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for school_id in school_ids {
            match self.ancestry(school_id) {
                Ok(ancestry) => {
                    let id = ancestry.at(level);
                    if seen.insert(id) {
                        if let Some(boundary) = self.boundary(id) {
                            found.push(boundary);
                        }
                    }
                }
                Err(err) => debug!(school_id, error = %err, "skipping school without ancestry"),
            }
        }
        found
    }

    /// Every resolvable school whose ancestry passes through `boundary`.
    pub fn schools_under(&self, boundary: BoundaryId) -> HashSet<SchoolId> {
        self.members.get(&boundary).cloned().unwrap_or_default()
    }

    /// Drops boundaries that are excluded, or that sit under an excluded
    /// boundary.
    pub fn apply_exclusions<'a>(
        &self,
        boundaries: Vec<&'a Boundary>,
        exclusions: &ExclusionList,
    ) -> Vec<&'a Boundary> {
        if exclusions.is_empty() {
            return boundaries;
        }
        boundaries
            .into_iter()
            .filter(|boundary| {
                let mut node = Some(*boundary);
                let mut hops = 0;
                while let Some(current) = node {
                    if exclusions.matches(current) {
                        debug!(boundary_id = boundary.id, "boundary excluded from breakdown");
                        return false;
                    }
                    hops += 1;
                    if hops > 3 {
                        break;
                    }
                    node = self.parent_of(current);
                }
                true
            })
            .collect()
    }
}
