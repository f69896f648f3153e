use std::collections::{BTreeMap, BTreeSet};

use crate::entities::{Performer, TagSet};

/// 专长到标签的静态映射
///
/// 执行者可匹配的标签集合是其所有专长对应标签的并集。
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    tags_by_speciality: BTreeMap<String, TagSet>,
}

impl TagIndex {
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut tags_by_speciality: BTreeMap<String, TagSet> = BTreeMap::new();
        for (speciality, tag) in pairs {
            tags_by_speciality
                .entry(speciality.into())
                .or_default()
                .insert(tag.into());
        }
        Self { tags_by_speciality }
    }

    pub fn tags_for_specialities<'a, I>(&self, specialities: I) -> TagSet
    where
        I: IntoIterator<Item = &'a String>,
    {
        specialities
            .into_iter()
            .filter_map(|speciality| self.tags_by_speciality.get(speciality))
            .flat_map(|tags| tags.iter().cloned())
            .collect()
    }

    pub fn tags_for(&self, performer: &Performer) -> TagSet {
        self.tags_for_specialities(&performer.specialities)
    }

    pub fn specialities(&self) -> BTreeSet<&str> {
        self.tags_by_speciality.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tags_by_speciality.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn performer(specialities: &[&str]) -> Performer {
        Performer {
            id: 1,
            is_blocked: false,
            specialities: specialities.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_union_across_specialities() {
        let index = TagIndex::from_pairs(vec![
            ("frontend", "design"),
            ("frontend", "UX/UI"),
            ("smm", "marketing"),
            ("smm", "design"),
            ("backend", "development"),
        ]);

        let tags = index.tags_for(&performer(&["frontend", "smm"]));
        let expected: TagSet = ["UX/UI", "design", "marketing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_unknown_speciality_contributes_nothing() {
        let index = TagIndex::from_pairs(vec![("backend", "development")]);
        assert!(index.tags_for(&performer(&["pottery"])).is_empty());
        assert!(index.tags_for(&performer(&[])).is_empty());
        assert_eq!(index.specialities().len(), 1);
    }
}
