//! Schema relation descriptors.
//!
//! Fetched once at startup and treated as read-only afterwards. The
//! relationship editor is the only consumer: it asks which relationship
//! types can connect two node types in a given drag direction, and what the
//! multiplicity constraints on each end are.

use std::collections::HashMap;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

/// Cardinality constraint on one end of a relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Multiplicity {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "*")]
    Many,
}

impl Default for Multiplicity {
    fn default() -> Self {
        Multiplicity::Many
    }
}

/// The set of node types allowed on the far end of a relation descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSet {
    /// All types possible
    All,
    Only(Vec<String>),
}

impl TypeSet {
    pub fn allows(&self, node_type: &str) -> bool {
        match self {
            TypeSet::All => true,
            TypeSet::Only(types) => types.iter().any(|t| t == node_type),
        }
    }
}

impl Default for TypeSet {
    fn default() -> Self {
        TypeSet::All
    }
}

// Wire shape: either the string "*" (all types possible), a single type
// name, or an array of type names.
impl<'de> Deserialize<'de> for TypeSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TypeSetVisitor;

        impl<'de> Visitor<'de> for TypeSetVisitor {
            type Value = TypeSet;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("\"*\", a type name, or an array of type names")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TypeSet, E> {
                if value == "*" {
                    Ok(TypeSet::All)
                } else {
                    Ok(TypeSet::Only(vec![value.to_owned()]))
                }
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TypeSet, A::Error> {
                let mut types = Vec::new();
                while let Some(t) = seq.next_element::<String>()? {
                    types.push(t);
                }
                Ok(TypeSet::Only(types))
            }
        }

        deserializer.deserialize_any(TypeSetVisitor)
    }
}

/// One relation descriptor: a relationship type reachable from a node type,
/// with the multiplicity of each end and the compatible far-end types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationDescriptor {
    #[serde(rename = "relType", alias = "type")]
    pub rel_type: String,
    #[serde(rename = "sourceMultiplicity", default)]
    pub source_multiplicity: Multiplicity,
    #[serde(rename = "targetMultiplicity", default)]
    pub target_multiplicity: Multiplicity,
    /// For `related_to` descriptors: allowed target types. For
    /// `related_from`: allowed source types.
    #[serde(rename = "possibleTargetTypes", alias = "possibleSourceTypes", default)]
    pub possible_types: TypeSet,
}

/// Relation descriptors for one node type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeSchema {
    /// Outbound descriptors
    #[serde(rename = "relatedTo", default)]
    pub related_to: Vec<RelationDescriptor>,
    /// Inbound descriptors
    #[serde(rename = "relatedFrom", default)]
    pub related_from: Vec<RelationDescriptor>,
}

/// The full descriptor set, keyed by node type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub types: HashMap<String, NodeSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_schema(&self, node_type: &str) -> Option<&NodeSchema> {
        self.types.get(node_type)
    }

    /// All relationship types that can connect `source_type -> target_type`,
    /// in declaration order. An empty result means the pair is
    /// schema-incompatible (the drag gesture is silently ignored).
    pub fn candidates_between(&self, source_type: &str, target_type: &str) -> Vec<&RelationDescriptor> {
        let Some(node_schema) = self.types.get(source_type) else {
            return Vec::new();
        };
        node_schema
            .related_to
            .iter()
            .filter(|d| d.possible_types.allows(target_type))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        serde_json::from_str(
            r#"{
                "Project": {
                    "relatedTo": [
                        {"relType": "PROJECT_HAS_MILESTONE", "sourceMultiplicity": "1",
                         "targetMultiplicity": "*", "possibleTargetTypes": ["Milestone"]},
                        {"relType": "PROJECT_HAS_TASK", "possibleTargetTypes": ["Task", "Milestone"]},
                        {"relType": "RELATES_TO", "possibleTargetTypes": "*"}
                    ],
                    "relatedFrom": [
                        {"relType": "USER_OWNS_PROJECT", "possibleSourceTypes": ["User"]}
                    ]
                },
                "Milestone": {}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_descriptor_set() {
        let schema = sample();
        let project = schema.node_schema("Project").unwrap();
        assert_eq!(project.related_to.len(), 3);
        assert_eq!(project.related_from.len(), 1);
        assert_eq!(project.related_to[0].source_multiplicity, Multiplicity::One);
        assert_eq!(project.related_to[1].source_multiplicity, Multiplicity::Many);
        assert_eq!(project.related_to[2].possible_types, TypeSet::All);
    }

    #[test]
    fn test_candidates_respect_target_types() {
        let schema = sample();
        let to_milestone = schema.candidates_between("Project", "Milestone");
        let types: Vec<_> = to_milestone.iter().map(|d| d.rel_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["PROJECT_HAS_MILESTONE", "PROJECT_HAS_TASK", "RELATES_TO"]
        );

        let to_user = schema.candidates_between("Project", "User");
        let types: Vec<_> = to_user.iter().map(|d| d.rel_type.as_str()).collect();
        assert_eq!(types, vec!["RELATES_TO"]);
    }

    #[test]
    fn test_unknown_type_has_no_candidates() {
        let schema = sample();
        assert!(schema.candidates_between("Nope", "Milestone").is_empty());
    }

    #[test]
    fn test_single_type_string() {
        let descriptor: RelationDescriptor = serde_json::from_str(
            r#"{"relType": "HAS", "possibleTargetTypes": "Milestone"}"#,
        )
        .unwrap();
        assert!(descriptor.possible_types.allows("Milestone"));
        assert!(!descriptor.possible_types.allows("Task"));
    }
}
