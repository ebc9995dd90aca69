//! Buckets export requests by format and scale, so each distinct combination
//! costs one render request no matter how many assets share it.

use std::{collections::HashMap, fmt};

use crate::discover::ExportableNode;
use crate::document::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupKey {
    pub format: ImageFormat,
    pub scale: f64,
}

/// The composite form, like `png2` or `svg1`.
impl fmt::Display for GroupKey {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}{}", self.format, self.scale)
    }
}

/// One rendering of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetStub {
    pub id: String,
    pub name: String,
    pub suffix: String,
    pub format: ImageFormat,
    pub scale: f64,
}

#[derive(Debug, Clone)]
pub struct AssetGroup {
    pub key: GroupKey,
    pub stubs: Vec<AssetStub>,
}

impl AssetGroup {
    pub fn ids(&self) -> Vec<String> {
        self.stubs.iter().map(|stub| stub.id.clone()).collect()
    }
}

/// Groups keyed by [`GroupKey`], iterated in the order each key was first
/// seen.
#[derive(Debug, Clone, Default)]
pub struct AssetGroups {
    groups: Vec<AssetGroup>,
    index: HashMap<String, usize>,
}

impl AssetGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stub: AssetStub) {
        let key = GroupKey {
            format: stub.format,
            scale: stub.scale,
        };

        let position = match self.index.get(&key.to_string()) {
            Some(&position) => position,
            None => {
                self.groups.push(AssetGroup {
                    key,
                    stubs: Vec::new(),
                });
                self.index.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        self.groups[position].stubs.push(stub);
    }

    pub fn get(&self, key: &str) -> Option<&AssetGroup> {
        self.index.get(key).map(|&position| &self.groups[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetGroup> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.groups.iter().map(|group| group.key.to_string())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn stub_count(&self) -> usize {
        self.groups.iter().map(|group| group.stubs.len()).sum()
    }
}

/// Produces one stub per (node, export setting) pair, routed to the group for
/// its format and scale. Stub order inside a group follows node order, then
/// export setting order.
pub fn group_by_format(nodes: &[ExportableNode<'_>]) -> AssetGroups {
    let mut groups = AssetGroups::new();

    for node in nodes {
        for setting in node.export_settings() {
            groups.push(AssetStub {
                id: node.id().to_owned(),
                name: node.name().to_owned(),
                suffix: setting.suffix.clone(),
                format: setting.format,
                scale: setting.scale(),
            });
        }
    }

    groups
}
