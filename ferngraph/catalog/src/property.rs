use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

use ferngraph_common::data_type::LogicalType;
use serde::{Deserialize, Serialize};

/// A property column of a node table or rel group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    name: String,
    logical_type: LogicalType,
    nullable: bool,
}

impl Borrow<str> for PropertyDefinition {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl Hash for PropertyDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PropertyDefinition {
    #[inline]
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    #[inline]
    pub fn nullable(&self) -> bool {
        self.nullable
    }
}
