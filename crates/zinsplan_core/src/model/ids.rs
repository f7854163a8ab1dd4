//! Identifiers for plan entities

use serde::{Deserialize, Serialize};

/// Identifier of a contribution element (savings plan or lump sum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u16);
