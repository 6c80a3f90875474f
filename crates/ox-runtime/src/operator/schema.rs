//! Static operator schemas.
//!
//! Every implementation variant declares its schema as a `static`: the
//! version range it covers, the attributes it understands and the dtypes
//! each input and output slot accepts.

use ox_tensor::DType;

use crate::attribute::AttributeKind;

/// Domain of the standard operator set.
pub const DEFAULT_DOMAIN: &str = "ai.onnx";

/// Maps the empty domain onto [`DEFAULT_DOMAIN`].
pub fn normalize_domain(domain: &str) -> &str {
    if domain.is_empty() {
        DEFAULT_DOMAIN
    } else {
        domain
    }
}

/// Half-open version range `[since_version, until_version)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub since_version: u32,
    pub until_version: Option<u32>,
}

impl VersionInfo {
    pub const fn new(since_version: u32, until_version: Option<u32>) -> Self {
        VersionInfo {
            since_version,
            until_version,
        }
    }

    pub fn contains(&self, version: u32) -> bool {
        version >= self.since_version && self.until_version.map_or(true, |until| version < until)
    }

    pub fn overlaps(&self, other: &VersionInfo) -> bool {
        let starts_before_other_ends = other
            .until_version
            .map_or(true, |until| self.since_version < until);
        let other_starts_before_end = self
            .until_version
            .map_or(true, |until| other.since_version < until);
        starts_before_other_ends && other_starts_before_end
    }
}

/// One input or output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoInfo {
    pub index: usize,
    pub name: &'static str,
    pub types: &'static [DType],
    pub optional: bool,
    /// Slots sharing a tag must all carry the same dtype.
    pub constraint: Option<&'static str>,
}

impl IoInfo {
    pub const fn required(index: usize, name: &'static str, types: &'static [DType]) -> Self {
        IoInfo {
            index,
            name,
            types,
            optional: false,
            constraint: None,
        }
    }

    pub const fn optional(index: usize, name: &'static str, types: &'static [DType]) -> Self {
        IoInfo {
            index,
            name,
            types,
            optional: true,
            constraint: None,
        }
    }

    /// Ties this slot's dtype to every other slot tagged `tag`.
    pub const fn constrained(self, tag: &'static str) -> Self {
        IoInfo {
            constraint: Some(tag),
            ..self
        }
    }

    pub fn accepts(&self, dtype: DType) -> bool {
        self.types.contains(&dtype)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub required: bool,
}

impl AttributeInfo {
    pub const fn new(name: &'static str, kind: AttributeKind, required: bool) -> Self {
        AttributeInfo {
            name,
            kind,
            required,
        }
    }
}

/// Schema of one implementation variant of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub name: &'static str,
    pub domain: &'static str,
    pub version: VersionInfo,
    pub attributes: &'static [AttributeInfo],
    pub inputs: &'static [IoInfo],
    pub outputs: &'static [IoInfo],
}

impl OperatorInfo {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn input(&self, index: usize) -> Option<&IoInfo> {
        self.inputs.iter().find(|io| io.index == index)
    }
}
