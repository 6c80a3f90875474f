use std::collections::HashMap;

use crate::attribute::Attributes;
use crate::error::{Result, RuntimeError};
use crate::operator::kernel::{Operator, OperatorKernel};
use crate::operator::schema::{normalize_domain, OperatorInfo, VersionInfo};
use crate::operators;

/// Builds a kernel from attributes already checked against the schema.
pub type KernelFactory = fn(&Attributes) -> Result<Box<dyn OperatorKernel>>;

/// One implementation of an operator, valid for a version range.
#[derive(Debug, Clone, Copy)]
pub struct OperatorVariant {
    pub info: &'static OperatorInfo,
    pub factory: KernelFactory,
}

/// Everything a graph node says about the operator it wants.
#[derive(Debug, Clone, Default)]
pub struct OperatorRequest {
    pub name: String,
    pub domain: String,
    pub version: Option<u32>,
    pub node: Option<String>,
    pub attributes: Attributes,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl OperatorRequest {
    pub fn new(name: impl Into<String>) -> Self {
        OperatorRequest {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn inputs<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.inputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn outputs<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.outputs = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Operator families keyed by `(domain, name)`, each sorted by
/// `since_version`.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    families: HashMap<(String, String), Vec<OperatorVariant>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for variant in operators::lstm::VARIANTS.iter() {
            registry.insert(*variant);
        }
        registry
    }

    fn key(domain: &str, name: &str) -> (String, String) {
        (normalize_domain(domain).to_string(), name.to_string())
    }

    fn insert(&mut self, variant: OperatorVariant) {
        let family = self
            .families
            .entry(Self::key(variant.info.domain, variant.info.name))
            .or_default();
        family.push(variant);
        family.sort_by_key(|v| v.info.version.since_version);
    }

    /// Adds a variant. Its version range must not overlap another variant
    /// of the same family.
    pub fn register(&mut self, variant: OperatorVariant) -> Result<()> {
        let key = Self::key(variant.info.domain, variant.info.name);
        if let Some(family) = self.families.get(&key) {
            if family
                .iter()
                .any(|v| v.info.version.overlaps(&variant.info.version))
            {
                return Err(RuntimeError::ConflictingVariant {
                    op: variant.info.name.to_string(),
                    since: variant.info.version.since_version,
                });
            }
        }
        self.insert(variant);
        Ok(())
    }

    /// Version ranges registered for an operator, oldest first.
    pub fn versions(&self, domain: &str, name: &str) -> Vec<VersionInfo> {
        self.families
            .get(&Self::key(domain, name))
            .map(|family| family.iter().map(|v| v.info.version).collect())
            .unwrap_or_default()
    }

    fn select(&self, domain: &str, name: &str, version: Option<u32>) -> Result<&OperatorVariant> {
        let family = self
            .families
            .get(&Self::key(domain, name))
            .filter(|family| !family.is_empty())
            .ok_or_else(|| RuntimeError::UnknownOperator {
                domain: normalize_domain(domain).to_string(),
                op: name.to_string(),
            })?;
        let found = match version {
            None => family.last(),
            Some(v) => family.iter().find(|variant| variant.info.version.contains(v)),
        };
        found.ok_or_else(|| RuntimeError::UnsupportedVersion {
            op: name.to_string(),
            version: version.unwrap_or_default(),
        })
    }

    /// Drops undeclared attributes and checks declared ones.
    fn check_attributes(info: &OperatorInfo, attributes: &Attributes) -> Result<Attributes> {
        let mut accepted = Attributes::new();
        for key in attributes.keys() {
            let Some(value) = attributes.get(key) else {
                continue;
            };
            match info.attribute(key) {
                None => {
                    tracing::warn!(
                        op = info.name,
                        since = info.version.since_version,
                        attribute = key,
                        "ignoring attribute not declared by this version"
                    );
                }
                Some(declared) if declared.kind != value.kind() => {
                    return Err(RuntimeError::InvalidAttribute {
                        op: info.name.to_string(),
                        attribute: key.to_string(),
                        reason: format!("expected {}, got {}", declared.kind, value.kind()),
                    });
                }
                Some(_) => accepted.insert(key, value.clone()),
            }
        }
        if let Some(missing) = info
            .attributes
            .iter()
            .find(|a| a.required && !accepted.contains(a.name))
        {
            return Err(RuntimeError::InvalidAttribute {
                op: info.name.to_string(),
                attribute: missing.name.to_string(),
                reason: "required attribute missing".to_string(),
            });
        }
        Ok(accepted)
    }

    /// Selects the variant for the requested version and builds it.
    ///
    /// With no version the newest variant wins; otherwise the variant whose
    /// range contains the version.
    pub fn resolve(&self, request: OperatorRequest) -> Result<Operator> {
        let variant = self.select(&request.domain, &request.name, request.version)?;
        let attributes = Self::check_attributes(variant.info, &request.attributes)?;
        let kernel = (variant.factory)(&attributes)?;

        tracing::debug!(
            op = variant.info.name,
            domain = normalize_domain(&request.domain),
            requested = ?request.version,
            since = variant.info.version.since_version,
            "resolved operator"
        );

        Ok(Operator::new(
            variant.info,
            request.node,
            request.inputs,
            request.outputs,
            kernel,
        ))
    }
}
