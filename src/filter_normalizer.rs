//! Search filter normalization and repair.
//!
//! One depth-first pass over a copy of the filter: leaves on undefined
//! attributes are dropped from their branch, branches left empty are removed,
//! AND/OR branches left with a single child are replaced by that child, and
//! every remaining assertion value is normalized through the schema. The root
//! itself is never rewritten by the pass; see [`resolve_root`].

use tracing::{debug, info, warn};

use crate::digester::MessageHandler;
use crate::error::{DecodeError, NormalizationError};
use crate::ldap_protocol::{Assertion, BranchOp, Filter, LdapMessage, Leaf, ProtocolOp};
use crate::schema::SchemaCapability;

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFilter {
    pub filter: Filter,
    /// Attribute descriptions of the leaves that were dropped, in visit order.
    pub dropped: Vec<String>,
}

pub struct FilterNormalizer<'a, S: SchemaCapability + ?Sized> {
    schema: &'a S,
}

impl<'a, S: SchemaCapability + ?Sized> FilterNormalizer<'a, S> {
    pub fn new(schema: &'a S) -> Self {
        Self { schema }
    }

    /// Normalize `filter` without touching it. On error nothing is returned,
    /// so a failed pass leaves the caller with its original tree.
    pub fn normalize(&self, filter: &Filter) -> Result<NormalizedFilter, NormalizationError> {
        let mut filter = filter.clone();
        let mut dropped = Vec::new();
        self.visit(&mut filter, &mut dropped)?;
        Ok(NormalizedFilter { filter, dropped })
    }

    fn is_undefined_leaf(&self, filter: &Filter) -> bool {
        match filter {
            // an extensible match with no type is not tied to an attribute
            Filter::Leaf(leaf) => !leaf.attribute.is_empty() && !self.schema.is_defined(&leaf.attribute),
            Filter::Branch(_) => false,
        }
    }

    fn visit(&self, filter: &mut Filter, dropped: &mut Vec<String>) -> Result<(), NormalizationError> {
        match filter {
            Filter::Leaf(leaf) => self.normalize_leaf(leaf),
            Filter::Branch(branch) => {
                branch.children.retain(|child| {
                    if self.is_undefined_leaf(child) {
                        if let Filter::Leaf(leaf) = child {
                            warn!("Dropping filter item on undefined attribute '{}'", leaf.attribute);
                            dropped.push(leaf.attribute.clone());
                        }
                        false
                    } else {
                        true
                    }
                });

                for child in branch.children.iter_mut() {
                    self.visit(child, dropped)?;
                }

                repair_children(&mut branch.children);
                Ok(())
            }
        }
    }

    fn normalize_leaf(&self, leaf: &mut Leaf) -> Result<(), NormalizationError> {
        if leaf.attribute.is_empty() || !self.schema.is_defined(&leaf.attribute) {
            return Ok(());
        }
        let attribute = leaf.attribute.as_str();
        let by_oid = attribute.starts_with(|c: char| c.is_ascii_digit());
        let normalize = |value: &mut Vec<u8>| -> Result<(), NormalizationError> {
            *value = if by_oid {
                self.schema.normalize_by_oid(attribute, value)?
            } else {
                self.schema.normalize_by_name(attribute, value)?
            };
            Ok(())
        };
        match &mut leaf.assertion {
            Assertion::Equality(v)
            | Assertion::GreaterOrEqual(v)
            | Assertion::LessOrEqual(v)
            | Assertion::Approx(v) => normalize(v),
            Assertion::Present => Ok(()),
            Assertion::Substrings(s) => {
                if let Some(initial) = &mut s.initial {
                    normalize(initial)?;
                }
                for any in s.any.iter_mut() {
                    normalize(any)?;
                }
                if let Some(fin) = &mut s.final_value {
                    normalize(fin)?;
                }
                Ok(())
            }
            Assertion::Extensible(m) => normalize(&mut m.value),
        }
    }
}

/// Left to right: drop empty branches, collapse single-child AND/OR.
fn repair_children(children: &mut Vec<Filter>) {
    children.retain(|child| match child {
        Filter::Branch(b) => !b.children.is_empty(),
        Filter::Leaf(_) => true,
    });
    for child in children.iter_mut() {
        if let Filter::Branch(b) = child {
            if b.op != BranchOp::Not && b.children.len() == 1 {
                if let Some(only) = b.children.pop() {
                    *child = only;
                }
            }
        }
    }
}

/// Final step a caller applies to a normalized root. `None` means nothing
/// can match (the root branch was left empty).
pub fn resolve_root(filter: Filter) -> Option<Filter> {
    let mut current = filter;
    loop {
        match current {
            Filter::Branch(b) if b.children.is_empty() => return None,
            Filter::Branch(mut b) if b.op != BranchOp::Not && b.children.len() == 1 => {
                current = b.children.pop()?;
            }
            other => return Some(other),
        }
    }
}

/// Normalizes the filter of every SearchRequest before passing messages on.
pub struct NormalizingHandler<'a, H, S: SchemaCapability + ?Sized> {
    inner: H,
    normalizer: FilterNormalizer<'a, S>,
}

impl<'a, H, S: SchemaCapability + ?Sized> NormalizingHandler<'a, H, S> {
    pub fn new(inner: H, schema: &'a S) -> Self {
        Self {
            inner,
            normalizer: FilterNormalizer::new(schema),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H, S> MessageHandler<LdapMessage> for NormalizingHandler<'_, H, S>
where
    H: MessageHandler<LdapMessage>,
    S: SchemaCapability + ?Sized,
{
    fn on_message_decoded(&mut self, mut message: LdapMessage) {
        if let ProtocolOp::SearchRequest(req) = &mut message.protocol_op {
            match self.normalizer.normalize(&req.filter) {
                Ok(normalized) => {
                    if !normalized.dropped.is_empty() {
                        debug!(
                            "Message {}: dropped {} filter item(s)",
                            message.message_id,
                            normalized.dropped.len()
                        );
                    }
                    req.filter = resolve_root(normalized.filter).unwrap_or_else(|| {
                        info!("Message {}: filter cannot match any entry", message.message_id);
                        // (|) is the absolute false filter
                        Filter::or(Vec::new())
                    });
                }
                Err(e) => {
                    self.inner.on_decode_error(&DecodeError::constraint(
                        "SearchRequest",
                        "filter",
                        e.to_string(),
                    ));
                    return;
                }
            }
        }
        self.inner.on_message_decoded(message);
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        self.inner.on_decode_error(error);
    }
}
