//! Canonical field paths.
//!
//! A canonical path is dot-separated and relative to the resource root;
//! array items add a `[]` suffix to the array's segment
//! (`spec.template.spec.containers[].image`).

use crate::types::{ResourceContext, SourceKind};

/// Prefix recorded for fields picked from a raw CRD document.
pub const CRD_ROOT_PREFIX: &str = "spec.versions[0].schema.openAPIV3Schema.properties.";

/// Prefix recorded for fields picked from a raw schema `properties` map.
pub const PROPERTIES_PREFIX: &str = "properties.";

/// Segment suffix denoting the items of an array.
pub const ARRAY_ITEMS: &str = "[]";

/// Map a recorded field path to its canonical form for a resource.
///
/// Each pass applies, in order and at most once each:
/// 1. strip the CRD root prefix,
/// 2. strip a leading `properties.`,
/// 3. for CRDs, strip a leading `<kind>.`; otherwise strip a leading `<resourceKey>.`.
///
/// Passes repeat until the path stops changing, so the result is always a
/// fixed point: normalizing it again returns it unchanged.
///
/// The cost of repeating is that a top-level field literally named
/// `properties`, or named after the CRD kind, cannot be addressed: its
/// segment is read as a prefix and stripped (`properties.foo` becomes `foo`).
/// Kubernetes and CRD schemas do not declare such fields, so idempotence
/// takes precedence.
pub fn normalize(raw: &str, ctx: &ResourceContext) -> String {
    let mut path = raw.trim().to_string();
    loop {
        let next = normalize_pass(&path, ctx);
        if next == path {
            return path;
        }
        path = next.to_string();
    }
}

fn normalize_pass<'a>(path: &'a str, ctx: &ResourceContext) -> &'a str {
    let mut p = path;
    if let Some(rest) = p.strip_prefix(CRD_ROOT_PREFIX) {
        p = rest;
    }
    if let Some(rest) = p.strip_prefix(PROPERTIES_PREFIX) {
        p = rest;
    }

    let owner = match ctx.source {
        SourceKind::Crd => ctx.kind.as_str(),
        SourceKind::Kubernetes => ctx.resource_key.as_str(),
    };
    if !owner.is_empty() {
        if let Some(rest) = p.strip_prefix(owner).and_then(|r| r.strip_prefix('.')) {
            p = rest;
        }
    }
    p
}

/// Child path of `key` under `prefix` (`key` itself at the root).
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Path denoting the items of the array at `path`.
pub fn items_path(path: &str) -> String {
    format!("{path}{ARRAY_ITEMS}")
}

/// True if `path` lies strictly below `ancestor`, through a property or array items.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some(rest) => !ancestor.is_empty() && (rest.starts_with('.') || rest.starts_with(ARRAY_ITEMS)),
        None => false,
    }
}

/// True if some path in `paths` lies below `ancestor` via a property (`ancestor.`).
pub fn has_property_descendant<'a, I>(paths: I, ancestor: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    let prefix = format!("{ancestor}.");
    paths.into_iter().any(|p| p.starts_with(&prefix))
}

/// True if some path in `paths` lies below `ancestor`'s array items (`ancestor[]`).
pub fn has_items_descendant<'a, I>(paths: I, ancestor: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    let prefix = items_path(ancestor);
    paths.into_iter().any(|p| p.starts_with(&prefix))
}
