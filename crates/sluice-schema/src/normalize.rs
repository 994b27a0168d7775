//! Type-list normalization.
//!
//! Producers are free to write `"type": "string"` or `"type": ["null", "string"]`.
//! Everything downstream assumes the list form, so we rewrite the whole tree
//! once up front. The walk covers `properties`, `items` and each branch of
//! `oneOf`/`anyOf`/`allOf`.

use crate::{PropertySchema, TypeSpec};

/// Return a copy of `schema` with every `type` keyword in list form.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(schema: &PropertySchema) -> PropertySchema {
    PropertySchema {
        ty: schema.ty.clone().map(TypeSpec::into_list),
        format: schema.format.clone(),
        properties: schema.properties.as_ref().map(|props| {
            props
                .iter()
                .map(|(name, prop)| (name.clone(), normalize(prop)))
                .collect()
        }),
        items: schema.items.as_deref().map(|items| Box::new(normalize(items))),
        one_of: normalize_branches(schema.one_of.as_deref()),
        any_of: normalize_branches(schema.any_of.as_deref()),
        all_of: normalize_branches(schema.all_of.as_deref()),
    }
}

fn normalize_branches(branches: Option<&[PropertySchema]>) -> Option<Vec<PropertySchema>> {
    branches.map(|branches| branches.iter().map(normalize).collect())
}

/// True when no reachable `type` keyword is a bare tag.
pub fn is_normalized(schema: &PropertySchema) -> bool {
    if matches!(schema.ty, Some(TypeSpec::One(_))) {
        return false;
    }

    schema
        .properties
        .iter()
        .flat_map(|props| props.values())
        .chain(schema.items.as_deref())
        .chain(schema.one_of.iter().flatten())
        .chain(schema.any_of.iter().flatten())
        .chain(schema.all_of.iter().flatten())
        .all(is_normalized)
}
