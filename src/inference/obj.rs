use indexmap::IndexMap;

use super::U;

/// Object evidence. Fields keep first-seen order.
#[derive(Clone, Debug, Default)]
pub struct ObjC {
    pub fields: IndexMap<String, FieldC>,
    pub seen_objects: u64,
}

#[derive(Clone, Debug, Default)]
pub struct FieldC {
    pub ty: U,
    pub present_in: u64,
}

impl ObjC {
    pub(super) fn join(a: &Self, b: &Self) -> Self {
        let mut out = Self {
            fields: IndexMap::with_capacity(a.fields.len().max(b.fields.len())),
            seen_objects: a.seen_objects + b.seen_objects,
        };
        // keys from a, in a's order
        for (k, fa) in &a.fields {
            let field = match b.fields.get(k) {
                None => fa.clone(),
                Some(fb) => FieldC {
                    ty: U::join(&fa.ty, &fb.ty),
                    present_in: fa.present_in + fb.present_in,
                },
            };
            out.fields.insert(k.clone(), field);
        }
        // then keys only in b
        for (k, fb) in &b.fields {
            if !out.fields.contains_key(k) {
                out.fields.insert(k.clone(), fb.clone());
            }
        }
        out
    }
}
