use super::U;

/// Array evidence: one element hypothesis shared by every position.
#[derive(Clone, Debug, Default)]
pub struct ArrC {
    pub len_min: u32,
    pub len_max: u32,
    pub item: Box<U>,
    pub samples: u64,
}

impl ArrC {
    pub(super) fn join(a: &Self, b: &Self) -> Self {
        Self {
            len_min: a.len_min.min(b.len_min),
            len_max: a.len_max.max(b.len_max),
            item: Box::new(U::join(&a.item, &b.item)),
            samples: a.samples + b.samples,
        }
    }
}
