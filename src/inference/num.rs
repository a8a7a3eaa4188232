use std::collections::BTreeSet;

use ordered_float::OrderedFloat;

use crate::descriptor::InputKind;

#[derive(Clone, Debug)]
pub struct NumC {
    pub lits: BTreeSet<OrderedFloat<f64>>,
    pub min: OrderedFloat<f64>,
    pub max: OrderedFloat<f64>,
    pub saw_int: bool,
    /// integer literal outside the 32-bit range
    pub saw_wide: bool,
    pub saw_float: bool,
}

impl NumC {
    pub fn observe(n: &serde_json::Number) -> Self {
        let (x, saw_int, saw_wide, saw_float) = if n.is_f64() {
            (n.as_f64().unwrap_or_default(), false, false, true)
        } else if let Some(i) = n.as_i64() {
            (i as f64, true, i32::try_from(i).is_err(), false)
        } else {
            (n.as_f64().unwrap_or_default(), true, true, false)
        };
        let x = OrderedFloat(x);
        Self {
            lits: BTreeSet::from([x]),
            min: x,
            max: x,
            saw_int,
            saw_wide,
            saw_float,
        }
    }

    pub(super) fn join(a: &Self, b: &Self) -> Self {
        let mut lits = &a.lits | &b.lits;
        if lits.len() > super::MAX_NUM_LITS {
            lits.clear(); // cap: interval only
        }
        Self {
            lits,
            min: a.min.min(b.min),
            max: a.max.max(b.max),
            saw_int: a.saw_int || b.saw_int,
            saw_wide: a.saw_wide || b.saw_wide,
            saw_float: a.saw_float || b.saw_float,
        }
    }

    pub fn kind(&self) -> InputKind {
        if self.saw_float {
            InputKind::Real
        } else if self.saw_wide {
            InputKind::Integer64
        } else {
            InputKind::Integer32
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.saw_float && self.saw_int
    }

    /// Small integer sets become an enumeration. Wide literals are skipped,
    /// the `f64` evidence may not hold them exactly.
    pub fn integer_enum(&self) -> Option<Vec<i64>> {
        if self.saw_float || self.saw_wide || self.lits.is_empty() || self.lits.len() > super::NUM_ENUM_MAX {
            return None;
        }
        Some(self.lits.iter().map(|x| x.0 as i64).collect())
    }
}
