//! Value-number pairs
//!
//! Value numbers are assigned by the value-numbering phase and passed
//! through untouched by the IR core. The liberal number assumes no
//! interference from other threads; the conservative one does not.

/// Opaque value number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueNum(pub u32);

impl ValueNum {
    /// "No value number assigned"
    pub const NO_VN: ValueNum = ValueNum(u32::MAX);

    pub fn is_none(self) -> bool {
        self == ValueNum::NO_VN
    }
}

impl Default for ValueNum {
    fn default() -> Self {
        ValueNum::NO_VN
    }
}

impl std::fmt::Display for ValueNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "$NoVN")
        } else {
            write!(f, "${:x}", self.0)
        }
    }
}

/// Which member of a pair to read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueNumKind {
    Liberal,
    Conservative,
}

/// Liberal/conservative value-number pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueNumPair {
    pub liberal: ValueNum,
    pub conservative: ValueNum,
}

impl ValueNumPair {
    pub fn new(liberal: ValueNum, conservative: ValueNum) -> Self {
        ValueNumPair { liberal, conservative }
    }

    /// Pair with the same number on both sides
    pub fn both(vn: ValueNum) -> Self {
        ValueNumPair { liberal: vn, conservative: vn }
    }

    pub fn get(&self, kind: ValueNumKind) -> ValueNum {
        match kind {
            ValueNumKind::Liberal => self.liberal,
            ValueNumKind::Conservative => self.conservative,
        }
    }

    pub fn set(&mut self, kind: ValueNumKind, vn: ValueNum) {
        match kind {
            ValueNumKind::Liberal => self.liberal = vn,
            ValueNumKind::Conservative => self.conservative = vn,
        }
    }

    pub fn both_defined(&self) -> bool {
        !self.liberal.is_none() && !self.conservative.is_none()
    }

    pub fn both_equal(&self) -> bool {
        self.liberal == self.conservative
    }

    pub fn clear(&mut self) {
        *self = ValueNumPair::default();
    }
}

impl std::fmt::Display for ValueNumPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.both_equal() {
            write!(f, "<l,c:{}>", self.liberal)
        } else {
            write!(f, "<l:{}, c:{}>", self.liberal, self.conservative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pair_is_empty() {
        let pair = ValueNumPair::default();
        assert!(pair.liberal.is_none());
        assert!(pair.conservative.is_none());
        assert!(!pair.both_defined());
    }

    #[test]
    fn test_get_set_by_kind() {
        let mut pair = ValueNumPair::default();
        pair.set(ValueNumKind::Conservative, ValueNum(7));
        assert_eq!(pair.get(ValueNumKind::Conservative), ValueNum(7));
        assert!(pair.get(ValueNumKind::Liberal).is_none());
        pair.set(ValueNumKind::Liberal, ValueNum(7));
        assert!(pair.both_defined());
        assert!(pair.both_equal());
        pair.clear();
        assert_eq!(pair, ValueNumPair::default());
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueNumPair::both(ValueNum(0x2a)).to_string(), "<l,c:$2a>");
        let split = ValueNumPair::new(ValueNum(1), ValueNum::NO_VN);
        assert_eq!(split.to_string(), "<l:$1, c:$NoVN>");
    }
}
