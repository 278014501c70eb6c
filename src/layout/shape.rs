//! Calling-convention shape bits for value types.

/// ABI classification bits for value types.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueTypeShapeCharacteristics {
    bits: u8,
}

impl ValueTypeShapeCharacteristics {
    pub const NONE: ValueTypeShapeCharacteristics = ValueTypeShapeCharacteristics { bits: 0 };
    /// Up to four `float` leaves and nothing else.
    pub const HOMOGENOUS_FLOAT_AGGREGATE: ValueTypeShapeCharacteristics =
        ValueTypeShapeCharacteristics { bits: 1 << 0 };
    pub const HOMOGENOUS_DOUBLE_AGGREGATE: ValueTypeShapeCharacteristics =
        ValueTypeShapeCharacteristics { bits: 1 << 1 };
    pub const HOMOGENOUS_VECTOR64_AGGREGATE: ValueTypeShapeCharacteristics =
        ValueTypeShapeCharacteristics { bits: 1 << 2 };
    pub const HOMOGENOUS_VECTOR128_AGGREGATE: ValueTypeShapeCharacteristics =
        ValueTypeShapeCharacteristics { bits: 1 << 3 };
    pub const AGGREGATE_MASK: ValueTypeShapeCharacteristics =
        ValueTypeShapeCharacteristics { bits: 0x0F };

    #[must_use]
    pub const fn empty() -> Self {
        Self::NONE
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self { bits }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.bits
    }

    #[must_use]
    pub const fn contains(self, other: ValueTypeShapeCharacteristics) -> bool {
        (self.bits & other.bits) == other.bits
    }

    pub fn insert(&mut self, other: ValueTypeShapeCharacteristics) {
        self.bits |= other.bits;
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Element width of a homogeneous aggregate, if this is one.
    #[must_use]
    pub fn aggregate_element_size(self) -> Option<usize> {
        let aggregate = self.bits & Self::AGGREGATE_MASK.bits;
        match aggregate {
            x if x == Self::HOMOGENOUS_FLOAT_AGGREGATE.bits => Some(4),
            x if x == Self::HOMOGENOUS_DOUBLE_AGGREGATE.bits
                || x == Self::HOMOGENOUS_VECTOR64_AGGREGATE.bits =>
            {
                Some(8)
            }
            x if x == Self::HOMOGENOUS_VECTOR128_AGGREGATE.bits => Some(16),
            _ => None,
        }
    }
}

impl std::ops::BitOr for ValueTypeShapeCharacteristics {
    type Output = ValueTypeShapeCharacteristics;

    fn bitor(self, rhs: Self) -> Self::Output {
        ValueTypeShapeCharacteristics {
            bits: self.bits | rhs.bits,
        }
    }
}

impl std::ops::BitOrAssign for ValueTypeShapeCharacteristics {
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits |= rhs.bits;
    }
}
