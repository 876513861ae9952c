/// Implements the shared surface of the `Slot` and `Epoch` newtypes:
/// conversions, saturating math against `u64`, display formatting and the
/// SSZ/tree-hash impls that delegate to the inner `u64`.
macro_rules! impl_common {
    ($type: ident) => {
        impl $type {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn as_u64(self) -> u64 {
                self.0
            }

            pub fn as_usize(self) -> usize {
                self.0 as usize
            }

            pub fn max_value() -> Self {
                Self(u64::MAX)
            }

            pub fn saturating_add<T: Into<u64>>(self, other: T) -> Self {
                Self(self.0.saturating_add(other.into()))
            }

            pub fn saturating_sub<T: Into<u64>>(self, other: T) -> Self {
                Self(self.0.saturating_sub(other.into()))
            }
        }

        impl From<u64> for $type {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$type> for u64 {
            fn from(value: $type) -> u64 {
                value.0
            }
        }

        impl std::ops::Add<u64> for $type {
            type Output = Self;

            fn add(self, other: u64) -> Self {
                self.saturating_add(other)
            }
        }

        impl std::ops::Sub<u64> for $type {
            type Output = Self;

            fn sub(self, other: u64) -> Self {
                self.saturating_sub(other)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::fmt::Debug for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl ssz::Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as ssz::Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as ssz::Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl ssz::Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as ssz::Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as ssz::Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
                u64::from_ssz_bytes(bytes).map(Self)
            }
        }

        impl tree_hash::TreeHash for $type {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                <u64 as tree_hash::TreeHash>::tree_hash_type()
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                <u64 as tree_hash::TreeHash>::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                self.0.tree_hash_root()
            }
        }
    };
}
