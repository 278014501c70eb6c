//! Shape fingerprints used to decide whether instantiations may share compiled code.

use blake3::Hasher;

use super::records::{ComputedInstanceFieldLayout, InstanceLayoutKind};
use crate::error::{Error, Result};
use crate::type_system::{TypeId, TypeSystemContext};

fn digest_to_u64(hasher: &Hasher) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

impl ComputedInstanceFieldLayout {
    /// Fingerprint of the scalar facts. Offsets are deliberately excluded so a layout and its
    /// `TypeOnly` projection hash the same.
    #[must_use]
    pub fn shape_identity(&self) -> u64 {
        let mut hasher = Hasher::new();
        for value in [
            self.byte_count_unaligned,
            self.byte_count_alignment,
            self.field_alignment,
            self.field_size,
        ] {
            hasher.update(&(value as u64).to_le_bytes());
        }
        hasher.update(&[u8::from(self.layout_abi_stable)]);
        digest_to_u64(&hasher)
    }
}

impl TypeSystemContext {
    /// Verify that `instantiation` may run code compiled for `canonical`.
    ///
    /// Sharing requires identical size, alignment, ABI stability, GC-pointer presence and
    /// by-ref presence.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidLayout`] naming the first disagreement, or with the error of
    /// laying out either type.
    pub fn check_code_sharing(&self, canonical: TypeId, instantiation: TypeId) -> Result<()> {
        let expected = self.instance_layout(canonical, InstanceLayoutKind::TypeOnly)?;
        let actual = self.instance_layout(instantiation, InstanceLayoutKind::TypeOnly)?;
        let mismatch = if expected.shape_identity() != actual.shape_identity() {
            Some(format!(
                "size {}/align {} differs from canonical `{}` size {}/align {}",
                actual.byte_count_unaligned,
                actual.byte_count_alignment,
                self.name(canonical),
                expected.byte_count_unaligned,
                expected.byte_count_alignment
            ))
        } else if self.contains_gc_pointers(canonical)?
            != self.contains_gc_pointers(instantiation)?
        {
            Some(format!(
                "GC pointer layout differs from canonical `{}`",
                self.name(canonical)
            ))
        } else if self.contains_byrefs(canonical)? != self.contains_byrefs(instantiation)? {
            Some(format!(
                "by-ref fields differ from canonical `{}`",
                self.name(canonical)
            ))
        } else {
            None
        };

        match mismatch {
            Some(message) => {
                tracing::debug!(
                    target: "layout",
                    stage = "identity.reject",
                    canonical = self.name(canonical),
                    instantiation = self.name(instantiation),
                    reason = %message
                );
                Err(Error::invalid_layout(self.name(instantiation), message))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_offsets_but_not_scalars() {
        let base = ComputedInstanceFieldLayout::scalar(16, 8);
        let mut unstable = base.clone();
        unstable.layout_abi_stable = false;
        let wider = ComputedInstanceFieldLayout::scalar(24, 8);

        assert_eq!(base.shape_identity(), base.without_offsets().shape_identity());
        assert_ne!(base.shape_identity(), unstable.shape_identity());
        assert_ne!(base.shape_identity(), wider.shape_identity());
    }
}
