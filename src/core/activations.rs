use crate::prelude::*;

/// Pre-activation values saved by [`relu_forward`] for the backward pass.
#[derive(Debug, Clone)]
pub struct ReluCache<A> {
    z: Array2<A>,
}

/// Elementwise max(0, z). Returns the activations and the cache consumed
/// by [`relu_backward`].
pub fn relu_forward<A: NdFloat>(z: Array2<A>) -> (Array2<A>, ReluCache<A>) {
    let a = z.mapv(|z| if z > A::zero() { z } else { A::zero() });
    (a, ReluCache { z })
}

/// Upstream gradient where the pre-activation was positive, zero elsewhere.
pub fn relu_backward<A: NdFloat>(mut dout: Array2<A>, cache: ReluCache<A>) -> Array2<A> {
    dout.zip_mut_with(&cache.z, |d, &z| {
        if z <= A::zero() {
            *d = A::zero();
        }
    });
    dout
}
