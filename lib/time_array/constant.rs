//! Time-independent arrays.

use ndarray as nd;
use crate::{
    dtype::Elem,
    error::Result,
    nd_utils::{ self, add_broadcast, mul_broadcast },
};

/// A fixed array, returned as-is at every time.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantArray<T>
where T: Elem
{
    x: nd::ArrayD<T>,
}

impl<T> ConstantArray<T>
where T: Elem
{
    /// Create a new `ConstantArray`.
    pub fn new(x: nd::ArrayD<T>) -> Self { Self { x } }

    /// Return a reference to the stored array.
    pub fn array(&self) -> &nd::ArrayD<T> { &self.x }

    pub fn shape(&self) -> &[usize] { self.x.shape() }

    pub fn call(&self, _t: f64) -> nd::ArrayD<T> { self.x.clone() }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        nd_utils::reshape(self.x.clone(), shape).map(Self::new)
    }

    pub fn mT(&self) -> Self {
        Self::new(nd_utils::transpose_last_two(self.x.clone()))
    }

    pub fn conj(&self) -> Self { Self::new(self.x.mapv(T::conj)) }

    pub fn neg(&self) -> Self { Self::new(self.x.mapv(|x| -x)) }

    pub fn scale(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        mul_broadcast(&self.x, y).map(Self::new)
    }

    pub fn add_array(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        add_broadcast(&self.x, y).map(Self::new)
    }
}

#[cfg(test)]
mod test {
    use num_complex::Complex64 as C64;
    use super::*;

    fn sx() -> nd::ArrayD<C64> {
        let o = C64::new(0.0, 0.0);
        let l = C64::new(1.0, 0.0);
        nd::array![[o, l], [l, o]].into_dyn()
    }

    #[test]
    fn constant_in_time() {
        let x = ConstantArray::new(sx());
        for t in [-1.0, 0.0, 0.5, 1e9] {
            assert_eq!(x.call(t), sx());
        }
    }

    #[test]
    fn algebra() {
        let x = ConstantArray::new(sx());
        let y = x.add_array(&sx()).unwrap().neg();
        assert_eq!(y.call(0.0), sx().mapv(|z| z * -2.0));
        let batch = nd::ArrayD::from_elem(nd::IxDyn(&[3, 1, 1]), C64::new(2.0, 0.0));
        assert_eq!(x.scale(&batch).unwrap().shape(), &[3, 2, 2]);
        let bad = nd::ArrayD::from_elem(nd::IxDyn(&[3]), C64::new(2.0, 0.0));
        assert!(x.add_array(&bad).is_err());
    }
}
