//! Input normalization: nested sequences, operator lists, and `.npy` files to
//! plain arrays of a requested element type.

use std::path::Path;
use ndarray as nd;
use ndarray_npy::{ read_npy, write_npy, ReadNpyError };
use num_complex::{ Complex32 as C32, Complex64 as C64 };
use crate::{
    dtype::{ ArrayLike, Elem },
    error::{ Error, Result },
    nd_utils::stack_arrays,
};

/// Convert a nested list to an array by stacking its (converted) elements
/// along a new leading axis.
///
/// An empty list gives an empty array of shape `(0,)`.
pub(crate) fn stack_list<T>(items: &[ArrayLike]) -> Result<nd::ArrayD<T>>
where T: Elem
{
    if items.is_empty() {
        return Ok(nd::ArrayD::zeros(nd::IxDyn(&[0])));
    }
    let arrays: Vec<nd::ArrayD<T>>
        = items.iter()
        .map(T::cast)
        .collect::<Result<_>>()?;
    let first = arrays[0].shape().to_vec();
    if let Some(bad) = arrays.iter().find(|a| a.shape() != first.as_slice()) {
        return Err(Error::ShapeMismatch {
            arg: "list",
            expected: format!("{:?} for every element", first),
            actual: bad.shape().to_vec(),
        });
    }
    stack_arrays(nd::Axis(0), &arrays)
        .map_err(|_| Error::ShapeMismatch {
            arg: "list",
            expected: format!("{:?} for every element", first),
            actual: first.clone(),
        })
}

/// Convert a single array-like to an array of `T`.
pub fn to_array<T, A>(x: A) -> Result<nd::ArrayD<T>>
where
    T: Elem,
    A: Into<ArrayLike>,
{
    T::cast(&x.into())
}

/// Convert a list of operators to a single stacked array of shape
/// `(len(ops), ...)`.
///
/// An empty list gives an empty array of shape `(0,)`.
pub fn to_operators<T>(ops: Vec<ArrayLike>) -> Result<nd::ArrayD<T>>
where T: Elem
{
    stack_list(&ops)
}

impl ArrayLike {
    /// Read an array from a `.npy` file, keeping its stored dtype.
    pub fn from_npy<P>(path: P) -> Result<Self>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        match read_npy::<_, nd::ArrayD<C64>>(path) {
            Ok(a) => return Ok(a.into()),
            Err(ReadNpyError::WrongDescriptor(_)) => { },
            Err(err) => return Err(err.into()),
        }
        match read_npy::<_, nd::ArrayD<C32>>(path) {
            Ok(a) => return Ok(a.into()),
            Err(ReadNpyError::WrongDescriptor(_)) => { },
            Err(err) => return Err(err.into()),
        }
        match read_npy::<_, nd::ArrayD<f64>>(path) {
            Ok(a) => return Ok(a.into()),
            Err(ReadNpyError::WrongDescriptor(_)) => { },
            Err(err) => return Err(err.into()),
        }
        Ok(read_npy::<_, nd::ArrayD<f32>>(path)?.into())
    }

    /// Write a native array to a `.npy` file.
    ///
    /// Nested lists must be converted first.
    pub fn to_npy<P>(&self, path: P) -> Result<()>
    where P: AsRef<Path>
    {
        match self {
            Self::Float32(a) => write_npy(path, a)?,
            Self::Float64(a) => write_npy(path, a)?,
            Self::Complex64(a) => write_npy(path, a)?,
            Self::Complex128(a) => write_npy(path, a)?,
            Self::List(_) => {
                return Err(Error::UnexpectedReturnType(self.type_name()));
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nested_list_stacks() {
        let row = |a: f64, b: f64| ArrayLike::from(vec![a, b]);
        let m = ArrayLike::List(vec![row(1.0, 2.0), row(3.0, 4.0)]);
        let a: nd::ArrayD<C64> = to_array(m).unwrap();
        assert_eq!(a.shape(), &[2, 2]);
        assert_eq!(a[[1, 1]], C64::new(4.0, 0.0));
    }

    #[test]
    fn ragged_list_fails() {
        let m = ArrayLike::List(vec![
            ArrayLike::from(vec![1.0_f64, 2.0]),
            ArrayLike::from(vec![3.0_f64]),
        ]);
        let err = to_array::<C64, _>(m).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn empty_operator_list() {
        let ops = to_operators::<C64>(Vec::new()).unwrap();
        assert_eq!(ops.shape(), &[0]);
    }

    #[test]
    fn operator_list() {
        let sx: ArrayLike = nd::array![[0.0, 1.0], [1.0, 0.0]].into();
        let sz: ArrayLike = nd::array![[1.0, 0.0], [0.0, -1.0]].into();
        let ops = to_operators::<C64>(vec![sx, sz]).unwrap();
        assert_eq!(ops.shape(), &[2, 2, 2]);
        assert_eq!(ops[[1, 1, 1]], C64::new(-1.0, 0.0));
    }

    #[test]
    fn npy_keeps_dtype() {
        let path = std::env::temp_dir()
            .join(format!("open-dynamics-{}.npy", std::process::id()));
        let a: ArrayLike
            = nd::array![
                [C64::new(1.0, 2.0), C64::i()],
                [C64::new(0.0, 0.0), C64::new(3.0, 0.0)],
            ]
            .into();
        a.to_npy(&path).unwrap();
        let b = ArrayLike::from_npy(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(a, b);
    }
}
