//! Construction of [`TimeArray`]s from loosely typed user input.
//!
//! All dtype and shape checks happen here, once, so that evaluation can trust
//! its data unconditionally.

use std::{ fmt, sync::Arc };
use ndarray as nd;
use num_complex::{ Complex32 as C32, Complex64 as C64 };
use tracing::debug;
use crate::{
    dtype::{ ArrayLike, Elem },
    error::{ Error, Result },
    time_array::{
        ArrayFn,
        TimeArray,
        callable::CallableArray,
        composite::FactorArray,
        constant::ConstantArray,
        factor::{ ModulatedFactor, PwcFactor },
    },
};

/// A user-supplied function of time.
pub type TimeFn = Arc<dyn Fn(f64) -> ArrayLike + Send + Sync>;

/// Input to [`totime`].
///
/// Accepted forms are a plain array, a function of time, a 2-tuple
/// `(f, array)` for a modulated array, and a 3-tuple `(times, values, array)`
/// for a piecewise-constant array.
#[derive(Clone)]
pub enum Input {
    Array(ArrayLike),
    Fn(TimeFn),
    Tuple(Vec<Input>),
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(a) => write!(f, "Array({:?})", a),
            Self::Fn(_) => write!(f, "Fn(Arc<...>)"),
            Self::Tuple(items) => write!(f, "Tuple({:?})", items),
        }
    }
}

impl Input {
    /// Wrap a function of time.
    pub fn function<F>(f: F) -> Self
    where F: Fn(f64) -> ArrayLike + Send + Sync + 'static
    {
        Self::Fn(Arc::new(f))
    }

    /// Build a `(times, values, array)` triple.
    pub fn pwc<A, B, C>(times: A, values: B, array: C) -> Self
    where
        A: Into<ArrayLike>,
        B: Into<ArrayLike>,
        C: Into<ArrayLike>,
    {
        Self::Tuple(vec![
            Self::Array(times.into()),
            Self::Array(values.into()),
            Self::Array(array.into()),
        ])
    }

    /// Build an `(f, array)` pair.
    pub fn modulated<F, A>(f: F, array: A) -> Self
    where
        F: Fn(f64) -> ArrayLike + Send + Sync + 'static,
        A: Into<ArrayLike>,
    {
        Self::Tuple(vec![Self::function(f), Self::Array(array.into())])
    }

    /// Human-readable description of the runtime type, for error messages.
    pub fn type_name(&self) -> String {
        match self {
            Self::Array(a) => a.type_name(),
            Self::Fn(_) => "a function".into(),
            Self::Tuple(items) => format!("a tuple of length {}", items.len()),
        }
    }
}

impl From<ArrayLike> for Input {
    fn from(a: ArrayLike) -> Self { Self::Array(a) }
}

impl From<TimeFn> for Input {
    fn from(f: TimeFn) -> Self { Self::Fn(f) }
}

macro_rules! impl_input_from_array {
    ( $( $elem:ty ),* ) => {
        $(
            impl<D> From<nd::Array<$elem, D>> for Input
            where D: nd::Dimension
            {
                fn from(a: nd::Array<$elem, D>) -> Self { Self::Array(a.into()) }
            }
        )*
    }
}
impl_input_from_array!(f32, f64, C32, C64);

impl<A, B> From<(A, B)> for Input
where
    A: Into<Input>,
    B: Into<Input>,
{
    fn from(x: (A, B)) -> Self { Self::Tuple(vec![x.0.into(), x.1.into()]) }
}

impl<A, B, C> From<(A, B, C)> for Input
where
    A: Into<Input>,
    B: Into<Input>,
    C: Into<Input>,
{
    fn from(x: (A, B, C)) -> Self {
        Self::Tuple(vec![x.0.into(), x.1.into(), x.2.into()])
    }
}

/// Build a [`TimeArray`] of element type `T` from user input.
///
/// Dispatch is by the form of the input:
/// - `(times, values, array)`: piecewise-constant;
/// - `(f, array)`: modulated;
/// - a plain array: constant;
/// - a function: callable.
pub fn totime<T, I>(x: I) -> Result<TimeArray<T>>
where
    T: Elem,
    I: Into<Input>,
{
    let items = match x.into() {
        Input::Tuple(items) => items,
        Input::Array(a) => { return constant(a); },
        Input::Fn(f) => { return callable(f); },
    };
    let items = match <[Input; 3]>::try_from(items) {
        Ok([times, values, array]) => { return pwc(times, values, array); },
        Err(items) => items,
    };
    match <[Input; 2]>::try_from(items) {
        Ok([f, array]) => modulated(f, array),
        Err(items) => {
            let found = Input::Tuple(items).type_name();
            Err(Error::UnsupportedInput(found))
        },
    }
}

fn constant<T>(x: ArrayLike) -> Result<TimeArray<T>>
where T: Elem
{
    let x = ConstantArray::new(T::cast(&x)?);
    debug!(kind = "ConstantTimeArray", shape = ?x.shape(), "built time array");
    Ok(TimeArray::Constant(x))
}

fn callable<T>(f: TimeFn) -> Result<TimeArray<T>>
where T: Elem
{
    let f0 = f(0.0);
    if !f0.is_native() {
        return Err(Error::UnexpectedReturnType(f0.type_name()));
    }
    let f0 = T::take_native(f0)
        .map_err(|other| {
            Error::DTypeMismatch {
                expected: format!("`{}`", T::DTYPE),
                actual: other.dtype().unwrap_or(T::DTYPE),
            }
        })?;
    let g: ArrayFn<T> = Arc::new(move |t| promote(f(t)));
    let x = CallableArray::new(g, f0);
    debug!(kind = "CallableTimeArray", shape = ?x.shape(), "built time array");
    Ok(TimeArray::Callable(x))
}

fn pwc<T>(times: Input, values: Input, array: Input) -> Result<TimeArray<T>>
where T: Elem
{
    let times: nd::ArrayD<f64> = f64::cast(&array_arg(times)?)?;
    if times.ndim() != 1 {
        return Err(Error::MalformedTimes {
            arg: "times",
            reason: format!("a 1D array, but has shape {:?}", times.shape()),
        });
    }
    if !times.iter().zip(times.iter().skip(1)).all(|(a, b)| a < b) {
        return Err(Error::MalformedTimes {
            arg: "times",
            reason: "sorted in strictly ascending order".into(),
        });
    }
    if times.len() < 2 {
        return Err(Error::MalformedTimes {
            arg: "times",
            reason: format!("an array with at least 2 elements, but has {}", times.len()),
        });
    }
    let nv = times.len() - 1;

    let values: nd::ArrayD<T> = T::cast(&array_arg(values)?)?;
    if values.ndim() == 0 || values.shape()[0] != nv {
        return Err(Error::ShapeMismatch {
            arg: "values",
            expected: format!("({}, ...)", nv),
            actual: values.shape().to_vec(),
        });
    }

    let array = square("array", T::cast(&array_arg(array)?)?)?;
    let times: Arc<[f64]> = times.iter().copied().collect();
    let factor = PwcFactor::new(times, values);
    let x = FactorArray::new(vec![factor], array.insert_axis(nd::Axis(0)), None)?;
    debug!(kind = "PWCTimeArray", shape = ?x.shape(), nv, "built time array");
    Ok(TimeArray::Pwc(x))
}

fn modulated<T>(f: Input, array: Input) -> Result<TimeArray<T>>
where T: Elem
{
    let f = match f {
        Input::Fn(f) => f,
        other => {
            return Err(Error::NotCallable { arg: "f", found: other.type_name() });
        },
    };
    let f0 = f(0.0);
    if !f0.is_native() {
        return Err(Error::UnexpectedReturnType(f0.type_name()));
    }
    let real = <T::Real as Elem>::DTYPE;
    match f0.dtype() {
        Some(dtype) if dtype == T::DTYPE || dtype == real => { },
        dtype => {
            let expected
                = if real == T::DTYPE {
                    format!("`{}`", T::DTYPE)
                } else {
                    format!("`{}` or `{}`", T::DTYPE, real)
                };
            return Err(Error::DTypeMismatch {
                expected,
                actual: dtype.unwrap_or(T::DTYPE),
            });
        },
    }
    let f0: nd::ArrayD<T> = promote(f0);

    let array = square("array", T::cast(&array_arg(array)?)?)?;
    let g: ArrayFn<T> = Arc::new(move |t| promote(f(t)));
    let factor = ModulatedFactor::new(g, f0);
    let x = FactorArray::new(vec![factor], array.insert_axis(nd::Axis(0)), None)?;
    debug!(kind = "ModulatedTimeArray", shape = ?x.shape(), "built time array");
    Ok(TimeArray::Modulated(x))
}

// convert the output of a user function, moving it out when it already has
// the right dtype
fn promote<T>(a: ArrayLike) -> nd::ArrayD<T>
where T: Elem
{
    match T::take_native(a) {
        Ok(x) => x,
        Err(other) => match T::cast(&other) {
            Ok(x) => x,
            Err(err) => panic!("time function returned an invalid array: {}", err),
        },
    }
}

fn array_arg(x: Input) -> Result<ArrayLike> {
    match x {
        Input::Array(a) => Ok(a),
        other => Err(Error::UnsupportedInput(other.type_name())),
    }
}

fn square<T>(arg: &'static str, a: nd::ArrayD<T>) -> Result<nd::Array2<T>>
where T: Elem
{
    let shape = a.shape().to_vec();
    if shape.len() != 2 || shape[0] != shape[1] {
        return Err(Error::not_square(arg, &shape));
    }
    a.into_dimensionality::<nd::Ix2>()
        .map_err(|_| Error::not_square(arg, &shape))
}
