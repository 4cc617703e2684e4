//! Typed closures turned into registry descriptors

use super::{Descriptor, Invoke};
use crate::convert::{FromValue, IntoReturns};
use crate::dispatch::CallError;
use crate::value::{TypeDesc, Value};

/// Functions that can be registered under a name.
///
/// Implemented for `Fn(A1, ..., An) -> R` with up to six parameters, where
/// every parameter implements `FromValue` and `R` implements `IntoReturns`.
/// `Args` only disambiguates the impls.
pub trait IntoCallable<Args>: Send + Sync + 'static {
    fn param_types() -> Vec<TypeDesc>;

    fn return_types() -> Vec<TypeDesc>;

    fn into_invoke(self) -> Invoke;

    /// Build the descriptor for `name`
    fn into_descriptor(self, name: &str) -> Descriptor
    where
        Self: Sized,
    {
        Descriptor::new(name, Self::param_types(), Self::return_types(), self.into_invoke())
    }
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $(, $tail:ident)*) => { 1usize + count!($($tail),*) };
}

macro_rules! impl_into_callable {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> IntoCallable<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReturns,
            $($arg: FromValue,)*
        {
            fn param_types() -> Vec<TypeDesc> {
                vec![$(<$arg as crate::convert::Typed>::type_desc()),*]
            }

            fn return_types() -> Vec<TypeDesc> {
                R::return_types()
            }

            #[allow(non_snake_case, unused_variables, unused_mut, unused_assignments)]
            fn into_invoke(self) -> Invoke {
                Box::new(move |args: Vec<Value>| {
                    let expected = count!($($arg),*);
                    let [$($arg),*]: [Value; count!($($arg),*)] =
                        args.try_into().map_err(|args: Vec<Value>| CallError::Arity {
                            expected,
                            got: args.len(),
                        })?;
                    let mut position = 0usize;
                    $(
                        let $arg = <$arg as FromValue>::from_value($arg)
                            .map_err(|source| CallError::Decode { position, source })?;
                        position += 1;
                    )*
                    Ok((self)($($arg),*).into_values())
                })
            }
        }
    };
}

impl_into_callable!();
impl_into_callable!(A1);
impl_into_callable!(A1, A2);
impl_into_callable!(A1, A2, A3);
impl_into_callable!(A1, A2, A3, A4);
impl_into_callable!(A1, A2, A3, A4, A5);
impl_into_callable!(A1, A2, A3, A4, A5, A6);
