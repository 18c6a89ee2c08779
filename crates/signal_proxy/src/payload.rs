//! Typed payloads and callbacks.
//!
//! Native sources hand arguments over as a slice of [`serde_json::Value`].
//! A [`Payload`] is the tuple of parameter types a signal carries; it decodes
//! those arguments positionally. A [`Callback`] is any closure whose parameter
//! list matches the tuple, so `|pressed: bool| {}` subscribes to a `(bool,)`
//! signal and `|| {}` to a `()` signal.

use crate::error::SignalError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Tuple of typed arguments carried by a signal (arity 0 to 3).
pub trait Payload: Clone + 'static {
    /// Number of positional arguments
    const ARITY: usize;

    /// Decodes native arguments into the typed tuple.
    fn decode(event: &str, args: &[Value]) -> Result<Self, SignalError>;

    /// Encodes the typed tuple as native arguments.
    fn encode(&self) -> Result<Vec<Value>, SignalError>;

    /// Human-readable signature, used in mismatch errors and logs.
    fn signature() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A listener callable with the payload `P` spread positionally.
pub trait Callback<P>: 'static {
    fn invoke(&self, payload: P);
}

fn check_arity(event: &str, args: &[Value], expected: usize) -> Result<(), SignalError> {
    if args.len() != expected {
        return Err(SignalError::ArgumentCount {
            event: event.into(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn decode_arg<T: DeserializeOwned>(
    event: &str,
    args: &[Value],
    index: usize,
) -> Result<T, SignalError> {
    T::deserialize(&args[index]).map_err(|source| SignalError::ArgumentDecode {
        event: event.into(),
        index,
        source,
    })
}

macro_rules! impl_payload {
    ($arity:expr; $( $ty:ident => $idx:tt ),*) => {
        impl<$($ty,)*> Payload for ($($ty,)*)
        where
            $($ty: Serialize + DeserializeOwned + Clone + 'static,)*
        {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn decode(event: &str, args: &[Value]) -> Result<Self, SignalError> {
                check_arity(event, args, $arity)?;
                Ok(($(decode_arg::<$ty>(event, args, $idx)?,)*))
            }

            fn encode(&self) -> Result<Vec<Value>, SignalError> {
                Ok(vec![$(serde_json::to_value(&self.$idx)?,)*])
            }
        }

        impl<Func, $($ty,)*> Callback<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) + 'static,
            $($ty: 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(&self, payload: ($($ty,)*)) {
                let ($($ty,)*) = payload;
                (self)($($ty),*)
            }
        }
    };
}

impl_payload!(0;);
impl_payload!(1; A => 0);
impl_payload!(2; A => 0, B => 1);
impl_payload!(3; A => 0, B => 1, C => 2);

/// Engine-side node reference as it travels in signal arguments.
///
/// Engines pass other objects (the body entering an area, the peer that
/// connected) by handle; listeners receive the handle and its class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: u64,
    pub class: String,
}

impl ObjectRef {
    pub fn new(id: u64, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
        }
    }
}
