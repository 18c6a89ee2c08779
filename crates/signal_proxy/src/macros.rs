//! # Signal Accessor Macros
//!
//! Engine wrapper types expose one `on_<signal>` / `remove_on_<signal>` pair
//! per signal. [`signal_accessors!`] writes those pairs from a declaration of
//! the signal names and their argument types, binding each pair to the
//! type's [`SignalProxy`] through [`SignalOwner`].

use crate::proxy::SignalProxy;

/// Types that own a [`SignalProxy`].
pub trait SignalOwner {
    fn signal_proxy(&self) -> &SignalProxy;
}

/// Generates typed subscribe/unsubscribe methods for a [`SignalOwner`].
///
/// Also generates `SIGNAL_NAMES`, the declared names in order, handy for
/// building the type's native source.
///
/// ```rust
/// use signal_proxy::{
///     signal_accessors, FrameScheduler, LocalSignals, SignalOwner, SignalProxy, SubscribeOptions,
/// };
/// use std::rc::Rc;
///
/// struct Button {
///     proxy: SignalProxy,
/// }
///
/// impl SignalOwner for Button {
///     fn signal_proxy(&self) -> &SignalProxy {
///         &self.proxy
///     }
/// }
///
/// signal_accessors! {
///     Button {
///         "pressed" => on_pressed, remove_on_pressed();
///         "toggled" => on_toggled, remove_on_toggled(bool);
///     }
/// }
///
/// let source = Rc::new(LocalSignals::new("Button", Button::SIGNAL_NAMES.iter().copied()));
/// let button = Button { proxy: SignalProxy::new(source, FrameScheduler::new()) };
/// let id = button.on_toggled(|on: bool| println!("toggled {on}"), SubscribeOptions::new()).unwrap();
/// assert!(button.remove_on_toggled(id));
/// ```
#[macro_export]
macro_rules! signal_accessors {
    (
        $owner:ty {
            $(
                $(#[$meta:meta])*
                $signal:literal => $on:ident, $remove:ident ( $($arg:ty),* $(,)? );
            )*
        }
    ) => {
        impl $owner {
            /// Signals declared for this type, in declaration order.
            pub const SIGNAL_NAMES: &'static [&'static str] = &[$($signal),*];

            $(
                $(#[$meta])*
                pub fn $on<F>(
                    &self,
                    callback: F,
                    options: $crate::SubscribeOptions,
                ) -> ::std::result::Result<$crate::SubscriptionId, $crate::SignalError>
                where
                    F: $crate::Callback<($($arg,)*)>,
                {
                    $crate::SignalOwner::signal_proxy(self)
                        .subscribe_with::<($($arg,)*), F>($signal, options, callback)
                }

                pub fn $remove(&self, id: $crate::SubscriptionId) -> bool {
                    $crate::SignalOwner::signal_proxy(self).unsubscribe($signal, id)
                }
            )*
        }
    };
}
