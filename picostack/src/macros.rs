/// Declare a field type that keeps values outside of the listed ones.
///
/// Generates the enum with an extra `Unknown` variant and the conversions from and into the
/// integer, so parsing a header never fails on a value we have no name for.
macro_rules! enum_with_unknown {
    (
        $( #[$meta:meta] )*
        pub enum $name:ident($repr:ty) {
            $( $( #[$item_meta:meta] )* $item:ident = $raw:expr ),+ $(,)?
        }
    ) => {
        $( #[$meta] )*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $( #[$item_meta] )* $item, )+
            /// Any other value of the field.
            Unknown($repr),
        }

        impl From<$repr> for $name {
            fn from(raw: $repr) -> Self {
                $( if raw == $raw { return $name::$item; } )+
                $name::Unknown(raw)
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> $repr {
                match value {
                    $( $name::$item => $raw, )+
                    $name::Unknown(raw) => raw,
                }
            }
        }
    }
}

/// Declare a header view over a plain byte slice.
///
/// The declared type is an unsized, `repr(transparent)` newtype of `[u8]`. The macro provides
/// the constructors `new_unchecked`, `new_unchecked_mut` and `new_checked`, as well as
/// `as_bytes` and `AsRef<[u8]>`. The type itself must supply
/// `fn check_len(&self) -> picostack::wire::Result<()>`, which `new_checked` runs.
///
/// ```
/// # use picostack::byte_wrapper;
/// # use picostack::wire::{Error, Result};
/// byte_wrapper! {
///     /// Two octets of port number.
///     pub struct port([u8]);
/// }
///
/// impl port {
///     fn check_len(&self) -> Result<()> {
///         if self.as_bytes().len() < 2 { Err(Error::Truncated) } else { Ok(()) }
///     }
/// }
///
/// assert!(port::new_checked(&[0x1f, 0x90]).is_ok());
/// assert_eq!(port::new_checked(&[0x1f]).err(), Some(Error::Truncated));
/// ```
#[macro_export]
macro_rules! byte_wrapper {
    (
        $( #[$meta:meta] )*
        pub struct $name:ident([u8]) $(;)?
    ) => {
        $( #[$meta] )*
        #[allow(non_camel_case_types)]
        #[repr(transparent)]
        pub struct $name([u8]);

        #[allow(dead_code)]
        impl $name {
            /// View the bytes as this header without checking their length.
            pub fn new_unchecked(bytes: &[u8]) -> &Self {
                // SAFETY: `Self` is a transparent wrapper of `[u8]`.
                unsafe { &*(bytes as *const [u8] as *const Self) }
            }

            /// View the bytes as this header, for filling it in.
            pub fn new_unchecked_mut(bytes: &mut [u8]) -> &mut Self {
                // SAFETY: `Self` is a transparent wrapper of `[u8]`.
                unsafe { &mut *(bytes as *mut [u8] as *mut Self) }
            }

            /// View the bytes as this header after `check_len` accepted them.
            pub fn new_checked(bytes: &[u8]) -> $crate::wire::Result<&Self> {
                let view = Self::new_unchecked(bytes);
                view.check_len()?;
                Ok(view)
            }

            /// The underlying bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    }
}

#[cfg(feature = "log")]
macro_rules! net_trace {
    ($($arg:expr),*) => { ::log::trace!($($arg),*) };
}

#[cfg(feature = "log")]
macro_rules! net_debug {
    ($($arg:expr),*) => { ::log::debug!($($arg),*) };
}

// Without `log` the arguments are still evaluated, keeping their bindings used.
#[cfg(not(feature = "log"))]
macro_rules! net_trace {
    ($($arg:expr),*) => {{ $( let _ = $arg; )* }};
}

#[cfg(not(feature = "log"))]
macro_rules! net_debug {
    ($($arg:expr),*) => {{ $( let _ = $arg; )* }};
}
