//! Display server backends implementing [`ForeignDisplay`](crate::icon::ForeignDisplay).

#[cfg(feature = "x11")]
pub mod x11;
