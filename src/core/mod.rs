// Core modules implementing the registry, conversion, framing and codecs.
pub mod codec;
pub mod comments;
pub mod convert;
pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;
pub mod meta;
pub mod object;
pub mod resolve;
pub mod scheme;
mod strict;
