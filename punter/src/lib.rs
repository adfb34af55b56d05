pub use codec::*;
pub use errors::*;
pub use protocol::*;
pub use scores::*;

#[cfg(test)]
mod arbitrary;
mod codec;
mod errors;
mod protocol;
mod scores;
