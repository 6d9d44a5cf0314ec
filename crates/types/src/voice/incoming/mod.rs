mod client;
mod hello;
mod ready;
mod session_description;
mod speaking;

pub use self::client::{ClientConnect, ClientDisconnect};
pub use self::hello::Hello;
pub use self::ready::Ready;
pub use self::session_description::{Encoding, SessionDescription};
pub use self::speaking::Speaking;
