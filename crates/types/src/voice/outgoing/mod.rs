mod identify;
mod resume;
mod select_protocol;
mod speaking;

pub use self::identify::Identify;
pub use self::resume::Resume;
pub use self::select_protocol::{SelectProtocol, SelectProtocolData};
pub use self::speaking::SetSpeaking;
