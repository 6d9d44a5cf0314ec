mod identify;
mod resume;
mod update_voice_state;

pub use self::identify::{Identify, IdentifyProperties};
pub use self::resume::Resume;
pub use self::update_voice_state::UpdateVoiceState;
