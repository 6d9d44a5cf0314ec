mod guild_create;
mod hello;
mod message_create;
mod reaction;
mod ready;
mod voice_server_update;
mod voice_state;

pub use self::guild_create::GuildCreate;
pub use self::hello::Hello;
pub use self::message_create::{MessageCreate, User};
pub use self::reaction::{Reaction, ReactionEmoji};
pub use self::ready::Ready;
pub use self::voice_server_update::VoiceServerUpdate;
pub use self::voice_state::VoiceState;
