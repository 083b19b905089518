pub mod edit;
pub mod list;
pub mod now_playing;
pub mod pause;
pub mod play;
pub mod skip;
pub mod stop;

use crate::{Data, Error};

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        play::play(),
        skip::skip(),
        stop::stop(),
        stop::leave(),
        pause::pause(),
        pause::resume(),
        list::list(),
        now_playing::now_playing(),
        edit::remove(),
        edit::shuffle(),
        edit::loop_mode(),
    ]
}
