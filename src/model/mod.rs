pub use aggregate::*;
pub use cursor::*;
pub use leaderboard::*;
pub use statistics::*;
pub use timestamp::*;
pub use token::*;
pub use video::*;

mod aggregate;
mod cursor;
mod leaderboard;
mod statistics;
mod timestamp;
mod token;
mod video;
