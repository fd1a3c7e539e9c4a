pub mod leaderboard;
pub mod presenter;
pub mod tiktok;
pub mod views;
