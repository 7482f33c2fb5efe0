pub mod checkpoint;
pub mod credits;
pub mod friends;
pub mod movie;
pub mod profile;
pub mod tracked_item;

pub use checkpoint::{SyncCheckpoint, CHECKPOINT_CACHE_ENABLED, CHECKPOINT_LAST_SYNC, CHECKPOINT_PROFILE};
pub use credits::{CastMember, Credits, CrewMember, MovieCollection, Video};
pub use friends::{Friend, FriendRequest, UserSearchResult};
pub use movie::{Genre, MovieDetail, MoviePage, MovieSummary};
pub use profile::{PrivacySetting, UserProfile, UserStats};
pub use tracked_item::{is_valid_rating, ListEntry, ListKind, TrackedItem};
