pub mod feed;
pub mod freshness;
pub mod recommend;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use feed::{SwiperBatch, SwiperFeed};
pub use freshness::{is_expired, is_expired_at};
pub use recommend::{plan, Facet, MixOutcome, Phase, RecommendationMixer, TasteProfile};
pub use scheduler::{SchedulerOptions, SyncJob, SyncScheduler, SyncTrigger};
pub use store::{Collection, LocalStore, StoreError, StoreOptions};
pub use sync::{
    is_session_error, DetailStats, ListOutcome, ListPage, ListReport, SkipReason, StorageHealth, SyncConfig, SyncEngine,
    SyncReport, SyncStatus,
};
pub use view::{LoadGuard, LoadSlot, ViewState};
