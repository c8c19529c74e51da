pub mod api;
pub mod live;
pub mod presenter;
pub mod storage;
pub mod store;

pub use api::NotificationApi;
pub use presenter::{NoopSoundPlayer, Presenter, SoundPlayer, TracingPresenter};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::NotificationStore;
