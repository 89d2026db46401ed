//! Repository traits for metadata operations.

pub mod activity;
pub mod downloads;
pub mod history;
pub mod releases;
pub mod settings;

pub use activity::ActivityRepo;
pub use downloads::DownloadLogRepo;
pub use history::HistoryRepo;
pub use releases::ReleaseRepo;
pub use settings::SettingsRepo;
