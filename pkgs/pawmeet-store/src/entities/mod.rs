//! Sea-ORM entities for pawmeet-store

pub mod unread_watermarks;

pub use unread_watermarks::Entity as UnreadWatermark;
