pub mod document;
pub mod notification;
pub mod trip;
pub mod tracking;
