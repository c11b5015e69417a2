pub mod reconciler;
pub mod syncer;
