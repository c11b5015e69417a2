pub mod lifecycle;
pub mod simulate;
pub mod stages;
pub mod transitions;
