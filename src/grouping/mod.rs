pub mod series;
pub mod title;
